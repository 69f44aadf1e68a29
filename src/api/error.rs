use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid backend response: {0}")]
    ParseError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Backend error: {code} - {message}")]
    BackendError { code: String, message: String },

    #[error("Backend is not configured: {0}")]
    NotConfigured(String),
}

impl ApiError {
    /// True when the caller has no valid session and should sign in again.
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::AuthenticationError(_))
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => ApiError::NotFound("no matching row".to_string()),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::ParseError(err.to_string())
    }
}
