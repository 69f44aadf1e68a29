//! JSON routes under `/api`, one module per page.

pub mod accounts;
pub mod auth;
pub mod dashboard;
pub mod profile;
pub mod trades;

use actix_web::{dev::Payload, http::StatusCode, web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use futures::future::LocalBoxFuture;
use serde_json::json;
use thiserror::Error;

use crate::{commands::resolve_session, models::Session, state::AppState};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),
}

impl From<String> for ControllerError {
    fn from(message: String) -> Self {
        ControllerError::BadRequest(message)
    }
}

impl ResponseError for ControllerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ControllerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ControllerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(actix_web::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// The session behind the request's bearer token, resolved against the
/// backend on every request.
pub struct Authenticated(pub Session);

impl FromRequest for Authenticated {
    type Error = ControllerError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = bearer_token(req);

        Box::pin(async move {
            let state = state.ok_or_else(|| ControllerError::BadRequest("Application state missing".to_string()))?;
            let token = token.ok_or_else(|| ControllerError::Unauthorized("Not signed in.".to_string()))?;

            resolve_session(state.backend.as_ref(), &token).await.map(Authenticated).map_err(|err| {
                if err.is_auth() {
                    ControllerError::Unauthorized(err.to_string())
                } else {
                    log::error!("Session lookup failed: {}", err);
                    ControllerError::BadRequest(err.to_string())
                }
            })
        })
    }
}
