use serde::{Deserialize, Serialize};

use crate::models::{AccountDraft, AuthUser, TradeDraft};

/// Error body as returned by either the REST or the auth endpoints.
///
/// REST errors carry `code`/`message`/`details`/`hint`; auth errors use
/// `error`/`error_description` or `error_code`/`msg`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Password grant and sign-up responses that include a session.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

/// Sign-up answers with a session when email confirmation is off, or with
/// the bare user when a confirmation email was sent.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(TokenResponse),
    User(AuthUser),
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordGrant<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpMetadata<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub data: SignUpMetadata<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecoverRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordUpdate<'a> {
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountInsert<'a> {
    pub user_id: &'a str,
    #[serde(flatten)]
    pub draft: &'a AccountDraft,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeInsert<'a> {
    pub user_id: &'a str,
    #[serde(flatten)]
    pub draft: &'a TradeDraft,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayoutInsert<'a> {
    pub user_id: &'a str,
    pub account_id: &'a str,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpsert<'a> {
    pub id: &'a str,
    pub username: &'a str,
}
