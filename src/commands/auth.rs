use serde::Deserialize;

use super::failure;
use crate::api::{ApiError, JournalBackend};
use crate::models::{normalize_email, validate_username, AuthUser, Credentials, PasswordForm, Session, SignUpOutcome};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub username: String,
}

pub async fn login(backend: &dyn JournalBackend, form: &LoginForm) -> Result<Session, String> {
    let email = normalize_email(&form.email)?;
    if form.password.is_empty() {
        return Err("Enter your password.".to_string());
    }

    let credentials = Credentials {
        email,
        password: form.password.clone(),
    };
    let session = backend
        .sign_in(&credentials)
        .await
        .map_err(|e| failure("Sign in", e))?;

    log::info!("User {} signed in", session.user_id());
    Ok(session)
}

pub async fn register(backend: &dyn JournalBackend, form: &RegisterForm) -> Result<SignUpOutcome, String> {
    let email = normalize_email(&form.email)?;
    let username = validate_username(&form.username)?;
    let password = PasswordForm {
        password: form.password.clone(),
        confirmation: None,
    }
    .validate()?;

    let outcome = backend
        .sign_up(&Credentials { email, password }, Some(&username))
        .await
        .map_err(|e| failure("Sign up", e))?;

    if outcome.session.is_none() {
        log::info!("User {} registered, awaiting email confirmation", outcome.user.id);
    }
    Ok(outcome)
}

pub async fn logout(backend: &dyn JournalBackend, session: &Session) -> Result<(), String> {
    backend
        .sign_out(session)
        .await
        .map_err(|e| failure("Sign out", e))
}

/// Sends the reset email. The link lands on `redirect_to`.
pub async fn forgot_password(backend: &dyn JournalBackend, email: &str, redirect_to: &str) -> Result<(), String> {
    let email = normalize_email(email)?;
    backend
        .send_password_reset(&email, redirect_to)
        .await
        .map_err(|e| failure("Password reset", e))
}

/// Sets a new password for the session opened by the reset link.
pub async fn reset_password(backend: &dyn JournalBackend, session: &Session, form: &PasswordForm) -> Result<(), String> {
    let password = form.validate()?;
    backend
        .update_password(session, &password)
        .await
        .map_err(|e| failure("Password update", e))
}

pub async fn current_user(backend: &dyn JournalBackend, session: &Session) -> Result<AuthUser, String> {
    backend
        .get_user(&session.access_token)
        .await
        .map_err(|e| failure("Load user", e))
}

/// Resolves a bearer token into a session. Errors stay typed so the HTTP
/// layer can tell an invalid session from a backend failure.
pub async fn resolve_session(backend: &dyn JournalBackend, access_token: &str) -> Result<Session, ApiError> {
    let user = backend.get_user(access_token).await?;
    Ok(Session {
        access_token: access_token.to_string(),
        refresh_token: None,
        expires_at: None,
        user,
    })
}
