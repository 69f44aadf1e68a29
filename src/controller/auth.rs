use actix_web::{get, post, routes, web, HttpResponse, Responder};
use serde::Deserialize;

use super::{Authenticated, ControllerError};
use crate::{
    commands::{self, LoginForm, RegisterForm},
    models::PasswordForm,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordBody {
    #[serde(default)]
    email: String,
}

#[post("/auth/login")]
pub async fn login(state: web::Data<AppState>, body: web::Json<LoginForm>) -> Result<impl Responder, ControllerError> {
    let session = commands::login(state.backend.as_ref(), &body).await?;
    Ok(web::Json(session))
}

#[routes]
#[post("/auth/register")]
#[post("/auth/signup")]
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterForm>,
) -> Result<impl Responder, ControllerError> {
    let outcome = commands::register(state.backend.as_ref(), &body).await?;
    Ok(web::Json(outcome))
}

#[post("/auth/logout")]
pub async fn logout(state: web::Data<AppState>, auth: Authenticated) -> Result<impl Responder, ControllerError> {
    commands::logout(state.backend.as_ref(), &auth.0).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/auth/forgot-password")]
pub async fn forgot_password(
    state: web::Data<AppState>,
    body: web::Json<ForgotPasswordBody>,
) -> Result<impl Responder, ControllerError> {
    let redirect_to = state.config.reset_redirect();
    commands::forgot_password(state.backend.as_ref(), &body.email, &redirect_to).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Called with the recovery session from the emailed link.
#[post("/auth/reset-password")]
pub async fn reset_password(
    state: web::Data<AppState>,
    auth: Authenticated,
    body: web::Json<PasswordForm>,
) -> Result<impl Responder, ControllerError> {
    commands::reset_password(state.backend.as_ref(), &auth.0, &body).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/auth/user")]
pub async fn user(state: web::Data<AppState>, auth: Authenticated) -> Result<impl Responder, ControllerError> {
    let me = commands::current_user(state.backend.as_ref(), &auth.0).await?;
    Ok(web::Json(me))
}
