use actix_web::{get, put, web, HttpResponse, Responder};
use serde::Deserialize;

use super::{Authenticated, ControllerError};
use crate::{commands, models::PasswordForm, state::AppState};

#[derive(Debug, Deserialize)]
pub struct UsernameBody {
    #[serde(default)]
    username: String,
}

#[get("/profile")]
pub async fn show(state: web::Data<AppState>, auth: Authenticated) -> Result<impl Responder, ControllerError> {
    let page = commands::profile_page(state.backend.as_ref(), &auth.0).await?;
    Ok(web::Json(page))
}

#[put("/profile/username")]
pub async fn username(
    state: web::Data<AppState>,
    auth: Authenticated,
    body: web::Json<UsernameBody>,
) -> Result<impl Responder, ControllerError> {
    let profile = commands::save_username(state.backend.as_ref(), &auth.0, &body.username).await?;
    Ok(web::Json(profile))
}

#[put("/profile/password")]
pub async fn password(
    state: web::Data<AppState>,
    auth: Authenticated,
    body: web::Json<PasswordForm>,
) -> Result<impl Responder, ControllerError> {
    commands::change_password(state.backend.as_ref(), &auth.0, &body).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    use super::*;
    use crate::controller::tests::{bearer, local_state};

    #[actix_web::test]
    async fn test_profile_routes() {
        let state = local_state();
        let bearer = bearer(&state, "me@mail.com").await;
        let app = test::init_service(App::new().app_data(state).service(show).service(username).service(password)).await;

        let req = test::TestRequest::put()
            .uri("/profile/username")
            .insert_header(bearer.clone())
            .set_json(json!({ "username": "night_owl" }))
            .to_request();
        let profile: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(profile["username"], "night_owl");

        let req = test::TestRequest::get().uri("/profile").insert_header(bearer.clone()).to_request();
        let page: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(page["username"], "night_owl");
        assert_eq!(page["email"], "me@mail.com");
        assert_eq!(page["level"]["level"], 1);
        assert_eq!(page["form"]["label"], "Tilt");

        let req = test::TestRequest::put()
            .uri("/profile/password")
            .insert_header(bearer)
            .set_json(json!({ "password": "short" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
