use actix_web::{delete, get, post, put, web, HttpResponse, Responder};

use super::{Authenticated, ControllerError};
use crate::{commands, models::AccountForm, state::AppState};

#[get("/accounts")]
pub async fn index(state: web::Data<AppState>, auth: Authenticated) -> Result<impl Responder, ControllerError> {
    let page = commands::list_accounts(state.backend.as_ref(), &auth.0, state.config.blown_rule).await?;
    Ok(web::Json(page))
}

#[get("/accounts/{id}")]
pub async fn show(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> Result<impl Responder, ControllerError> {
    let view = commands::get_account(state.backend.as_ref(), &auth.0, &path, state.config.blown_rule).await?;
    Ok(web::Json(view))
}

#[post("/accounts")]
pub async fn create(
    state: web::Data<AppState>,
    auth: Authenticated,
    body: web::Json<AccountForm>,
) -> Result<impl Responder, ControllerError> {
    let account = commands::create_account(state.backend.as_ref(), &auth.0, &body).await?;
    Ok(HttpResponse::Created().json(account))
}

#[put("/accounts/{id}")]
pub async fn update(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<String>,
    body: web::Json<AccountForm>,
) -> Result<impl Responder, ControllerError> {
    let account = commands::update_account(state.backend.as_ref(), &auth.0, &path, &body).await?;
    Ok(web::Json(account))
}

#[delete("/accounts/{id}")]
pub async fn remove(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> Result<impl Responder, ControllerError> {
    commands::delete_account(state.backend.as_ref(), &auth.0, &path).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/accounts/{id}/withdraw")]
pub async fn withdraw(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> Result<impl Responder, ControllerError> {
    let withdrawal = commands::withdraw_profit(state.backend.as_ref(), &auth.0, &path).await?;
    Ok(web::Json(withdrawal))
}

#[get("/payouts")]
pub async fn payouts(state: web::Data<AppState>, auth: Authenticated) -> Result<impl Responder, ControllerError> {
    let rows = commands::list_payouts(state.backend.as_ref(), &auth.0).await?;
    Ok(web::Json(rows))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    use super::*;
    use crate::controller::tests::{bearer, local_state};

    #[actix_web::test]
    async fn test_account_routes() {
        let state = local_state();
        let bearer = bearer(&state, "me@mail.com").await;

        let app = test::init_service(
            App::new()
                .app_data(state)
                .service(index)
                .service(create)
                .service(withdraw)
                .service(payouts)
                .service(remove),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/accounts")
            .insert_header(bearer.clone())
            .set_json(json!({
                "account_number": "L-1",
                "firm": "FTMO",
                "size": "10 000",
                "phase": "live",
                "balance": "10400",
                "max_drawdown_percent": "10%"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let account: Value = test::read_body_json(resp).await;
        let id = account["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri("/accounts")
            .insert_header(bearer.clone())
            .set_json(json!({ "firm": "FTMO" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/accounts").insert_header(bearer.clone()).to_request();
        let page: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(page["active"].as_array().unwrap().len(), 1);
        assert_eq!(page["active"][0]["label"], "L-1 • FTMO • $10,000");

        let req = test::TestRequest::post()
            .uri(&format!("/accounts/{}/withdraw", id))
            .insert_header(bearer.clone())
            .to_request();
        let withdrawal: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(withdrawal["payout"]["amount"], 400.0);

        let req = test::TestRequest::get().uri("/payouts").insert_header(bearer.clone()).to_request();
        let list: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let req = test::TestRequest::delete()
            .uri(&format!("/accounts/{}", id))
            .insert_header(bearer)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn test_accounts_require_session() {
        let app = test::init_service(App::new().app_data(local_state()).service(index)).await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/accounts").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
