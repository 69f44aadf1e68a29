use actix_web::{dev::Server, middleware, web, App, HttpServer};

use crate::{
    controller::{accounts, auth, dashboard, profile, trades},
    state::AppState,
};

pub async fn server_task(app_state: web::Data<AppState>) -> std::io::Result<()> {
    init_server(app_state)?.await
}

/// Registers every page route under `/api`.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(auth::login)
            .service(auth::register)
            .service(auth::logout)
            .service(auth::forgot_password)
            .service(auth::reset_password)
            .service(auth::user)
            .service(dashboard::home)
            .service(dashboard::backtest)
            .service(accounts::index)
            .service(accounts::show)
            .service(accounts::create)
            .service(accounts::update)
            .service(accounts::remove)
            .service(accounts::withdraw)
            .service(accounts::payouts)
            .service(trades::live_export)
            .service(trades::live_index)
            .service(trades::live_create)
            .service(trades::live_update)
            .service(trades::live_delete)
            .service(trades::backtest_export)
            .service(trades::backtest_index)
            .service(trades::backtest_create)
            .service(trades::backtest_update)
            .service(trades::backtest_delete)
            .service(profile::show)
            .service(profile::username)
            .service(profile::password),
    );
}

fn init_server(app_state: web::Data<AppState>) -> std::io::Result<Server> {
    let host = app_state.config.server_host.to_owned();
    let port = app_state.config.port;
    log::info!("Listening on http://{}:{}", host, port);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(app_state.clone())
            .app_data(web::JsonConfig::default().limit(64 * 1024))
            .configure(routes)
    })
    .bind((host, port))?
    .run();
    Ok(server)
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test};
    use serde_json::{json, Value};

    use super::*;
    use crate::controller::tests::local_state;

    #[actix_web::test]
    async fn test_full_flow_through_api_scope() {
        let app = test::init_service(App::new().app_data(local_state()).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({ "email": "flow@mail.com", "password": "long enough", "username": "flow" }))
            .to_request();
        let outcome: Value = test::call_and_read_body_json(&app, req).await;
        let token = outcome["session"]["access_token"].as_str().unwrap().to_string();
        let bearer = ("Authorization", format!("Bearer {}", token));

        let req = test::TestRequest::post()
            .uri("/api/accounts")
            .insert_header(bearer.clone())
            .set_json(json!({
                "account_number": "E-1",
                "firm": "Apex",
                "size": "50000",
                "phase": "phase1",
                "balance": "50500",
                "max_drawdown_percent": "6",
                "profit_target_percent": "6"
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let req = test::TestRequest::get()
            .uri("/api/backtest/dashboard")
            .insert_header(bearer.clone())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/dashboard").insert_header(bearer).to_request();
        let dash: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(dash["has_active_accounts"], true);
        assert_eq!(dash["accounts"]["summary"]["closest_to_pass"].as_array().unwrap().len(), 1);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/profile").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
