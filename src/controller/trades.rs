//! Live journal under `/trades` and the backtest journal under `/backtest`.
//! Both share the same handlers, parameterized by [`Journal`].

use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use chrono::Local;

use super::{Authenticated, ControllerError};
use crate::{
    commands,
    models::{Journal, TradeFilters, TradeForm},
    state::AppState,
};

async fn list(state: &AppState, auth: &Authenticated, journal: Journal, filters: &TradeFilters) -> Result<HttpResponse, ControllerError> {
    let trades = commands::list_trades(state.backend.as_ref(), &auth.0, journal, filters).await?;
    Ok(HttpResponse::Ok().json(trades))
}

async fn create(state: &AppState, auth: &Authenticated, journal: Journal, form: &TradeForm) -> Result<HttpResponse, ControllerError> {
    let trade = commands::create_trade(state.backend.as_ref(), &auth.0, journal, form).await?;
    Ok(HttpResponse::Created().json(trade))
}

async fn update(
    state: &AppState,
    auth: &Authenticated,
    journal: Journal,
    id: &str,
    form: &TradeForm,
) -> Result<HttpResponse, ControllerError> {
    let trade = commands::update_trade(state.backend.as_ref(), &auth.0, journal, id, form).await?;
    Ok(HttpResponse::Ok().json(trade))
}

async fn remove(state: &AppState, auth: &Authenticated, journal: Journal, id: &str) -> Result<HttpResponse, ControllerError> {
    commands::delete_trade(state.backend.as_ref(), &auth.0, journal, id).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn export(state: &AppState, auth: &Authenticated, journal: Journal, filters: &TradeFilters) -> Result<HttpResponse, ControllerError> {
    let csv = commands::export_trades(state.backend.as_ref(), &auth.0, journal, filters).await?;
    let filename = commands::export_filename(journal, Local::now().date_naive());

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header(("Content-Disposition", format!("attachment; filename=\"{}\"", filename)))
        .body(csv))
}

#[get("/trades")]
pub async fn live_index(
    state: web::Data<AppState>,
    auth: Authenticated,
    query: web::Query<TradeFilters>,
) -> Result<impl Responder, ControllerError> {
    list(&state, &auth, Journal::Live, &query).await
}

#[post("/trades")]
pub async fn live_create(
    state: web::Data<AppState>,
    auth: Authenticated,
    body: web::Json<TradeForm>,
) -> Result<impl Responder, ControllerError> {
    create(&state, &auth, Journal::Live, &body).await
}

#[put("/trades/{id}")]
pub async fn live_update(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<String>,
    body: web::Json<TradeForm>,
) -> Result<impl Responder, ControllerError> {
    update(&state, &auth, Journal::Live, &path, &body).await
}

#[delete("/trades/{id}")]
pub async fn live_delete(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> Result<impl Responder, ControllerError> {
    remove(&state, &auth, Journal::Live, &path).await
}

#[get("/trades/export")]
pub async fn live_export(
    state: web::Data<AppState>,
    auth: Authenticated,
    query: web::Query<TradeFilters>,
) -> Result<impl Responder, ControllerError> {
    export(&state, &auth, Journal::Live, &query).await
}

#[get("/backtest")]
pub async fn backtest_index(
    state: web::Data<AppState>,
    auth: Authenticated,
    query: web::Query<TradeFilters>,
) -> Result<impl Responder, ControllerError> {
    list(&state, &auth, Journal::Backtest, &query).await
}

#[post("/backtest")]
pub async fn backtest_create(
    state: web::Data<AppState>,
    auth: Authenticated,
    body: web::Json<TradeForm>,
) -> Result<impl Responder, ControllerError> {
    create(&state, &auth, Journal::Backtest, &body).await
}

#[put("/backtest/{id}")]
pub async fn backtest_update(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<String>,
    body: web::Json<TradeForm>,
) -> Result<impl Responder, ControllerError> {
    update(&state, &auth, Journal::Backtest, &path, &body).await
}

#[delete("/backtest/{id}")]
pub async fn backtest_delete(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> Result<impl Responder, ControllerError> {
    remove(&state, &auth, Journal::Backtest, &path).await
}

#[get("/backtest/export")]
pub async fn backtest_export(
    state: web::Data<AppState>,
    auth: Authenticated,
    query: web::Query<TradeFilters>,
) -> Result<impl Responder, ControllerError> {
    export(&state, &auth, Journal::Backtest, &query).await
}
