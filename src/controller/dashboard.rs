use actix_web::{get, web, Responder};
use chrono::{Local, NaiveDate};
use serde::Deserialize;

use super::{Authenticated, ControllerError};
use crate::{
    commands,
    metrics::{first_of_month, parse_month, CalendarView},
    state::AppState,
};

/// `?month=YYYY-MM&day=YYYY-MM-DD`; both optional.
#[derive(Debug, Default, Deserialize)]
pub struct CalendarQuery {
    month: Option<String>,
    day: Option<String>,
}

impl CalendarQuery {
    fn view(&self, today: NaiveDate) -> Result<CalendarView, String> {
        let day = self
            .day
            .as_deref()
            .map(|raw| {
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                    .map_err(|_| format!("Invalid day: {} (expected YYYY-MM-DD)", raw))
            })
            .transpose()?;

        let month = match (&self.month, day) {
            (Some(raw), _) => parse_month(raw)?,
            (None, Some(day)) => first_of_month(day),
            (None, None) => first_of_month(today),
        };

        let mut view = CalendarView::with_month(month);
        if let Some(day) = day {
            view.select_day(day);
        }
        Ok(view)
    }
}

#[get("/dashboard")]
pub async fn home(
    state: web::Data<AppState>,
    auth: Authenticated,
    query: web::Query<CalendarQuery>,
) -> Result<impl Responder, ControllerError> {
    let today = Local::now().date_naive();
    let view = query.view(today)?;
    let dashboard =
        commands::home_dashboard(state.backend.as_ref(), &auth.0, state.config.blown_rule, view, today).await?;
    Ok(web::Json(dashboard))
}

#[get("/backtest/dashboard")]
pub async fn backtest(
    state: web::Data<AppState>,
    auth: Authenticated,
    query: web::Query<CalendarQuery>,
) -> Result<impl Responder, ControllerError> {
    let today = Local::now().date_naive();
    let view = query.view(today)?;
    let dashboard = commands::backtest_dashboard(state.backend.as_ref(), &auth.0, view, today).await?;
    Ok(web::Json(dashboard))
}
