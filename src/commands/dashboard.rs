use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::accounts::{accounts_page, AccountsPage};
use super::failure;
use crate::api::JournalBackend;
use crate::metrics::{
    best_worst, day_totals, month_bounds, month_grid, recent_outcomes, trades_for_day, week_bounds, win_rate,
    BestWorst, BlownRule, CalendarCell, CalendarView, WinRate,
};
use crate::models::{Journal, Outcome, Session, Trade, TradeFilters};

const RECENT_STRIP: usize = 5;
const BACKTEST_WINDOW: u32 = 2000;
const TRAILING_DAYS: i64 = 7;

/// Month grid plus the trades of the selected day, if any.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarPage {
    pub view: CalendarView,
    pub cells: Vec<CalendarCell>,
    pub day_trades: Vec<Trade>,
}

impl CalendarPage {
    fn build(view: CalendarView, month_trades: &[Trade], today: NaiveDate) -> Self {
        let totals = day_totals(month_trades);
        CalendarPage {
            view,
            cells: month_grid(view.cursor_month, &totals, today),
            day_trades: view
                .selected_day
                .map(|day| trades_for_day(month_trades, day))
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HomeDashboard {
    pub username: Option<String>,
    pub has_active_accounts: bool,
    pub accounts: AccountsPage,
    pub month_win_rate: WinRate,
    pub week_win_rate: WinRate,
    pub recent_outcomes: Vec<Outcome>,
    pub best_worst: BestWorst,
    pub month_trades: usize,
    pub calendar: CalendarPage,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestDashboard {
    pub month_win_rate: WinRate,
    pub trailing_7d_win_rate: WinRate,
    pub recent_outcomes: Vec<Outcome>,
    pub best_worst: BestWorst,
    pub total_trades: usize,
    pub month_trades: usize,
    pub calendar: CalendarPage,
}

pub async fn home_dashboard(
    backend: &dyn JournalBackend,
    session: &Session,
    rule: BlownRule,
    view: CalendarView,
    today: NaiveDate,
) -> Result<HomeDashboard, String> {
    let (month_start, month_end) = month_bounds(view.cursor_month);
    let (week_start, week_end) = week_bounds(today);
    let month_filters = TradeFilters::between(month_start, month_end);
    let week_filters = TradeFilters::between(week_start, week_end);
    let latest = TradeFilters::latest(RECENT_STRIP as u32);

    let (accounts, profile, month_trades, week_trades, recent) = futures::try_join!(
        backend.list_accounts(session),
        backend.get_profile(session),
        backend.list_trades(session, Journal::Live, &month_filters),
        backend.list_trades(session, Journal::Live, &week_filters),
        backend.list_trades(session, Journal::Live, &latest),
    )
    .map_err(|e| failure("Load dashboard", e))?;

    let username = profile
        .and_then(|p| p.username)
        .or_else(|| session.user.email.clone());
    let accounts = accounts_page(accounts, rule);

    Ok(HomeDashboard {
        username,
        has_active_accounts: !accounts.active.is_empty(),
        month_win_rate: win_rate(&month_trades),
        week_win_rate: win_rate(&week_trades),
        recent_outcomes: recent_outcomes(&recent, RECENT_STRIP),
        best_worst: best_worst(&month_trades),
        month_trades: month_trades.len(),
        calendar: CalendarPage::build(view, &month_trades, today),
        accounts,
    })
}

pub async fn backtest_dashboard(
    backend: &dyn JournalBackend,
    session: &Session,
    view: CalendarView,
    today: NaiveDate,
) -> Result<BacktestDashboard, String> {
    let trades = backend
        .list_trades(session, Journal::Backtest, &TradeFilters::latest(BACKTEST_WINDOW))
        .await
        .map_err(|e| failure("Load backtest dashboard", e))?;

    let (month_start, month_end) = month_bounds(view.cursor_month);
    let month_trades: Vec<Trade> = trades
        .iter()
        .filter(|t| t.trade_date >= month_start && t.trade_date <= month_end)
        .cloned()
        .collect();

    let trailing_start = today - Duration::days(TRAILING_DAYS - 1);
    let trailing = trades
        .iter()
        .filter(|t| t.trade_date >= trailing_start && t.trade_date <= today);

    Ok(BacktestDashboard {
        month_win_rate: win_rate(&month_trades),
        trailing_7d_win_rate: win_rate(trailing),
        recent_outcomes: recent_outcomes(&trades, RECENT_STRIP),
        best_worst: best_worst(&month_trades),
        total_trades: trades.len(),
        month_trades: month_trades.len(),
        calendar: CalendarPage::build(view, &month_trades, today),
    })
}
