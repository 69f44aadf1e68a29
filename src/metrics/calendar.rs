use std::collections::HashMap;

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::Serialize;

use crate::models::{finite_or_zero, Trade};

pub const GRID_CELLS: usize = 42;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DayTotal {
    pub pnl: f64,
    pub trades: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Positive,
    Negative,
    Flat,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub in_month: bool,
    pub pnl: f64,
    pub trades: usize,
    pub has_trades: bool,
    pub is_today: bool,
    pub tone: Tone,
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First and last day of the month containing `date`.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = first_of_month(date);
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(start);
    (start, end)
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Monday..Sunday of the week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = week_start(date);
    (start, start + Duration::days(6))
}

/// Parses "YYYY-MM" (or a full date) into the first of that month.
pub fn parse_month(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(first_of_month))
        .map_err(|_| format!("Invalid month: {} (expected YYYY-MM)", raw))
}

pub fn day_totals<'a, I>(trades: I) -> HashMap<NaiveDate, DayTotal>
where
    I: IntoIterator<Item = &'a Trade>,
{
    let mut map: HashMap<NaiveDate, DayTotal> = HashMap::new();
    for trade in trades {
        let entry = map.entry(trade.trade_date).or_default();
        entry.pnl += finite_or_zero(trade.pnl_money);
        entry.trades += 1;
    }
    map
}

fn tone(total: &DayTotal) -> Tone {
    if total.trades == 0 {
        Tone::Empty
    } else if total.pnl > 0.0 {
        Tone::Positive
    } else if total.pnl < 0.0 {
        Tone::Negative
    } else {
        Tone::Flat
    }
}

/// Six Monday-first weeks covering the month of `month`.
pub fn month_grid(month: NaiveDate, totals: &HashMap<NaiveDate, DayTotal>, today: NaiveDate) -> Vec<CalendarCell> {
    let first = first_of_month(month);
    let start = week_start(first);

    start
        .iter_days()
        .take(GRID_CELLS)
        .map(|date| {
            let total = totals.get(&date).copied().unwrap_or_default();
            CalendarCell {
                date,
                in_month: date.month() == first.month() && date.year() == first.year(),
                pnl: total.pnl,
                trades: total.trades,
                has_trades: total.trades > 0,
                is_today: date == today,
                tone: tone(&total),
            }
        })
        .collect()
}

pub fn trades_for_day(trades: &[Trade], day: NaiveDate) -> Vec<Trade> {
    trades.iter().filter(|t| t.trade_date == day).cloned().collect()
}

/// Calendar navigation state: the displayed month plus an optional selected day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarView {
    pub cursor_month: NaiveDate,
    pub selected_day: Option<NaiveDate>,
}

impl CalendarView {
    pub fn new(today: NaiveDate) -> Self {
        CalendarView {
            cursor_month: first_of_month(today),
            selected_day: None,
        }
    }

    pub fn with_month(month: NaiveDate) -> Self {
        CalendarView {
            cursor_month: first_of_month(month),
            selected_day: None,
        }
    }

    pub fn prev_month(&mut self) {
        if let Some(prev) = self.cursor_month.checked_sub_months(Months::new(1)) {
            self.cursor_month = prev;
        }
    }

    pub fn next_month(&mut self) {
        if let Some(next) = self.cursor_month.checked_add_months(Months::new(1)) {
            self.cursor_month = next;
        }
    }

    pub fn jump_to_today(&mut self, today: NaiveDate) {
        self.cursor_month = first_of_month(today);
    }

    pub fn select_day(&mut self, day: NaiveDate) {
        self.selected_day = Some(day);
    }

    pub fn clear_day(&mut self) {
        self.selected_day = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::outcomes::tests::trade;
    use crate::models::Outcome;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_grid_has_42_cells_from_monday() {
        let empty = HashMap::new();
        for month in ["2026-02-01", "2026-03-01", "2026-06-01", "2026-10-01", "2027-01-01"] {
            let grid = month_grid(date(month), &empty, date("2026-10-18"));
            assert_eq!(grid.len(), GRID_CELLS);
            assert_eq!(grid[0].date.weekday(), chrono::Weekday::Mon);
            assert!(grid.iter().any(|c| c.date == date(month) && c.in_month));
        }
    }

    #[test]
    fn test_grid_marks_month_and_today() {
        let grid = month_grid(date("2026-10-01"), &HashMap::new(), date("2026-10-18"));
        // October 2026 starts on a Thursday
        assert_eq!(grid[0].date, date("2026-09-28"));
        assert!(!grid[0].in_month);
        assert!(grid[3].in_month);
        assert_eq!(grid.iter().filter(|c| c.in_month).count(), 31);
        assert_eq!(grid.iter().filter(|c| c.is_today).count(), 1);
    }

    #[test]
    fn test_day_totals_and_tones() {
        let trades = vec![
            trade("2026-10-05", Outcome::TakeProfit, 300.0),
            trade("2026-10-05", Outcome::StopLoss, 100.0),
            trade("2026-10-06", Outcome::StopLoss, 100.0),
            trade("2026-10-07", Outcome::BreakEvenPlus, 0.0),
        ];
        let totals = day_totals(&trades);
        assert_eq!(totals[&date("2026-10-05")], DayTotal { pnl: 200.0, trades: 2 });

        let grid = month_grid(date("2026-10-01"), &totals, date("2026-10-18"));
        let cell = |d: &str| grid.iter().find(|c| c.date == date(d)).unwrap().clone();
        assert_eq!(cell("2026-10-05").tone, Tone::Positive);
        assert_eq!(cell("2026-10-06").tone, Tone::Negative);
        assert_eq!(cell("2026-10-07").tone, Tone::Flat);
        assert_eq!(cell("2026-10-08").tone, Tone::Empty);
        assert!(!cell("2026-10-08").has_trades);

        assert_eq!(trades_for_day(&trades, date("2026-10-05")).len(), 2);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(month_bounds(date("2026-02-14")), (date("2026-02-01"), date("2026-02-28")));
        assert_eq!(month_bounds(date("2026-12-31")), (date("2026-12-01"), date("2026-12-31")));
        assert_eq!(week_bounds(date("2026-10-18")), (date("2026-10-12"), date("2026-10-18")));
        assert_eq!(week_bounds(date("2026-10-19")), (date("2026-10-19"), date("2026-10-25")));
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2026-10").unwrap(), date("2026-10-01"));
        assert_eq!(parse_month("2026-10-18").unwrap(), date("2026-10-01"));
        assert!(parse_month("October").is_err());
    }

    #[test]
    fn test_view_navigation() {
        let mut view = CalendarView::new(date("2026-01-18"));
        assert_eq!(view.cursor_month, date("2026-01-01"));

        view.prev_month();
        assert_eq!(view.cursor_month, date("2025-12-01"));
        view.next_month();
        view.next_month();
        assert_eq!(view.cursor_month, date("2026-02-01"));

        view.select_day(date("2026-02-03"));
        assert_eq!(view.selected_day, Some(date("2026-02-03")));
        view.clear_day();
        assert_eq!(view.selected_day, None);

        view.jump_to_today(date("2026-10-18"));
        assert_eq!(view.cursor_month, date("2026-10-01"));
    }
}
