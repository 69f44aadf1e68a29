use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::amount::lenient_f64;

text_enum! {
    /// Trading-session bucket the entry was taken in.
    pub enum Killzone {
        Asia => "asia",
        Frankfurt => "frank",
        London => "london",
        Lunch => "lunch",
        NewYork => "ny",
        LateNewYork => "late_ny",
    }
}

impl Killzone {
    pub fn label(&self) -> &'static str {
        match self {
            Killzone::Asia => "Asia",
            Killzone::Frankfurt => "Frankfurt",
            Killzone::London => "London",
            Killzone::Lunch => "Lunch",
            Killzone::NewYork => "New York",
            Killzone::LateNewYork => "Late New York",
        }
    }
}

text_enum! {
    pub enum Direction {
        Long => "long",
        Short => "short",
    }
}

text_enum! {
    pub enum MarketPhase {
        Reverse => "reverse",
        Continuation => "continuation",
        Range => "range",
    }
}

text_enum! {
    pub enum Outcome {
        StopLoss => "sl",
        TakeProfit => "tp",
        BreakEvenPlus => "be_plus",
        BreakEvenMinus => "be_minus",
    }
}

impl Outcome {
    /// tp and be+ count as wins everywhere.
    pub fn is_win(&self) -> bool {
        matches!(self, Outcome::TakeProfit | Outcome::BreakEvenPlus)
    }

    pub fn is_loss(&self) -> bool {
        !self.is_win()
    }

    /// Quality score used for best/worst rankings: TP > BE+ > BE- > SL.
    pub fn score(&self) -> f64 {
        match self {
            Outcome::TakeProfit => 1.0,
            Outcome::BreakEvenPlus => 0.5,
            Outcome::BreakEvenMinus => -0.5,
            Outcome::StopLoss => -1.0,
        }
    }

    /// Force the sign of a money result to agree with the outcome.
    pub fn normalize_pnl(&self, raw: f64) -> f64 {
        let abs = if raw.is_finite() { raw.abs() } else { 0.0 };
        if self.is_loss() && abs > 0.0 { -abs } else { abs }
    }
}

/// Which journal a trade belongs to. Both share one row shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Journal {
    Live,
    Backtest,
}

impl Journal {
    pub fn table(&self) -> &'static str {
        match self {
            Journal::Live => "trades",
            Journal::Backtest => "backtest_trades",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub trade_date: NaiveDate,
    /// 0 = Sunday .. 6 = Saturday
    #[serde(default)]
    pub day_of_week: u32,
    #[serde(default)]
    pub asset: String,
    pub killzone: Killzone,
    pub direction: Direction,
    pub market_phase: MarketPhase,
    #[serde(default)]
    pub setup: Option<String>,
    #[serde(deserialize_with = "lenient_f64", default)]
    pub risk_pct: f64,
    #[serde(deserialize_with = "lenient_f64", default)]
    pub rr: f64,
    pub outcome: Outcome,
    #[serde(deserialize_with = "lenient_f64", default)]
    pub pnl_money: f64,
    #[serde(default)]
    pub htf_screenshot_url: Option<String>,
    #[serde(default)]
    pub ltf_screenshot_url: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Validated trade fields ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub trade_date: NaiveDate,
    pub day_of_week: u32,
    pub asset: String,
    pub killzone: Killzone,
    pub direction: Direction,
    pub market_phase: MarketPhase,
    pub setup: Option<String>,
    pub risk_pct: f64,
    pub rr: f64,
    pub outcome: Outcome,
    pub pnl_money: f64,
    pub htf_screenshot_url: Option<String>,
    pub ltf_screenshot_url: Option<String>,
    pub comment: Option<String>,
}

/// Sunday-based weekday index stored alongside each trade.
pub fn day_of_week(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeFilters {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub account_id: Option<String>,
    pub outcome: Option<Outcome>,
    pub limit: Option<u32>,
}

impl TradeFilters {
    pub fn between(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        TradeFilters {
            start_date: Some(start_date),
            end_date: Some(end_date),
            ..Default::default()
        }
    }

    pub fn latest(limit: u32) -> Self {
        TradeFilters {
            limit: Some(limit),
            ..Default::default()
        }
    }
}
