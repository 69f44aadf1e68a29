use serde::Serialize;

use super::{clamp, outcomes::win_streak, percent_of};
use crate::models::Trade;

pub const XP_PER_TRADE: u64 = 3;
pub const MAX_LEVEL: u32 = 50;
const FORM_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Level {
    pub level: u32,
    pub xp: u64,
    /// XP earned inside the current level.
    pub current_xp: u64,
    pub next_need: u64,
    pub to_next: u64,
    pub progress_pct: f64,
    pub title: &'static str,
}

fn xp_needed(level: u32) -> u64 {
    50 + u64::from(level.saturating_sub(2)) * 20
}

pub fn level_title(level: u32) -> &'static str {
    match level {
        35.. => "Elite",
        20.. => "Pro",
        10.. => "Advanced",
        5.. => "Steady",
        _ => "Novice",
    }
}

impl Level {
    pub fn from_trade_count(trades: usize) -> Self {
        let xp = trades as u64 * XP_PER_TRADE;

        let mut level = 1;
        let mut current = xp;
        let mut need = xp_needed(level);
        while level < MAX_LEVEL && current >= need {
            current -= need;
            level += 1;
            need = xp_needed(level);
        }

        Level {
            level,
            xp,
            current_xp: current,
            next_need: need,
            to_next: need.saturating_sub(current),
            progress_pct: percent_of(current as f64, need as f64),
            title: level_title(level),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FormLabel {
    #[serde(rename = "On Fire")]
    OnFire,
    Neutral,
    Tilt,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Form {
    pub value: f64,
    pub label: FormLabel,
    pub win_rate_10: f64,
    pub score_sum: f64,
}

impl Form {
    /// Short-term form over the newest ten trades.
    pub fn from_trades(newest_first: &[Trade]) -> Self {
        let window = &newest_first[..newest_first.len().min(FORM_WINDOW)];

        let score_sum: f64 = window.iter().map(|t| t.outcome.score()).sum();
        let wins = window.iter().filter(|t| t.outcome.is_win()).count();
        let win_rate_10 = percent_of(wins as f64, window.len() as f64);

        let score_norm = clamp((score_sum + 10.0) / 20.0 * 100.0, 0.0, 100.0);
        let streak = clamp(win_streak(newest_first) as f64, 0.0, 5.0);
        let value = clamp(score_norm * 0.6 + win_rate_10 * 0.35 + streak, 0.0, 100.0);

        let label = if value >= 68.0 {
            FormLabel::OnFire
        } else if value <= 42.0 {
            FormLabel::Tilt
        } else {
            FormLabel::Neutral
        };

        Form {
            value,
            label,
            win_rate_10,
            score_sum,
        }
    }
}
