use std::collections::BTreeMap;

use serde::Serialize;

use super::{clamp, percent_of};
use crate::models::{finite_or_zero, Outcome, Trade};

/// Minimum trades a group needs before it is ranked.
pub const MIN_GROUP_SAMPLES: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WinRate {
    pub wins: usize,
    pub losses: usize,
    pub total: usize,
    pub pct: f64,
}

/// Break-evens count by their sign: be_plus is a win, be_minus a loss.
pub fn win_rate<'a, I>(trades: I) -> WinRate
where
    I: IntoIterator<Item = &'a Trade>,
{
    let (wins, losses) = trades.into_iter().fold((0, 0), |(w, l), t| {
        if t.outcome.is_win() { (w + 1, l) } else { (w, l + 1) }
    });
    let total = wins + losses;

    WinRate {
        wins,
        losses,
        total,
        pct: percent_of(wins as f64, total as f64),
    }
}

/// Trade attribute used to group trades for best/worst rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Setup,
    Asset,
    Killzone,
}

impl GroupBy {
    fn key(&self, trade: &Trade) -> Option<String> {
        let key = match self {
            GroupBy::Setup => trade.setup.as_deref().unwrap_or("").trim().to_string(),
            GroupBy::Asset => trade.asset.trim().to_lowercase(),
            GroupBy::Killzone => trade.killzone.label().to_string(),
        };
        if key.is_empty() { None } else { Some(key) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupScore {
    pub key: String,
    pub count: usize,
    pub avg_score: f64,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupRanking {
    pub best: Option<GroupScore>,
    pub worst: Option<GroupScore>,
}

pub fn rank_groups<'a, I>(trades: I, by: GroupBy) -> GroupRanking
where
    I: IntoIterator<Item = &'a Trade>,
{
    // key -> (count, wins, score sum)
    let mut groups: BTreeMap<String, (usize, usize, f64)> = BTreeMap::new();
    for trade in trades {
        let Some(key) = by.key(trade) else { continue };
        let entry = groups.entry(key).or_insert((0, 0, 0.0));
        entry.0 += 1;
        entry.1 += usize::from(trade.outcome.is_win());
        entry.2 += trade.outcome.score();
    }

    let mut scored: Vec<GroupScore> = groups
        .into_iter()
        .filter(|(_, (count, _, _))| *count >= MIN_GROUP_SAMPLES)
        .map(|(key, (count, wins, score_sum))| GroupScore {
            key,
            count,
            avg_score: score_sum / count as f64,
            win_rate: percent_of(wins as f64, count as f64),
        })
        .collect();

    scored.sort_by(|a, b| b.avg_score.total_cmp(&a.avg_score));

    GroupRanking {
        worst: scored.last().cloned(),
        best: scored.into_iter().next(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BestWorst {
    pub setup: GroupRanking,
    pub asset: GroupRanking,
    pub killzone: GroupRanking,
}

pub fn best_worst(trades: &[Trade]) -> BestWorst {
    BestWorst {
        setup: rank_groups(trades, GroupBy::Setup),
        asset: rank_groups(trades, GroupBy::Asset),
        killzone: rank_groups(trades, GroupBy::Killzone),
    }
}

/// Consecutive wins counted from the newest trade. Expects newest first.
pub fn win_streak(newest_first: &[Trade]) -> usize {
    newest_first.iter().take_while(|t| t.outcome.is_win()).count()
}

pub fn loss_streak(newest_first: &[Trade]) -> usize {
    newest_first.iter().take_while(|t| t.outcome.is_loss()).count()
}

pub fn recent_outcomes(newest_first: &[Trade], n: usize) -> Vec<Outcome> {
    newest_first.iter().take(n).map(|t| t.outcome).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TraderStats {
    pub trades: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub tp_or_be_plus: usize,
    pub sl_or_be_minus: usize,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub avg_rr: f64,
    pub avg_risk_pct: f64,
    pub expectancy: f64,
    pub win_streak: usize,
    pub loss_streak: usize,
}

impl TraderStats {
    pub fn from_trades(newest_first: &[Trade]) -> Self {
        let n = newest_first.len();
        let rate = win_rate(newest_first);

        let pnl = || newest_first.iter().map(|t| finite_or_zero(t.pnl_money));
        let gross_profit: f64 = pnl().filter(|p| *p > 0.0).sum();
        let gross_loss: f64 = pnl().filter(|p| *p < 0.0).sum::<f64>().abs();

        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            99.0
        } else {
            0.0
        };

        let mean = |sum: f64| if n > 0 { sum / n as f64 } else { 0.0 };

        TraderStats {
            trades: n,
            wins: rate.wins,
            win_rate: rate.pct,
            tp_or_be_plus: rate.wins,
            sl_or_be_minus: rate.losses,
            gross_profit,
            gross_loss,
            profit_factor,
            avg_rr: mean(newest_first.iter().map(|t| finite_or_zero(t.rr)).sum()),
            avg_risk_pct: mean(newest_first.iter().map(|t| finite_or_zero(t.risk_pct)).sum()),
            expectancy: mean(pnl().sum()),
            win_streak: win_streak(newest_first),
            loss_streak: loss_streak(newest_first),
        }
    }

    pub fn discipline(&self) -> f64 {
        clamp(
            self.win_rate * 0.6 + self.profit_factor.min(5.0) * 10.0 - self.loss_streak as f64 * 4.0,
            0.0,
            100.0,
        )
    }

    /// 100 at exactly 1% average risk, falling off on either side.
    pub fn risk_control(&self) -> f64 {
        clamp(100.0 - (self.avg_risk_pct - 1.0).abs() * 120.0, 0.0, 100.0)
    }
}
