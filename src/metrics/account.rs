use serde::Serialize;

use super::percent_of;
use crate::models::{finite_or_zero, text_enum, Account, AccountStatus, Phase};

/// Fallback blown cutoff for [`BlownRule::Fixed`]: 10% below size.
pub const FIXED_BLOWN_RATIO: f64 = 0.9;

pub const COLOR_PHASE1: &str = "#3B82F6";
pub const COLOR_PHASE2: &str = "#F59E0B";
pub const COLOR_LIVE: &str = "#22C55E";
pub const COLOR_EMPTY: &str = "#E5E7EB";

const TOP_N: usize = 3;

text_enum! {
    /// How an account without an explicit `blown` status is classified.
    pub enum BlownRule {
        Fixed => "fixed",
        Configured => "configured",
    }
}

impl Default for BlownRule {
    fn default() -> Self {
        BlownRule::Fixed
    }
}

impl BlownRule {
    pub fn is_blown(&self, account: &Account) -> bool {
        if account.status == Some(AccountStatus::Blown) {
            return true;
        }

        let size = finite_or_zero(account.size);
        if size <= 0.0 {
            return false;
        }

        let cutoff = match self {
            BlownRule::Fixed => size * FIXED_BLOWN_RATIO,
            BlownRule::Configured => min_balance(account),
        };
        finite_or_zero(account.balance) <= cutoff
    }
}

/// Lowest balance the firm allows before the account is lost.
pub fn min_balance(account: &Account) -> f64 {
    let size = finite_or_zero(account.size);
    finite_or_zero(size * (1.0 - finite_or_zero(account.max_drawdown_percent) / 100.0))
}

pub fn target_balance(account: &Account) -> f64 {
    let size = finite_or_zero(account.size);
    finite_or_zero(size * (1.0 + finite_or_zero(account.profit_target_percent) / 100.0))
}

pub fn result_pct(account: &Account) -> f64 {
    let size = finite_or_zero(account.size);
    percent_of(finite_or_zero(account.balance) - size, size)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountMetrics {
    pub result_pct: f64,
    pub min_balance: f64,
    /// Remaining room above `min_balance`, as a percent of size. Never negative.
    pub drawdown_cushion_pct: f64,
    /// The cushion shown as a distance: always `<= 0`.
    pub distance_to_blown_pct: f64,
    pub target_balance: Option<f64>,
    pub distance_to_pass_pct: Option<f64>,
    pub profit_money: Option<f64>,
}

impl AccountMetrics {
    pub fn of(account: &Account) -> Self {
        let size = finite_or_zero(account.size);
        let balance = finite_or_zero(account.balance);

        let min_balance = min_balance(account);
        let drawdown_cushion_pct = percent_of(balance - min_balance, size).max(0.0);
        let distance_to_blown_pct = if drawdown_cushion_pct > 0.0 { -drawdown_cushion_pct } else { 0.0 };

        let (target_balance, distance_to_pass_pct) = if account.phase.has_profit_target() {
            let target = target_balance(account);
            (Some(target), Some(percent_of(target - balance, size).max(0.0)))
        } else {
            (None, None)
        };

        let profit_money = match account.phase {
            Phase::Live => Some(balance - size),
            _ => None,
        };

        AccountMetrics {
            result_pct: result_pct(account),
            min_balance,
            drawdown_cushion_pct,
            distance_to_blown_pct,
            target_balance,
            distance_to_pass_pct,
            profit_money,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationSlice {
    pub phase: Phase,
    pub amount: f64,
    pub share_pct: f64,
    pub color: &'static str,
}

/// Active capital split by phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    pub total: f64,
    pub slices: Vec<AllocationSlice>,
    /// Set only when there is nothing to show.
    pub empty_color: Option<&'static str>,
}

fn phase_color(phase: Phase) -> &'static str {
    match phase {
        Phase::Phase1 => COLOR_PHASE1,
        Phase::Phase2 => COLOR_PHASE2,
        Phase::Live => COLOR_LIVE,
    }
}

pub fn allocation<'a, I>(active: I) -> Allocation
where
    I: IntoIterator<Item = &'a Account>,
{
    let mut amounts = [0.0_f64; 3];
    for account in active {
        let idx = Phase::ALL.iter().position(|p| *p == account.phase).unwrap_or(0);
        amounts[idx] += finite_or_zero(account.size);
    }

    let total: f64 = amounts.iter().sum();
    let slices = Phase::ALL
        .iter()
        .zip(amounts)
        .map(|(phase, amount)| AllocationSlice {
            phase: *phase,
            amount,
            share_pct: percent_of(amount, total),
            color: phase_color(*phase),
        })
        .collect();

    Allocation {
        total,
        slices,
        empty_color: if total > 0.0 { None } else { Some(COLOR_EMPTY) },
    }
}

/// Profit withdrawable now: live accounts at least 1% up.
pub fn payout_ready<'a, I>(active: I) -> f64
where
    I: IntoIterator<Item = &'a Account>,
{
    active
        .into_iter()
        .filter(|a| a.phase == Phase::Live && finite_or_zero(a.size) > 0.0)
        .filter(|a| result_pct(a) >= 1.0)
        .map(|a| (finite_or_zero(a.balance) - finite_or_zero(a.size)).max(0.0))
        .sum()
}

/// How far an account is from a threshold, in money and percent of size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Proximity {
    pub account_id: String,
    pub label: String,
    pub remaining_money: f64,
    pub remaining_pct: f64,
}

fn top_by_remaining(mut list: Vec<Proximity>) -> Vec<Proximity> {
    list.sort_by(|a, b| a.remaining_pct.total_cmp(&b.remaining_pct));
    list.truncate(TOP_N);
    list
}

pub fn closest_to_drawdown<'a, I>(active: I) -> Vec<Proximity>
where
    I: IntoIterator<Item = &'a Account>,
{
    let list = active
        .into_iter()
        .filter(|a| finite_or_zero(a.size) > 0.0 && finite_or_zero(a.max_drawdown_percent) > 0.0)
        .map(|a| {
            let remaining = finite_or_zero(a.balance) - min_balance(a);
            Proximity {
                account_id: a.id.clone(),
                label: a.label(),
                remaining_money: remaining,
                remaining_pct: percent_of(remaining, a.size).max(0.0),
            }
        })
        .collect();
    top_by_remaining(list)
}

pub fn closest_to_pass<'a, I>(active: I) -> Vec<Proximity>
where
    I: IntoIterator<Item = &'a Account>,
{
    let list = active
        .into_iter()
        .filter(|a| a.phase.has_profit_target())
        .filter(|a| finite_or_zero(a.size) > 0.0 && finite_or_zero(a.profit_target_percent) > 0.0)
        .map(|a| {
            let remaining = target_balance(a) - finite_or_zero(a.balance);
            Proximity {
                account_id: a.id.clone(),
                label: a.label(),
                remaining_money: remaining,
                remaining_pct: percent_of(remaining, a.size).max(0.0),
            }
        })
        .collect();
    top_by_remaining(list)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total_active: usize,
    pub phase1: usize,
    pub phase2: usize,
    pub live: usize,
    pub total_size: f64,
    pub total_balance: f64,
    pub payout_ready: f64,
    pub closest_to_drawdown: Vec<Proximity>,
    pub closest_to_pass: Vec<Proximity>,
    pub blown_count: usize,
    pub blown_size: f64,
    pub allocation: Allocation,
}

/// Splits accounts into (active, blown) under `rule`, preserving order.
pub fn partition_blown(accounts: &[Account], rule: BlownRule) -> (Vec<&Account>, Vec<&Account>) {
    accounts.iter().partition(|a| !rule.is_blown(a))
}

pub fn portfolio_summary(accounts: &[Account], rule: BlownRule) -> PortfolioSummary {
    let (active, blown) = partition_blown(accounts, rule);
    let count = |phase: Phase| active.iter().filter(|a| a.phase == phase).count();

    PortfolioSummary {
        total_active: active.len(),
        phase1: count(Phase::Phase1),
        phase2: count(Phase::Phase2),
        live: count(Phase::Live),
        total_size: active.iter().map(|a| finite_or_zero(a.size)).sum(),
        total_balance: active.iter().map(|a| finite_or_zero(a.balance)).sum(),
        payout_ready: payout_ready(active.iter().copied()),
        closest_to_drawdown: closest_to_drawdown(active.iter().copied()),
        closest_to_pass: closest_to_pass(active.iter().copied()),
        blown_count: blown.len(),
        blown_size: blown.iter().map(|a| finite_or_zero(a.size)).sum(),
        allocation: allocation(active.iter().copied()),
    }
}
