//! Form payloads as submitted by the pages, and their validation into
//! drafts the backend can store.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::account::{AccountDraft, Phase};
use super::amount::parse_amount;
use super::trade::{day_of_week, Direction, Journal, Killzone, MarketPhase, Outcome, TradeDraft};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountForm {
    pub account_number: String,
    pub firm: String,
    pub size: String,
    pub phase: Phase,
    pub balance: String,
    pub max_drawdown_percent: String,
    pub profit_target_percent: String,
}

impl AccountForm {
    pub fn validate(&self) -> Result<AccountDraft, String> {
        let needs_target = self.phase.has_profit_target();

        let required = [
            &self.account_number,
            &self.firm,
            &self.size,
            &self.balance,
            &self.max_drawdown_percent,
        ];
        if required.iter().any(|v| v.trim().is_empty())
            || (needs_target && self.profit_target_percent.trim().is_empty())
        {
            return Err("Fill in all required fields.".to_string());
        }

        let numeric = |raw: &str| {
            parse_amount(raw).ok_or_else(|| {
                "Check the numeric fields: they must be numbers (dot or comma allowed).".to_string()
            })
        };

        let size = numeric(&self.size)?;
        let balance = numeric(&self.balance)?;
        let max_drawdown_percent = numeric(&self.max_drawdown_percent)?;
        let profit_target_percent = if needs_target {
            numeric(&self.profit_target_percent)?
        } else {
            0.0
        };

        Ok(AccountDraft {
            account_number: self.account_number.trim().to_string(),
            firm: self.firm.trim().to_string(),
            size,
            phase: self.phase,
            balance,
            max_drawdown_percent,
            profit_target_percent,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeForm {
    pub account_id: Option<String>,
    pub trade_date: String,
    pub asset: String,
    pub killzone: Killzone,
    pub direction: Direction,
    pub market_phase: MarketPhase,
    pub setup: String,
    pub risk_pct: String,
    pub rr: String,
    pub outcome: Outcome,
    pub pnl_money: String,
    pub htf_screenshot_url: String,
    pub ltf_screenshot_url: String,
    pub comment: String,
}

impl Default for TradeForm {
    fn default() -> Self {
        TradeForm {
            account_id: None,
            trade_date: String::new(),
            asset: String::new(),
            killzone: Killzone::Asia,
            direction: Direction::Long,
            market_phase: MarketPhase::Continuation,
            setup: String::new(),
            risk_pct: "1".to_string(),
            rr: "2".to_string(),
            outcome: Outcome::TakeProfit,
            pnl_money: "0".to_string(),
            htf_screenshot_url: String::new(),
            ltf_screenshot_url: String::new(),
            comment: String::new(),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

impl TradeForm {
    pub fn validate(&self, journal: Journal) -> Result<TradeDraft, String> {
        let raw_date = self.trade_date.trim();
        if raw_date.is_empty() {
            return Err("Pick the trade date.".to_string());
        }
        let trade_date = NaiveDate::parse_from_str(raw_date.get(..10).unwrap_or(raw_date), "%Y-%m-%d")
            .map_err(|_| format!("Invalid trade date: {}", raw_date))?;

        let asset = self.asset.trim();
        if asset.is_empty() {
            return Err("Enter the asset (for example XAUUSD).".to_string());
        }

        let account_id = match journal {
            Journal::Live => Some(
                self.account_id
                    .as_deref()
                    .and_then(non_blank)
                    .ok_or_else(|| "Choose the account this trade belongs to.".to_string())?,
            ),
            Journal::Backtest => None,
        };

        let pnl = parse_amount(&self.pnl_money).unwrap_or(0.0);

        Ok(TradeDraft {
            account_id,
            trade_date,
            day_of_week: day_of_week(trade_date),
            asset: asset.to_string(),
            killzone: self.killzone,
            direction: self.direction,
            market_phase: self.market_phase,
            setup: non_blank(&self.setup),
            risk_pct: parse_amount(&self.risk_pct).unwrap_or(0.0),
            rr: parse_amount(&self.rr).unwrap_or(0.0),
            outcome: self.outcome,
            pnl_money: self.outcome.normalize_pnl(pnl),
            htf_screenshot_url: non_blank(&self.htf_screenshot_url),
            ltf_screenshot_url: non_blank(&self.ltf_screenshot_url),
            comment: non_blank(&self.comment),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordForm {
    pub password: String,
    pub confirmation: Option<String>,
}

impl PasswordForm {
    /// Returns the password exactly as typed. Surrounding spaces are part of it.
    pub fn validate(&self) -> Result<String, String> {
        let password = &self.password;
        if password.trim().is_empty() {
            return Err("Password cannot be empty.".to_string());
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(format!("Password must be at least {} characters.", MIN_PASSWORD_LEN));
        }
        if let Some(confirmation) = &self.confirmation {
            if confirmation != password {
                return Err("Passwords do not match.".to_string());
            }
        }
        Ok(password.clone())
    }
}

pub fn validate_username(raw: &str) -> Result<String, String> {
    non_blank(raw).ok_or_else(|| "Username cannot be empty.".to_string())
}

pub fn normalize_email(raw: &str) -> Result<String, String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err("Enter your email.".to_string());
    }
    Ok(email)
}
