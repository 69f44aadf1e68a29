use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amount::lenient_f64;

text_enum! {
    /// Evaluation stage of a prop-firm account.
    pub enum Phase {
        Phase1 => "phase1",
        Phase2 => "phase2",
        Live => "live",
    }
}

impl Phase {
    /// Challenge phases carry a profit target; live accounts do not.
    pub fn has_profit_target(&self) -> bool {
        matches!(self, Phase::Phase1 | Phase::Phase2)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Phase1
    }
}

text_enum! {
    pub enum AccountStatus {
        Active => "active",
        Blown => "blown",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub firm: String,
    #[serde(deserialize_with = "lenient_f64", default)]
    pub size: f64,
    #[serde(default)]
    pub phase: Phase,
    #[serde(deserialize_with = "lenient_f64", default)]
    pub balance: f64,
    #[serde(deserialize_with = "lenient_f64", default)]
    pub max_drawdown_percent: f64,
    #[serde(deserialize_with = "lenient_f64", default)]
    pub profit_target_percent: f64,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Option<AccountStatus>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Display label: "<number> • <firm> • $<size>", empty parts omitted.
    pub fn label(&self) -> String {
        let number = self.account_number.trim();
        let mut parts = vec![if number.is_empty() { "Account".to_string() } else { number.to_string() }];

        let firm = self.firm.trim();
        if !firm.is_empty() {
            parts.push(firm.to_string());
        }
        if self.size > 0.0 {
            parts.push(format!("${}", format_money(self.size)));
        }

        parts.join(" • ")
    }
}

/// Unknown status strings are treated as "no status".
fn lenient_status<'de, D>(deserializer: D) -> Result<Option<AccountStatus>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.trim().to_lowercase().parse().ok()))
}

/// Thousands-separated money with up to two decimals ("25,000", "1,234.5").
pub fn format_money(value: f64) -> String {
    let rounded = (value.abs() * 100.0).round() / 100.0;
    let whole = rounded.trunc() as u64;
    let cents = ((rounded - rounded.trunc()) * 100.0).round() as u64;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && rounded > 0.0 { "-" } else { "" };
    match cents {
        0 => format!("{}{}", sign, grouped),
        c if c % 10 == 0 => format!("{}{}.{}", sign, grouped, c / 10),
        c => format!("{}{}.{:02}", sign, grouped, c),
    }
}

/// Validated account fields ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDraft {
    pub account_number: String,
    pub firm: String,
    pub size: f64,
    pub phase: Phase,
    pub balance: f64,
    pub max_drawdown_percent: f64,
    pub profit_target_percent: f64,
}

/// Partial account update; only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_drawdown_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_target_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AccountStatus>,
}

impl From<AccountDraft> for AccountPatch {
    fn from(draft: AccountDraft) -> Self {
        AccountPatch {
            account_number: Some(draft.account_number),
            firm: Some(draft.firm),
            size: Some(draft.size),
            phase: Some(draft.phase),
            balance: Some(draft.balance),
            max_drawdown_percent: Some(draft.max_drawdown_percent),
            profit_target_percent: Some(draft.profit_target_percent),
            status: None,
        }
    }
}

impl AccountPatch {
    pub fn balance(balance: f64) -> Self {
        AccountPatch {
            balance: Some(balance),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == AccountPatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_json(extra: &str) -> String {
        format!(
            r#"{{
                "id": "acc-1",
                "user_id": "user-1",
                "account_number": "FP-25K-01",
                "firm": "FundingPips",
                "size": 25000,
                "phase": "phase1",
                "balance": "24 350,5",
                "max_drawdown_percent": 10,
                "profit_target_percent": null,
                "created_at": "2026-01-05T10:00:00.123456+00:00"
                {}
            }}"#,
            extra
        )
    }

    #[test]
    fn test_account_deserializes_lenient_numbers() {
        let account: Account = serde_json::from_str(&account_json("")).unwrap();
        assert_eq!(account.size, 25000.0);
        assert_eq!(account.balance, 24350.5);
        assert_eq!(account.profit_target_percent, 0.0);
        assert_eq!(account.phase, Phase::Phase1);
        assert_eq!(account.status, None);
    }

    #[test]
    fn test_account_status_is_case_insensitive_and_tolerant() {
        let account: Account = serde_json::from_str(&account_json(r#", "status": "Blown""#)).unwrap();
        assert_eq!(account.status, Some(AccountStatus::Blown));

        let account: Account = serde_json::from_str(&account_json(r#", "status": "archived""#)).unwrap();
        assert_eq!(account.status, None);
    }

    #[test]
    fn test_label_omits_empty_parts() {
        let mut account: Account = serde_json::from_str(&account_json("")).unwrap();
        assert_eq!(account.label(), "FP-25K-01 • FundingPips • $25,000");

        account.account_number = "  ".to_string();
        account.firm = String::new();
        account.size = 0.0;
        assert_eq!(account.label(), "Account");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "0");
        assert_eq!(format_money(999.0), "999");
        assert_eq!(format_money(1234567.0), "1,234,567");
        assert_eq!(format_money(1234.5), "1,234.5");
        assert_eq!(format_money(-50.25), "-50.25");
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = AccountPatch::balance(25000.0);
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "balance": 25000.0 }));
        assert!(!patch.is_empty());
        assert!(AccountPatch::default().is_empty());
    }
}
