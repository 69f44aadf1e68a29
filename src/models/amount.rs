use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::sync::OnceLock;

fn strip_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^0-9.\-]").expect("static regex is valid"))
}

/// Parse a user- or backend-supplied amount.
///
/// Accepts "10%", "$ 200", "1 000", "10,5" and similar. Returns `None` when
/// nothing numeric is left after stripping decoration.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    // Only the first comma is a decimal separator
    let normalized = compact.replacen(',', ".", 1);
    let cleaned = strip_pattern().replace_all(&normalized, "");

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Serde helper: numeric columns may arrive as numbers, strings or null.
/// Anything unreadable becomes 0.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().map(finite_or_zero).unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => parse_amount(&s).unwrap_or(0.0),
        _ => 0.0,
    })
}
