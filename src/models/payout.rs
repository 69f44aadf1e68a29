use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amount::lenient_f64;

/// Ledger entry written when profit is withdrawn from a live account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payout {
    pub id: String,
    pub user_id: String,
    pub account_id: String,
    #[serde(deserialize_with = "lenient_f64", default)]
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}
