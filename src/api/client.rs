use async_trait::async_trait;

use super::error::ApiError;
use crate::models::{
    Account, AccountDraft, AccountPatch, AuthUser, Credentials, Journal, Payout, Profile, Session,
    SignUpOutcome, Trade, TradeDraft, TradeFilters,
};

/// Seam to the data/auth service that stores the journal.
///
/// Every data call runs on behalf of a [`Session`] and only sees rows owned
/// by `session.user`. Implementations must not retry.
#[async_trait]
pub trait JournalBackend: Send + Sync {
    /// Short name for logs ("supabase", "local")
    fn backend_name(&self) -> &str;

    // Auth

    async fn sign_up(&self, credentials: &Credentials, username: Option<&str>) -> Result<SignUpOutcome, ApiError>;

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, ApiError>;

    async fn sign_out(&self, session: &Session) -> Result<(), ApiError>;

    /// Resolve the user behind an access token. Fails with
    /// [`ApiError::AuthenticationError`] for unknown or expired tokens.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, ApiError>;

    /// Email a password-reset link that lands on `redirect_to`.
    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<(), ApiError>;

    async fn update_password(&self, session: &Session, new_password: &str) -> Result<(), ApiError>;

    // Accounts

    /// Newest first.
    async fn list_accounts(&self, session: &Session) -> Result<Vec<Account>, ApiError>;

    async fn get_account(&self, session: &Session, id: &str) -> Result<Option<Account>, ApiError>;

    async fn insert_account(&self, session: &Session, draft: &AccountDraft) -> Result<Account, ApiError>;

    async fn update_account(&self, session: &Session, id: &str, patch: &AccountPatch) -> Result<Account, ApiError>;

    async fn delete_account(&self, session: &Session, id: &str) -> Result<(), ApiError>;

    // Payouts

    async fn insert_payout(&self, session: &Session, account_id: &str, amount: f64) -> Result<Payout, ApiError>;

    /// Newest first.
    async fn list_payouts(&self, session: &Session) -> Result<Vec<Payout>, ApiError>;

    // Trades, live or backtest

    /// Ordered by trade_date desc, then created_at desc.
    async fn list_trades(
        &self,
        session: &Session,
        journal: Journal,
        filters: &TradeFilters,
    ) -> Result<Vec<Trade>, ApiError>;

    async fn insert_trade(&self, session: &Session, journal: Journal, draft: &TradeDraft) -> Result<Trade, ApiError>;

    async fn update_trade(
        &self,
        session: &Session,
        journal: Journal,
        id: &str,
        draft: &TradeDraft,
    ) -> Result<Trade, ApiError>;

    async fn delete_trade(&self, session: &Session, journal: Journal, id: &str) -> Result<(), ApiError>;

    // Profile

    async fn get_profile(&self, session: &Session) -> Result<Option<Profile>, ApiError>;

    async fn upsert_profile(&self, session: &Session, username: &str) -> Result<Profile, ApiError>;
}
