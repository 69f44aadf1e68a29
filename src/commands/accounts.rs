use serde::Serialize;

use super::failure;
use crate::api::JournalBackend;
use crate::metrics::{portfolio_summary, AccountMetrics, BlownRule, PortfolioSummary};
use crate::models::{finite_or_zero, Account, AccountForm, AccountPatch, Payout, Phase, Session};

/// An account with everything the pages derive from it.
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    #[serde(flatten)]
    pub account: Account,
    pub label: String,
    pub blown: bool,
    pub metrics: AccountMetrics,
}

impl AccountView {
    pub fn new(account: Account, rule: BlownRule) -> Self {
        AccountView {
            label: account.label(),
            blown: rule.is_blown(&account),
            metrics: AccountMetrics::of(&account),
            account,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountsPage {
    pub active: Vec<AccountView>,
    /// Read-only on the pages.
    pub blown: Vec<AccountView>,
    pub summary: PortfolioSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct Withdrawal {
    pub payout: Payout,
    pub account: Account,
}

pub async fn list_accounts(
    backend: &dyn JournalBackend,
    session: &Session,
    rule: BlownRule,
) -> Result<AccountsPage, String> {
    let accounts = backend
        .list_accounts(session)
        .await
        .map_err(|e| failure("Load accounts", e))?;
    Ok(accounts_page(accounts, rule))
}

pub(crate) fn accounts_page(accounts: Vec<Account>, rule: BlownRule) -> AccountsPage {
    let summary = portfolio_summary(&accounts, rule);
    let (blown, active): (Vec<_>, Vec<_>) = accounts
        .into_iter()
        .map(|account| AccountView::new(account, rule))
        .partition(|view| view.blown);

    AccountsPage { active, blown, summary }
}

pub async fn get_account(
    backend: &dyn JournalBackend,
    session: &Session,
    id: &str,
    rule: BlownRule,
) -> Result<AccountView, String> {
    backend
        .get_account(session, id)
        .await
        .map_err(|e| failure("Load account", e))?
        .map(|account| AccountView::new(account, rule))
        .ok_or_else(|| "Account not found.".to_string())
}

pub async fn create_account(backend: &dyn JournalBackend, session: &Session, form: &AccountForm) -> Result<Account, String> {
    let draft = form.validate()?;
    let account = backend
        .insert_account(session, &draft)
        .await
        .map_err(|e| failure("Create account", e))?;

    log::info!("Created account {} ({})", account.id, account.phase);
    Ok(account)
}

pub async fn update_account(
    backend: &dyn JournalBackend,
    session: &Session,
    id: &str,
    form: &AccountForm,
) -> Result<Account, String> {
    let patch = AccountPatch::from(form.validate()?);
    backend
        .update_account(session, id, &patch)
        .await
        .map_err(|e| failure("Update account", e))
}

pub async fn delete_account(backend: &dyn JournalBackend, session: &Session, id: &str) -> Result<(), String> {
    backend
        .delete_account(session, id)
        .await
        .map_err(|e| failure("Delete account", e))?;

    log::info!("Deleted account {}", id);
    Ok(())
}

/// Logs the live account's profit as a payout and resets its balance to size.
///
/// The two writes are not atomic: if the balance reset fails after the
/// payout was stored, the error is logged and returned as is.
pub async fn withdraw_profit(backend: &dyn JournalBackend, session: &Session, id: &str) -> Result<Withdrawal, String> {
    let account = backend
        .get_account(session, id)
        .await
        .map_err(|e| failure("Load account", e))?
        .ok_or_else(|| "Account not found.".to_string())?;

    if account.phase != Phase::Live {
        return Err("Profit can only be withdrawn from live accounts.".to_string());
    }

    let size = finite_or_zero(account.size);
    let profit = finite_or_zero(account.balance) - size;
    if profit <= 0.0 {
        return Err("There is no profit to withdraw.".to_string());
    }

    let payout = backend
        .insert_payout(session, &account.id, profit)
        .await
        .map_err(|e| failure("Record payout", e))?;

    let account = match backend.update_account(session, &account.id, &AccountPatch::balance(size)).await {
        Ok(account) => account,
        Err(err) => {
            log::error!(
                "Payout {} recorded but balance reset failed for account {}: {}",
                payout.id,
                account.id,
                err
            );
            return Err(err.to_string());
        }
    };

    log::info!("Withdrew {:.2} from account {}", profit, account.id);
    Ok(Withdrawal { payout, account })
}

pub async fn list_payouts(backend: &dyn JournalBackend, session: &Session) -> Result<Vec<Payout>, String> {
    backend
        .list_payouts(session)
        .await
        .map_err(|e| failure("Load payouts", e))
}
