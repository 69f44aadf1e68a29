use serde::Serialize;

use super::failure;
use crate::api::JournalBackend;
use crate::metrics::{best_worst, recent_outcomes, BestWorst, Form, Level, TraderStats};
use crate::models::{validate_username, Journal, Outcome, PasswordForm, Profile, Session, TradeFilters};

const PROFILE_WINDOW: u32 = 500;
const RECENT_STRIP: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct ProfilePage {
    pub email: Option<String>,
    /// Falls back to the email when no username was saved.
    pub username: Option<String>,
    pub stats: TraderStats,
    pub level: Level,
    pub form: Form,
    pub discipline: f64,
    pub risk_control: f64,
    pub recent_outcomes: Vec<Outcome>,
    pub best_worst: BestWorst,
}

pub async fn profile_page(backend: &dyn JournalBackend, session: &Session) -> Result<ProfilePage, String> {
    let window = TradeFilters::latest(PROFILE_WINDOW);
    let (profile, trades) = futures::try_join!(
        backend.get_profile(session),
        backend.list_trades(session, Journal::Live, &window),
    )
    .map_err(|e| failure("Load profile", e))?;

    let email = session.user.email.clone();
    let stats = TraderStats::from_trades(&trades);

    Ok(ProfilePage {
        username: profile.and_then(|p| p.username).or_else(|| email.clone()),
        email,
        level: Level::from_trade_count(stats.trades),
        form: Form::from_trades(&trades),
        discipline: stats.discipline(),
        risk_control: stats.risk_control(),
        recent_outcomes: recent_outcomes(&trades, RECENT_STRIP),
        best_worst: best_worst(&trades),
        stats,
    })
}

pub async fn save_username(backend: &dyn JournalBackend, session: &Session, username: &str) -> Result<Profile, String> {
    let username = validate_username(username)?;
    backend
        .upsert_profile(session, &username)
        .await
        .map_err(|e| failure("Save username", e))
}

pub async fn change_password(backend: &dyn JournalBackend, session: &Session, form: &PasswordForm) -> Result<(), String> {
    let password = form.validate()?;
    backend
        .update_password(session, &password)
        .await
        .map_err(|e| failure("Change password", e))?;

    log::info!("Password changed for user {}", session.user_id());
    Ok(())
}
