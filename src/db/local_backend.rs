//! SQLite implementation of [`JournalBackend`] for offline use and tests.
//!
//! Mirrors the hosted tables one to one. Every statement is scoped by the
//! session's user id, which stands in for the hosted row-level policies.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::api::{ApiError, JournalBackend};
use crate::db::Database;
use crate::models::{
    Account, AccountDraft, AccountPatch, AuthUser, Credentials, Journal, Payout, Profile, Session,
    SignUpOutcome, Trade, TradeDraft, TradeFilters,
};

/// What a bearer token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionKind {
    Access,
    Recovery,
}

impl SessionKind {
    fn as_str(self) -> &'static str {
        match self {
            SessionKind::Access => "access",
            SessionKind::Recovery => "recovery",
        }
    }

    fn ttl(self) -> Duration {
        match self {
            SessionKind::Access => Duration::days(7),
            SessionKind::Recovery => Duration::hours(1),
        }
    }
}

const ACCOUNT_COLUMNS: &str = "id, user_id, account_number, firm, size, phase, balance, \
     max_drawdown_percent, profit_target_percent, status, created_at";

const TRADE_COLUMNS: &str = "id, user_id, account_id, trade_date, day_of_week, asset, killzone, \
     direction, market_phase, setup, risk_pct, rr, outcome, pnl_money, htf_screenshot_url, \
     ltf_screenshot_url, comment, created_at, updated_at";

pub struct LocalBackend {
    db: Database,
}

impl LocalBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open(db_path: &str) -> Result<Self, ApiError> {
        Ok(Self::new(Database::new(db_path)?))
    }

    pub fn in_memory() -> Result<Self, ApiError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T, ApiError>) -> Result<T, ApiError> {
        let conn = self
            .db
            .conn
            .lock()
            .map_err(|e| ApiError::DatabaseError(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Argon2id PHC string; the salt travels inside it.
fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| ApiError::DatabaseError(format!("Password salt: {}", e)))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::DatabaseError(format!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            log::warn!("Stored password hash is unreadable ({}); a reset is required", e);
            false
        }
    }
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn parse_column<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn row_to_account(row: &Row) -> rusqlite::Result<Account> {
    let status: Option<String> = row.get(9)?;
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_number: row.get(2)?,
        firm: row.get(3)?,
        size: row.get(4)?,
        phase: parse_column(row, 5)?,
        balance: row.get(6)?,
        max_drawdown_percent: row.get(7)?,
        profit_target_percent: row.get(8)?,
        status: status.and_then(|s| s.parse().ok()),
        created_at: from_millis(row.get(10)?),
    })
}

fn row_to_trade(row: &Row) -> rusqlite::Result<Trade> {
    let raw_date: String = row.get(3)?;
    let trade_date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d")
        .map_err(|e| conversion_error(3, format!("{}: {}", raw_date, e)))?;
    let updated_at: Option<i64> = row.get(18)?;

    Ok(Trade {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_id: row.get(2)?,
        trade_date,
        day_of_week: row.get(4)?,
        asset: row.get(5)?,
        killzone: parse_column(row, 6)?,
        direction: parse_column(row, 7)?,
        market_phase: parse_column(row, 8)?,
        setup: row.get(9)?,
        risk_pct: row.get(10)?,
        rr: row.get(11)?,
        outcome: parse_column(row, 12)?,
        pnl_money: row.get(13)?,
        htf_screenshot_url: row.get(14)?,
        ltf_screenshot_url: row.get(15)?,
        comment: row.get(16)?,
        created_at: from_millis(row.get(17)?),
        updated_at: updated_at.map(from_millis),
    })
}

/// Issues a token and sweeps every expired one.
fn create_session(conn: &Connection, user: AuthUser, kind: SessionKind) -> Result<Session, ApiError> {
    let token = Uuid::new_v4().to_string();
    let now = Utc::now();
    let expires_at = now + kind.ttl();

    let purged = conn.execute("DELETE FROM sessions WHERE expires_at <= ?", [now.timestamp_millis()])?;
    if purged > 0 {
        log::debug!("Purged {} expired sessions", purged);
    }

    conn.execute(
        "INSERT INTO sessions (access_token, user_id, kind, created_at, expires_at) VALUES (?, ?, ?, ?, ?)",
        params![token, user.id, kind.as_str(), now.timestamp_millis(), expires_at.timestamp_millis()],
    )?;

    Ok(Session {
        access_token: token,
        refresh_token: None,
        expires_at: Some(expires_at.timestamp()),
        user,
    })
}

fn user_for_token(conn: &Connection, access_token: &str) -> Result<AuthUser, ApiError> {
    conn.query_row(
        "SELECT u.id, u.email FROM sessions s JOIN users u ON u.id = s.user_id
         WHERE s.access_token = ? AND s.expires_at > ?",
        params![access_token, now_millis()],
        |row| {
            Ok(AuthUser {
                id: row.get(0)?,
                email: row.get(1)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| ApiError::AuthenticationError("Invalid or expired session".to_string()))
}

fn select_account(conn: &Connection, user_id: &str, id: &str) -> Result<Option<Account>, ApiError> {
    let sql = format!("SELECT {} FROM accounts WHERE id = ? AND user_id = ?", ACCOUNT_COLUMNS);
    Ok(conn.query_row(&sql, params![id, user_id], row_to_account).optional()?)
}

fn select_trade(conn: &Connection, journal: Journal, user_id: &str, id: &str) -> Result<Trade, ApiError> {
    // Table names only ever come from Journal::table()
    let sql = format!("SELECT {} FROM {} WHERE id = ? AND user_id = ?", TRADE_COLUMNS, journal.table());
    conn.query_row(&sql, params![id, user_id], row_to_trade)
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("{} row {}", journal.table(), id)))
}

fn ensure_account_owned(conn: &Connection, user_id: &str, account_id: &str) -> Result<(), ApiError> {
    match select_account(conn, user_id, account_id)? {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound(format!("accounts row {}", account_id))),
    }
}

#[async_trait]
impl JournalBackend for LocalBackend {
    fn backend_name(&self) -> &str {
        "local"
    }

    async fn sign_up(&self, credentials: &Credentials, username: Option<&str>) -> Result<SignUpOutcome, ApiError> {
        let email = credentials.email.trim().to_lowercase();
        let password_hash = hash_password(&credentials.password)?;
        self.with_conn(|conn| {
            let exists: bool = conn.query_row("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)", [&email], |row| {
                row.get(0)
            })?;
            if exists {
                return Err(ApiError::BackendError {
                    code: "user_already_exists".to_string(),
                    message: "User already registered".to_string(),
                });
            }

            let user = AuthUser {
                id: Uuid::new_v4().to_string(),
                email: Some(email.clone()),
            };
            let now = now_millis();

            conn.execute(
                "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
                params![user.id, email, password_hash, now],
            )?;
            conn.execute(
                "INSERT INTO profiles (id, username, created_at) VALUES (?, ?, ?)",
                params![user.id, username, now],
            )?;

            log::info!("Registered local user {}", user.id);

            let session = create_session(conn, user.clone(), SessionKind::Access)?;
            Ok(SignUpOutcome {
                user,
                session: Some(session),
            })
        })
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        let email = credentials.email.trim().to_lowercase();
        let found: Option<(String, String)> = self.with_conn(|conn| {
            Ok(conn
                .query_row("SELECT id, password_hash FROM users WHERE email = ?", [&email], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()?)
        })?;

        // Verified outside the lock
        match found {
            Some((id, hash)) if verify_password(&credentials.password, &hash) => self.with_conn(|conn| {
                create_session(conn, AuthUser { id, email: Some(email.clone()) }, SessionKind::Access)
            }),
            _ => Err(ApiError::AuthenticationError("Invalid login credentials".to_string())),
        }
    }

    async fn sign_out(&self, session: &Session) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE access_token = ?", [&session.access_token])?;
            Ok(())
        })
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, ApiError> {
        self.with_conn(|conn| user_for_token(conn, access_token))
    }

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<(), ApiError> {
        let email = email.trim().to_lowercase();
        self.with_conn(|conn| {
            let user_id: Option<String> = conn
                .query_row("SELECT id FROM users WHERE email = ?", [&email], |row| row.get(0))
                .optional()?;

            // Unknown addresses succeed silently
            let Some(id) = user_id else {
                return Ok(());
            };

            // Only the newest link works
            conn.execute(
                "DELETE FROM sessions WHERE user_id = ? AND kind = ?",
                params![id, SessionKind::Recovery.as_str()],
            )?;
            let session = create_session(conn, AuthUser { id, email: Some(email.clone()) }, SessionKind::Recovery)?;
            log::info!(
                "Password reset link for {}: {}#access_token={}&type=recovery",
                email,
                redirect_to,
                session.access_token
            );
            Ok(())
        })
    }

    async fn update_password(&self, session: &Session, new_password: &str) -> Result<(), ApiError> {
        let password_hash = hash_password(new_password)?;
        self.with_conn(|conn| {
            let user = user_for_token(conn, &session.access_token)?;
            conn.execute("UPDATE users SET password_hash = ? WHERE id = ?", params![password_hash, user.id])?;

            // The session that changed the password stays signed in
            let revoked = conn.execute(
                "DELETE FROM sessions WHERE user_id = ? AND access_token <> ?",
                params![user.id, session.access_token],
            )?;
            log::info!("Password changed for {}, {} other session(s) revoked", user.id, revoked);
            Ok(())
        })
    }

    async fn list_accounts(&self, session: &Session) -> Result<Vec<Account>, ApiError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM accounts WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
                ACCOUNT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let accounts = stmt
                .query_map([session.user_id()], row_to_account)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(accounts)
        })
    }

    async fn get_account(&self, session: &Session, id: &str) -> Result<Option<Account>, ApiError> {
        self.with_conn(|conn| select_account(conn, session.user_id(), id))
    }

    async fn insert_account(&self, session: &Session, draft: &AccountDraft) -> Result<Account, ApiError> {
        self.with_conn(|conn| {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO accounts (id, user_id, account_number, firm, size, phase, balance,
                     max_drawdown_percent, profit_target_percent, status, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)",
                params![
                    id,
                    session.user_id(),
                    draft.account_number,
                    draft.firm,
                    draft.size,
                    draft.phase.as_str(),
                    draft.balance,
                    draft.max_drawdown_percent,
                    draft.profit_target_percent,
                    now_millis()
                ],
            )?;
            select_account(conn, session.user_id(), &id)?
                .ok_or_else(|| ApiError::DatabaseError("Inserted account vanished".to_string()))
        })
    }

    async fn update_account(&self, session: &Session, id: &str, patch: &AccountPatch) -> Result<Account, ApiError> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(v) = &patch.account_number {
            sets.push("account_number = ?");
            values.push(Value::Text(v.clone()));
        }
        if let Some(v) = &patch.firm {
            sets.push("firm = ?");
            values.push(Value::Text(v.clone()));
        }
        if let Some(v) = patch.size {
            sets.push("size = ?");
            values.push(Value::Real(v));
        }
        if let Some(v) = patch.phase {
            sets.push("phase = ?");
            values.push(Value::Text(v.as_str().to_string()));
        }
        if let Some(v) = patch.balance {
            sets.push("balance = ?");
            values.push(Value::Real(v));
        }
        if let Some(v) = patch.max_drawdown_percent {
            sets.push("max_drawdown_percent = ?");
            values.push(Value::Real(v));
        }
        if let Some(v) = patch.profit_target_percent {
            sets.push("profit_target_percent = ?");
            values.push(Value::Real(v));
        }
        if let Some(v) = patch.status {
            sets.push("status = ?");
            values.push(Value::Text(v.as_str().to_string()));
        }

        self.with_conn(|conn| {
            if !sets.is_empty() {
                values.push(Value::Text(id.to_string()));
                values.push(Value::Text(session.user_id().to_string()));
                let sql = format!("UPDATE accounts SET {} WHERE id = ? AND user_id = ?", sets.join(", "));
                conn.execute(&sql, params_from_iter(values.iter()))?;
            }
            select_account(conn, session.user_id(), id)?
                .ok_or_else(|| ApiError::NotFound(format!("accounts row {}", id)))
        })
    }

    async fn delete_account(&self, session: &Session, id: &str) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM accounts WHERE id = ? AND user_id = ?",
                params![id, session.user_id()],
            )?;
            if deleted == 0 {
                return Err(ApiError::NotFound(format!("accounts row {}", id)));
            }
            Ok(())
        })
    }

    async fn insert_payout(&self, session: &Session, account_id: &str, amount: f64) -> Result<Payout, ApiError> {
        self.with_conn(|conn| {
            ensure_account_owned(conn, session.user_id(), account_id)?;

            let payout = Payout {
                id: Uuid::new_v4().to_string(),
                user_id: session.user_id().to_string(),
                account_id: account_id.to_string(),
                amount,
                created_at: from_millis(now_millis()),
            };
            conn.execute(
                "INSERT INTO payouts (id, user_id, account_id, amount, created_at) VALUES (?, ?, ?, ?, ?)",
                params![
                    payout.id,
                    payout.user_id,
                    payout.account_id,
                    payout.amount,
                    payout.created_at.timestamp_millis()
                ],
            )?;
            Ok(payout)
        })
    }

    async fn list_payouts(&self, session: &Session) -> Result<Vec<Payout>, ApiError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, account_id, amount, created_at FROM payouts
                 WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
            )?;
            let payouts = stmt
                .query_map([session.user_id()], |row| {
                    Ok(Payout {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        account_id: row.get(2)?,
                        amount: row.get(3)?,
                        created_at: from_millis(row.get(4)?),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(payouts)
        })
    }

    async fn list_trades(
        &self,
        session: &Session,
        journal: Journal,
        filters: &TradeFilters,
    ) -> Result<Vec<Trade>, ApiError> {
        let mut clauses = vec!["user_id = ?"];
        let mut values = vec![Value::Text(session.user_id().to_string())];

        if let Some(start) = filters.start_date {
            clauses.push("trade_date >= ?");
            values.push(Value::Text(start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = filters.end_date {
            clauses.push("trade_date <= ?");
            values.push(Value::Text(end.format("%Y-%m-%d").to_string()));
        }
        if let Some(account_id) = &filters.account_id {
            clauses.push("account_id = ?");
            values.push(Value::Text(account_id.clone()));
        }
        if let Some(outcome) = filters.outcome {
            clauses.push("outcome = ?");
            values.push(Value::Text(outcome.as_str().to_string()));
        }

        // SQLite treats a negative limit as no limit
        values.push(Value::Integer(filters.limit.map(i64::from).unwrap_or(-1)));

        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY trade_date DESC, created_at DESC, rowid DESC LIMIT ?",
            TRADE_COLUMNS,
            journal.table(),
            clauses.join(" AND ")
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let trades = stmt
                .query_map(params_from_iter(values.iter()), row_to_trade)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(trades)
        })
    }

    async fn insert_trade(&self, session: &Session, journal: Journal, draft: &TradeDraft) -> Result<Trade, ApiError> {
        self.with_conn(|conn| {
            let account_id = match journal {
                Journal::Live => draft.account_id.as_deref(),
                Journal::Backtest => None,
            };
            if let Some(account_id) = account_id {
                ensure_account_owned(conn, session.user_id(), account_id)?;
            }

            let id = Uuid::new_v4().to_string();
            let now = now_millis();
            let sql = format!(
                "INSERT INTO {} (id, user_id, account_id, trade_date, day_of_week, asset, killzone, direction,
                     market_phase, setup, risk_pct, rr, outcome, pnl_money, htf_screenshot_url,
                     ltf_screenshot_url, comment, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                journal.table()
            );
            conn.execute(
                &sql,
                params![
                    id,
                    session.user_id(),
                    account_id,
                    draft.trade_date.format("%Y-%m-%d").to_string(),
                    draft.day_of_week,
                    draft.asset,
                    draft.killzone.as_str(),
                    draft.direction.as_str(),
                    draft.market_phase.as_str(),
                    draft.setup,
                    draft.risk_pct,
                    draft.rr,
                    draft.outcome.as_str(),
                    draft.pnl_money,
                    draft.htf_screenshot_url,
                    draft.ltf_screenshot_url,
                    draft.comment,
                    now,
                    now
                ],
            )?;
            select_trade(conn, journal, session.user_id(), &id)
        })
    }

    async fn update_trade(
        &self,
        session: &Session,
        journal: Journal,
        id: &str,
        draft: &TradeDraft,
    ) -> Result<Trade, ApiError> {
        self.with_conn(|conn| {
            let account_id = match journal {
                Journal::Live => draft.account_id.as_deref(),
                Journal::Backtest => None,
            };
            if let Some(account_id) = account_id {
                ensure_account_owned(conn, session.user_id(), account_id)?;
            }

            let sql = format!(
                "UPDATE {} SET account_id = ?, trade_date = ?, day_of_week = ?, asset = ?, killzone = ?,
                     direction = ?, market_phase = ?, setup = ?, risk_pct = ?, rr = ?, outcome = ?,
                     pnl_money = ?, htf_screenshot_url = ?, ltf_screenshot_url = ?, comment = ?,
                     updated_at = ?
                 WHERE id = ? AND user_id = ?",
                journal.table()
            );
            let changed = conn.execute(
                &sql,
                params![
                    account_id,
                    draft.trade_date.format("%Y-%m-%d").to_string(),
                    draft.day_of_week,
                    draft.asset,
                    draft.killzone.as_str(),
                    draft.direction.as_str(),
                    draft.market_phase.as_str(),
                    draft.setup,
                    draft.risk_pct,
                    draft.rr,
                    draft.outcome.as_str(),
                    draft.pnl_money,
                    draft.htf_screenshot_url,
                    draft.ltf_screenshot_url,
                    draft.comment,
                    now_millis(),
                    id,
                    session.user_id()
                ],
            )?;
            if changed == 0 {
                return Err(ApiError::NotFound(format!("{} row {}", journal.table(), id)));
            }
            select_trade(conn, journal, session.user_id(), id)
        })
    }

    async fn delete_trade(&self, session: &Session, journal: Journal, id: &str) -> Result<(), ApiError> {
        self.with_conn(|conn| {
            let sql = format!("DELETE FROM {} WHERE id = ? AND user_id = ?", journal.table());
            let deleted = conn.execute(&sql, params![id, session.user_id()])?;
            if deleted == 0 {
                return Err(ApiError::NotFound(format!("{} row {}", journal.table(), id)));
            }
            Ok(())
        })
    }

    async fn get_profile(&self, session: &Session) -> Result<Option<Profile>, ApiError> {
        self.with_conn(|conn| {
            let profile = conn
                .query_row(
                    "SELECT id, username, created_at FROM profiles WHERE id = ?",
                    [session.user_id()],
                    |row| {
                        Ok(Profile {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            created_at: Some(from_millis(row.get(2)?)),
                        })
                    },
                )
                .optional()?;
            Ok(profile)
        })
    }

    async fn upsert_profile(&self, session: &Session, username: &str) -> Result<Profile, ApiError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profiles (id, username, created_at) VALUES (?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET username = excluded.username",
                params![session.user_id(), username, now_millis()],
            )?;
            conn.query_row(
                "SELECT id, username, created_at FROM profiles WHERE id = ?",
                [session.user_id()],
                |row| {
                    Ok(Profile {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        created_at: Some(from_millis(row.get(2)?)),
                    })
                },
            )
            .map_err(ApiError::from)
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Direction, Killzone, MarketPhase, Outcome, Phase};

    pub(crate) async fn register(backend: &LocalBackend, email: &str) -> Session {
        let credentials = Credentials {
            email: email.to_string(),
            password: "correct horse".to_string(),
        };
        backend
            .sign_up(&credentials, Some("trader"))
            .await
            .unwrap()
            .session
            .unwrap()
    }

    pub(crate) fn account_draft(number: &str, phase: Phase, size: f64, balance: f64) -> AccountDraft {
        AccountDraft {
            account_number: number.to_string(),
            firm: "FTMO".to_string(),
            size,
            phase,
            balance,
            max_drawdown_percent: 10.0,
            profit_target_percent: if phase == Phase::Live { 0.0 } else { 8.0 },
        }
    }

    pub(crate) fn trade_draft(date: &str, outcome: Outcome, pnl: f64, account_id: Option<&str>) -> TradeDraft {
        let trade_date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        TradeDraft {
            account_id: account_id.map(str::to_string),
            trade_date,
            day_of_week: crate::models::day_of_week(trade_date),
            asset: "XAUUSD".to_string(),
            killzone: Killzone::NewYork,
            direction: Direction::Short,
            market_phase: MarketPhase::Range,
            setup: Some("Sweep".to_string()),
            risk_pct: 1.0,
            rr: 2.0,
            outcome,
            pnl_money: outcome.normalize_pnl(pnl),
            htf_screenshot_url: None,
            ltf_screenshot_url: None,
            comment: None,
        }
    }

    #[tokio::test]
    async fn test_sign_up_sign_in_and_sessions() {
        let backend = LocalBackend::in_memory().unwrap();
        let session = register(&backend, " Me@Mail.com ").await;

        let user = backend.get_user(&session.access_token).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("me@mail.com"));

        let again = backend
            .sign_up(
                &Credentials {
                    email: "me@mail.com".to_string(),
                    password: "whatever123".to_string(),
                },
                None,
            )
            .await;
        assert!(matches!(again, Err(ApiError::BackendError { .. })));

        let wrong = backend
            .sign_in(&Credentials {
                email: "me@mail.com".to_string(),
                password: "nope nope".to_string(),
            })
            .await;
        assert!(wrong.unwrap_err().is_auth());

        backend.sign_out(&session).await.unwrap();
        assert!(backend.get_user(&session.access_token).await.unwrap_err().is_auth());
    }

    #[tokio::test]
    async fn test_update_password() {
        let backend = LocalBackend::in_memory().unwrap();
        let session = register(&backend, "me@mail.com").await;

        backend.update_password(&session, "brand new pass").await.unwrap();

        let old = backend
            .sign_in(&Credentials {
                email: "me@mail.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await;
        assert!(old.is_err());

        let new = backend
            .sign_in(&Credentials {
                email: "me@mail.com".to_string(),
                password: "brand new pass".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(new.user_id(), session.user_id());
    }

    #[tokio::test]
    async fn test_accounts_are_scoped_per_user() {
        let backend = LocalBackend::in_memory().unwrap();
        let alice = register(&backend, "alice@mail.com").await;
        let bob = register(&backend, "bob@mail.com").await;

        let account = backend
            .insert_account(&alice, &account_draft("A-1", Phase::Phase1, 25000.0, 25000.0))
            .await
            .unwrap();
        assert_eq!(account.status, None);

        assert_eq!(backend.list_accounts(&alice).await.unwrap().len(), 1);
        assert!(backend.list_accounts(&bob).await.unwrap().is_empty());
        assert!(backend.get_account(&bob, &account.id).await.unwrap().is_none());

        let err = backend
            .update_account(&bob, &account.id, &AccountPatch::balance(1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(backend.delete_account(&bob, &account.id).await.is_err());

        let updated = backend
            .update_account(&alice, &account.id, &AccountPatch::balance(24000.0))
            .await
            .unwrap();
        assert_eq!(updated.balance, 24000.0);
        assert_eq!(updated.firm, "FTMO");

        backend.delete_account(&alice, &account.id).await.unwrap();
        assert!(backend.list_accounts(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trades_filters_and_order() {
        let backend = LocalBackend::in_memory().unwrap();
        let session = register(&backend, "me@mail.com").await;
        let account = backend
            .insert_account(&session, &account_draft("A-1", Phase::Live, 10000.0, 10000.0))
            .await
            .unwrap();

        for (date, outcome) in [
            ("2026-09-30", Outcome::TakeProfit),
            ("2026-10-02", Outcome::StopLoss),
            ("2026-10-15", Outcome::BreakEvenPlus),
        ] {
            backend
                .insert_trade(&session, Journal::Live, &trade_draft(date, outcome, 100.0, Some(&account.id)))
                .await
                .unwrap();
        }

        let all = backend
            .list_trades(&session, Journal::Live, &TradeFilters::default())
            .await
            .unwrap();
        let dates: Vec<_> = all.iter().map(|t| t.trade_date.to_string()).collect();
        assert_eq!(dates, vec!["2026-10-15", "2026-10-02", "2026-09-30"]);
        assert_eq!(all[1].pnl_money, -100.0);

        let october = TradeFilters::between(
            NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 31).unwrap(),
        );
        assert_eq!(backend.list_trades(&session, Journal::Live, &october).await.unwrap().len(), 2);

        let latest = backend
            .list_trades(&session, Journal::Live, &TradeFilters::latest(1))
            .await
            .unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].outcome, Outcome::BreakEvenPlus);

        assert!(backend
            .list_trades(&session, Journal::Backtest, &TradeFilters::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_trade_update_and_delete() {
        let backend = LocalBackend::in_memory().unwrap();
        let session = register(&backend, "me@mail.com").await;
        let other = register(&backend, "other@mail.com").await;

        let trade = backend
            .insert_trade(&session, Journal::Backtest, &trade_draft("2026-10-01", Outcome::TakeProfit, 50.0, None))
            .await
            .unwrap();
        assert_eq!(trade.account_id, None);

        let mut draft = trade_draft("2026-10-02", Outcome::StopLoss, 75.0, None);
        draft.comment = Some("moved stop".to_string());
        let updated = backend
            .update_trade(&session, Journal::Backtest, &trade.id, &draft)
            .await
            .unwrap();
        assert_eq!(updated.pnl_money, -75.0);
        assert_eq!(updated.day_of_week, 5);
        assert!(updated.updated_at.is_some());

        assert!(backend
            .update_trade(&other, Journal::Backtest, &trade.id, &draft)
            .await
            .is_err());
        assert!(backend.delete_trade(&other, Journal::Backtest, &trade.id).await.is_err());
        backend.delete_trade(&session, Journal::Backtest, &trade.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_live_trade_requires_own_account() {
        let backend = LocalBackend::in_memory().unwrap();
        let alice = register(&backend, "alice@mail.com").await;
        let bob = register(&backend, "bob@mail.com").await;
        let account = backend
            .insert_account(&alice, &account_draft("A-1", Phase::Live, 10000.0, 10000.0))
            .await
            .unwrap();

        let err = backend
            .insert_trade(&bob, Journal::Live, &trade_draft("2026-10-01", Outcome::TakeProfit, 5.0, Some(&account.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_payouts_and_profile() {
        let backend = LocalBackend::in_memory().unwrap();
        let session = register(&backend, "me@mail.com").await;
        let account = backend
            .insert_account(&session, &account_draft("L-1", Phase::Live, 10000.0, 10500.0))
            .await
            .unwrap();

        backend.insert_payout(&session, &account.id, 500.0).await.unwrap();
        let payouts = backend.list_payouts(&session).await.unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].amount, 500.0);

        let profile = backend.get_profile(&session).await.unwrap().unwrap();
        assert_eq!(profile.username.as_deref(), Some("trader"));

        let profile = backend.upsert_profile(&session, "scalper").await.unwrap();
        assert_eq!(profile.username.as_deref(), Some("scalper"));
    }

    #[tokio::test]
    async fn test_password_reset_issues_recovery_session() {
        let backend = LocalBackend::in_memory().unwrap();
        register(&backend, "me@mail.com").await;

        backend
            .send_password_reset("me@mail.com", "http://localhost:3000/reset-password")
            .await
            .unwrap();
        backend
            .send_password_reset("nobody@mail.com", "http://localhost:3000/reset-password")
            .await
            .unwrap();

        let sessions: i64 = backend
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(sessions, 2);
    }

    fn count(backend: &LocalBackend, sql: &str) -> i64 {
        backend
            .with_conn(|conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
            .unwrap()
    }

    #[tokio::test]
    async fn test_password_stored_as_argon2() {
        let backend = LocalBackend::in_memory().unwrap();
        register(&backend, "me@mail.com").await;

        let stored: String = backend
            .with_conn(|conn| Ok(conn.query_row("SELECT password_hash FROM users", [], |row| row.get(0))?))
            .unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(!stored.contains("correct horse"));
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("correct horse ", &stored));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn test_repeated_reset_requests_keep_one_short_session() {
        let backend = LocalBackend::in_memory().unwrap();
        register(&backend, "me@mail.com").await;

        for _ in 0..50 {
            backend
                .send_password_reset("me@mail.com", "http://localhost:3000/reset-password")
                .await
                .unwrap();
        }

        assert_eq!(count(&backend, "SELECT COUNT(*) FROM sessions WHERE kind = 'recovery'"), 1);
        let horizon = (Utc::now() + Duration::hours(1)).timestamp_millis();
        let too_long = format!("SELECT COUNT(*) FROM sessions WHERE kind = 'recovery' AND expires_at > {}", horizon);
        assert_eq!(count(&backend, &too_long), 0);
    }

    #[tokio::test]
    async fn test_password_change_revokes_other_sessions() {
        let backend = LocalBackend::in_memory().unwrap();
        let first = register(&backend, "me@mail.com").await;
        let second = backend
            .sign_in(&Credentials {
                email: "me@mail.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap();

        backend
            .send_password_reset("me@mail.com", "http://localhost:3000/reset-password")
            .await
            .unwrap();
        let recovery_token: String = backend
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT access_token FROM sessions WHERE kind = 'recovery'", [], |row| {
                    row.get(0)
                })?)
            })
            .unwrap();
        let recovery = Session {
            access_token: recovery_token.clone(),
            refresh_token: None,
            expires_at: None,
            user: backend.get_user(&recovery_token).await.unwrap(),
        };

        backend.update_password(&recovery, "brand new pass").await.unwrap();

        assert!(backend.get_user(&first.access_token).await.unwrap_err().is_auth());
        assert!(backend.get_user(&second.access_token).await.unwrap_err().is_auth());
        assert!(backend.get_user(&recovery_token).await.is_ok());

        // Changing it from a signed-in session keeps that one only
        let third = backend
            .sign_in(&Credentials {
                email: "me@mail.com".to_string(),
                password: "brand new pass".to_string(),
            })
            .await
            .unwrap();
        backend.update_password(&third, "another new pass").await.unwrap();
        assert!(backend.get_user(&third.access_token).await.is_ok());
        assert!(backend.get_user(&recovery_token).await.unwrap_err().is_auth());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_purged() {
        let backend = LocalBackend::in_memory().unwrap();
        let session = register(&backend, "me@mail.com").await;
        backend
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO sessions (access_token, user_id, kind, created_at, expires_at) VALUES ('stale', ?, 'access', 0, 1)",
                    [session.user_id()],
                )?;
                Ok(())
            })
            .unwrap();
        assert!(backend.get_user("stale").await.unwrap_err().is_auth());

        backend
            .sign_in(&Credentials {
                email: "me@mail.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(count(&backend, "SELECT COUNT(*) FROM sessions WHERE access_token = 'stale'"), 0);
        assert_eq!(count(&backend, "SELECT COUNT(*) FROM sessions"), 2);
    }
}
