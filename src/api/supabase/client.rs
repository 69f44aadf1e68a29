use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::{client::JournalBackend, error::ApiError};
use crate::models::{
    Account, AccountDraft, AccountPatch, AuthUser, Credentials, Journal, Payout, Profile, Session,
    SignUpOutcome, Trade, TradeDraft, TradeFilters,
};

use super::{
    mapper::{eq, map_error, sign_up_outcome, token_to_session, trade_query},
    types::{
        AccountInsert, PasswordGrant, PasswordUpdate, PayoutInsert, ProfileUpsert, RecoverRequest,
        SignUpMetadata, SignUpRequest, SignUpResponse, TokenResponse, TradeInsert,
    },
};

const REST_PATH: &str = "/rest/v1";
const AUTH_PATH: &str = "/auth/v1";

const RETURN_ROWS: &str = "return=representation";
const UPSERT_ROWS: &str = "resolution=merge-duplicates,return=representation";

/// Client for the hosted Postgres REST + auth service.
pub struct SupabaseBackend {
    base_url: String,
    anon_key: String,
    http_client: reqwest::Client,
}

impl SupabaseBackend {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn rest_url(&self, table: &str) -> String {
        format!("{}{}/{}", self.base_url, REST_PATH, table)
    }

    pub fn auth_url(&self, endpoint: &str) -> String {
        format!("{}{}/{}", self.base_url, AUTH_PATH, endpoint.trim_start_matches('/'))
    }

    fn ensure_configured(&self) -> Result<(), ApiError> {
        if self.base_url.is_empty() || self.anon_key.is_empty() {
            return Err(ApiError::NotConfigured(
                "SUPABASE_URL and SUPABASE_ANON_KEY must be set".to_string(),
            ));
        }
        Ok(())
    }

    /// `apikey` plus a bearer token: the user's when given, the anon key otherwise.
    fn build_headers(&self, access_token: Option<&str>) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key)
                .map_err(|e| ApiError::AuthenticationError(format!("Invalid API key: {}", e)))?,
        );

        let bearer = format!("Bearer {}", access_token.unwrap_or(&self.anon_key));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer)
                .map_err(|e| ApiError::AuthenticationError(format!("Invalid access token: {}", e)))?,
        );

        Ok(headers)
    }

    fn request(&self, method: Method, url: &str, access_token: Option<&str>) -> Result<RequestBuilder, ApiError> {
        self.ensure_configured()?;
        let headers = self.build_headers(access_token)?;
        Ok(self.http_client.request(method, url).headers(headers))
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = map_error(status, &body);
            log::warn!("Backend request failed: {}", err);
            return Err(err);
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::ParseError(format!("Failed to parse response: {} - Body: {}", e, body)))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        session: &Session,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        let request = self
            .request(Method::GET, &self.rest_url(table), Some(&session.access_token))?
            .query(query);
        self.send_json(request).await
    }

    /// Insert one row and return it as stored.
    async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        session: &Session,
        table: &str,
        row: &B,
        prefer: &'static str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let request = self
            .request(Method::POST, &self.rest_url(table), Some(&session.access_token))?
            .header("Prefer", prefer)
            .query(query)
            .json(row);

        let rows: Vec<T> = self.send_json(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::ParseError(format!("Insert into {} returned no row", table)))
    }

    /// Patch the caller's row with `id`; missing rows are [`ApiError::NotFound`].
    async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        session: &Session,
        table: &str,
        id: &str,
        patch: &B,
    ) -> Result<T, ApiError> {
        let request = self
            .request(Method::PATCH, &self.rest_url(table), Some(&session.access_token))?
            .header("Prefer", RETURN_ROWS)
            .query(&[("id", eq(id)), ("user_id", eq(session.user_id()))])
            .json(patch);

        let rows: Vec<T> = self.send_json(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("{} row {}", table, id)))
    }

    async fn delete(&self, session: &Session, table: &str, id: &str) -> Result<(), ApiError> {
        let request = self
            .request(Method::DELETE, &self.rest_url(table), Some(&session.access_token))?
            .header("Prefer", RETURN_ROWS)
            .query(&[("id", eq(id)), ("user_id", eq(session.user_id()))]);

        let rows: Vec<serde_json::Value> = self.send_json(request).await?;
        if rows.is_empty() {
            return Err(ApiError::NotFound(format!("{} row {}", table, id)));
        }
        Ok(())
    }
}

#[async_trait]
impl JournalBackend for SupabaseBackend {
    fn backend_name(&self) -> &str {
        "supabase"
    }

    async fn sign_up(&self, credentials: &Credentials, username: Option<&str>) -> Result<SignUpOutcome, ApiError> {
        let body = SignUpRequest {
            email: &credentials.email,
            password: &credentials.password,
            data: SignUpMetadata { username },
        };
        let request = self.request(Method::POST, &self.auth_url("signup"), None)?.json(&body);
        let response: SignUpResponse = self.send_json(request).await?;
        Ok(sign_up_outcome(response))
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        let body = PasswordGrant {
            email: &credentials.email,
            password: &credentials.password,
        };
        let request = self
            .request(Method::POST, &self.auth_url("token"), None)?
            .query(&[("grant_type", "password")])
            .json(&body);

        // A rejected password grant is an auth failure, not a backend fault
        let token: TokenResponse = self.send_json(request).await.map_err(|e| match e {
            ApiError::BackendError { message, .. } => ApiError::AuthenticationError(message),
            other => other,
        })?;
        Ok(token_to_session(token))
    }

    async fn sign_out(&self, session: &Session) -> Result<(), ApiError> {
        let request = self.request(Method::POST, &self.auth_url("logout"), Some(&session.access_token))?;
        self.send(request).await.map(|_| ())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, ApiError> {
        let request = self.request(Method::GET, &self.auth_url("user"), Some(access_token))?;
        self.send_json(request).await
    }

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<(), ApiError> {
        let request = self
            .request(Method::POST, &self.auth_url("recover"), None)?
            .query(&[("redirect_to", redirect_to)])
            .json(&RecoverRequest { email });
        self.send(request).await.map(|_| ())
    }

    async fn update_password(&self, session: &Session, new_password: &str) -> Result<(), ApiError> {
        let request = self
            .request(Method::PUT, &self.auth_url("user"), Some(&session.access_token))?
            .json(&PasswordUpdate { password: new_password });
        self.send(request).await.map(|_| ())
    }

    async fn list_accounts(&self, session: &Session) -> Result<Vec<Account>, ApiError> {
        let query = [
            ("select", "*".to_string()),
            ("user_id", eq(session.user_id())),
            ("order", "created_at.desc".to_string()),
        ];
        self.select(session, "accounts", &query).await
    }

    async fn get_account(&self, session: &Session, id: &str) -> Result<Option<Account>, ApiError> {
        let query = [
            ("select", "*".to_string()),
            ("id", eq(id)),
            ("user_id", eq(session.user_id())),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<Account> = self.select(session, "accounts", &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_account(&self, session: &Session, draft: &AccountDraft) -> Result<Account, ApiError> {
        let row = AccountInsert {
            user_id: session.user_id(),
            draft,
        };
        self.insert(session, "accounts", &row, RETURN_ROWS, &[]).await
    }

    async fn update_account(&self, session: &Session, id: &str, patch: &AccountPatch) -> Result<Account, ApiError> {
        self.update(session, "accounts", id, patch).await
    }

    async fn delete_account(&self, session: &Session, id: &str) -> Result<(), ApiError> {
        self.delete(session, "accounts", id).await
    }

    async fn insert_payout(&self, session: &Session, account_id: &str, amount: f64) -> Result<Payout, ApiError> {
        let row = PayoutInsert {
            user_id: session.user_id(),
            account_id,
            amount,
        };
        self.insert(session, "payouts", &row, RETURN_ROWS, &[]).await
    }

    async fn list_payouts(&self, session: &Session) -> Result<Vec<Payout>, ApiError> {
        let query = [
            ("select", "*".to_string()),
            ("user_id", eq(session.user_id())),
            ("order", "created_at.desc".to_string()),
        ];
        self.select(session, "payouts", &query).await
    }

    async fn list_trades(
        &self,
        session: &Session,
        journal: Journal,
        filters: &TradeFilters,
    ) -> Result<Vec<Trade>, ApiError> {
        let query = trade_query(session.user_id(), filters);
        self.select(session, journal.table(), &query).await
    }

    async fn insert_trade(&self, session: &Session, journal: Journal, draft: &TradeDraft) -> Result<Trade, ApiError> {
        let row = TradeInsert {
            user_id: session.user_id(),
            draft,
        };
        self.insert(session, journal.table(), &row, RETURN_ROWS, &[]).await
    }

    async fn update_trade(
        &self,
        session: &Session,
        journal: Journal,
        id: &str,
        draft: &TradeDraft,
    ) -> Result<Trade, ApiError> {
        self.update(session, journal.table(), id, draft).await
    }

    async fn delete_trade(&self, session: &Session, journal: Journal, id: &str) -> Result<(), ApiError> {
        self.delete(session, journal.table(), id).await
    }

    async fn get_profile(&self, session: &Session) -> Result<Option<Profile>, ApiError> {
        let query = [
            ("select", "*".to_string()),
            ("id", eq(session.user_id())),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<Profile> = self.select(session, "profiles", &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_profile(&self, session: &Session, username: &str) -> Result<Profile, ApiError> {
        let row = ProfileUpsert {
            id: session.user_id(),
            username,
        };
        self.insert(session, "profiles", &row, UPSERT_ROWS, &[("on_conflict", "id".to_string())])
            .await
    }
}
