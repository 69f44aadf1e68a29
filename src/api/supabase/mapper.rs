use chrono::Utc;
use reqwest::StatusCode;

use super::types::{ErrorBody, SignUpResponse, TokenResponse};
use crate::api::error::ApiError;
use crate::models::{SignUpOutcome, Session, TradeFilters};

/// Map a non-success response to an [`ApiError`].
pub fn map_error(status: StatusCode, body: &str) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    let message = parsed
        .message
        .or(parsed.msg)
        .or(parsed.error_description)
        .or(parsed.error.clone())
        .map(|m| match parsed.details.as_deref() {
            Some(details) if !details.is_empty() => format!("{} ({})", m, details),
            _ => m,
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.trim().to_string()
            }
        });

    let code = parsed
        .error_code
        .or_else(|| {
            parsed.code.map(|c| match c {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
        })
        .or(parsed.error)
        .unwrap_or_else(|| status.as_u16().to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::AuthenticationError(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        _ => ApiError::BackendError { code, message },
    }
}

pub fn token_to_session(token: TokenResponse) -> Session {
    let expires_at = token
        .expires_at
        .or_else(|| token.expires_in.map(|secs| Utc::now().timestamp() + secs));

    Session {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at,
        user: token.user,
    }
}

pub fn sign_up_outcome(response: SignUpResponse) -> SignUpOutcome {
    match response {
        SignUpResponse::Session(token) => {
            let session = token_to_session(token);
            SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            }
        }
        SignUpResponse::User(user) => SignUpOutcome { user, session: None },
    }
}

pub fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// Query parameters for a trade listing: owner scope, filters and ordering.
pub fn trade_query(user_id: &str, filters: &TradeFilters) -> Vec<(&'static str, String)> {
    let mut query = vec![("select", "*".to_string()), ("user_id", eq(user_id))];

    if let Some(start) = filters.start_date {
        query.push(("trade_date", format!("gte.{}", start.format("%Y-%m-%d"))));
    }
    if let Some(end) = filters.end_date {
        query.push(("trade_date", format!("lte.{}", end.format("%Y-%m-%d"))));
    }
    if let Some(account_id) = &filters.account_id {
        query.push(("account_id", eq(account_id)));
    }
    if let Some(outcome) = filters.outcome {
        query.push(("outcome", eq(outcome.as_str())));
    }

    query.push(("order", "trade_date.desc,created_at.desc".to_string()));

    if let Some(limit) = filters.limit {
        query.push(("limit", limit.to_string()));
    }

    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Outcome;
    use chrono::NaiveDate;

    #[test]
    fn test_map_rest_error() {
        let body = r#"{"code":"23502","details":"Failing row","hint":null,"message":"null value in column"}"#;
        match map_error(StatusCode::BAD_REQUEST, body) {
            ApiError::BackendError { code, message } => {
                assert_eq!(code, "23502");
                assert_eq!(message, "null value in column (Failing row)");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_map_auth_error() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        match map_error(StatusCode::BAD_REQUEST, body) {
            ApiError::BackendError { code, message } => {
                assert_eq!(code, "invalid_grant");
                assert_eq!(message, "Invalid login credentials");
            }
            other => panic!("unexpected {:?}", other),
        }

        let body = r#"{"code":401,"error_code":"bad_jwt","msg":"invalid JWT"}"#;
        assert!(map_error(StatusCode::UNAUTHORIZED, body).is_auth());
    }

    #[test]
    fn test_map_error_plain_body() {
        match map_error(StatusCode::BAD_GATEWAY, "") {
            ApiError::BackendError { code, message } => {
                assert_eq!(code, "502");
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sign_up_without_session() {
        let json = r#"{"id":"u-1","email":"me@mail.com","confirmation_sent_at":"2026-10-18T10:00:00Z"}"#;
        let response: SignUpResponse = serde_json::from_str(json).unwrap();
        let outcome = sign_up_outcome(response);
        assert_eq!(outcome.user.id, "u-1");
        assert!(outcome.session.is_none());
    }

    #[test]
    fn test_token_to_session() {
        let json = r#"{
            "access_token":"jwt","token_type":"bearer","expires_in":3600,"expires_at":1800000000,
            "refresh_token":"r1","user":{"id":"u-1","email":"me@mail.com","role":"authenticated"}
        }"#;
        let response: SignUpResponse = serde_json::from_str(json).unwrap();
        let outcome = sign_up_outcome(response);
        let session = outcome.session.unwrap();
        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.expires_at, Some(1800000000));
        assert_eq!(session.user_id(), "u-1");
    }

    #[test]
    fn test_trade_query() {
        let filters = TradeFilters {
            start_date: NaiveDate::from_ymd_opt(2026, 10, 1),
            end_date: NaiveDate::from_ymd_opt(2026, 10, 31),
            account_id: Some("acc-1".to_string()),
            outcome: Some(Outcome::BreakEvenPlus),
            limit: Some(5),
        };
        let query = trade_query("u-1", &filters);
        assert_eq!(
            query,
            vec![
                ("select", "*".to_string()),
                ("user_id", "eq.u-1".to_string()),
                ("trade_date", "gte.2026-10-01".to_string()),
                ("trade_date", "lte.2026-10-31".to_string()),
                ("account_id", "eq.acc-1".to_string()),
                ("outcome", "eq.be_plus".to_string()),
                ("order", "trade_date.desc,created_at.desc".to_string()),
                ("limit", "5".to_string()),
            ]
        );
    }
}
