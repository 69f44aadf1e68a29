//! One function per page operation.
//!
//! Every command runs on behalf of a resolved [`Session`](crate::models::Session)
//! and renders failures to display text at this boundary.

pub mod accounts;
pub mod auth;
pub mod dashboard;
pub mod export;
pub mod profile;
pub mod trades;

pub use accounts::*;
pub use auth::*;
pub use dashboard::*;
pub use export::*;
pub use profile::*;
pub use trades::*;

use crate::api::ApiError;

/// Logs a backend failure and turns it into the message shown to the user.
pub(crate) fn failure(action: &str, err: ApiError) -> String {
    if err.is_auth() {
        log::warn!("{} rejected: {}", action, err);
    } else {
        log::error!("{} failed: {}", action, err);
    }
    err.to_string()
}
