//! Pure analytics over account snapshots and trade lists.
//!
//! Nothing here touches the backend; every function takes rows and returns
//! plain values. Missing or non-finite inputs are read as 0.

pub mod account;
pub mod calendar;
pub mod gamification;
pub mod outcomes;

pub use account::*;
pub use calendar::*;
pub use gamification::*;
pub use outcomes::*;

pub(crate) fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    value.max(min).min(max)
}

/// `part / whole * 100`, 0 when `whole` is not positive.
pub(crate) fn percent_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        crate::models::finite_or_zero(part / whole * 100.0)
    } else {
        0.0
    }
}
