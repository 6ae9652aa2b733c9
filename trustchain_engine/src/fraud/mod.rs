//! Fraud heuristics.
//!
//! The rules themselves are pure functions over a snapshot of history (see [`rules`]). Fetching that snapshot,
//! recording the alerts and notifying administrators is the job of [`crate::FraudDetectionApi`].
mod rules;

pub use rules::{order_alerts, user_alerts, FraudThresholds, UserActivity};
