//! TrustChain Engine
//!
//! The TrustChain engine is the core of an escrow marketplace for last-mile deliveries. A customer's payment is held in
//! escrow while a driver carries the parcel, and is only released once the customer's one-time delivery code has been
//! verified at the door.
//!
//! The library is divided into these main sections:
//! 1. Persistence. The backend traits live in [`mod@traits`]; SQLite is the supported backend. You should never need to
//!    access the database directly. The exception is the data types stored in the database, which are defined in
//!    [`mod@db_types`] and are public.
//! 2. The public API ([`mod@tce_api`]): order lifecycle, delivery confirmation, escrow, fraud detection, notifications,
//!    profiles and insurance.
//! 3. The fraud heuristics themselves ([`mod@fraud`]), which are pure functions over a snapshot of history.
//!
//! The engine also publishes an event whenever an order, payment, delivery, alert or notification changes, once the
//! change has been committed. A simple channel-based framework ([`mod@events`]) lets you hook into these events, e.g.
//! to push them to connected clients, or to send the text messages the engine asks for.
pub mod db_types;
pub mod events;
pub mod fraud;
pub mod helpers;
pub mod tce_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use tce_api::{
    delivery_api::DeliveryApi,
    escrow_api::EscrowApi,
    fraud_api::FraudDetectionApi,
    fraud_objects,
    insurance_api::InsuranceApi,
    insurance_objects,
    notification_api::NotificationDispatcher,
    notification_objects,
    order_lifecycle_api::OrderLifecycleApi,
    order_objects,
    profile_api::ProfileApi,
};
