//! # TrustChain engine public API
//!
//! The `tce_api` module exposes the programmatic API for the TrustChain engine. Each API covers one concern, so clients
//! can pick the parts they need.
//!
//! * [`order_lifecycle_api`] creates orders and drives them through assignment, pickup and cancellation.
//! * [`delivery_api`] ingests driver positions and gates the hand-over on the customer's delivery code.
//! * [`escrow_api`] captures payments, holds them in escrow and releases them to the driver.
//! * [`fraud_api`] scores users and orders against the fraud rules and manages the resulting alerts.
//! * [`notification_api`] stores in-app notifications and queues text messages.
//! * [`profile_api`] and [`insurance_api`] cover user profiles, ratings and optional transit insurance.
//!
//! # API usage
//!
//! Every API is created by supplying a database backend that implements the traits it needs, and the
//! [`crate::events::EventProducers`] that its change events should be published to.
//!
//! ```rust,ignore
//! use trustchain_engine::{events::EventProducers, OrderLifecycleApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/trustchain.db", 5).await?;
//! let api = OrderLifecycleApi::new(db, EventProducers::default());
//! let pending = api.available_orders(Some(20)).await?;
//! ```

pub mod delivery_api;
pub mod escrow_api;
pub mod fraud_api;
pub mod fraud_objects;
pub mod insurance_api;
pub mod insurance_objects;
pub mod notification_api;
pub mod notification_objects;
pub mod order_lifecycle_api;
pub mod order_objects;
pub mod profile_api;
