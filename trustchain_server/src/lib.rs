//! # TrustChain server
//! This crate hosts the HTTP surface of the TrustChain delivery escrow marketplace. It is responsible for:
//! * Identifying the caller from the headers set by the upstream identity provider.
//! * Checking the caller's role against each route's access list.
//! * Handing the request to the matching engine API and mapping engine errors to HTTP status codes.
//! * Wiring the engine's event bus to the SMS transport and the fraud check worker, and running the insurance expiry
//!   worker.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! `/health` is public. Everything else lives under `/api` and requires the `tc-user-id` and `tc-user-role` headers.
//! See [routes](routes/index.html) for the full list.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod fraud_check_worker;
pub mod helpers;
pub mod identity;
pub mod insurance_expiry_worker;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
