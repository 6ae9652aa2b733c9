//! SQLite backend for the TrustChain engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
