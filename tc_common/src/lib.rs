//! Types and helpers shared by the TrustChain engine and server crates.
mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use helpers::parse_boolean_flag;
pub use money::{Money, MoneyConversionError, CURRENCY_CODE, CURRENCY_CODE_LOWER};
pub use secret::Secret;
