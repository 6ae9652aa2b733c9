//! Identifier and code generators, and input normalisation helpers.
mod codes;
mod msisdn;

pub use codes::{new_delivery_otp, new_policy_number, new_tracking_id, OTP_LENGTH};
pub use msisdn::{normalize_msisdn, InvalidPhoneNumber};
