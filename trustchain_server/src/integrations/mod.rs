//! Collaborators the engine calls out to: the mobile money gateway and the SMS provider.
//!
//! Neither provider's HTTP API is spoken yet. Both implementations accept every well-formed request, hand back a
//! provider-style reference and log what would have been sent.
pub mod mpesa;
pub mod sms;
