use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Not a valid Kenyan mobile number: {0}")]
pub struct InvalidPhoneNumber(pub String);

fn msisdn_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^254[17]\d{8}$").expect("MSISDN pattern is valid"))
}

/// Converts a local or international Kenyan mobile number to the `2547XXXXXXXX` form the payment and SMS gateways
/// expect. Spaces, dashes and a leading `+` are ignored.
pub fn normalize_msisdn(phone: &str) -> Result<String, InvalidPhoneNumber> {
    let digits: String = phone.chars().filter(|c| !matches!(c, ' ' | '-' | '+' | '(' | ')')).collect();
    let normalized = match digits.strip_prefix('0') {
        Some(rest) => format!("254{rest}"),
        None => digits,
    };
    if msisdn_pattern().is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(InvalidPhoneNumber(phone.to_string()))
    }
}
