use chrono::{DateTime, Utc};
use rand::{distributions::Uniform, Rng};

use crate::db_types::TrackingId;

pub const OTP_LENGTH: usize = 4;

// No 0/O or 1/I, so that codes read back over the phone are unambiguous.
const TRACKING_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
const POLICY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn random_chars<R: Rng>(rng: &mut R, alphabet: &[u8], len: usize) -> String {
    let dist = Uniform::new(0, alphabet.len());
    (0..len).map(|_| alphabet[rng.sample(dist)] as char).collect()
}

/// Generates a tracking id of the form `TC-YYYYMMDD-XXXXXX`. Uniqueness is enforced by the database; callers retry on
/// collision.
pub fn new_tracking_id(now: DateTime<Utc>) -> TrackingId {
    let mut rng = rand::thread_rng();
    let suffix = random_chars(&mut rng, TRACKING_ALPHABET, 6);
    TrackingId(format!("TC-{}-{suffix}", now.format("%Y%m%d")))
}

/// A zero-padded four digit delivery code, e.g. `0427`.
pub fn new_delivery_otp() -> String {
    let code: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("{code:0width$}", width = OTP_LENGTH)
}

/// Policy numbers look like `POL1718112345123AB3XZ`: the creation time in milliseconds and five random characters.
pub fn new_policy_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    format!("POL{}{}", now.timestamp_millis(), random_chars(&mut rng, POLICY_ALPHABET, 5))
}
