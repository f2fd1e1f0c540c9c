//! Identifier and timestamp generation.

use chrono::{DateTime, Utc};
use rand::Rng;

const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const RANDOM_ID_LEN: usize = 9;

pub const BOOKING_PREFIX: &str = "QHP-";
pub const REVIEW_PREFIX: &str = "REV-";
pub const TRANSACTION_PREFIX: &str = "TXN-";
pub const USER_PREFIX: &str = "user_";

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// `prefix` followed by nine random uppercase base-36 characters.
pub fn random_id(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..RANDOM_ID_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{prefix}{suffix}")
}

/// A [`random_id`] that `taken` does not report as in use.
pub fn unique_random_id(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    loop {
        let candidate = random_id(prefix);
        if !taken(&candidate) {
            return candidate;
        }
    }
}

/// `user_<epoch millis>`, bumped forward one millisecond at a time until
/// `taken` accepts it.
pub fn user_id(at: DateTime<Utc>, taken: impl Fn(&str) -> bool) -> String {
    let mut stamp = at.timestamp_millis();
    loop {
        let candidate = format!("{USER_PREFIX}{stamp}");
        if !taken(&candidate) {
            return candidate;
        }
        stamp += 1;
    }
}
