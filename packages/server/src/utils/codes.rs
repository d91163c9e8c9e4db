use rand::{Rng, distr::Alphanumeric};

/// Length of team share codes and contest room codes.
pub const CODE_LEN: usize = 6;

/// Generate a random alphanumeric code, used for team share codes and
/// contest room codes. Uniqueness is enforced by the caller against the
/// store, not here.
pub fn short_code() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(CODE_LEN)
        .map(char::from)
        .collect()
}

/// Generate a 6-digit numeric one-time password for the reset flow.
pub fn otp() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000))
}
