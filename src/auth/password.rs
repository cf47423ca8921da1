//! Password hashing with Argon2id.
//!
//! The work factor is fixed: 19 MiB of memory, 2 iterations, 1 lane (the
//! OWASP baseline for Argon2id). Hashes are PHC strings, so the salt and
//! parameters travel with the hash.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use lazy_static::lazy_static;

pub const MEMORY_COST_KIB: u32 = 19_456;
pub const TIME_COST: u32 = 2;
pub const PARALLELISM: u32 = 1;

lazy_static! {
    /// Hash verified against when the username does not exist, so that both
    /// failure paths cost one Argon2 verification.
    static ref DUMMY_HASH: String =
        hash_password("medportal-timing-equalizer").unwrap_or_default();
}

fn hasher() -> Result<Argon2<'static>, argon2::password_hash::Error> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password using Argon2id with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash. Malformed hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    match hasher() {
        Ok(argon2) => argon2.verify_password(password.as_bytes(), &parsed_hash).is_ok(),
        Err(_) => false,
    }
}

/// Burn one verification's worth of time for an unknown user
pub fn verify_dummy(password: &str) {
    let _ = verify_password(password, &DUMMY_HASH);
}
