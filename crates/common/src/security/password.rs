//! Argon2 password hashing
//!
//! Hashes are stored in PHC string format (`$argon2id$v=19$...`) so the
//! parameters travel with the hash.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::{CommonError, CommonResult};

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str) -> CommonResult<String> {
    if password.is_empty() {
        return Err(CommonError::validation("password", "must not be empty"));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CommonError::internal(format!("password hashing failed: {e}")))
}

/// Check `password` against a stored PHC hash.
///
/// A mismatch is `Ok(false)`; a malformed stored hash is an error.
pub fn verify_password(password: &str, stored_hash: &str) -> CommonResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| CommonError::validation("password_hash", e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CommonError::internal(format!("password verification failed: {e}"))),
    }
}
