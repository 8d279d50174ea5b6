//! Password hashing and verification (argon2id).

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::error::CoreError;

/// Hashes a plaintext password with argon2id and a fresh random salt.
///
/// # Errors
///
/// Returns [`CoreError::Internal`] if hashing fails.
pub fn hash_password(plain: &str) -> Result<String, CoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::Internal(format!("password hashing failed: {e}")))
}

/// Verifies a plaintext password against a stored argon2id hash.
///
/// # Errors
///
/// Returns [`CoreError::Internal`] if the stored hash is malformed.
pub fn verify_password(plain: &str, stored_hash: &str) -> Result<bool, CoreError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| CoreError::Internal(format!("stored password hash malformed: {e}")))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let Ok(hash) = hash_password("s3cret-pass") else {
            panic!("hashing failed");
        };
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret-pass", &hash).unwrap_or(false));
        assert!(!verify_password("wrong-pass", &hash).unwrap_or(true));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let Ok(a) = hash_password("same") else {
            panic!("hashing failed");
        };
        let Ok(b) = hash_password("same") else {
            panic!("hashing failed");
        };
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_stored_hash_is_an_error() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }
}
