//! Argon2 password hashing

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::backend::StorageError;

/// Hash a password into a PHC string
pub fn hash_password(password: &str) -> Result<String, StorageError> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|e| StorageError::Internal(format!("salt generation failed: {e}")))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StorageError::Internal(format!("password hashing failed: {e}")))
}

/// Check a password against a stored PHC string
pub fn verify_password(password: &str, phc: &str) -> Result<bool, StorageError> {
    let parsed = PasswordHash::new(phc)
        .map_err(|e| StorageError::Internal(format!("corrupt password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
