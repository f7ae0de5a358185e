/// Password hashing and verification
///
/// New hashes are Argon2id (PHC string). Stored bcrypt hashes
/// (`$2a$`, `$2b$`, `$2y$`) still verify. Both comparisons are constant time.
use crate::error::{IdentityError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password using Argon2id with a random 16-byte salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| IdentityError::Internal(format!("Password hashing failed: {}", e)))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against its stored hash, detecting the algorithm
///
/// Returns `Ok(false)` on mismatch; an unrecognized or corrupt hash is an
/// internal error.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    if password_hash.starts_with("$argon2") {
        verify_argon2(password, password_hash)
    } else if password_hash.starts_with("$2") {
        bcrypt::verify(password, password_hash)
            .map_err(|e| IdentityError::Internal(format!("Password verification failed: {}", e)))
    } else {
        Err(IdentityError::Internal(
            "Unknown password hash format".to_string(),
        ))
    }
}

fn verify_argon2(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| IdentityError::Internal(format!("Invalid password hash format: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(IdentityError::Internal(format!(
            "Password verification failed: {}",
            e
        ))),
    }
}
