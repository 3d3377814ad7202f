//! Password hashing with Argon2id. Hashes are PHC strings carrying their
//! own salt and parameters.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::OnceLock;
use timetable_core::TimetableError;

pub fn hash_password(password: &str) -> Result<String, TimetableError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| TimetableError::internal(format!("Failed to hash password: {e}")))
}

/// Returns true if the password matches the stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, TimetableError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| TimetableError::internal(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Burn one verification against a throwaway hash so that an unknown
/// email costs the same as a wrong password.
pub fn verify_against_dummy(password: &str) {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    let dummy = DUMMY.get_or_init(|| hash_password("timetable-dummy-password").ok());
    if let Some(hash) = dummy {
        let _ = verify_password(password, hash);
    }
}
