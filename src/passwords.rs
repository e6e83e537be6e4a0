//! Salted, one-way password hashes in PHC string format.
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("failed to hash password: {}", e))
}

/// False for a wrong password and for a stored hash that can't be parsed.
pub fn verify_password(password: &str, hash: &str) -> bool {
    guard!(let Ok(parsed) = PasswordHash::new(hash) else {
        return false
    });
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
