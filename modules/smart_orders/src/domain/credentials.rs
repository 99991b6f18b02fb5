//! Password hashing, session tokens and the callback shared secret

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use sha2::{Digest, Sha256};

/// Hash a password into an Argon2id PHC string
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. A malformed hash never matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

/// Fresh opaque session token
pub fn new_session_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Compare a presented callback token with the configured secret.
///
/// Both sides are hashed first so the comparison does not depend on where
/// the strings diverge. An empty secret matches nothing.
pub fn callback_token_matches(presented: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        assert!(!verify_password("anything", "plaintext"));
    }

    #[test]
    fn test_session_tokens_are_unique() {
        assert_ne!(new_session_token(), new_session_token());
    }

    #[test]
    fn test_callback_token() {
        assert!(callback_token_matches("s3cret", "s3cret"));
        assert!(!callback_token_matches("s3cre", "s3cret"));
        assert!(!callback_token_matches("", ""));
    }
}
