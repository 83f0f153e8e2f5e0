use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::services::ServiceError;

/// Minimum zxcvbn score a new password must reach.
pub const MIN_PASSWORD_SCORE: u8 = 3;

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for password hash
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash a password using Argon2id with a random salt.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Verify a password against a PHC hash string.
pub fn verify_password(
    password: &Password,
    password_hash: &PasswordHashString,
) -> Result<(), anyhow::Error> {
    let parsed_hash = PasswordHash::new(password_hash.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed_hash)
        .map_err(|_| anyhow::anyhow!("Password verification failed"))
}

/// Keyed fingerprint used to detect password reuse by equality.
pub fn password_fingerprint(
    secret: &SecretString,
    password: &Password,
) -> Result<String, anyhow::Error> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid fingerprint key: {}", e))?;
    mac.update(password.as_str().as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Rejects passwords scoring below [`MIN_PASSWORD_SCORE`]. `user_inputs`
/// such as the email and names count against the score.
pub fn check_password_strength(
    password: &Password,
    user_inputs: &[&str],
) -> Result<(), ServiceError> {
    let entropy = zxcvbn::zxcvbn(password.as_str(), user_inputs)
        .map_err(|_| ServiceError::WeakPassword("Password must not be empty".to_string()))?;

    if entropy.score() < MIN_PASSWORD_SCORE {
        return Err(ServiceError::WeakPassword(
            "Please use a longer password that is harder to guess".to_string(),
        ));
    }
    Ok(())
}
