//! HS256 token issuance and verification.

use chrono::Duration;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use thiserror::Error;
use uuid::Uuid;

use super::clock::Clock;
use crate::models::UserId;

/// Purpose a token was minted for. A token is only accepted for its own kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    Register,
    ResetPassword,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::Register => "register",
            TokenKind::ResetPassword => "reset_password",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: i64,
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Random token id, keeps same-second tokens distinct
    pub jti: String,
}

impl Claims {
    pub fn subject(&self) -> UserId {
        UserId(self.sub)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("wrong token kind: expected {expected}, got {actual}")]
    WrongKind {
        expected: TokenKind,
        actual: TokenKind,
    },

    #[error("malformed token")]
    Malformed,

    #[error("failed to encode token: {0}")]
    Encoding(String),
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(secret: &SecretString, clock: Arc<dyn Clock>) -> Self {
        let key = secret.expose_secret().as_bytes();

        // Expiry is checked against the injected clock, not the system time.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            validation,
            clock,
        }
    }

    pub fn issue(
        &self,
        subject: UserId,
        kind: TokenKind,
        ttl_seconds: i64,
    ) -> Result<String, TokenError> {
        let now = self.clock.now();
        let exp = now + Duration::seconds(ttl_seconds);

        let claims = Claims {
            sub: subject.0,
            kind,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Checks signature, then expiry, then kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })?
            .claims;

        if self.clock.now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        if claims.kind != expected {
            return Err(TokenError::WrongKind {
                expected,
                actual: claims.kind,
            });
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::{ManualClock, SystemClock};

    fn secret() -> SecretString {
        SecretString::new("test-secret-that-is-long-enough-0123456789".to_string())
    }

    fn manual() -> (Arc<ManualClock>, TokenCodec) {
        let clock = Arc::new(ManualClock::default());
        let codec = TokenCodec::new(&secret(), clock.clone());
        (clock, codec)
    }

    #[test]
    fn issue_then_verify_returns_subject() {
        let (_, codec) = manual();
        let token = codec.issue(UserId(42), TokenKind::Access, 3600).unwrap();
        let claims = codec.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.subject(), UserId(42));
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn same_second_tokens_differ() {
        let (_, codec) = manual();
        let a = codec.issue(UserId(1), TokenKind::Access, 60).unwrap();
        let b = codec.issue(UserId(1), TokenKind::Access, 60).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn expiry_is_a_hard_deadline() {
        let (clock, codec) = manual();
        let token = codec.issue(UserId(42), TokenKind::Access, 10).unwrap();

        clock.advance(Duration::seconds(9));
        assert!(codec.verify(&token, TokenKind::Access).is_ok());

        clock.advance(Duration::seconds(1));
        assert_eq!(
            codec.verify(&token, TokenKind::Access).unwrap_err(),
            TokenError::Expired
        );
    }

    #[tokio::test]
    async fn one_second_token_fails_after_two_seconds() {
        let codec = TokenCodec::new(&secret(), Arc::new(SystemClock));
        let token = codec.issue(UserId(42), TokenKind::Access, 1).unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;

        assert_eq!(
            codec.verify(&token, TokenKind::Access).unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let (_, codec) = manual();
        let token = codec.issue(UserId(42), TokenKind::Refresh, 60).unwrap();
        assert_eq!(
            codec.verify(&token, TokenKind::Access).unwrap_err(),
            TokenError::WrongKind {
                expected: TokenKind::Access,
                actual: TokenKind::Refresh
            }
        );
    }

    #[test]
    fn foreign_secret_is_invalid_signature() {
        let (_, codec) = manual();
        let other = TokenCodec::new(
            &SecretString::new("another-secret-another-secret-000000".to_string()),
            Arc::new(ManualClock::default()),
        );
        let token = other.issue(UserId(42), TokenKind::Access, 60).unwrap();
        assert_eq!(
            codec.verify(&token, TokenKind::Access).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let (_, codec) = manual();
        assert_eq!(
            codec.verify("not-a-token", TokenKind::Access).unwrap_err(),
            TokenError::Malformed
        );
    }
}
