//! Short numeric reset codes for the mobile password reset flow.
//!
//! The code is derived from the email, the issue timestamp and the server
//! secret, so nothing is stored between issue and check. The caller echoes
//! the timestamp back together with the code.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sha1::{Digest, Sha1};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;

use super::clock::Clock;

/// Wire format of the issue timestamp, always UTC.
pub const RESET_CODE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const CODE_MODULUS: u64 = 100_000_000;
const CODE_DIGITS: usize = 4;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResetCodeError {
    #[error("reset code does not match")]
    Mismatch,

    #[error("reset code expired")]
    Expired,

    #[error("reset code date is in the future")]
    FutureDate,

    #[error("reset code date is not a valid timestamp")]
    InvalidDate,
}

/// A freshly issued code and the timestamp it was derived from.
#[derive(Debug, Clone)]
pub struct IssuedResetCode {
    pub code: String,
    pub date: String,
}

#[derive(Clone)]
pub struct ResetCodeGenerator {
    secret: SecretString,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResetCodeGenerator {
    pub fn new(secret: SecretString, ttl_seconds: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret,
            ttl: Duration::seconds(ttl_seconds),
            clock,
        }
    }

    pub fn issue(&self, email: &str) -> IssuedResetCode {
        let date = self.clock.now().format(RESET_CODE_DATE_FORMAT).to_string();
        IssuedResetCode {
            code: self.code_for(email, &date),
            date,
        }
    }

    /// First four decimal digits of `sha1(email + date + secret) mod 10^8`.
    pub fn code_for(&self, email: &str, date: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(email.as_bytes());
        hasher.update(date.as_bytes());
        hasher.update(self.secret.expose_secret().as_bytes());
        let digest = hasher.finalize();

        // Big-endian digest reduced modulo 10^8 one byte at a time.
        let value = digest
            .iter()
            .fold(0u64, |acc, b| (acc * 256 + u64::from(*b)) % CODE_MODULUS);

        value.to_string().chars().take(CODE_DIGITS).collect()
    }

    pub fn check(&self, email: &str, date: &str, candidate: &str) -> Result<(), ResetCodeError> {
        let expected = self.code_for(email, date);
        if !bool::from(expected.as_bytes().ct_eq(candidate.trim().as_bytes())) {
            return Err(ResetCodeError::Mismatch);
        }

        let issued = parse_date(date)?;
        let now = self.clock.now();
        if issued > now {
            return Err(ResetCodeError::FutureDate);
        }
        if now - issued >= self.ttl {
            return Err(ResetCodeError::Expired);
        }
        Ok(())
    }
}

fn parse_date(date: &str) -> Result<DateTime<Utc>, ResetCodeError> {
    NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S"))
        .map(|naive| naive.and_utc())
        .map_err(|_| ResetCodeError::InvalidDate)
}
