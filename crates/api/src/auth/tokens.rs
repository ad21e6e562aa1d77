//! Single-use token issuance for email verification and password reset
//!
//! Tokens are 32 bytes from the OS random source, base64url-encoded, so they
//! are safe to embed in links without escaping. Uniqueness is probabilistic;
//! nothing scans for collisions. Verification tokens carry no expiry and die
//! when consumed; reset tokens expire one hour after issuance.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::TryRngCore;
use time::{Duration, OffsetDateTime};

/// Validity window for password reset tokens
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

const TOKEN_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("secure random source unavailable: {0}")]
    Rng(String),
}

/// Issues verification and reset tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenManager;

impl TokenManager {
    pub fn new() -> Self {
        Self
    }

    /// Token for confirming ownership of an email address
    pub fn issue_verification_token(&self) -> Result<String, TokenError> {
        self.random_token()
    }

    /// Token plus expiry for a password reset
    pub fn issue_reset_token(&self) -> Result<(String, OffsetDateTime), TokenError> {
        self.issue_reset_token_at(OffsetDateTime::now_utc())
    }

    /// Reset issuance against an explicit clock, used by tests
    pub fn issue_reset_token_at(
        &self,
        now: OffsetDateTime,
    ) -> Result<(String, OffsetDateTime), TokenError> {
        let token = self.random_token()?;
        Ok((token, now + RESET_TOKEN_TTL))
    }

    fn random_token(&self) -> Result<String, TokenError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| TokenError::Rng(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}
