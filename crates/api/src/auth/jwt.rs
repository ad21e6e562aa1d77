//! Signed access tokens
//!
//! Logins are asserted with stateless HS256 tokens; nothing is stored server
//! side. `sub` carries the account id — emails are not unique across the
//! password and Google paths, so they cannot identify an account. `jti` is a
//! random id so individual tokens are distinguishable in logs.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: Uuid,
    /// Account email at issuance, for log context
    pub email: String,
    /// Expiry, unix seconds
    pub exp: i64,
    /// Issued at, unix seconds
    pub iat: i64,
    /// Token id
    pub jti: String,
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("token encoding failed: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
    #[error("invalid or expired token")]
    Invalid,
}

/// Issues and validates access tokens with a shared HMAC secret
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_minutes: i64,
}

impl JwtManager {
    pub fn new(secret: &str, expiry_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_minutes,
        }
    }

    /// Sign an access token for an account
    pub fn create_access_token(&self, account_id: Uuid, email: &str) -> Result<String, JwtError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: account_id,
            email: email.to_string(),
            exp: now + self.expiry_minutes * 60,
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Decode and validate a token, enforcing HS256 explicitly
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 60;
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| JwtError::Invalid)
    }

    pub fn expiry_seconds(&self) -> i64 {
        self.expiry_minutes * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-at-least-32-chars!";

    #[test]
    fn round_trip_preserves_subject() {
        let jwt = JwtManager::new(TEST_SECRET, 1440);
        let account_id = Uuid::new_v4();
        let token = jwt
            .create_access_token(account_id, "alice@example.com")
            .expect("should sign");

        let claims = jwt.validate_token(&token).expect("should validate");
        assert_eq!(claims.sub, account_id);
        assert_eq!(claims.email, "alice@example.com");
    }

    #[test]
    fn expiry_tracks_configured_minutes() {
        let jwt = JwtManager::new(TEST_SECRET, 1440);
        let token = jwt
            .create_access_token(Uuid::new_v4(), "alice@example.com")
            .expect("should sign");
        let claims = jwt.validate_token(&token).expect("should validate");

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let expected_exp = now + 1440 * 60;
        assert!(
            (claims.exp - expected_exp).abs() < 5,
            "exp should be ~24h out"
        );
        assert_eq!(jwt.expiry_seconds(), 1440 * 60);
    }

    #[test]
    fn tokens_from_a_different_secret_are_rejected() {
        let jwt = JwtManager::new(TEST_SECRET, 1440);
        let other = JwtManager::new("another-secret-also-32-chars-long!!", 1440);

        let token = other
            .create_access_token(Uuid::new_v4(), "alice@example.com")
            .expect("should sign");
        assert!(matches!(jwt.validate_token(&token), Err(JwtError::Invalid)));
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let jwt = JwtManager::new(TEST_SECRET, 1440);

        assert!(jwt.validate_token("not.a.valid.token").is_err());
        assert!(jwt.validate_token("completely-invalid").is_err());
        assert!(jwt.validate_token("").is_err());
    }

    #[test]
    fn each_token_gets_a_fresh_jti() {
        let jwt = JwtManager::new(TEST_SECRET, 1440);
        let account_id = Uuid::new_v4();
        let first = jwt
            .create_access_token(account_id, "alice@example.com")
            .expect("should sign");
        let second = jwt
            .create_access_token(account_id, "alice@example.com")
            .expect("should sign");

        let first = jwt.validate_token(&first).expect("valid");
        let second = jwt.validate_token(&second).expect("valid");
        assert_ne!(first.jti, second.jti);
    }
}
