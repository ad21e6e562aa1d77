//! Application state

use std::time::Duration;

use reqwest::Client;
use sqlx::PgPool;

use markpad_shared::{RateLimitConfig, RateLimiter};

use crate::auth::google::GoogleVerifier;
use crate::auth::jwt::JwtManager;
use crate::auth::password;
use crate::auth::tokens::TokenManager;
use crate::config::Config;
use crate::email::EmailService;

/// Timeout for calls to the token verifier and the mail relay
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub jwt_manager: JwtManager,
    pub token_manager: TokenManager,
    pub google_verifier: GoogleVerifier,
    pub email: EmailService,
    /// Login attempts per client address: 5 per 15 minutes
    pub login_limiter: RateLimiter,
    /// Registration attempts per client address: 3 per hour
    pub registration_limiter: RateLimiter,
    /// Valid-format hash of an unknowable secret; login verifies against it
    /// when the email has no password-capable account, so both outcomes cost
    /// one argon2 verification.
    pub fallback_password_hash: String,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> anyhow::Result<Self> {
        let jwt_manager = JwtManager::new(&config.jwt_secret, config.jwt_expiry_minutes);
        let token_manager = TokenManager::new();

        // One client for all outbound calls; a stalled upstream fails the
        // request instead of hanging it.
        let http_client = Client::builder().timeout(UPSTREAM_TIMEOUT).build()?;

        let google_verifier =
            GoogleVerifier::new(http_client.clone(), config.google_client_id.clone());
        if google_verifier.is_configured() {
            tracing::info!("Google sign-in enabled");
        } else {
            tracing::warn!("Google sign-in not configured (missing GOOGLE_CLIENT_ID)");
        }

        let email = EmailService::from_env(http_client, config.frontend_url.clone());
        if email.is_enabled() {
            tracing::info!("Mail delivery enabled");
        } else {
            tracing::warn!(
                "Mail delivery not configured (missing RESEND_API_KEY), links will be logged"
            );
        }

        let login_limiter = RateLimiter::new_in_memory(RateLimitConfig::LOGIN);
        let registration_limiter = RateLimiter::new_in_memory(RateLimitConfig::REGISTRATION);
        tracing::info!("Rate limiters initialized");

        let fallback_password_hash = password::generate_impossible_hash()?;

        Ok(Self {
            pool,
            config,
            jwt_manager,
            token_manager,
            google_verifier,
            email,
            login_limiter,
            registration_limiter,
            fallback_password_hash,
        })
    }
}
