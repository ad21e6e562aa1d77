//! Auth settings sourced from the `system_settings` table
//!
//! Administrators store a JSON document under the `auth_settings` key. Both
//! readers fall back to defaults when the key or an individual field is
//! absent, so a fresh database behaves sensibly without seeding.

use serde_json::Value;
use sqlx::PgPool;

use crate::auth::password::PasswordPolicy;
use crate::error::ApiResult;

const AUTH_SETTINGS_KEY: &str = "auth_settings";

/// Which sign-in modes are currently enabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthMode {
    pub mode: String,
    pub email_enabled: bool,
    pub google_enabled: bool,
}

pub async fn auth_mode(pool: &PgPool) -> ApiResult<AuthMode> {
    let value = fetch_auth_settings(pool).await?;
    Ok(auth_mode_from_value(value.as_ref()))
}

pub async fn password_policy(pool: &PgPool) -> ApiResult<PasswordPolicy> {
    let value = fetch_auth_settings(pool).await?;
    Ok(policy_from_value(value.as_ref()))
}

async fn fetch_auth_settings(pool: &PgPool) -> ApiResult<Option<Value>> {
    let value: Option<Value> =
        sqlx::query_scalar("SELECT value FROM system_settings WHERE key = $1")
            .bind(AUTH_SETTINGS_KEY)
            .fetch_optional(pool)
            .await?;
    Ok(value)
}

fn auth_mode_from_value(value: Option<&Value>) -> AuthMode {
    let mode = value
        .and_then(|v| v.get("mode"))
        .and_then(Value::as_str)
        .unwrap_or("email")
        .to_string();

    AuthMode {
        email_enabled: mode == "email" || mode == "both",
        google_enabled: mode == "google" || mode == "both",
        mode,
    }
}

fn policy_from_value(value: Option<&Value>) -> PasswordPolicy {
    let defaults = PasswordPolicy::default();
    let Some(value) = value else {
        return defaults;
    };

    let usize_field = |key: &str, fallback: usize| {
        value
            .get(key)
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(fallback)
    };
    let bool_field = |key: &str, fallback: bool| {
        value.get(key).and_then(Value::as_bool).unwrap_or(fallback)
    };

    PasswordPolicy {
        min_length: usize_field("password_min_length", defaults.min_length),
        require_uppercase: bool_field("password_require_uppercase", defaults.require_uppercase),
        require_lowercase: bool_field("password_require_lowercase", defaults.require_lowercase),
        require_digit: bool_field("password_require_number", defaults.require_digit),
        require_special: bool_field("password_require_special", defaults.require_special),
    }
}
