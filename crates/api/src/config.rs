//! Environment-backed configuration

use anyhow::Context;

/// Runtime configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// HMAC secret for signing access tokens
    pub jwt_secret: String,
    /// Access token lifetime in minutes
    pub jwt_expiry_minutes: i64,
    /// OAuth client id the Google token verifier checks `aud` against.
    /// Empty means Google sign-in is not configured.
    pub google_client_id: String,
    /// Emails granted the admin flag when their account is created
    pub admin_emails: Vec<String>,
    /// Base URL used to build verification/reset links in outgoing mail
    pub frontend_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters");
        }

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let jwt_expiry_minutes = match std::env::var("JWT_EXPIRY_MINUTES") {
            Ok(raw) => raw
                .parse()
                .context("JWT_EXPIRY_MINUTES must be an integer")?,
            Err(_) => 1440,
        };

        let google_client_id = std::env::var("GOOGLE_CLIENT_ID").unwrap_or_default();

        let admin_emails = std::env::var("ADMIN_EMAILS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(String::from)
            .collect();

        let frontend_url = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        Ok(Self {
            database_url,
            bind_address,
            jwt_secret,
            jwt_expiry_minutes,
            google_client_id,
            admin_emails,
            frontend_url,
        })
    }

    /// Whether a newly created account for `email` receives the admin flag
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|admin| admin == email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn set_required_env() {
        std::env::set_var("DATABASE_URL", "postgresql://localhost/markpad_test");
        std::env::set_var("JWT_SECRET", "test-jwt-secret-key-at-least-32-chars!");
    }

    fn clear_optional_env() {
        for key in [
            "BIND_ADDRESS",
            "JWT_EXPIRY_MINUTES",
            "GOOGLE_CLIENT_ID",
            "ADMIN_EMAILS",
            "FRONTEND_URL",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn defaults_applied_when_optional_vars_absent() {
        set_required_env();
        clear_optional_env();

        let config = Config::from_env().expect("config should load");
        assert_eq!(config.bind_address, "0.0.0.0:8000");
        assert_eq!(config.jwt_expiry_minutes, 1440);
        assert!(config.google_client_id.is_empty());
        assert!(config.admin_emails.is_empty());
        assert_eq!(config.frontend_url, "http://localhost:5173");
    }

    #[test]
    #[serial]
    fn admin_emails_parsed_as_comma_separated_list() {
        set_required_env();
        clear_optional_env();
        std::env::set_var("ADMIN_EMAILS", "root@example.com, ops@example.com ,");

        let config = Config::from_env().expect("config should load");
        assert_eq!(config.admin_emails.len(), 2);
        assert!(config.is_admin_email("root@example.com"));
        assert!(config.is_admin_email("ops@example.com"));
        assert!(!config.is_admin_email("user@example.com"));

        std::env::remove_var("ADMIN_EMAILS");
    }

    #[test]
    #[serial]
    fn short_jwt_secret_is_rejected() {
        set_required_env();
        std::env::set_var("JWT_SECRET", "too-short");

        assert!(Config::from_env().is_err());

        std::env::set_var("JWT_SECRET", "test-jwt-secret-key-at-least-32-chars!");
    }
}
