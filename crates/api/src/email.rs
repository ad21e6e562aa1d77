//! Outbound mail for verification and reset links
//!
//! Delivery is fire and forget: sends run on a detached task and failures
//! are logged and swallowed, because by the time mail goes out the account
//! state is already committed and the user can always request a resend.
//! Without a configured relay the message is logged instead, which keeps
//! local development working.

use serde_json::json;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Clone)]
pub struct EmailService {
    http_client: reqwest::Client,
    api_key: Option<String>,
    from_address: String,
    frontend_url: String,
}

impl EmailService {
    /// Build from RESEND_API_KEY / EMAIL_FROM environment variables
    pub fn from_env(http_client: reqwest::Client, frontend_url: String) -> Self {
        let api_key = std::env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty());
        let from_address = std::env::var("EMAIL_FROM")
            .unwrap_or_else(|_| "Markpad <noreply@markpad.app>".to_string());

        Self {
            http_client,
            api_key,
            from_address,
            frontend_url,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn send_verification_email(&self, to: &str, token: &str) {
        let link = self.verification_link(token);
        self.dispatch(
            to,
            "Verify your Markpad email address",
            format!("Welcome to Markpad! Confirm your email address by opening:\n\n{link}\n"),
        );
    }

    pub fn send_password_reset_email(&self, to: &str, token: &str) {
        let link = self.reset_link(token);
        self.dispatch(
            to,
            "Reset your Markpad password",
            format!(
                "A password reset was requested for this address. The link below is valid for one hour:\n\n{link}\n\nIf you did not request this, you can ignore this message.\n"
            ),
        );
    }

    fn verification_link(&self, token: &str) -> String {
        format!("{}/verify-email?token={}", self.frontend_url, token)
    }

    fn reset_link(&self, token: &str) -> String {
        format!("{}/reset-password?token={}", self.frontend_url, token)
    }

    fn dispatch(&self, to: &str, subject: &str, body: String) {
        let Some(api_key) = self.api_key.clone() else {
            tracing::info!(
                to = %to,
                subject = %subject,
                body = %body,
                "mail relay not configured, logging message instead"
            );
            return;
        };

        let client = self.http_client.clone();
        let from = self.from_address.clone();
        let to = to.to_string();
        let subject = subject.to_string();

        tokio::spawn(async move {
            let payload = json!({
                "from": from,
                "to": [to],
                "subject": subject,
                "text": body,
            });

            match client
                .post(RESEND_ENDPOINT)
                .bearer_auth(&api_key)
                .json(&payload)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(to = %to, subject = %subject, "mail accepted by relay");
                }
                Ok(response) => {
                    tracing::warn!(
                        to = %to,
                        status = %response.status(),
                        "mail relay rejected message"
                    );
                }
                Err(e) => {
                    tracing::warn!(to = %to, error = %e, "mail delivery failed");
                }
            }
        });
    }
}
