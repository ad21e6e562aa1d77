//! Google ID token verification
//!
//! The token a client hands us is opaque; Google's `tokeninfo` endpoint is
//! the authority on whether it is genuine. We only check that the response
//! names us as the audience and a Google issuer signed it. The shared HTTP
//! client carries a request timeout, so a stalled upstream fails the one
//! request instead of hanging it.

use serde::Deserialize;

use crate::error::ApiError;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const VALID_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// An externally verified claim of identity: subject, email, display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub google_id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct TokenInfoResponse {
    sub: String,
    aud: String,
    iss: String,
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Validates Google ID tokens against the tokeninfo endpoint
#[derive(Clone)]
pub struct GoogleVerifier {
    http_client: reqwest::Client,
    client_id: String,
    endpoint: String,
}

impl GoogleVerifier {
    pub fn new(http_client: reqwest::Client, client_id: String) -> Self {
        Self {
            http_client,
            client_id,
            endpoint: TOKENINFO_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_endpoint(http_client: reqwest::Client, client_id: String, endpoint: String) -> Self {
        Self {
            http_client,
            client_id,
            endpoint,
        }
    }

    /// Whether a Google client id is configured at all
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty()
    }

    /// Verify an ID token and extract the identity it asserts
    pub async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, ApiError> {
        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "tokeninfo request failed");
                ApiError::UpstreamIdentityInvalid
            })?;

        if !response.status().is_success() {
            tracing::warn!(
                status = %response.status(),
                "Google rejected the ID token"
            );
            return Err(ApiError::UpstreamIdentityInvalid);
        }

        let info = response.json::<TokenInfoResponse>().await.map_err(|e| {
            tracing::warn!(error = %e, "tokeninfo response was not parseable");
            ApiError::UpstreamIdentityInvalid
        })?;

        if info.aud != self.client_id {
            tracing::warn!(aud = %info.aud, "ID token issued for a different client");
            return Err(ApiError::UpstreamIdentityInvalid);
        }
        if !VALID_ISSUERS.contains(&info.iss.as_str()) {
            tracing::warn!(iss = %info.iss, "ID token from an unexpected issuer");
            return Err(ApiError::UpstreamIdentityInvalid);
        }
        let email = info.email.ok_or_else(|| {
            tracing::warn!("ID token carried no email claim");
            ApiError::UpstreamIdentityInvalid
        })?;

        Ok(GoogleIdentity {
            google_id: info.sub,
            email,
            name: info.name.unwrap_or_default(),
        })
    }
}
