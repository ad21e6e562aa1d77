//! Authentication middleware for Axum

use std::net::SocketAddr;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::account::Account;
use crate::auth::users;
use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated account, injected into request extensions
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Account);

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(String::from)
}

/// Best-effort client address for rate limiting and login history
///
/// Proxy headers win over the socket peer, which behind a load balancer is
/// the balancer itself. X-Forwarded-For may carry a chain; the first hop is
/// the client.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(xff) = headers.get("X-Forwarded-For").and_then(|h| h.to_str().ok()) {
        if let Some(first) = xff.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("X-Real-IP").and_then(|h| h.to_str().ok()) {
        return real_ip.to_string();
    }
    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

/// Middleware that requires a valid access token
///
/// Validates the bearer JWT, re-loads the account it names, and makes it
/// available to handlers as a [`CurrentUser`] extension. The account load
/// means a token for a deleted account stops working immediately even
/// though tokens themselves are stateless.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let Some(token) = extract_bearer_token(request.headers()) else {
        tracing::warn!(path = %path, "request without bearer token");
        return ApiError::MissingAuth.into_response();
    };

    let claims = match state.jwt_manager.validate_token(&token) {
        Ok(claims) => claims,
        Err(_) => {
            tracing::warn!(path = %path, "bearer token failed validation");
            return ApiError::InvalidAccessToken.into_response();
        }
    };

    let account = match users::find_by_id(&state.pool, claims.sub).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            tracing::warn!(path = %path, account_id = %claims.sub, "token names an unknown account");
            return ApiError::InvalidAccessToken.into_response();
        }
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(CurrentUser(account));
    next.run(request).await
}
