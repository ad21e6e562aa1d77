//! HTTP routes

pub mod auth;

use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::auth::require_auth;
use crate::state::AppState;

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/settings", get(auth::get_auth_settings))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/google/login", post(auth::google_login))
        .route("/verify-email", post(auth::verify_email))
        .route("/resend-verification", post(auth::resend_verification))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password));

    let protected = Router::new()
        .route("/me", get(auth::me))
        .route("/verify", post(auth::verify_token))
        .route("/change-password", post(auth::change_password))
        .route("/accept-terms", post(auth::accept_terms))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/auth", public.merge(protected))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
