// Test code patterns:
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Markpad API Library
//!
//! Account authentication and identity lifecycle for the Markpad backend:
//! registration, email verification, password reset, Google sign-in, and
//! the rate limiting in front of all of it.

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod routes;
pub mod settings;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
