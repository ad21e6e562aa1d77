//! Authentication module for Markpad

pub mod account;
#[cfg(test)]
mod edge_case_tests;
pub mod google;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod tokens;
pub mod users;

pub use account::{reconcile_google_identity, Account, AuthProvider, PasswordReset, Reconciliation};
pub use google::{GoogleIdentity, GoogleVerifier};
pub use jwt::{Claims, JwtError, JwtManager};
pub use middleware::{client_ip, require_auth, CurrentUser};
pub use password::{
    generate_impossible_hash, hash_password, validate_password_strength, verify_password,
    PasswordPolicy, PolicyViolation,
};
pub use tokens::{TokenError, TokenManager, RESET_TOKEN_TTL};
