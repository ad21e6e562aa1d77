//! Authentication endpoints
//!
//! Thin HTTP shells around the auth module: extract, check the rate limit
//! and enabled modes, drive the account lifecycle, serialize. Argon2 work
//! always goes through `spawn_blocking` so a hash never stalls the runtime.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::account::{Account, AuthProvider, Reconciliation};
use crate::auth::middleware::{client_ip, CurrentUser};
use crate::auth::{password, reconcile_google_identity, users};
use crate::error::{ApiError, ApiResult};
use crate::settings;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleLoginRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AuthSettingsResponse {
    pub auth_mode: String,
    pub email_enabled: bool,
    pub google_enabled: bool,
}

/// Public view of an account; credential and token fields never leave the
/// server
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub auth_provider: AuthProvider,
    pub email_verified: bool,
    pub is_admin: bool,
    pub terms_accepted: bool,
    pub terms_accepted_at: Option<OffsetDateTime>,
    pub last_login_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl From<Account> for UserResponse {
    fn from(account: Account) -> Self {
        Self {
            auth_provider: account.auth_provider(),
            id: account.id,
            email: account.email,
            name: account.name,
            email_verified: account.email_verified,
            is_admin: account.is_admin,
            terms_accepted: account.terms_accepted,
            terms_accepted_at: account.terms_accepted_at,
            last_login_at: account.last_login_at,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct GoogleLoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub is_new: bool,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct VerifyTokenResponse {
    pub user: UserResponse,
}

// ---------------------------------------------------------------------------
// Blocking-pool wrappers for argon2 work
// ---------------------------------------------------------------------------

async fn hash_password_blocking(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn verify_password_blocking(password: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("verification task failed: {e}")))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

// ---------------------------------------------------------------------------
// Public endpoints
// ---------------------------------------------------------------------------

/// GET /api/v1/auth/settings
pub async fn get_auth_settings(
    State(state): State<AppState>,
) -> ApiResult<Json<AuthSettingsResponse>> {
    let mode = settings::auth_mode(&state.pool).await?;
    Ok(Json(AuthSettingsResponse {
        auth_mode: mode.mode,
        email_enabled: mode.email_enabled,
        google_enabled: mode.google_enabled,
    }))
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    let ip = client_ip(&headers, Some(peer));
    state.registration_limiter.check_and_record(&ip)?;

    let mode = settings::auth_mode(&state.pool).await?;
    if !mode.email_enabled {
        return Err(ApiError::AuthModeDisabled);
    }

    if users::find_by_email(&state.pool, &request.email)
        .await?
        .is_some()
    {
        return Err(ApiError::EmailAlreadyExists);
    }

    let policy = settings::password_policy(&state.pool).await?;
    password::validate_password_strength(&request.password, &policy)?;

    let password_hash = hash_password_blocking(request.password).await?;
    let verification_token = state
        .token_manager
        .issue_verification_token()
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let is_admin = state.config.is_admin_email(&request.email);
    let account = Account::new_registration(
        request.email,
        request.name,
        password_hash,
        verification_token.clone(),
        is_admin,
        OffsetDateTime::now_utc(),
    );

    if let Err(e) = users::insert(&state.pool, &account).await {
        // Two concurrent registrations for the same address: the partial
        // unique index stops the second one here.
        if users::is_unique_violation(&e) {
            return Err(ApiError::EmailAlreadyExists);
        }
        return Err(e.into());
    }

    state
        .email
        .send_verification_email(&account.email, &verification_token);
    tracing::info!(account_id = %account.id, "account registered, verification pending");

    Ok(Json(RegisterResponse {
        message: "Registration successful. Check your inbox for a verification link.".to_string(),
        email: account.email,
    }))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let ip = client_ip(&headers, Some(peer));
    state.login_limiter.check_and_record(&ip)?;

    let mode = settings::auth_mode(&state.pool).await?;
    if !mode.email_enabled {
        return Err(ApiError::AuthModeDisabled);
    }

    let account = users::find_by_email(&state.pool, &request.email).await?;

    // Unknown email and password-less account verify against the fallback
    // hash, so every login costs one argon2 verification and the failure
    // is indistinguishable from a wrong password.
    let stored_hash = account
        .as_ref()
        .and_then(|acc| acc.password_hash.clone())
        .unwrap_or_else(|| state.fallback_password_hash.clone());
    let credentials_valid = verify_password_blocking(request.password, stored_hash).await?;

    let Some(mut account) = account else {
        return Err(ApiError::InvalidCredentials);
    };
    if account.password_hash.is_none() || !credentials_valid {
        tracing::warn!(account_id = %account.id, "login failed, bad credentials");
        return Err(ApiError::InvalidCredentials);
    }

    // Only after the credentials check out: a caller who guesses a valid
    // password for an unverified account learns nothing extra about other
    // addresses.
    if !account.email_verified {
        return Err(ApiError::EmailNotVerified);
    }

    let now = OffsetDateTime::now_utc();
    users::touch_last_login(&state.pool, account.id, now).await?;
    users::record_login(state.pool.clone(), account.id, Some(ip.clone()));
    state.login_limiter.reset(&ip);

    let access_token = state
        .jwt_manager
        .create_access_token(account.id, &account.email)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(account_id = %account.id, "login succeeded");
    account.last_login_at = Some(now);

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.jwt_manager.expiry_seconds(),
        user: UserResponse::from(account),
    }))
}

/// POST /api/v1/auth/google/login
pub async fn google_login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<GoogleLoginRequest>,
) -> ApiResult<Json<GoogleLoginResponse>> {
    if !state.google_verifier.is_configured() {
        return Err(ApiError::AuthModeDisabled);
    }

    let identity = state.google_verifier.verify(&request.token).await?;
    let now = OffsetDateTime::now_utc();

    let linked = users::find_by_google_id(&state.pool, &identity.google_id).await?;
    let (mut account, is_new) = match reconcile_google_identity(
        linked.as_ref(),
        &identity,
        &state.config.admin_emails,
    ) {
        Reconciliation::Login => {
            let account = linked.ok_or_else(|| {
                ApiError::Internal("login outcome without a linked account".to_string())
            })?;
            (account, false)
        }
        Reconciliation::CreateNew { is_admin } => {
            let account = Account::new_from_google(identity.clone(), is_admin, now);
            match users::insert(&state.pool, &account).await {
                Ok(()) => {
                    tracing::info!(account_id = %account.id, "account created from Google sign-in");
                    (account, true)
                }
                Err(e) if users::is_unique_violation(&e) => {
                    // A concurrent first sign-in for the same subject got
                    // there first; use the row it created.
                    let account = users::find_by_google_id(&state.pool, &identity.google_id)
                        .await?
                        .ok_or_else(|| {
                            ApiError::Internal(
                                "account missing after insert conflict".to_string(),
                            )
                        })?;
                    (account, false)
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    users::touch_last_login(&state.pool, account.id, now).await?;
    account.last_login_at = Some(now);

    let ip = client_ip(&headers, Some(peer));
    users::record_login(state.pool.clone(), account.id, Some(ip));

    let access_token = state
        .jwt_manager
        .create_access_token(account.id, &account.email)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(account_id = %account.id, is_new = is_new, "Google sign-in succeeded");

    Ok(Json(GoogleLoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.jwt_manager.expiry_seconds(),
        is_new,
        user: UserResponse::from(account),
    }))
}

/// POST /api/v1/auth/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    Json(request): Json<VerifyEmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if !users::consume_verification_token(&state.pool, &request.token).await? {
        return Err(ApiError::InvalidToken);
    }

    tracing::info!("email address verified");
    Ok(Json(MessageResponse {
        message: "Email address verified. You can now sign in.".to_string(),
    }))
}

/// POST /api/v1/auth/resend-verification
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(request): Json<ResendVerificationRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let generic = MessageResponse {
        message: "If the address is registered, a verification email has been sent.".to_string(),
    };

    let Some(mut account) = users::find_by_email(&state.pool, &request.email).await? else {
        return Ok(Json(generic));
    };
    if account.email_verified {
        return Err(ApiError::EmailAlreadyVerified);
    }

    let token = state
        .token_manager
        .issue_verification_token()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    account.rotate_verification_token(token.clone())?;
    users::set_verification_token(&state.pool, account.id, &token).await?;

    state.email.send_verification_email(&account.email, &token);
    Ok(Json(generic))
}

/// POST /api/v1/auth/forgot-password
///
/// Always reports success so callers cannot probe which addresses exist.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    // Issued before the lookup so known and unknown addresses do
    // comparable work on this path.
    let (token, expires_at) = state
        .token_manager
        .issue_reset_token()
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    match users::find_by_email(&state.pool, &request.email).await? {
        Some(mut account) if account.password_hash.is_some() => {
            let reset = account.begin_password_reset(token.clone(), expires_at).clone();
            users::set_password_reset(&state.pool, account.id, &reset).await?;
            state
                .email
                .send_password_reset_email(&account.email, &token);
            tracing::info!(account_id = %account.id, "password reset issued");
        }
        _ => {
            // Unknown address or a Google-only account: nothing to reset,
            // same response either way.
            tracing::debug!("password reset requested for non-password address");
        }
    }

    Ok(Json(MessageResponse {
        message: "If the address is registered, a password reset email has been sent.".to_string(),
    }))
}

/// POST /api/v1/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let Some(mut account) = users::find_by_reset_token(&state.pool, &request.token).await? else {
        return Err(ApiError::InvalidToken);
    };

    account.consume_password_reset(&request.token, OffsetDateTime::now_utc())?;

    let policy = settings::password_policy(&state.pool).await?;
    password::validate_password_strength(&request.new_password, &policy)?;

    let new_hash = hash_password_blocking(request.new_password).await?;

    // The UPDATE re-checks the token, so of two concurrent consumers only
    // one rotates the hash; the other matches zero rows and fails.
    if !users::consume_password_reset(&state.pool, &request.token, &new_hash).await? {
        return Err(ApiError::InvalidToken);
    }

    tracing::info!(account_id = %account.id, "password reset completed");
    Ok(Json(MessageResponse {
        message: "Password has been reset. You can now sign in.".to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Authenticated endpoints
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(CurrentUser(account)): Extension<CurrentUser>,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let Some(current_hash) = account.password_hash.clone() else {
        return Err(ApiError::NoPasswordSet);
    };

    if !verify_password_blocking(request.current_password, current_hash).await? {
        return Err(ApiError::WrongPassword);
    }

    let policy = settings::password_policy(&state.pool).await?;
    password::validate_password_strength(&request.new_password, &policy)?;

    let new_hash = hash_password_blocking(request.new_password).await?;
    users::update_password_hash(&state.pool, account.id, &new_hash).await?;

    tracing::info!(account_id = %account.id, "password changed");
    Ok(Json(MessageResponse {
        message: "Password has been changed.".to_string(),
    }))
}

/// GET /api/v1/auth/me
pub async fn me(Extension(CurrentUser(account)): Extension<CurrentUser>) -> Json<UserResponse> {
    Json(UserResponse::from(account))
}

/// POST /api/v1/auth/verify
pub async fn verify_token(
    Extension(CurrentUser(account)): Extension<CurrentUser>,
) -> Json<VerifyTokenResponse> {
    Json(VerifyTokenResponse {
        user: UserResponse::from(account),
    })
}

/// POST /api/v1/auth/accept-terms
pub async fn accept_terms(
    State(state): State<AppState>,
    Extension(CurrentUser(account)): Extension<CurrentUser>,
) -> ApiResult<Json<UserResponse>> {
    let account = users::accept_terms(&state.pool, account.id)
        .await?
        .ok_or(ApiError::InvalidAccessToken)?;

    tracing::info!(account_id = %account.id, "terms of service accepted");
    Ok(Json(UserResponse::from(account)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::google::GoogleIdentity;

    fn sample_account() -> Account {
        Account::new_registration(
            "alice@example.com".to_string(),
            "Alice".to_string(),
            "$argon2id$fake".to_string(),
            "verify-token".to_string(),
            false,
            OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp"),
        )
    }

    #[test]
    fn user_response_derives_auth_provider() {
        let response = UserResponse::from(sample_account());
        assert_eq!(response.auth_provider, AuthProvider::Email);

        let google = Account::new_from_google(
            GoogleIdentity {
                google_id: "sub-1".to_string(),
                email: "bob@example.com".to_string(),
                name: "Bob".to_string(),
            },
            false,
            OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp"),
        );
        assert_eq!(UserResponse::from(google).auth_provider, AuthProvider::Google);
    }

    #[test]
    fn user_response_never_carries_credentials() {
        // The serialized view must not leak hashes or live tokens
        let json = serde_json::to_value(UserResponse::from(sample_account()))
            .expect("should serialize");
        let body = json.to_string();

        assert!(!body.contains("password_hash"));
        assert!(!body.contains("verify-token"));
        assert!(!body.contains("verification_token"));
        assert!(!body.contains("password_reset"));
        assert_eq!(json["auth_provider"], "email");
        assert_eq!(json["email_verified"], false);
    }
}
