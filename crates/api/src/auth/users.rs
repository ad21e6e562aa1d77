//! User store queries
//!
//! Token consumption is a conditional single-statement UPDATE: the WHERE
//! clause re-checks the token so two concurrent consumers cannot both
//! succeed — the loser matches zero rows and surfaces `InvalidToken`.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::account::{Account, PasswordReset};
use crate::error::ApiResult;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    google_id: Option<String>,
    password_hash: Option<String>,
    email_verified: bool,
    email_verification_token: Option<String>,
    password_reset_token: Option<String>,
    password_reset_expires: Option<OffsetDateTime>,
    is_admin: bool,
    terms_accepted: bool,
    terms_accepted_at: Option<OffsetDateTime>,
    last_login_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
}

impl From<UserRow> for Account {
    fn from(row: UserRow) -> Self {
        // The reset columns are always written as a pair; a token without an
        // expiry would be unconsumable, so treat it as absent.
        let password_reset = match (row.password_reset_token, row.password_reset_expires) {
            (Some(token), Some(expires_at)) => Some(PasswordReset { token, expires_at }),
            (Some(_), None) => {
                tracing::warn!(user_id = %row.id, "reset token stored without expiry, ignoring");
                None
            }
            _ => None,
        };

        Account {
            id: row.id,
            email: row.email,
            name: row.name,
            google_id: row.google_id,
            password_hash: row.password_hash,
            email_verified: row.email_verified,
            verification_token: row.email_verification_token,
            password_reset,
            is_admin: row.is_admin,
            terms_accepted: row.terms_accepted,
            terms_accepted_at: row.terms_accepted_at,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        id,
        email,
        name,
        google_id,
        password_hash,
        email_verified,
        email_verification_token,
        password_reset_token,
        password_reset_expires,
        is_admin,
        terms_accepted,
        terms_accepted_at,
        last_login_at,
        created_at
    FROM users
"#;

/// Look up an account by email
///
/// Emails are unique only within the password path; when a Google account
/// shares the address, the password-capable row wins so login and reset
/// resolve against the credential that can actually satisfy them.
pub async fn find_by_email(pool: &PgPool, email: &str) -> ApiResult<Option<Account>> {
    let row: Option<UserRow> = sqlx::query_as(&format!(
        "{SELECT_COLUMNS} WHERE email = $1 ORDER BY (password_hash IS NOT NULL) DESC, created_at ASC LIMIT 1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Account::from))
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> ApiResult<Option<Account>> {
    let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Account::from))
}

pub async fn find_by_google_id(pool: &PgPool, google_id: &str) -> ApiResult<Option<Account>> {
    let row: Option<UserRow> =
        sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE google_id = $1"))
            .bind(google_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(Account::from))
}

pub async fn find_by_reset_token(pool: &PgPool, token: &str) -> ApiResult<Option<Account>> {
    let row: Option<UserRow> =
        sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE password_reset_token = $1"))
            .bind(token)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(Account::from))
}

/// Insert a new account
///
/// Raw sqlx error is returned so callers can map a unique violation to the
/// outcome that fits their flow (duplicate registration vs. a lost
/// creation race on first Google sign-in).
pub async fn insert(pool: &PgPool, account: &Account) -> Result<(), sqlx::Error> {
    let (reset_token, reset_expires) = match &account.password_reset {
        Some(reset) => (Some(reset.token.as_str()), Some(reset.expires_at)),
        None => (None, None),
    };

    sqlx::query(
        r#"
        INSERT INTO users (
            id,
            email,
            name,
            google_id,
            password_hash,
            email_verified,
            email_verification_token,
            password_reset_token,
            password_reset_expires,
            is_admin,
            terms_accepted,
            terms_accepted_at,
            last_login_at,
            created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(account.id)
    .bind(&account.email)
    .bind(&account.name)
    .bind(&account.google_id)
    .bind(&account.password_hash)
    .bind(account.email_verified)
    .bind(&account.verification_token)
    .bind(reset_token)
    .bind(reset_expires)
    .bind(account.is_admin)
    .bind(account.terms_accepted)
    .bind(account.terms_accepted_at)
    .bind(account.last_login_at)
    .bind(account.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Whether an error is a Postgres unique-constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// Atomically consume a verification token
///
/// Returns false when no unverified account holds the token (unknown,
/// already used, or a concurrent consumer won).
pub async fn consume_verification_token(pool: &PgPool, token: &str) -> ApiResult<bool> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE users
        SET email_verified = TRUE,
            email_verification_token = NULL
        WHERE email_verification_token = $1
          AND email_verified = FALSE
        "#,
    )
    .bind(token)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(rows_affected > 0)
}

/// Store a fresh verification token (resend flow)
pub async fn set_verification_token(pool: &PgPool, user_id: Uuid, token: &str) -> ApiResult<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET email_verification_token = $2
        WHERE id = $1
          AND email_verified = FALSE
        "#,
    )
    .bind(user_id)
    .bind(token)
    .execute(pool)
    .await?;

    Ok(())
}

/// Install a reset grant; token and expiry are written together
pub async fn set_password_reset(
    pool: &PgPool,
    user_id: Uuid,
    reset: &PasswordReset,
) -> ApiResult<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET password_reset_token = $2,
            password_reset_expires = $3
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(&reset.token)
    .bind(reset.expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Atomically consume a reset token, rotating the hash and clearing the pair
///
/// Returns false when the token no longer matches — a second consumer racing
/// on the same token lands here.
pub async fn consume_password_reset(
    pool: &PgPool,
    token: &str,
    new_password_hash: &str,
) -> ApiResult<bool> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE users
        SET password_hash = $2,
            password_reset_token = NULL,
            password_reset_expires = NULL
        WHERE password_reset_token = $1
        "#,
    )
    .bind(token)
    .bind(new_password_hash)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(rows_affected > 0)
}

/// Rotate the password hash (authenticated change-password flow)
pub async fn update_password_hash(pool: &PgPool, user_id: Uuid, hash: &str) -> ApiResult<()> {
    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(user_id)
        .bind(hash)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn touch_last_login(
    pool: &PgPool,
    user_id: Uuid,
    now: OffsetDateTime,
) -> ApiResult<()> {
    sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
        .bind(user_id)
        .bind(now)
        .execute(pool)
        .await?;

    Ok(())
}

/// Mark the terms of service accepted, returning the updated account
pub async fn accept_terms(pool: &PgPool, user_id: Uuid) -> ApiResult<Option<Account>> {
    let row: Option<UserRow> = sqlx::query_as(
        r#"
        UPDATE users
        SET terms_accepted = TRUE,
            terms_accepted_at = NOW()
        WHERE id = $1
        RETURNING
            id,
            email,
            name,
            google_id,
            password_hash,
            email_verified,
            email_verification_token,
            password_reset_token,
            password_reset_expires,
            is_admin,
            terms_accepted,
            terms_accepted_at,
            last_login_at,
            created_at
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Account::from))
}

/// Append to the login history (fire and forget)
///
/// History is an audit convenience; a failed insert must never fail the
/// login that triggered it.
pub fn record_login(pool: PgPool, user_id: Uuid, ip_address: Option<String>) {
    tokio::spawn(async move {
        let result = sqlx::query(
            "INSERT INTO login_history (user_id, ip_address) VALUES ($1, $2)",
        )
        .bind(user_id)
        .bind(ip_address)
        .execute(&pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(user_id = %user_id, error = ?e, "failed to record login history");
        }
    });
}

#[cfg(test)]
mod tests {
    #[allow(unused_imports)]
    use super::*;

    #[test]
    fn test_store_functions_compile() {
        // This test just ensures the module compiles
        // Actual integration tests require a test database
    }
}
