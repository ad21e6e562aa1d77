//! Account model and lifecycle transitions
//!
//! All credential and verification state changes go through the methods on
//! [`Account`]; handlers never flip the fields directly. The reset token and
//! its expiry live in one `Option<PasswordReset>` so they cannot drift apart,
//! and `auth_provider` is derived from credential presence instead of being
//! stored. Token comparisons are constant time.

use serde::Serialize;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::google::GoogleIdentity;
use crate::error::ApiError;

/// Which sign-in paths an account can currently use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Email,
    Google,
    Both,
}

/// A live password-reset grant: token and expiry always travel together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordReset {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub google_id: Option<String>,
    pub password_hash: Option<String>,
    pub email_verified: bool,
    /// Present only while unverified and a token has been issued
    pub verification_token: Option<String>,
    pub password_reset: Option<PasswordReset>,
    pub is_admin: bool,
    pub terms_accepted: bool,
    pub terms_accepted_at: Option<OffsetDateTime>,
    pub last_login_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

fn tokens_match(stored: &str, candidate: &str) -> bool {
    stored.as_bytes().ct_eq(candidate.as_bytes()).into()
}

impl Account {
    /// A self-registered account: unverified, holding a verification token
    pub fn new_registration(
        email: String,
        name: String,
        password_hash: String,
        verification_token: String,
        is_admin: bool,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            name,
            google_id: None,
            password_hash: Some(password_hash),
            email_verified: false,
            verification_token: Some(verification_token),
            password_reset: None,
            is_admin,
            terms_accepted: false,
            terms_accepted_at: None,
            last_login_at: None,
            created_at: now,
        }
    }

    /// An account created by a first Google sign-in
    ///
    /// Google is trusted as the verification authority for the address, so
    /// the account starts verified and never holds a verification token.
    pub fn new_from_google(identity: GoogleIdentity, is_admin: bool, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: identity.email,
            name: identity.name,
            google_id: Some(identity.google_id),
            password_hash: None,
            email_verified: true,
            verification_token: None,
            password_reset: None,
            is_admin,
            terms_accepted: false,
            terms_accepted_at: None,
            last_login_at: Some(now),
            created_at: now,
        }
    }

    /// Derived from which credential fields are populated
    pub fn auth_provider(&self) -> AuthProvider {
        match (self.password_hash.is_some(), self.google_id.is_some()) {
            (true, true) => AuthProvider::Both,
            (false, true) => AuthProvider::Google,
            _ => AuthProvider::Email,
        }
    }

    /// Verify the email address by consuming the verification token
    ///
    /// The token is single-use: success clears it, and an already verified
    /// account rejects any token.
    pub fn consume_verification_token(&mut self, token: &str) -> Result<(), ApiError> {
        let stored = self
            .verification_token
            .as_deref()
            .ok_or(ApiError::InvalidToken)?;
        if self.email_verified || !tokens_match(stored, token) {
            return Err(ApiError::InvalidToken);
        }
        self.email_verified = true;
        self.verification_token = None;
        Ok(())
    }

    /// Replace the verification token (resend flow, unverified accounts only)
    pub fn rotate_verification_token(&mut self, token: String) -> Result<(), ApiError> {
        if self.email_verified {
            return Err(ApiError::InvalidToken);
        }
        self.verification_token = Some(token);
        Ok(())
    }

    /// Install a reset grant, replacing any previous one
    ///
    /// An account holds at most one live reset token.
    pub fn begin_password_reset(
        &mut self,
        token: String,
        expires_at: OffsetDateTime,
    ) -> &PasswordReset {
        self.password_reset.insert(PasswordReset { token, expires_at })
    }

    /// Consume the reset grant; the caller rotates the hash on success
    pub fn consume_password_reset(
        &mut self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<(), ApiError> {
        let reset = self.password_reset.as_ref().ok_or(ApiError::InvalidToken)?;
        if !tokens_match(&reset.token, token) {
            return Err(ApiError::InvalidToken);
        }
        if now > reset.expires_at {
            return Err(ApiError::TokenExpired);
        }
        self.password_reset = None;
        Ok(())
    }

    pub fn set_password_hash(&mut self, hash: String) {
        self.password_hash = Some(hash);
    }
}

/// Outcome of matching a verified Google identity against the store
///
/// Matching is by `google_id` only. An existing password account with the
/// same email address does NOT absorb the Google identity; the two remain
/// separate accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// An account already links this Google subject: treat as a login
    Login,
    /// No account links this subject: create one, pre-verified
    CreateNew { is_admin: bool },
}

/// Decide login vs. creation for a verified Google identity
///
/// `linked` is the account found by `google_id`, if any.
pub fn reconcile_google_identity(
    linked: Option<&Account>,
    identity: &GoogleIdentity,
    admin_emails: &[String],
) -> Reconciliation {
    match linked {
        Some(_) => Reconciliation::Login,
        None => Reconciliation::CreateNew {
            is_admin: admin_emails.iter().any(|admin| *admin == identity.email),
        },
    }
}
