//! Edge Case Tests for the Account Lifecycle
//!
//! Exercises full flows across the pure components:
//! - Registration and verification (LIFE-V01 to LIFE-V04)
//! - Password reset grants and expiry (LIFE-R01 to LIFE-R05)
//! - Google identity reconciliation (LIFE-G01 to LIFE-G03)
//! - Policy interaction with the reset flow (LIFE-P01)

#[cfg(test)]
mod lifecycle_flow_tests {
    use time::{Duration, OffsetDateTime};

    use super::super::account::{
        reconcile_google_identity, Account, AuthProvider, Reconciliation,
    };
    use super::super::google::GoogleIdentity;
    use super::super::password::{
        validate_password_strength, PasswordPolicy, PolicyViolation,
    };
    use super::super::tokens::{TokenManager, RESET_TOKEN_TTL};
    use crate::error::ApiError;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp")
    }

    fn registered_account(tokens: &TokenManager) -> (Account, String) {
        let token = tokens
            .issue_verification_token()
            .expect("should issue token");
        let account = Account::new_registration(
            "alice@example.com".to_string(),
            "Alice".to_string(),
            "$argon2id$placeholder".to_string(),
            token.clone(),
            false,
            now(),
        );
        (account, token)
    }

    // =========================================================================
    // LIFE-V01: Register then verify with the issued token - account verified
    // =========================================================================
    #[test]
    fn test_registration_to_verified_flow() {
        let tokens = TokenManager::new();
        let (mut account, token) = registered_account(&tokens);

        assert!(!account.email_verified);
        account
            .consume_verification_token(&token)
            .expect("issued token verifies the account");
        assert!(account.email_verified);
        assert!(account.verification_token.is_none());
    }

    // =========================================================================
    // LIFE-V02: Replay of a consumed verification token - InvalidToken
    // =========================================================================
    #[test]
    fn test_verification_token_replay_rejected() {
        let tokens = TokenManager::new();
        let (mut account, token) = registered_account(&tokens);

        account
            .consume_verification_token(&token)
            .expect("first consume");
        assert!(matches!(
            account.consume_verification_token(&token),
            Err(ApiError::InvalidToken)
        ));
    }

    // =========================================================================
    // LIFE-V03: A token from another issuance never verifies this account
    // =========================================================================
    #[test]
    fn test_foreign_verification_token_rejected() {
        let tokens = TokenManager::new();
        let (mut account, _) = registered_account(&tokens);
        let foreign = tokens
            .issue_verification_token()
            .expect("should issue token");

        assert!(matches!(
            account.consume_verification_token(&foreign),
            Err(ApiError::InvalidToken)
        ));
        assert!(!account.email_verified);
    }

    // =========================================================================
    // LIFE-V04: Resend rotates the token, invalidating the previous one
    // =========================================================================
    #[test]
    fn test_resend_invalidates_previous_token() {
        let tokens = TokenManager::new();
        let (mut account, original) = registered_account(&tokens);

        let rotated = tokens
            .issue_verification_token()
            .expect("should issue token");
        account
            .rotate_verification_token(rotated.clone())
            .expect("unverified account rotates");

        assert!(matches!(
            account.consume_verification_token(&original),
            Err(ApiError::InvalidToken)
        ));
        account
            .consume_verification_token(&rotated)
            .expect("rotated token verifies");
    }

    // =========================================================================
    // LIFE-R01: Issued reset grant consumes exactly once
    // =========================================================================
    #[test]
    fn test_reset_grant_single_use() {
        let tokens = TokenManager::new();
        let (mut account, _) = registered_account(&tokens);

        let (token, expires_at) = tokens
            .issue_reset_token_at(now())
            .expect("should issue token");
        account.begin_password_reset(token.clone(), expires_at);

        account
            .consume_password_reset(&token, now() + Duration::minutes(5))
            .expect("live grant consumes");
        assert!(matches!(
            account.consume_password_reset(&token, now() + Duration::minutes(5)),
            Err(ApiError::InvalidToken)
        ));
    }

    // =========================================================================
    // LIFE-R02: Consumption at expires_at - 1s succeeds, + 1s expires
    // =========================================================================
    #[test]
    fn test_reset_expiry_boundaries() {
        let tokens = TokenManager::new();

        let (token, expires_at) = tokens
            .issue_reset_token_at(now())
            .expect("should issue token");
        assert_eq!(expires_at, now() + RESET_TOKEN_TTL);

        let (mut before, _) = registered_account(&tokens);
        before.begin_password_reset(token.clone(), expires_at);
        before
            .consume_password_reset(&token, expires_at - Duration::seconds(1))
            .expect("valid one second before expiry");

        let (mut after, _) = registered_account(&tokens);
        after.begin_password_reset(token.clone(), expires_at);
        assert!(matches!(
            after.consume_password_reset(&token, expires_at + Duration::seconds(1)),
            Err(ApiError::TokenExpired)
        ));
    }

    // =========================================================================
    // LIFE-R03: Re-request replaces the live grant; only the newest consumes
    // =========================================================================
    #[test]
    fn test_second_request_invalidates_first_grant() {
        let tokens = TokenManager::new();
        let (mut account, _) = registered_account(&tokens);

        let (first, first_exp) = tokens
            .issue_reset_token_at(now())
            .expect("should issue token");
        let (second, second_exp) = tokens
            .issue_reset_token_at(now() + Duration::minutes(10))
            .expect("should issue token");

        account.begin_password_reset(first.clone(), first_exp);
        account.begin_password_reset(second.clone(), second_exp);

        assert!(matches!(
            account.consume_password_reset(&first, now()),
            Err(ApiError::InvalidToken)
        ));
        account
            .consume_password_reset(&second, now() + Duration::minutes(15))
            .expect("newest grant is live");
    }

    // =========================================================================
    // LIFE-R04: Completing a reset rotates the hash and keeps the provider
    // =========================================================================
    #[test]
    fn test_reset_rotates_hash_only() {
        let tokens = TokenManager::new();
        let (mut account, _) = registered_account(&tokens);
        let old_hash = account.password_hash.clone();

        let (token, expires_at) = tokens
            .issue_reset_token_at(now())
            .expect("should issue token");
        account.begin_password_reset(token.clone(), expires_at);
        account
            .consume_password_reset(&token, now())
            .expect("grant consumes");
        account.set_password_hash("$argon2id$rotated".to_string());

        assert_ne!(account.password_hash, old_hash);
        assert_eq!(account.auth_provider(), AuthProvider::Email);
        assert!(account.password_reset.is_none());
    }

    // =========================================================================
    // LIFE-R05: Expired grant does not block a fresh one
    // =========================================================================
    #[test]
    fn test_fresh_grant_after_expiry() {
        let tokens = TokenManager::new();
        let (mut account, _) = registered_account(&tokens);

        let (stale, stale_exp) = tokens
            .issue_reset_token_at(now() - Duration::hours(2))
            .expect("should issue token");
        account.begin_password_reset(stale, stale_exp);

        let (fresh, fresh_exp) = tokens
            .issue_reset_token_at(now())
            .expect("should issue token");
        account.begin_password_reset(fresh.clone(), fresh_exp);
        account
            .consume_password_reset(&fresh, now())
            .expect("fresh grant consumes");
    }

    // =========================================================================
    // LIFE-G01: Same email, different Google subject - two distinct accounts
    // =========================================================================
    #[test]
    fn test_google_identity_never_merges_by_email() {
        let tokens = TokenManager::new();
        let (password_account, _) = registered_account(&tokens);

        let identity = GoogleIdentity {
            google_id: "google-subject-9".to_string(),
            email: password_account.email.clone(),
            name: "Alice".to_string(),
        };

        // Lookup is by google_id; the password account is not linked, so the
        // identity gets its own account.
        let outcome = reconcile_google_identity(None, &identity, &[]);
        assert_eq!(outcome, Reconciliation::CreateNew { is_admin: false });

        let google_account = Account::new_from_google(identity, false, now());
        assert_ne!(google_account.id, password_account.id);
        assert_eq!(google_account.email, password_account.email);
        assert!(google_account.email_verified);
    }

    // =========================================================================
    // LIFE-G02: Linked subject logs in without touching account state
    // =========================================================================
    #[test]
    fn test_linked_subject_is_a_login() {
        let identity = GoogleIdentity {
            google_id: "google-subject-1".to_string(),
            email: "bob@example.com".to_string(),
            name: "Bob".to_string(),
        };
        let linked = Account::new_from_google(identity.clone(), false, now());

        let outcome = reconcile_google_identity(Some(&linked), &identity, &[]);
        assert_eq!(outcome, Reconciliation::Login);
    }

    // =========================================================================
    // LIFE-G03: Admin allow-list is consulted only at creation
    // =========================================================================
    #[test]
    fn test_allow_list_does_not_promote_existing_accounts() {
        let identity = GoogleIdentity {
            google_id: "google-subject-1".to_string(),
            email: "root@example.com".to_string(),
            name: "Root".to_string(),
        };
        let admins = vec!["root@example.com".to_string()];

        // Existing non-admin account: outcome is a plain login, no promotion
        let linked = Account::new_from_google(identity.clone(), false, now());
        assert_eq!(
            reconcile_google_identity(Some(&linked), &identity, &admins),
            Reconciliation::Login
        );

        // No account yet: creation carries the flag
        assert_eq!(
            reconcile_google_identity(None, &identity, &admins),
            Reconciliation::CreateNew { is_admin: true }
        );
    }

    // =========================================================================
    // LIFE-P01: Policy rejects the replacement password before consumption
    // =========================================================================
    #[test]
    fn test_weak_replacement_password_is_reported_specifically() {
        let policy = PasswordPolicy::default();

        // The reset flow validates before consuming the grant, so the caller
        // sees the precise violation and the token stays live for a retry.
        assert_eq!(
            validate_password_strength("short", &policy),
            Err(PolicyViolation::TooShort { min: 8 })
        );
        assert_eq!(
            validate_password_strength("nouppercase1", &policy),
            Err(PolicyViolation::MissingUppercase)
        );
        assert_eq!(validate_password_strength("Acceptable1", &policy), Ok(()));
    }
}
