//! Password hashing and strength validation
//!
//! Hashes use argon2id with a per-password random salt. Verification goes
//! through the argon2 crate's own comparison, which does not short-circuit
//! on the first mismatching byte.

use argon2::password_hash::rand_core::{OsRng as HashRng, RngCore};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Failure inside the hashing backend itself, distinct from a mismatch
#[derive(Debug, thiserror::Error)]
#[error("password hashing failed: {0}")]
pub struct HashError(argon2::password_hash::Error);

/// Hash a password with argon2id and a fresh random salt
pub fn hash_password(password: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut HashRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(HashError)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash
///
/// Returns `Ok(false)` on mismatch; `Err` only when the stored hash is
/// malformed or the backend fails.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, HashError> {
    let parsed = PasswordHash::new(hash).map_err(HashError)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(HashError(e)),
    }
}

/// Produce a valid-format hash of a random secret nobody knows
///
/// Login verifies against this when the email is unknown or the account has
/// no password, so both paths cost one argon2 verification and a caller
/// cannot distinguish them by response time.
pub fn generate_impossible_hash() -> Result<String, HashError> {
    let mut secret = [0u8; 32];
    HashRng.fill_bytes(&mut secret);
    let salt = SaltString::generate(&mut HashRng);
    let hash = Argon2::default()
        .hash_password(&secret, &salt)
        .map_err(HashError)?;
    Ok(hash.to_string())
}

/// Active password-strength rules, sourced from system settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: false,
        }
    }
}

const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

/// The first rule a candidate password failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("password must be at least {min} characters long")]
    TooShort { min: usize },
    #[error("password must contain an uppercase letter")]
    MissingUppercase,
    #[error("password must contain a lowercase letter")]
    MissingLowercase,
    #[error("password must contain a digit")]
    MissingDigit,
    #[error("password must contain a special character")]
    MissingSpecial,
}

/// Validate a candidate password against the active policy
///
/// Rules are checked in a fixed order (length, uppercase, lowercase, digit,
/// special) and the first failure is reported.
pub fn validate_password_strength(
    password: &str,
    policy: &PasswordPolicy,
) -> Result<(), PolicyViolation> {
    if password.chars().count() < policy.min_length {
        return Err(PolicyViolation::TooShort {
            min: policy.min_length,
        });
    }
    if policy.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PolicyViolation::MissingUppercase);
    }
    if policy.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(PolicyViolation::MissingLowercase);
    }
    if policy.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PolicyViolation::MissingDigit);
    }
    if policy.require_special && !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        return Err(PolicyViolation::MissingSpecial);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let hash = hash_password("CorrectHorse1").expect("should hash");
        assert!(verify_password("CorrectHorse1", &hash).expect("should verify"));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let hash = hash_password("CorrectHorse1").expect("should hash");
        assert!(!verify_password("WrongHorse1", &hash).expect("should verify"));
    }

    #[test]
    fn same_password_hashes_differently() {
        // Per-password random salt
        let first = hash_password("CorrectHorse1").expect("should hash");
        let second = hash_password("CorrectHorse1").expect("should hash");
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_hash_is_an_error_not_a_mismatch() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn impossible_hash_never_verifies_user_input() {
        let hash = generate_impossible_hash().expect("should hash");
        assert!(!verify_password("", &hash).expect("should verify"));
        assert!(!verify_password("password", &hash).expect("should verify"));
    }

    #[test]
    fn default_policy_accepts_mixed_case_with_digit() {
        let policy = PasswordPolicy::default();
        assert_eq!(validate_password_strength("Test1234", &policy), Ok(()));
    }

    #[test]
    fn missing_uppercase_reported_under_default_policy() {
        let policy = PasswordPolicy::default();
        assert_eq!(
            validate_password_strength("test1234", &policy),
            Err(PolicyViolation::MissingUppercase)
        );
    }

    #[test]
    fn lowercase_checked_before_digit() {
        // "TESTTEST" violates both the lowercase and digit rules; the fixed
        // order reports the lowercase failure.
        let policy = PasswordPolicy::default();
        assert_eq!(
            validate_password_strength("TESTTEST", &policy),
            Err(PolicyViolation::MissingLowercase)
        );
    }

    #[test]
    fn digit_reported_once_lowercase_is_satisfied() {
        let policy = PasswordPolicy::default();
        assert_eq!(
            validate_password_strength("TESTtest", &policy),
            Err(PolicyViolation::MissingDigit)
        );
    }

    #[test]
    fn length_checked_first() {
        let policy = PasswordPolicy::default();
        assert_eq!(
            validate_password_strength("ab", &policy),
            Err(PolicyViolation::TooShort { min: 8 })
        );
    }

    #[test]
    fn special_rule_only_applies_when_required() {
        let mut policy = PasswordPolicy::default();
        assert_eq!(validate_password_strength("Test1234", &policy), Ok(()));

        policy.require_special = true;
        assert_eq!(
            validate_password_strength("Test1234", &policy),
            Err(PolicyViolation::MissingSpecial)
        );
        assert_eq!(validate_password_strength("Test1234!", &policy), Ok(()));
    }

    #[test]
    fn relaxed_policy_accepts_anything_long_enough() {
        let policy = PasswordPolicy {
            min_length: 4,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        };
        assert_eq!(validate_password_strength("aaaa", &policy), Ok(()));
        assert_eq!(
            validate_password_strength("aaa", &policy),
            Err(PolicyViolation::TooShort { min: 4 })
        );
    }
}
