/// Password Hashing and Verification
///
/// bcrypt with a fixed cost factor plus the registration strength policy.
/// Hashing and verification take tens of milliseconds; async callers should run
/// them on the blocking pool.

use bcrypt::{hash, verify};
use lazy_static::lazy_static;

use crate::error::{AppError, AuthError, ValidationError};

/// bcrypt work factor for every stored credential
pub const BCRYPT_COST: u32 = 12;

/// bcrypt only reads this many bytes of its input; longer passwords are
/// refused rather than silently truncated
pub const MAX_PASSWORD_BYTES: usize = 72;

const MIN_PASSWORD_LENGTH: usize = 8;
const PASSWORD_SYMBOLS: &[char] = &['@', '$', '!', '%', '*', '?', '&'];

/// Hash a password with bcrypt
///
/// The returned string embeds the salt and cost factor, so verification
/// needs nothing else.
///
/// # Errors
/// - `AppError::Validation` if the password is longer than bcrypt reads
/// - `AppError::Internal` if bcrypt fails (e.g. no randomness available)
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash_with_cost(password, BCRYPT_COST)
}

fn hash_with_cost(password: &str, cost: u32) -> Result<String, AppError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::TooLong("password".to_string(), MAX_PASSWORD_BYTES).into());
    }
    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored bcrypt hash
///
/// A hash that cannot be parsed counts as a mismatch, and so does any
/// password longer than bcrypt can tell apart.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    if password.len() > MAX_PASSWORD_BYTES {
        return false;
    }
    match verify(password, password_hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash could not be parsed");
            false
        }
    }
}

lazy_static! {
    // Real cost-12 hash of a throwaway value; empty only if bcrypt itself fails
    static ref DUMMY_HASH: String =
        hash("dummy-password-for-timing", BCRYPT_COST).unwrap_or_default();
}

/// Spend the same bcrypt work as a real check when there is no stored hash,
/// so an unknown account answers as slowly as a wrong password. Always false.
pub fn verify_against_dummy(password: &str) -> bool {
    let _ = verify_password(password, &DUMMY_HASH);
    false
}

/// Strength policy:
/// - at least 8 characters
/// - an uppercase letter, a lowercase letter and a digit
/// - one symbol from `@$!%*?&`
pub fn is_password_strong(password: &str) -> bool {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return false;
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| PASSWORD_SYMBOLS.contains(&c));

    has_upper && has_lower && has_digit && has_symbol
}

/// Registration gate, run before hashing
pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
    if is_password_strong(password) {
        Ok(())
    } else {
        Err(AuthError::WeakPassword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Cheapest cost bcrypt accepts; keeps the suite fast
    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_password_uses_configured_cost() {
        let password = "Abcdefg1!";
        let hash = hash_password(password).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
        assert!(hash.contains("$12$"));
        assert!(verify_password(password, &hash));
    }

    #[test]
    fn test_verify_wrong_password() {
        let hash = hash_with_cost("Abcdefg1!", TEST_COST).expect("Failed to hash password");

        assert!(!verify_password("Abcdefg1?", &hash));
        assert!(!verify_password("abcdefg1!", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn test_same_password_hashes_differently() {
        let password = "Sup3r$ecret";
        let first = hash_with_cost(password, TEST_COST).expect("Failed to hash password");
        let second = hash_with_cost(password, TEST_COST).expect("Failed to hash password");

        assert_ne!(first, second);
        assert!(verify_password(password, &first));
        assert!(verify_password(password, &second));
    }

    #[test]
    fn test_verify_against_malformed_hash() {
        assert!(!verify_password("Abcdefg1!", "not-a-bcrypt-hash"));
        assert!(!verify_password("Abcdefg1!", ""));
        assert!(!verify_password("Abcdefg1!", "$2b$12$short"));
    }

    #[test]
    fn test_passwords_differing_after_byte_72_are_not_confused() {
        let stem = format!("Abcdefg1!{}", "x".repeat(63));
        assert_eq!(stem.len(), MAX_PASSWORD_BYTES);

        let hash = hash_with_cost(&stem, TEST_COST).expect("Failed to hash password");
        assert!(verify_password(&stem, &hash));
        assert!(!verify_password(&format!("{}ZZZZ", stem), &hash));

        let long = format!("{}AAAA", stem);
        assert!(matches!(
            hash_with_cost(&long, TEST_COST),
            Err(AppError::Validation(ValidationError::TooLong(_, MAX_PASSWORD_BYTES)))
        ));
    }

    #[test]
    fn test_dummy_verification_never_matches() {
        assert!(!verify_against_dummy("dummy-password-for-timing"));
        assert!(!verify_against_dummy("Abcdefg1!"));
    }

    #[test]
    fn test_strength_policy() {
        assert!(!is_password_strong("abc"));
        assert!(is_password_strong("Abcdefg1!"));
        assert!(!is_password_strong("abcdefgh"));
    }

    #[test]
    fn test_strength_requires_every_class() {
        assert!(!is_password_strong("ABCDEFG1!"), "no lowercase");
        assert!(!is_password_strong("abcdefg1!"), "no uppercase");
        assert!(!is_password_strong("Abcdefgh!"), "no digit");
        assert!(!is_password_strong("Abcdefg12"), "no symbol");
        assert!(!is_password_strong("Abcdefg1#"), "symbol outside the allowed set");
        assert!(!is_password_strong("Abcde1!"), "seven characters");
    }

    #[test]
    fn test_every_allowed_symbol_counts() {
        for symbol in PASSWORD_SYMBOLS {
            let password = format!("Abcdefg1{}", symbol);
            assert!(is_password_strong(&password), "{} rejected", password);
        }
    }

    #[test]
    fn test_validate_password_strength() {
        assert_eq!(validate_password_strength("Abcdefg1!"), Ok(()));
        assert_eq!(
            validate_password_strength("password"),
            Err(AuthError::WeakPassword)
        );
    }
}
