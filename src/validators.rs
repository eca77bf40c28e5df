/// Input validators
///
/// Every user-supplied field passes through one of these before it reaches a
/// query. Queries are always parameterized; these checks enforce the domain
/// rules (lengths, ranges, allowed values) and reject control characters.

use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::MAX_PASSWORD_BYTES;
use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_EMAIL_LOCAL_PART: usize = 64;
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 32;
const MAX_SEARCH_TERM_LENGTH: usize = 100;
const MAX_URL_LENGTH: usize = 512;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 10;

pub const LIBRARY_STATUSES: &[&str] = &["playing", "completed", "abandoned", "wishlist"];

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).unwrap();

    static ref USERNAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
}

/// Validates an email address and returns it trimmed
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    if let Some(at_pos) = trimmed.find('@') {
        if at_pos > MAX_EMAIL_LOCAL_PART {
            return Err(ValidationError::SuspiciousContent("email".to_string()));
        }
    }

    Ok(trimmed.to_string())
}

/// Usernames: 3-32 ASCII letters, digits or underscores
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let trimmed = username.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("username".to_string()));
    }

    if trimmed.len() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::TooShort(
            "username".to_string(),
            MIN_USERNAME_LENGTH,
        ));
    }

    if trimmed.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong(
            "username".to_string(),
            MAX_USERNAME_LENGTH,
        ));
    }

    if !USERNAME_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("username".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Password length cap in bytes, applied before the strength policy
pub fn is_valid_password_length(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_BYTES,
        ));
    }
    Ok(())
}

/// Required free text (review bodies, replies)
pub fn is_valid_text(field: &str, value: &str, max_length: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }

    if trimmed.chars().count() > max_length {
        return Err(ValidationError::TooLong(field.to_string(), max_length));
    }

    if has_forbidden_characters(trimmed) {
        return Err(ValidationError::SuspiciousContent(field.to_string()));
    }

    Ok(trimmed.to_string())
}

/// Optional free text: `None` and blank strings both come back as `None`
pub fn is_valid_optional_text(
    field: &str,
    value: Option<&str>,
    max_length: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => is_valid_text(field, text, max_length).map(Some),
    }
}

/// Avatar links must be absolute http(s) URLs without whitespace
pub fn is_valid_avatar_url(url: &str) -> Result<String, ValidationError> {
    let trimmed = url.trim();

    if trimmed.len() > MAX_URL_LENGTH {
        return Err(ValidationError::TooLong("avatar_url".to_string(), MAX_URL_LENGTH));
    }

    let has_scheme = trimmed.starts_with("https://") || trimmed.starts_with("http://");
    if !has_scheme || trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidFormat("avatar_url".to_string()));
    }

    Ok(trimmed.to_string())
}

pub fn is_valid_rating(rating: i32) -> Result<i32, ValidationError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(ValidationError::OutOfRange(
            "rating".to_string(),
            MIN_RATING as f64,
            MAX_RATING as f64,
        ));
    }
    Ok(rating)
}

pub fn is_valid_library_status(status: &str) -> Result<String, ValidationError> {
    let normalized = status.trim().to_lowercase();
    if LIBRARY_STATUSES.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(ValidationError::InvalidFormat("status".to_string()))
    }
}

pub fn is_valid_completion(percentage: f64) -> Result<f64, ValidationError> {
    if !percentage.is_finite() || !(0.0..=100.0).contains(&percentage) {
        return Err(ValidationError::OutOfRange(
            "completion_percentage".to_string(),
            0.0,
            100.0,
        ));
    }
    Ok(percentage)
}

pub fn is_valid_playtime(hours: f64) -> Result<f64, ValidationError> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(ValidationError::OutOfRange(
            "playtime_hours".to_string(),
            0.0,
            f64::MAX,
        ));
    }
    Ok(hours)
}

/// Turns a search term into an `ILIKE` pattern with wildcards escaped
pub fn search_pattern(term: &str) -> Result<String, ValidationError> {
    let trimmed = term.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("q".to_string()));
    }

    if trimmed.chars().count() > MAX_SEARCH_TERM_LENGTH {
        return Err(ValidationError::TooLong("q".to_string(), MAX_SEARCH_TERM_LENGTH));
    }

    if has_forbidden_characters(trimmed) {
        return Err(ValidationError::SuspiciousContent("q".to_string()));
    }

    let escaped = trimmed
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Ok(format!("%{}%", escaped))
}

/// Null bytes and control characters other than line breaks and tabs
fn has_forbidden_characters(text: &str) -> bool {
    text.chars()
        .any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(is_valid_email("user@example.com").is_ok());
        assert!(is_valid_email("test.email@domain.co.uk").is_ok());
        assert!(is_valid_email("user+tag@example.com").is_ok());
        assert_eq!(is_valid_email("  a@x.com ").unwrap(), "a@x.com");
    }

    #[test]
    fn test_invalid_email_format() {
        assert!(is_valid_email("invalid").is_err());
        assert!(is_valid_email("user@").is_err());
        assert!(is_valid_email("@example.com").is_err());
        assert!(is_valid_email("user@@example.com").is_err());
        assert!(is_valid_email("user@localhost").is_err());
    }

    #[test]
    fn test_email_length_limits() {
        let too_long = format!("{}@example.com", "a".repeat(250));
        assert!(is_valid_email(&too_long).is_err());

        let long_local = format!("{}@example.com", "a".repeat(65));
        assert!(matches!(
            is_valid_email(&long_local),
            Err(ValidationError::SuspiciousContent(_))
        ));

        assert!(is_valid_email("a@b").is_err());
    }

    #[test]
    fn test_usernames() {
        assert!(is_valid_username("alice").is_ok());
        assert!(is_valid_username("speed_runner_42").is_ok());
        assert!(is_valid_username("ab").is_err());
        assert!(is_valid_username(&"a".repeat(33)).is_err());
        assert!(is_valid_username("bad name").is_err());
        assert!(is_valid_username("émile").is_err());
    }

    #[test]
    fn test_password_length_cap() {
        assert!(is_valid_password_length("Abcdefg1!").is_ok());
        assert!(is_valid_password_length("").is_err());
        assert!(is_valid_password_length(&"A1!a".repeat(18)).is_ok());
        assert!(is_valid_password_length(&format!("{}b", "A1!a".repeat(18))).is_err());
        // multi-byte characters count by bytes
        assert!(is_valid_password_length(&"é".repeat(37)).is_err());
    }

    #[test]
    fn test_text_fields() {
        assert_eq!(
            is_valid_text("review_text", "  Great game  ", 100).unwrap(),
            "Great game"
        );
        assert!(is_valid_text("review_text", "   ", 100).is_err());
        assert!(is_valid_text("review_text", "abcdef", 5).is_err());
        assert!(is_valid_text("review_text", "null\0byte", 100).is_err());
        assert!(is_valid_text("review_text", "two\nlines", 100).is_ok());
    }

    #[test]
    fn test_optional_text_fields() {
        assert_eq!(is_valid_optional_text("bio", None, 10), Ok(None));
        assert_eq!(is_valid_optional_text("bio", Some("  "), 10), Ok(None));
        assert_eq!(
            is_valid_optional_text("bio", Some("hi"), 10),
            Ok(Some("hi".to_string()))
        );
        assert!(is_valid_optional_text("bio", Some("far too long"), 5).is_err());
    }

    #[test]
    fn test_avatar_urls() {
        assert!(is_valid_avatar_url("https://cdn.example.com/a.png").is_ok());
        assert!(is_valid_avatar_url("javascript:alert(1)").is_err());
        assert!(is_valid_avatar_url("https://example.com/a b.png").is_err());
        assert!(is_valid_avatar_url(&format!("https://x.com/{}", "a".repeat(600))).is_err());
    }

    #[test]
    fn test_rating_bounds() {
        assert!(is_valid_rating(1).is_ok());
        assert!(is_valid_rating(10).is_ok());
        assert!(is_valid_rating(0).is_err());
        assert!(is_valid_rating(11).is_err());
    }

    #[test]
    fn test_library_status() {
        assert_eq!(is_valid_library_status("Playing").unwrap(), "playing");
        assert!(is_valid_library_status("wishlist").is_ok());
        assert!(is_valid_library_status("owned").is_err());
    }

    #[test]
    fn test_progress_numbers() {
        assert!(is_valid_completion(0.0).is_ok());
        assert!(is_valid_completion(100.0).is_ok());
        assert!(is_valid_completion(100.5).is_err());
        assert!(is_valid_completion(f64::NAN).is_err());
        assert!(is_valid_playtime(12.5).is_ok());
        assert!(is_valid_playtime(-1.0).is_err());
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        assert_eq!(search_pattern("zelda").unwrap(), "%zelda%");
        assert_eq!(search_pattern("100%").unwrap(), "%100\\%%");
        assert_eq!(search_pattern("a_b").unwrap(), "%a\\_b%");
        assert!(search_pattern("  ").is_err());
        assert!(search_pattern(&"x".repeat(101)).is_err());
    }
}
