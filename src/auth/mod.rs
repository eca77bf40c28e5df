/// Authentication module
///
/// Password hashing, the password strength policy and bearer token
/// issuance/validation.

mod claims;
mod jwt;
mod password;

pub use claims::Claims;
pub use jwt::TokenService;
pub use password::hash_password;
pub use password::is_password_strong;
pub use password::validate_password_strength;
pub use password::verify_against_dummy;
pub use password::verify_password;
pub use password::MAX_PASSWORD_BYTES;
pub use password::BCRYPT_COST;
