/// Token claims
///
/// Payload of every bearer token: the user's identity plus the standard
/// `iat`/`exp` timestamps (RFC 7519).

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (user id as a decimal string)
    pub sub: String,
    pub username: String,
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Claims for `user_id` valid for `expiry_seconds` from now
    pub fn new(user_id: i64, username: String, email: String, expiry_seconds: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            username,
            email,
            iat: now,
            exp: now + expiry_seconds,
        }
    }

    /// User id carried in `sub`
    ///
    /// Only meaningful on claims that came out of `TokenService::decode`.
    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidOrExpiredToken)
    }
}
