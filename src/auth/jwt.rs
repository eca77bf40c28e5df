/// Bearer token issuance and validation
///
/// Tokens are compact HS256 JWTs (`header.claims.signature`). The service is
/// built once from `JwtSettings` and shared read-only across workers.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_expiry: i64,
}

impl TokenService {
    pub fn new(config: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            token_expiry: config.token_expiry,
        }
    }

    /// Token lifetime in seconds
    pub fn token_expiry(&self) -> i64 {
        self.token_expiry
    }

    /// Sign a new token for the given identity
    ///
    /// # Errors
    /// Returns `AppError::Internal` if the claims cannot be serialized or signed
    pub fn issue(&self, user_id: i64, username: &str, email: &str) -> Result<String, AppError> {
        let claims = Claims::new(
            user_id,
            username.to_string(),
            email.to_string(),
            self.token_expiry,
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify signature, structure and expiry, then return the claims
    ///
    /// Every failure collapses into `InvalidOrExpiredToken`; the cause is
    /// only logged.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(reason = %e, "Token rejected");
                AuthError::InvalidOrExpiredToken
            })
    }

    pub fn validate(&self, token: &str) -> bool {
        self.decode(token).is_ok()
    }

    /// User id of a token that passes full validation
    pub fn extract_user_id(&self, token: &str) -> Result<i64, AuthError> {
        self.decode(token)?.user_id()
    }
}
