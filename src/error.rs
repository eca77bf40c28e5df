/// Application error types
///
/// Every fallible operation returns one of the closed set of errors below.
/// Handlers propagate them with `?` and the `ResponseError` impl turns each
/// kind into a fixed HTTP status, a stable code and a JSON body.

use actix_web::{error::ResponseError, http::StatusCode, HttpMessage, HttpRequest, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

use crate::logger::RequestId;

/// Rejected user input; the `String` is always the offending field name
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    OutOfRange(String, f64, f64),
    SuspiciousContent(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} must not be empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} must be at least {} characters", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} must be at most {} characters", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} is not valid", field),
            ValidationError::OutOfRange(field, min, max) if *max == f64::MAX => {
                write!(f, "{} must be at least {}", field, min)
            }
            ValidationError::OutOfRange(field, min, max) => {
                write!(f, "{} must be between {} and {}", field, min, max)
            }
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains characters that are not allowed", field)
            }
        }
    }
}

impl StdError for ValidationError {}

/// Persistence failures. `NotFound` and `UniqueConstraintViolation` carry a
/// client-facing description; the other two carry driver detail for the logs.
#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    NotFound(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => write!(f, "{}", msg),
            DatabaseError::NotFound(what) => write!(f, "{} not found", what),
            DatabaseError::ConnectionPool(detail) => write!(f, "Database unavailable: {}", detail),
            DatabaseError::UnexpectedError(detail) => write!(f, "Query failed: {}", detail),
        }
    }
}

impl StdError for DatabaseError {}

#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(key) => write!(f, "{} is not set", key),
            ConfigError::InvalidValue(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for ConfigError {}

/// Authentication and registration failures
///
/// `InvalidOrExpiredToken` covers bad signatures, malformed tokens and
/// expired tokens alike.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    InvalidCredentials,
    WeakPassword,
    DuplicateIdentity(String),
    InvalidOrExpiredToken,
    MissingToken,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid email or password"),
            AuthError::WeakPassword => write!(
                f,
                "Password must be at least 8 characters and contain an uppercase letter, \
                 a lowercase letter, a digit and one of @$!%*?&"
            ),
            AuthError::DuplicateIdentity(field) => write!(f, "{} is already registered", field),
            AuthError::InvalidOrExpiredToken => write!(f, "Invalid or expired token"),
            AuthError::MissingToken => write!(f, "Authorization header with a bearer token is required"),
        }
    }
}

impl StdError for AuthError {}

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Database(DatabaseError),
    Auth(AuthError),
    Config(ConfigError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => e.fmt(f),
            AppError::Database(e) => e.fmt(f),
            AppError::Auth(e) => e.fmt(f),
            AppError::Config(e) => e.fmt(f),
            AppError::Internal(detail) => write!(f, "{}", detail),
        }
    }
}

impl StdError for AppError {}

impl AppError {
    /// 404 for a missing or foreign row, e.g. `AppError::not_found("Review")`
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::Database(DatabaseError::NotFound(what.into()))
    }

    /// 409 with a message the client can show as is
    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Database(DatabaseError::UniqueConstraintViolation(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => StatusCode::CONFLICT,
            AppError::Database(DatabaseError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Database(DatabaseError::ConnectionPool(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Auth(AuthError::WeakPassword) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::DuplicateIdentity(_)) => StatusCode::CONFLICT,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(DatabaseError::UnexpectedError(_))
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => "DUPLICATE_ENTRY",
            AppError::Database(DatabaseError::NotFound(_)) => "NOT_FOUND",
            AppError::Database(DatabaseError::ConnectionPool(_)) => "SERVICE_UNAVAILABLE",
            AppError::Database(DatabaseError::UnexpectedError(_)) => "DATABASE_ERROR",
            AppError::Auth(AuthError::InvalidCredentials) => "INVALID_CREDENTIALS",
            AppError::Auth(AuthError::WeakPassword) => "WEAK_PASSWORD",
            AppError::Auth(AuthError::DuplicateIdentity(_)) => "DUPLICATE_IDENTITY",
            AppError::Auth(AuthError::InvalidOrExpiredToken) => "TOKEN_INVALID",
            AppError::Auth(AuthError::MissingToken) => "MISSING_TOKEN",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Server-side failures never expose their detail to the client
    fn public_message(&self) -> String {
        match self {
            AppError::Database(DatabaseError::ConnectionPool(_)) => {
                "Service temporarily unavailable".to_string()
            }
            AppError::Database(DatabaseError::UnexpectedError(_))
            | AppError::Config(_)
            | AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn to_body(&self, error_id: &str) -> ErrorResponse {
        ErrorResponse {
            error_id: error_id.to_string(),
            message: self.public_message(),
            code: self.code().to_string(),
            status: self.status().as_u16(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn log(&self, error_id: &str) {
        let code = self.code();
        match self {
            // the email is not logged for failed logins
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(error_id = error_id, code = code, "Rejected login");
            }
            _ if self.status().is_server_error() => {
                tracing::error!(error_id = error_id, code = code, error = %self, "Request failed");
            }
            _ => {
                tracing::warn!(error_id = error_id, code = code, error = %self, "Request rejected");
            }
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Postgres SQLSTATE codes with a domain meaning
fn database_error_for_sqlstate(code: Option<&str>) -> Option<DatabaseError> {
    match code? {
        UNIQUE_VIOLATION => Some(DatabaseError::UniqueConstraintViolation(
            "Resource already exists".to_string(),
        )),
        // the row being referenced disappeared between check and insert
        FOREIGN_KEY_VIOLATION => Some(DatabaseError::NotFound("Referenced record".to_string())),
        _ => None,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let db_err = match &err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record".to_string()),
            sqlx::Error::Database(e) => match database_error_for_sqlstate(e.code().as_deref()) {
                Some(mapped) => {
                    tracing::debug!(constraint = ?e.constraint(), "Constraint violated");
                    mapped
                }
                None => DatabaseError::UnexpectedError(err.to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionPool(err.to_string())
            }
            _ => DatabaseError::UnexpectedError(err.to_string()),
        };
        AppError::Database(db_err)
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::Internal(format!("blocking task failed: {}", err))
    }
}

/// JSON body of every error response
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Matches the `error_id` field of the corresponding log line
    pub error_id: String,
    pub message: String,
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log(&error_id);
        HttpResponse::build(self.status()).json(self.to_body(&error_id))
    }

    fn status_code(&self) -> StatusCode {
        self.status()
    }
}

/// Names the operation a handler is performing so that failures it logs
/// itself (before returning them) carry the same fields every time.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub operation: &'static str,
    pub user_id: Option<i64>,
}

impl ErrorContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation,
            user_id: None,
        }
    }

    /// Reuses the id `RequestLogger` assigned, so handler logs line up with
    /// the `x-request-id` the client sees
    pub fn for_request(operation: &'static str, req: &HttpRequest) -> Self {
        let request_id = req.extensions().get::<RequestId>().map(|id| id.0.clone());
        match request_id {
            Some(request_id) => Self {
                request_id,
                operation,
                user_id: None,
            },
            None => Self::new(operation),
        }
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn log_error(&self, error: &AppError) {
        tracing::warn!(
            request_id = %self.request_id,
            operation = self.operation,
            user_id = ?self.user_id,
            code = error.code(),
            "Operation rejected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_name_the_field() {
        let err = ValidationError::EmptyField("email".to_string());
        assert_eq!(err.to_string(), "email must not be empty");

        let err = ValidationError::OutOfRange("rating".to_string(), 1.0, 10.0);
        assert_eq!(err.to_string(), "rating must be between 1 and 10");

        let err = ValidationError::OutOfRange("playtime_hours".to_string(), 0.0, f64::MAX);
        assert_eq!(err.to_string(), "playtime_hours must be at least 0");
    }

    #[test]
    fn test_auth_errors_map_to_distinct_statuses() {
        let cases = [
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::WeakPassword, StatusCode::BAD_REQUEST),
            (
                AuthError::DuplicateIdentity("Username".to_string()),
                StatusCode::CONFLICT,
            ),
            (AuthError::InvalidOrExpiredToken, StatusCode::UNAUTHORIZED),
            (AuthError::MissingToken, StatusCode::UNAUTHORIZED),
        ];

        for (err, expected) in cases {
            let app_err: AppError = err.into();
            assert_eq!(ResponseError::status_code(&app_err), expected);
        }
    }

    #[test]
    fn test_token_errors_share_one_body() {
        let body = AppError::Auth(AuthError::InvalidOrExpiredToken).to_body("req-1");
        assert_eq!(body.error_id, "req-1");
        assert_eq!(body.code, "TOKEN_INVALID");
        assert_eq!(body.message, "Invalid or expired token");
        assert_eq!(body.status, 401);
    }

    #[test]
    fn test_server_errors_hide_details() {
        let body = AppError::Internal("bcrypt rng unavailable".to_string()).to_body("req-2");
        assert_eq!(body.status, 500);
        assert_eq!(body.message, "Internal server error");

        let body = AppError::from(sqlx::Error::PoolTimedOut).to_body("req-3");
        assert_eq!(body.status, 503);
        assert!(!body.message.contains("pool"));
    }

    #[test]
    fn test_domain_helpers() {
        let missing = AppError::not_found("Review");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.to_string(), "Review not found");

        let conflict = AppError::conflict("You have already liked this review");
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(
            conflict.to_body("x").message,
            "You have already liked this review"
        );
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        let app_err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(app_err.status(), StatusCode::NOT_FOUND);
        assert_eq!(app_err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_sqlstate_mapping() {
        let fk = AppError::Database(
            database_error_for_sqlstate(Some("23503")).expect("foreign key code is mapped"),
        );
        assert_eq!(fk.status(), StatusCode::NOT_FOUND);
        assert_eq!(fk.code(), "NOT_FOUND");

        let unique = AppError::Database(
            database_error_for_sqlstate(Some("23505")).expect("unique code is mapped"),
        );
        assert_eq!(unique.status(), StatusCode::CONFLICT);

        assert!(database_error_for_sqlstate(Some("40001")).is_none());
        assert!(database_error_for_sqlstate(None).is_none());
    }

    #[test]
    fn test_error_context_tracks_user() {
        let ctx = ErrorContext::new("user_login");
        assert_eq!(ctx.operation, "user_login");
        assert!(ctx.user_id.is_none());
        assert_eq!(ctx.with_user_id(42).user_id, Some(42));
    }

    #[test]
    fn test_error_context_reuses_request_id() {
        let req = actix_web::test::TestRequest::default().to_http_request();
        req.extensions_mut()
            .insert(RequestId("abc-123".to_string()));

        let ctx = ErrorContext::for_request("user_registration", &req);
        assert_eq!(ctx.request_id, "abc-123");
    }
}
