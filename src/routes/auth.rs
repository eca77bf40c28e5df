/// Account routes
///
/// Registration, login and the current user's profile.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::{
    hash_password, validate_password_strength, verify_against_dummy, verify_password, Claims,
    TokenService,
};
use crate::error::{AppError, AuthError, DatabaseError, ErrorContext, ValidationError};
use crate::validators::{
    is_valid_avatar_url, is_valid_email, is_valid_optional_text, is_valid_password_length,
    is_valid_username,
};

const MAX_DISPLAY_NAME_LENGTH: usize = 64;
const MAX_BIO_LENGTH: usize = 1000;
const MAX_COUNTRY_LENGTH: usize = 64;

const PROFILE_COLUMNS: &str = "user_id, username, email, display_name, bio, avatar_url, country, \
     total_achievements, total_playtime_hours, account_created, last_login";

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub country: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Profile fields a user may change; absent fields are left untouched
#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub country: Option<String>,
    pub avatar_url: Option<String>,
}

/// Public view of a user. The password hash is never selected into it.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub country: Option<String>,
    pub total_achievements: i32,
    pub total_playtime_hours: f64,
    pub account_created: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct StoredCredentials {
    user_id: i64,
    password_hash: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserProfile,
}

impl AuthResponse {
    fn new(token: String, expires_in: i64, user: UserProfile) -> Self {
        Self {
            token,
            token_type: "Bearer".to_string(),
            expires_in,
            user,
        }
    }
}

/// POST /auth/register
///
/// Input checks and the password policy run before any database access.
///
/// # Errors
/// - 400: invalid field or weak password
/// - 409: username or email already registered
pub async fn register(
    req: HttpRequest,
    form: web::Json<RegisterRequest>,
    pool: web::Data<PgPool>,
    tokens: web::Data<TokenService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::for_request("user_registration", &req);

    let username = is_valid_username(&form.username)?;
    let email = is_valid_email(&form.email)?.to_lowercase();
    let display_name = is_valid_optional_text(
        "display_name",
        form.display_name.as_deref(),
        MAX_DISPLAY_NAME_LENGTH,
    )?;
    let country = is_valid_optional_text("country", form.country.as_deref(), MAX_COUNTRY_LENGTH)?;
    is_valid_password_length(&form.password)?;
    validate_password_strength(&form.password)?;

    if username_exists(pool.get_ref(), &username).await? {
        return Err(AuthError::DuplicateIdentity("Username".to_string()).into());
    }
    if email_exists(pool.get_ref(), &email).await? {
        return Err(AuthError::DuplicateIdentity("Email".to_string()).into());
    }

    let password = form.password.clone();
    let password_hash = web::block(move || hash_password(&password)).await??;

    let sql = format!(
        r#"
        INSERT INTO users (username, email, password_hash, display_name, country)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        PROFILE_COLUMNS
    );
    let user = sqlx::query_as::<_, UserProfile>(&sql)
        .bind(&username)
        .bind(&email)
        .bind(&password_hash)
        .bind(&display_name)
        .bind(&country)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| match AppError::from(e) {
            // lost a race with a concurrent registration
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                AppError::Auth(AuthError::DuplicateIdentity("Username or email".to_string()))
            }
            other => other,
        })?;

    let token = tokens.issue(user.user_id, &user.username, &user.email)?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = user.user_id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(AuthResponse::new(token, tokens.token_expiry(), user)))
}

/// POST /auth/login
///
/// Unknown email and wrong password produce the same 401 response.
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    tokens: web::Data<TokenService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::for_request("user_login", &req);

    let email = form.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()).into());
    }
    if form.password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()).into());
    }

    let credentials = sqlx::query_as::<_, StoredCredentials>(
        "SELECT user_id, password_hash FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await?;

    let credentials = match credentials {
        Some(credentials) => credentials,
        None => {
            // Same bcrypt work as a wrong password so timing does not reveal the account
            let password = form.password.clone();
            web::block(move || verify_against_dummy(&password)).await?;
            return Err(AppError::Auth(AuthError::InvalidCredentials));
        }
    };

    let password = form.password.clone();
    let password_hash = credentials.password_hash;
    let password_valid = web::block(move || verify_password(&password, &password_hash)).await?;
    if !password_valid {
        let err = AppError::Auth(AuthError::InvalidCredentials);
        context.with_user_id(credentials.user_id).log_error(&err);
        return Err(err);
    }

    let sql = format!(
        "UPDATE users SET last_login = NOW() WHERE user_id = $1 RETURNING {}",
        PROFILE_COLUMNS
    );
    let user = sqlx::query_as::<_, UserProfile>(&sql)
        .bind(credentials.user_id)
        .fetch_one(pool.get_ref())
        .await?;

    let token = tokens.issue(user.user_id, &user.username, &user.email)?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = user.user_id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok().json(AuthResponse::new(token, tokens.token_expiry(), user)))
}

/// GET /api/me
pub async fn get_current_user(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let user = fetch_profile(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(HttpResponse::Ok().json(user))
}

/// PUT /api/me
pub async fn update_profile(
    claims: web::ReqData<Claims>,
    form: web::Json<UpdateProfileRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let display_name = is_valid_optional_text(
        "display_name",
        form.display_name.as_deref(),
        MAX_DISPLAY_NAME_LENGTH,
    )?;
    let bio = is_valid_optional_text("bio", form.bio.as_deref(), MAX_BIO_LENGTH)?;
    let country = is_valid_optional_text("country", form.country.as_deref(), MAX_COUNTRY_LENGTH)?;
    let avatar_url = form
        .avatar_url
        .as_deref()
        .map(is_valid_avatar_url)
        .transpose()?;

    let sql = format!(
        r#"
        UPDATE users
        SET display_name = COALESCE($1, display_name),
            bio = COALESCE($2, bio),
            country = COALESCE($3, country),
            avatar_url = COALESCE($4, avatar_url)
        WHERE user_id = $5
        RETURNING {}
        "#,
        PROFILE_COLUMNS
    );
    let user = sqlx::query_as::<_, UserProfile>(&sql)
        .bind(&display_name)
        .bind(&bio)
        .bind(&country)
        .bind(&avatar_url)
        .bind(user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    tracing::info!(user_id = user_id, "Profile updated");

    Ok(HttpResponse::Ok().json(user))
}

async fn fetch_profile(pool: &PgPool, user_id: i64) -> Result<Option<UserProfile>, sqlx::Error> {
    let sql = format!("SELECT {} FROM users WHERE user_id = $1", PROFILE_COLUMNS);
    sqlx::query_as::<_, UserProfile>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

async fn username_exists(pool: &PgPool, username: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
        .bind(username)
        .fetch_one(pool)
        .await
}

async fn email_exists(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_optional_fields() {
        let json = r#"{"username": "alice", "email": "a@x.com", "password": "Abcdefg1!"}"#;
        let request: RegisterRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.username, "alice");
        assert!(request.display_name.is_none());
        assert!(request.country.is_none());
    }

    #[test]
    fn test_profile_serialization_has_no_password_field() {
        let profile = UserProfile {
            user_id: 1,
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            display_name: None,
            bio: None,
            avatar_url: None,
            country: Some("NO".to_string()),
            total_achievements: 0,
            total_playtime_hours: 0.0,
            account_created: Utc::now(),
            last_login: None,
        };
        let response = AuthResponse::new("token".to_string(), 3600, profile);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["user"]["username"], "alice");
        assert!(json["user"].get("password_hash").is_none());
    }
}
