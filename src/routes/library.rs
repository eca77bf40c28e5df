/// Personal game library routes
///
/// All handlers run behind the JWT middleware and only ever touch rows owned
/// by the authenticated user.

use actix_web::{web, HttpResponse};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};

use crate::auth::Claims;
use crate::error::{AppError, DatabaseError};
use crate::routes::games::ensure_game_exists;
use crate::validators::{is_valid_completion, is_valid_library_status, is_valid_playtime};

const DEFAULT_STATUS: &str = "playing";

const USER_GAME_COLUMNS: &str = "user_game_id, user_id, game_id, playtime_hours, \
     completion_percentage, status, ownership_date, last_played";

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserGame {
    pub user_game_id: i64,
    pub user_id: i64,
    pub game_id: i64,
    pub playtime_hours: f64,
    pub completion_percentage: f64,
    pub status: String,
    pub ownership_date: NaiveDate,
    pub last_played: Option<DateTime<Utc>>,
}

/// Library row joined with its game and the user's unlocked achievement count
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LibraryEntry {
    pub user_game_id: i64,
    pub game_id: i64,
    pub title: String,
    pub cover_image_url: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub playtime_hours: f64,
    pub completion_percentage: f64,
    pub status: String,
    pub ownership_date: NaiveDate,
    pub last_played: Option<DateTime<Utc>>,
    pub total_achievements: i32,
    pub unlocked_achievements: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LibraryStats {
    pub total_games: i64,
    pub playing: i64,
    pub completed: i64,
    pub abandoned: i64,
    pub wishlist: i64,
    pub total_playtime: f64,
    pub avg_completion: f64,
}

/// Answer to "is this game in my library?"; entry fields only when it is
#[derive(Debug, Serialize, PartialEq)]
pub struct LibraryMembership {
    pub in_library: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_game_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playtime_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_percentage: Option<f64>,
}

impl From<Option<UserGame>> for LibraryMembership {
    fn from(entry: Option<UserGame>) -> Self {
        match entry {
            Some(entry) => Self {
                in_library: true,
                user_game_id: Some(entry.user_game_id),
                status: Some(entry.status),
                playtime_hours: Some(entry.playtime_hours),
                completion_percentage: Some(entry.completion_percentage),
            },
            None => Self {
                in_library: false,
                user_game_id: None,
                status: None,
                playtime_hours: None,
                completion_percentage: None,
            },
        }
    }
}

#[derive(Deserialize)]
pub struct AddToLibraryRequest {
    pub game_id: i64,
    pub status: Option<String>,
    pub playtime_hours: Option<f64>,
    pub completion_percentage: Option<f64>,
}

#[derive(Deserialize)]
pub struct UpdateLibraryRequest {
    pub status: Option<String>,
    pub playtime_hours: Option<f64>,
    pub completion_percentage: Option<f64>,
}

/// GET /api/library
pub async fn get_library(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let entries = sqlx::query_as::<_, LibraryEntry>(
        r#"
        SELECT
            ug.user_game_id, ug.game_id, g.title, g.cover_image_url, g.developer, g.publisher,
            ug.playtime_hours, ug.completion_percentage, ug.status, ug.ownership_date,
            ug.last_played, g.total_achievements,
            (SELECT COUNT(*) FROM user_achievements ua
                JOIN achievements a ON ua.achievement_id = a.achievement_id
                WHERE ua.user_id = ug.user_id AND a.game_id = ug.game_id) AS unlocked_achievements
        FROM user_games ug
        JOIN games g ON ug.game_id = g.game_id
        WHERE ug.user_id = $1
        ORDER BY ug.last_played DESC NULLS LAST, ug.ownership_date DESC, g.title
        "#,
    )
    .bind(user_id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(entries))
}

/// GET /api/library/stats
pub async fn library_stats(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let stats = sqlx::query_as::<_, LibraryStats>(
        r#"
        SELECT
            COUNT(*) AS total_games,
            COUNT(*) FILTER (WHERE status = 'playing') AS playing,
            COUNT(*) FILTER (WHERE status = 'completed') AS completed,
            COUNT(*) FILTER (WHERE status = 'abandoned') AS abandoned,
            COUNT(*) FILTER (WHERE status = 'wishlist') AS wishlist,
            COALESCE(SUM(playtime_hours), 0)::float8 AS total_playtime,
            COALESCE(AVG(completion_percentage), 0)::float8 AS avg_completion
        FROM user_games
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(stats))
}

/// GET /api/library/check/{game_id}
///
/// Unknown games answer `in_library: false` rather than 404.
pub async fn check_library(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let game_id = path.into_inner();

    let sql = format!(
        "SELECT {} FROM user_games WHERE user_id = $1 AND game_id = $2",
        USER_GAME_COLUMNS
    );
    let entry = sqlx::query_as::<_, UserGame>(&sql)
        .bind(user_id)
        .bind(game_id)
        .fetch_optional(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(LibraryMembership::from(entry)))
}

/// POST /api/library
///
/// # Errors
/// - 400: invalid status, playtime or completion
/// - 404: unknown game
/// - 409: game already in the library
pub async fn add_to_library(
    claims: web::ReqData<Claims>,
    form: web::Json<AddToLibraryRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let status = is_valid_library_status(form.status.as_deref().unwrap_or(DEFAULT_STATUS))?;
    let playtime = is_valid_playtime(form.playtime_hours.unwrap_or(0.0))?;
    let completion = is_valid_completion(form.completion_percentage.unwrap_or(0.0))?;

    ensure_game_exists(pool.get_ref(), form.game_id).await?;

    let mut transaction = pool.begin().await?;

    let sql = format!(
        r#"
        INSERT INTO user_games (user_id, game_id, playtime_hours, completion_percentage, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        USER_GAME_COLUMNS
    );
    let entry = sqlx::query_as::<_, UserGame>(&sql)
        .bind(user_id)
        .bind(form.game_id)
        .bind(playtime)
        .bind(completion)
        .bind(&status)
        .fetch_one(&mut transaction)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                AppError::conflict("Game is already in your library")
            }
            other => other,
        })?;

    refresh_total_playtime(&mut transaction, user_id).await?;
    transaction.commit().await?;

    tracing::info!(user_id = user_id, game_id = form.game_id, "Game added to library");

    Ok(HttpResponse::Created().json(entry))
}

/// PUT /api/library/{game_id}
pub async fn update_library_entry(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    form: web::Json<UpdateLibraryRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let game_id = path.into_inner();

    let status = form
        .status
        .as_deref()
        .map(is_valid_library_status)
        .transpose()?;
    let playtime = form.playtime_hours.map(is_valid_playtime).transpose()?;
    let completion = form
        .completion_percentage
        .map(is_valid_completion)
        .transpose()?;

    let mut transaction = pool.begin().await?;

    let sql = format!(
        r#"
        UPDATE user_games
        SET playtime_hours = COALESCE($1, playtime_hours),
            completion_percentage = COALESCE($2, completion_percentage),
            status = COALESCE($3, status),
            last_played = NOW()
        WHERE user_id = $4 AND game_id = $5
        RETURNING {}
        "#,
        USER_GAME_COLUMNS
    );
    let entry = sqlx::query_as::<_, UserGame>(&sql)
        .bind(playtime)
        .bind(completion)
        .bind(&status)
        .bind(user_id)
        .bind(game_id)
        .fetch_optional(&mut transaction)
        .await?
        .ok_or_else(|| AppError::not_found("Library entry"))?;

    refresh_total_playtime(&mut transaction, user_id).await?;
    transaction.commit().await?;

    Ok(HttpResponse::Ok().json(entry))
}

/// DELETE /api/library/{game_id}
pub async fn remove_from_library(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let game_id = path.into_inner();

    let mut transaction = pool.begin().await?;

    let result = sqlx::query("DELETE FROM user_games WHERE user_id = $1 AND game_id = $2")
        .bind(user_id)
        .bind(game_id)
        .execute(&mut transaction)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Library entry"));
    }

    refresh_total_playtime(&mut transaction, user_id).await?;
    transaction.commit().await?;

    tracing::info!(user_id = user_id, game_id = game_id, "Game removed from library");

    Ok(HttpResponse::NoContent().finish())
}

/// Keep the denormalized `users.total_playtime_hours` in step with the library
async fn refresh_total_playtime(
    transaction: &mut Transaction<'_, Postgres>,
    user_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE users
        SET total_playtime_hours =
            (SELECT COALESCE(SUM(playtime_hours), 0) FROM user_games WHERE user_id = $1)
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .execute(transaction)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_for_missing_entry_has_only_the_flag() {
        let membership = LibraryMembership::from(None);
        assert!(!membership.in_library);

        let body = serde_json::to_value(&membership).unwrap();
        assert_eq!(body, serde_json::json!({"in_library": false}));
    }

    #[test]
    fn test_membership_carries_entry_fields() {
        let entry = UserGame {
            user_game_id: 11,
            user_id: 2,
            game_id: 5,
            playtime_hours: 12.5,
            completion_percentage: 40.0,
            status: "playing".to_string(),
            ownership_date: NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
            last_played: None,
        };

        let body = serde_json::to_value(LibraryMembership::from(Some(entry))).unwrap();
        assert_eq!(body["in_library"], true);
        assert_eq!(body["user_game_id"], 11);
        assert_eq!(body["status"], "playing");
        assert_eq!(body["playtime_hours"], 12.5);
        assert_eq!(body["completion_percentage"], 40.0);
    }
}
