use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::auth::Claims;
use crate::error::AppError;
use crate::routes::games::ensure_game_exists;
use crate::routes::pagination::LimitQuery;

const DEFAULT_UNLOCK_LIMIT: i64 = 10;

const UNLOCKED_SELECT: &str = r#"
    SELECT a.achievement_id, a.game_id, g.title AS game_title, a.name, a.description,
        a.icon_url, a.points_value, a.rarity_percentage, ua.unlocked_at
    FROM user_achievements ua
    JOIN achievements a ON ua.achievement_id = a.achievement_id
    JOIN games g ON a.game_id = g.game_id
"#;

/// Hidden achievements keep their name but not their description
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Achievement {
    pub achievement_id: i64,
    pub game_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub points_value: i32,
    pub rarity_percentage: Option<f64>,
    pub is_hidden: bool,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UnlockedAchievement {
    pub achievement_id: i64,
    pub game_id: i64,
    pub game_title: String,
    pub name: String,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub points_value: i32,
    pub rarity_percentage: Option<f64>,
    pub unlocked_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct AchievementProgress {
    pub game_id: i64,
    pub total_achievements: i64,
    pub unlocked_achievements: i64,
    pub completion_percentage: f64,
}

impl AchievementProgress {
    pub fn new(game_id: i64, total_achievements: i64, unlocked_achievements: i64) -> Self {
        let completion_percentage = if total_achievements > 0 {
            unlocked_achievements as f64 * 100.0 / total_achievements as f64
        } else {
            0.0
        };
        Self {
            game_id,
            total_achievements,
            unlocked_achievements,
            completion_percentage,
        }
    }
}

/// GET /games/{id}/achievements
pub async fn game_achievements(
    path: web::Path<i64>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let game_id = path.into_inner();
    ensure_game_exists(pool.get_ref(), game_id).await?;

    let achievements = sqlx::query_as::<_, Achievement>(
        r#"
        SELECT achievement_id, game_id, name,
            CASE WHEN is_hidden THEN NULL ELSE description END AS description,
            icon_url, points_value, rarity_percentage, is_hidden
        FROM achievements
        WHERE game_id = $1
        ORDER BY points_value DESC, name
        "#,
    )
    .bind(game_id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(achievements))
}

/// GET /api/achievements
pub async fn my_achievements(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let sql = format!("{} WHERE ua.user_id = $1 ORDER BY ua.unlocked_at DESC", UNLOCKED_SELECT);
    let achievements = sqlx::query_as::<_, UnlockedAchievement>(&sql)
        .bind(user_id)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(achievements))
}

/// GET /api/achievements/recent?limit=
pub async fn recent_achievements(
    claims: web::ReqData<Claims>,
    query: web::Query<LimitQuery>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let sql = format!(
        "{} WHERE ua.user_id = $1 ORDER BY ua.unlocked_at DESC, a.achievement_id LIMIT $2",
        UNLOCKED_SELECT
    );
    let achievements = sqlx::query_as::<_, UnlockedAchievement>(&sql)
        .bind(user_id)
        .bind(query.limit(DEFAULT_UNLOCK_LIMIT))
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(achievements))
}

/// GET /api/achievements/rarest?limit=
///
/// The user's unlocks, rarest first. Achievements without a rarity figure
/// sort last.
pub async fn rarest_achievements(
    claims: web::ReqData<Claims>,
    query: web::Query<LimitQuery>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let sql = format!(
        r#"{} WHERE ua.user_id = $1
        ORDER BY a.rarity_percentage ASC NULLS LAST, ua.unlocked_at DESC
        LIMIT $2"#,
        UNLOCKED_SELECT
    );
    let achievements = sqlx::query_as::<_, UnlockedAchievement>(&sql)
        .bind(user_id)
        .bind(query.limit(DEFAULT_UNLOCK_LIMIT))
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(achievements))
}

/// GET /api/achievements/games/{game_id}/progress
pub async fn game_progress(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let game_id = path.into_inner();
    ensure_game_exists(pool.get_ref(), game_id).await?;

    let (total, unlocked) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(ua.achievement_id) AS unlocked
        FROM achievements a
        LEFT JOIN user_achievements ua
            ON ua.achievement_id = a.achievement_id AND ua.user_id = $1
        WHERE a.game_id = $2
        "#,
    )
    .bind(user_id)
    .bind(game_id)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(AchievementProgress::new(game_id, total, unlocked)))
}

/// POST /api/achievements/{id}/unlock
///
/// Records the unlock and bumps the user's achievement counter in one
/// transaction.
///
/// # Errors
/// - 404: unknown achievement
/// - 409: already unlocked by this user
pub async fn unlock_achievement(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let achievement_id = path.into_inner();

    let mut transaction = pool.begin().await?;

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM achievements WHERE achievement_id = $1)",
    )
    .bind(achievement_id)
    .fetch_one(&mut transaction)
    .await?;
    if !exists {
        return Err(AppError::not_found("Achievement"));
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO user_achievements (user_id, achievement_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, achievement_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(achievement_id)
    .execute(&mut transaction)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(AppError::conflict("Achievement already unlocked"));
    }

    sqlx::query("UPDATE users SET total_achievements = total_achievements + 1 WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut transaction)
        .await?;

    let sql = format!("{} WHERE ua.user_id = $1 AND ua.achievement_id = $2", UNLOCKED_SELECT);
    let unlocked = sqlx::query_as::<_, UnlockedAchievement>(&sql)
        .bind(user_id)
        .bind(achievement_id)
        .fetch_one(&mut transaction)
        .await?;

    transaction.commit().await?;

    tracing::info!(
        user_id = user_id,
        achievement_id = achievement_id,
        "Achievement unlocked"
    );

    Ok(HttpResponse::Created().json(unlocked))
}
