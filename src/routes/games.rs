/// Game catalog routes (public, read-only)

use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::AppError;
use crate::routes::pagination::{LimitQuery, Page, PageQuery};
use crate::validators::search_pattern;

const SEARCH_LIMIT: i64 = 50;
const DEFAULT_POPULAR_LIMIT: i64 = 20;

const GAME_COLUMNS: &str = r#"
    g.game_id, g.title, g.description, g.release_date, g.developer, g.publisher,
    g.cover_image_url, g.total_achievements, g.avg_completion_time_hours, g.metacritic_score,
    (SELECT AVG(r.rating)::float8 FROM reviews r WHERE r.game_id = g.game_id) AS avg_rating
"#;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Game {
    pub game_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub cover_image_url: Option<String>,
    pub total_achievements: i32,
    pub avg_completion_time_hours: Option<f64>,
    pub metacritic_score: Option<i32>,
    pub avg_rating: Option<f64>,
}

/// A game plus aggregate player and review statistics
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct GameDetails {
    pub game_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub cover_image_url: Option<String>,
    pub total_achievements: i32,
    pub avg_completion_time_hours: Option<f64>,
    pub metacritic_score: Option<i32>,
    pub avg_rating: Option<f64>,
    pub total_players: i64,
    pub avg_completion_rate: Option<f64>,
    pub review_count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PopularGame {
    pub game_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub cover_image_url: Option<String>,
    pub total_achievements: i32,
    pub avg_completion_time_hours: Option<f64>,
    pub metacritic_score: Option<i32>,
    pub avg_rating: Option<f64>,
    pub player_count: i64,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

/// GET /games?page=&size=
pub async fn list_games(
    query: web::Query<PageQuery>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let sql = format!(
        "SELECT {} FROM games g ORDER BY g.title, g.game_id LIMIT $1 OFFSET $2",
        GAME_COLUMNS
    );
    let games = sqlx::query_as::<_, Game>(&sql)
        .bind(query.size())
        .bind(query.offset())
        .fetch_all(pool.get_ref())
        .await?;

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM games")
        .fetch_one(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(Page::new(games, total, &query)))
}

/// GET /games/search?q=
pub async fn search_games(
    query: web::Query<SearchQuery>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let pattern = search_pattern(&query.q)?;

    let sql = format!(
        "SELECT {} FROM games g WHERE g.title ILIKE $1 ORDER BY g.title LIMIT $2",
        GAME_COLUMNS
    );
    let games = sqlx::query_as::<_, Game>(&sql)
        .bind(&pattern)
        .bind(SEARCH_LIMIT)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(games))
}

/// GET /games/popular?limit=
///
/// Games ordered by how many distinct users hold them in a library.
pub async fn popular_games(
    query: web::Query<LimitQuery>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let sql = format!(
        r#"
        SELECT {},
            (SELECT COUNT(DISTINCT ug.user_id) FROM user_games ug
                WHERE ug.game_id = g.game_id) AS player_count
        FROM games g
        ORDER BY player_count DESC, g.title
        LIMIT $1
        "#,
        GAME_COLUMNS
    );
    let games = sqlx::query_as::<_, PopularGame>(&sql)
        .bind(query.limit(DEFAULT_POPULAR_LIMIT))
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(games))
}

/// GET /games/{id}
pub async fn get_game(
    path: web::Path<i64>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let game_id = path.into_inner();

    let sql = format!(
        r#"
        SELECT {},
            (SELECT COUNT(*) FROM user_games ug WHERE ug.game_id = g.game_id) AS total_players,
            (SELECT AVG(ug.completion_percentage)::float8
                FROM user_games ug WHERE ug.game_id = g.game_id) AS avg_completion_rate,
            (SELECT COUNT(*) FROM reviews r WHERE r.game_id = g.game_id) AS review_count
        FROM games g
        WHERE g.game_id = $1
        "#,
        GAME_COLUMNS
    );
    let game = sqlx::query_as::<_, GameDetails>(&sql)
        .bind(game_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Game"))?;

    Ok(HttpResponse::Ok().json(game))
}

/// Shared existence check for routes that take a game id
pub(crate) async fn ensure_game_exists(pool: &PgPool, game_id: i64) -> Result<(), AppError> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM games WHERE game_id = $1)")
            .bind(game_id)
            .fetch_one(pool)
            .await?;

    if exists {
        Ok(())
    } else {
        Err(AppError::not_found("Game"))
    }
}
