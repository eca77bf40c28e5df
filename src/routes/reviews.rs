/// Reviews, helpful votes, likes and replies
///
/// Listing routes are public. Everything that writes runs under `/api` and
/// acts as the authenticated user; edits and deletes only match rows that
/// user owns, so someone else's review looks exactly like a missing one.

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::Claims;
use crate::error::{AppError, DatabaseError};
use crate::routes::games::ensure_game_exists;
use crate::routes::pagination::{LimitQuery, Page, PageQuery};
use crate::validators::{is_valid_rating, is_valid_text};

const MAX_REVIEW_LENGTH: usize = 5000;
const MAX_REPLY_LENGTH: usize = 2000;
const DEFAULT_RECENT_LIMIT: i64 = 10;

const REVIEW_SELECT: &str = r#"
    SELECT
        r.review_id, r.user_id, u.username, r.game_id, g.title AS game_title,
        r.rating, r.review_text, r.recommended, r.helpful_count, r.not_helpful_count,
        r.review_date, r.last_updated,
        (SELECT COUNT(*) FROM review_likes l WHERE l.review_id = r.review_id) AS likes_count,
        (SELECT COUNT(*) FROM review_replies p WHERE p.review_id = r.review_id) AS replies_count
    FROM reviews r
    JOIN users u ON r.user_id = u.user_id
    JOIN games g ON r.game_id = g.game_id
"#;

const REPLY_SELECT: &str = r#"
    SELECT p.reply_id, p.review_id, p.user_id, u.username, p.reply_text, p.created_at
    FROM review_replies p
    JOIN users u ON p.user_id = u.user_id
"#;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Review {
    pub review_id: i64,
    pub user_id: i64,
    pub username: String,
    pub game_id: i64,
    pub game_title: String,
    pub rating: i32,
    pub review_text: String,
    pub recommended: bool,
    pub helpful_count: i32,
    pub not_helpful_count: i32,
    pub review_date: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
    pub likes_count: i64,
    pub replies_count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Reply {
    pub reply_id: i64,
    pub review_id: i64,
    pub user_id: i64,
    pub username: String,
    pub reply_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct VoteTally {
    pub review_id: i64,
    pub helpful_count: i32,
    pub not_helpful_count: i32,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LikeStatus {
    pub review_id: i64,
    pub liked: bool,
    pub likes_count: i64,
}

#[derive(Deserialize)]
pub struct CreateReviewRequest {
    pub game_id: i64,
    pub rating: i32,
    pub review_text: String,
    pub recommended: Option<bool>,
}

impl CreateReviewRequest {
    /// A review recommends the game unless the client says otherwise
    pub fn recommends(&self) -> bool {
        self.recommended.unwrap_or(true)
    }
}

#[derive(Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: Option<i32>,
    pub review_text: Option<String>,
    pub recommended: Option<bool>,
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub helpful: bool,
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    pub reply_text: String,
}

/// GET /games/{id}/reviews?page=&size=
pub async fn game_reviews(
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let game_id = path.into_inner();
    ensure_game_exists(pool.get_ref(), game_id).await?;

    let sql = format!(
        "{} WHERE r.game_id = $1 ORDER BY r.helpful_count DESC, r.review_date DESC LIMIT $2 OFFSET $3",
        REVIEW_SELECT
    );
    let reviews = sqlx::query_as::<_, Review>(&sql)
        .bind(game_id)
        .bind(query.size())
        .bind(query.offset())
        .fetch_all(pool.get_ref())
        .await?;

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE game_id = $1")
        .bind(game_id)
        .fetch_one(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(Page::new(reviews, total, &query)))
}

/// GET /reviews/recent?limit=
pub async fn recent_reviews(
    query: web::Query<LimitQuery>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let sql = format!("{} ORDER BY r.review_date DESC, r.review_id DESC LIMIT $1", REVIEW_SELECT);
    let reviews = sqlx::query_as::<_, Review>(&sql)
        .bind(query.limit(DEFAULT_RECENT_LIMIT))
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(reviews))
}

/// GET /users/{id}/reviews
pub async fn user_reviews(
    path: web::Path<i64>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();

    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE user_id = $1)")
            .bind(user_id)
            .fetch_one(pool.get_ref())
            .await?;
    if !exists {
        return Err(AppError::not_found("User"));
    }

    let sql = format!("{} WHERE r.user_id = $1 ORDER BY r.review_date DESC", REVIEW_SELECT);
    let reviews = sqlx::query_as::<_, Review>(&sql)
        .bind(user_id)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(reviews))
}

/// POST /api/reviews
///
/// # Errors
/// - 400: rating outside 1-10 or empty/oversized text
/// - 404: unknown game
/// - 409: the user already reviewed this game
pub async fn create_review(
    claims: web::ReqData<Claims>,
    form: web::Json<CreateReviewRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let rating = is_valid_rating(form.rating)?;
    let review_text = is_valid_text("review_text", &form.review_text, MAX_REVIEW_LENGTH)?;
    let recommended = form.recommends();

    ensure_game_exists(pool.get_ref(), form.game_id).await?;

    let review_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO reviews (user_id, game_id, rating, review_text, recommended)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING review_id
        "#,
    )
    .bind(user_id)
    .bind(form.game_id)
    .bind(rating)
    .bind(&review_text)
    .bind(recommended)
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
            AppError::conflict("You have already reviewed this game")
        }
        other => other,
    })?;

    let review = fetch_review(pool.get_ref(), review_id)
        .await?
        .ok_or_else(|| AppError::not_found("Review"))?;

    tracing::info!(
        user_id = user_id,
        game_id = form.game_id,
        review_id = review_id,
        "Review created"
    );

    Ok(HttpResponse::Created().json(review))
}

/// PUT /api/reviews/{id}
pub async fn update_review(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    form: web::Json<UpdateReviewRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let review_id = path.into_inner();

    let rating = form.rating.map(is_valid_rating).transpose()?;
    let review_text = form
        .review_text
        .as_deref()
        .map(|text| is_valid_text("review_text", text, MAX_REVIEW_LENGTH))
        .transpose()?;

    let updated = sqlx::query(
        r#"
        UPDATE reviews
        SET rating = COALESCE($1, rating),
            review_text = COALESCE($2, review_text),
            recommended = COALESCE($3, recommended),
            last_updated = NOW()
        WHERE review_id = $4 AND user_id = $5
        "#,
    )
    .bind(rating)
    .bind(&review_text)
    .bind(form.recommended)
    .bind(review_id)
    .bind(user_id)
    .execute(pool.get_ref())
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::not_found("Review"));
    }

    let review = fetch_review(pool.get_ref(), review_id)
        .await?
        .ok_or_else(|| AppError::not_found("Review"))?;

    Ok(HttpResponse::Ok().json(review))
}

/// DELETE /api/reviews/{id}
pub async fn delete_review(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let review_id = path.into_inner();

    let result = sqlx::query("DELETE FROM reviews WHERE review_id = $1 AND user_id = $2")
        .bind(review_id)
        .bind(user_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Review"));
    }

    tracing::info!(user_id = user_id, review_id = review_id, "Review deleted");

    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/reviews/{id}/vote
pub async fn vote_review(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    form: web::Json<VoteRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let review_id = path.into_inner();

    let tally = sqlx::query_as::<_, VoteTally>(
        r#"
        UPDATE reviews
        SET helpful_count = helpful_count + CASE WHEN $1 THEN 1 ELSE 0 END,
            not_helpful_count = not_helpful_count + CASE WHEN $1 THEN 0 ELSE 1 END
        WHERE review_id = $2
        RETURNING review_id, helpful_count, not_helpful_count
        "#,
    )
    .bind(form.helpful)
    .bind(review_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::not_found("Review"))?;

    tracing::debug!(
        user_id = user_id,
        review_id = review_id,
        helpful = form.helpful,
        "Review vote recorded"
    );

    Ok(HttpResponse::Ok().json(tally))
}

/// GET /api/reviews/{id}/like
pub async fn like_status(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let review_id = path.into_inner();
    ensure_review_exists(pool.get_ref(), review_id).await?;

    let liked = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM review_likes WHERE review_id = $1 AND user_id = $2)",
    )
    .bind(review_id)
    .bind(user_id)
    .fetch_one(pool.get_ref())
    .await?;

    let likes_count = count_likes(pool.get_ref(), review_id).await?;

    Ok(HttpResponse::Ok().json(LikeStatus {
        review_id,
        liked,
        likes_count,
    }))
}

/// POST /api/reviews/{id}/like
pub async fn like_review(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let review_id = path.into_inner();
    ensure_review_exists(pool.get_ref(), review_id).await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO review_likes (review_id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (review_id, user_id) DO NOTHING
        "#,
    )
    .bind(review_id)
    .bind(user_id)
    .execute(pool.get_ref())
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(AppError::conflict("You have already liked this review"));
    }

    let likes_count = count_likes(pool.get_ref(), review_id).await?;

    Ok(HttpResponse::Ok().json(LikeStatus {
        review_id,
        liked: true,
        likes_count,
    }))
}

/// DELETE /api/reviews/{id}/like
pub async fn unlike_review(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let review_id = path.into_inner();

    let removed = sqlx::query("DELETE FROM review_likes WHERE review_id = $1 AND user_id = $2")
        .bind(review_id)
        .bind(user_id)
        .execute(pool.get_ref())
        .await?;

    if removed.rows_affected() == 0 {
        return Err(AppError::not_found("Like"));
    }

    let likes_count = count_likes(pool.get_ref(), review_id).await?;

    Ok(HttpResponse::Ok().json(LikeStatus {
        review_id,
        liked: false,
        likes_count,
    }))
}

/// GET /reviews/{id}/replies
pub async fn review_replies(
    path: web::Path<i64>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let review_id = path.into_inner();
    ensure_review_exists(pool.get_ref(), review_id).await?;

    let sql = format!("{} WHERE p.review_id = $1 ORDER BY p.created_at", REPLY_SELECT);
    let replies = sqlx::query_as::<_, Reply>(&sql)
        .bind(review_id)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(replies))
}

/// POST /api/reviews/{id}/replies
pub async fn reply_to_review(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    form: web::Json<ReplyRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let review_id = path.into_inner();

    let reply_text = is_valid_text("reply_text", &form.reply_text, MAX_REPLY_LENGTH)?;
    ensure_review_exists(pool.get_ref(), review_id).await?;

    let reply = sqlx::query_as::<_, Reply>(
        r#"
        WITH inserted AS (
            INSERT INTO review_replies (review_id, user_id, reply_text)
            VALUES ($1, $2, $3)
            RETURNING reply_id, review_id, user_id, reply_text, created_at
        )
        SELECT i.reply_id, i.review_id, i.user_id, u.username, i.reply_text, i.created_at
        FROM inserted i
        JOIN users u ON i.user_id = u.user_id
        "#,
    )
    .bind(review_id)
    .bind(user_id)
    .bind(&reply_text)
    .fetch_one(pool.get_ref())
    .await?;

    tracing::info!(
        user_id = user_id,
        review_id = review_id,
        reply_id = reply.reply_id,
        "Reply posted"
    );

    Ok(HttpResponse::Created().json(reply))
}

/// DELETE /api/replies/{id}
pub async fn delete_reply(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let reply_id = path.into_inner();

    let result = sqlx::query("DELETE FROM review_replies WHERE reply_id = $1 AND user_id = $2")
        .bind(reply_id)
        .bind(user_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Reply"));
    }

    Ok(HttpResponse::NoContent().finish())
}

async fn fetch_review(pool: &PgPool, review_id: i64) -> Result<Option<Review>, sqlx::Error> {
    let sql = format!("{} WHERE r.review_id = $1", REVIEW_SELECT);
    sqlx::query_as::<_, Review>(&sql)
        .bind(review_id)
        .fetch_optional(pool)
        .await
}

async fn ensure_review_exists(pool: &PgPool, review_id: i64) -> Result<(), AppError> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM reviews WHERE review_id = $1)")
            .bind(review_id)
            .fetch_one(pool)
            .await?;

    if exists {
        Ok(())
    } else {
        Err(AppError::not_found("Review"))
    }
}

async fn count_likes(pool: &PgPool, review_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM review_likes WHERE review_id = $1")
        .bind(review_id)
        .fetch_one(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_recommended_is_optional() {
        let request: CreateReviewRequest =
            serde_json::from_str(r#"{"game_id": 3, "rating": 8, "review_text": "Great"}"#)
                .unwrap();
        assert_eq!(request.game_id, 3);
        assert!(request.recommended.is_none());
        assert!(request.recommends());
    }

    #[test]
    fn test_low_rating_without_flag_still_recommends() {
        let request: CreateReviewRequest =
            serde_json::from_str(r#"{"game_id": 3, "rating": 2, "review_text": "Meh"}"#)
                .unwrap();
        assert!(request.recommends());

        let explicit: CreateReviewRequest = serde_json::from_str(
            r#"{"game_id": 3, "rating": 9, "review_text": "Fine", "recommended": false}"#,
        )
        .unwrap();
        assert!(!explicit.recommends());
    }

    #[test]
    fn test_update_request_accepts_partial_body() {
        let request: UpdateReviewRequest = serde_json::from_str(r#"{"rating": 4}"#).unwrap();
        assert_eq!(request.rating, Some(4));
        assert!(request.review_text.is_none());
        assert!(request.recommended.is_none());
    }

    #[test]
    fn test_vote_request_requires_flag() {
        assert!(serde_json::from_str::<VoteRequest>("{}").is_err());
        let vote: VoteRequest = serde_json::from_str(r#"{"helpful": false}"#).unwrap();
        assert!(!vote.helpful);
    }

    #[test]
    fn test_like_status_serialization() {
        let status = LikeStatus {
            review_id: 7,
            liked: true,
            likes_count: 12,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["liked"], true);
        assert_eq!(json["likes_count"], 12);
    }
}
