use actix_web::HttpResponse;
use serde::Serialize;

#[derive(Serialize)]
struct Liveness {
    status: &'static str,
    timestamp: String,
}

/// GET /health_check
///
/// Liveness only; does not touch the database.
pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().json(Liveness {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
