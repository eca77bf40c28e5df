use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::auth::TokenService;
use crate::configuration::JwtSettings;
use crate::error::{AppError, ValidationError};
use crate::logger::RequestLogger;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    add_to_library, check_library, create_review, delete_reply, delete_review, game_achievements,
    game_progress, game_reviews, get_current_user, get_game, get_library, health_check,
    library_stats, like_review, like_status, list_games, login, my_achievements, popular_games,
    rarest_achievements, recent_achievements, recent_reviews, register, remove_from_library,
    reply_to_review, review_replies, search_games, unlike_review, unlock_achievement,
    update_library_entry, update_profile, update_review, user_reviews, vote_review,
};

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    jwt_config: JwtSettings,
) -> Result<Server, std::io::Error> {
    let connection = web::Data::new(connection);
    let tokens = web::Data::new(TokenService::new(&jwt_config));

    let server = HttpServer::new(move || {
        // malformed bodies and query strings get the same JSON error shape as every other 400
        let json_config = web::JsonConfig::default().error_handler(|err, _req| {
            tracing::debug!(error = %err, "Rejected request body");
            AppError::Validation(ValidationError::InvalidFormat("request body".to_string())).into()
        });
        let query_config = web::QueryConfig::default().error_handler(|err, _req| {
            tracing::debug!(error = %err, "Rejected query string");
            AppError::Validation(ValidationError::InvalidFormat("query string".to_string())).into()
        });

        App::new()
            .wrap(RequestLogger)
            .app_data(connection.clone())
            .app_data(tokens.clone())
            .app_data(json_config)
            .app_data(query_config)
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/games", web::get().to(list_games))
            .route("/games/search", web::get().to(search_games))
            .route("/games/popular", web::get().to(popular_games))
            .route("/games/{id}", web::get().to(get_game))
            .route("/games/{id}/reviews", web::get().to(game_reviews))
            .route("/games/{id}/achievements", web::get().to(game_achievements))
            .route("/users/{id}/reviews", web::get().to(user_reviews))
            .route("/reviews/recent", web::get().to(recent_reviews))
            .route("/reviews/{id}/replies", web::get().to(review_replies))
            // Protected routes
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(tokens.clone()))
                    .route("/me", web::get().to(get_current_user))
                    .route("/me", web::put().to(update_profile))
                    .route("/library", web::get().to(get_library))
                    .route("/library", web::post().to(add_to_library))
                    .route("/library/stats", web::get().to(library_stats))
                    .route("/library/check/{game_id}", web::get().to(check_library))
                    .route("/library/{game_id}", web::put().to(update_library_entry))
                    .route("/library/{game_id}", web::delete().to(remove_from_library))
                    .route("/reviews", web::post().to(create_review))
                    .route("/reviews/{id}", web::put().to(update_review))
                    .route("/reviews/{id}", web::delete().to(delete_review))
                    .route("/reviews/{id}/vote", web::post().to(vote_review))
                    .route("/reviews/{id}/like", web::get().to(like_status))
                    .route("/reviews/{id}/like", web::post().to(like_review))
                    .route("/reviews/{id}/like", web::delete().to(unlike_review))
                    .route("/reviews/{id}/replies", web::post().to(reply_to_review))
                    .route("/replies/{id}", web::delete().to(delete_reply))
                    .route("/achievements", web::get().to(my_achievements))
                    .route("/achievements/recent", web::get().to(recent_achievements))
                    .route("/achievements/rarest", web::get().to(rarest_achievements))
                    .route(
                        "/achievements/games/{game_id}/progress",
                        web::get().to(game_progress),
                    )
                    .route("/achievements/{id}/unlock", web::post().to(unlock_achievement)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
