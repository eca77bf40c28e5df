mod achievements;
mod auth;
mod games;
mod health_check;
mod library;
mod pagination;
mod reviews;

pub use achievements::{
    game_achievements, game_progress, my_achievements, rarest_achievements, recent_achievements,
    unlock_achievement,
};
pub use auth::{get_current_user, login, register, update_profile};
pub use games::{get_game, list_games, popular_games, search_games};
pub use health_check::health_check;
pub use library::{
    add_to_library, check_library, get_library, library_stats, remove_from_library,
    update_library_entry,
};
pub use reviews::{
    create_review, delete_reply, delete_review, game_reviews, like_review, like_status,
    recent_reviews, reply_to_review, review_replies, unlike_review, update_review, user_reviews,
    vote_review,
};
