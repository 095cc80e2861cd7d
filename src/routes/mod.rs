use axum::http::HeaderValue;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod health;
pub mod ideas;
pub mod votes;
pub mod webhook;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let ideas_routes = Router::new()
        .route("/", get(ideas::list_ideas))
        .route("/weekly", get(ideas::weekly_ideas))
        .route("/weekly-batches", get(ideas::weekly_batches))
        .route("/leaderboard", get(ideas::leaderboard))
        .route("/winner/:week", get(ideas::winner_for_week))
        .route("/:id", get(ideas::get_idea));

    let votes_routes = Router::new()
        .route("/", post(votes::cast_vote))
        .route("/user", get(votes::current_vote))
        .route("/last-week", get(votes::last_week))
        .route("/badges", get(votes::badges));

    let auth_routes = Router::new()
        .route("/subscribe", post(auth::subscribe))
        .route("/signup", post(auth::signup))
        .route("/unsubscribe", get(auth::unsubscribe));

    let admin_routes = Router::new()
        .route("/pending", get(admin::pending_ideas))
        .route("/approve/:id", post(admin::approve_idea))
        .route("/reject/:id", post(admin::reject_idea))
        .route("/publish", post(admin::publish_week))
        .route("/idea/:id", put(admin::update_idea));

    Router::new()
        .nest("/api/ideas", ideas_routes)
        .nest("/api/votes", votes_routes)
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .route("/api/webhook/bubblelab", post(webhook::ingest_ideas))
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
}
