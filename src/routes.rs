// routes.rs
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use http::{Method, header::CONTENT_TYPE};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    cache::{CachePolicy, cache_response},
    config::Config,
    handlers::{self, AppState},
    throttle::{RateLimiter, throttle},
};

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let cached = |ttl: Duration, per_caller: bool| {
        from_fn_with_state(
            CachePolicy {
                cache: state.cache.clone(),
                ttl,
                per_caller,
            },
            cache_response,
        )
    };

    let ideas = Router::new()
        .route("/ideas", get(handlers::list_ideas))
        .route("/ideas/{id}", get(handlers::get_idea))
        .route_layer(cached(config.cache.ideas_ttl, false));

    let status = Router::new()
        .route("/votes/status", get(handlers::vote_status))
        .route_layer(cached(config.cache.status_ttl, true));

    let writes = Router::new()
        .route("/ideas/{id}/vote", post(handlers::vote_idea))
        .route("/votes/reset", delete(handlers::reset_votes));

    let api = ideas
        .merge(status)
        .merge(writes)
        .layer(from_fn_with_state(
            Arc::new(RateLimiter::new(config.rate_limit)),
            throttle,
        ))
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let router = if config.prefix.is_empty() {
        api
    } else {
        Router::new().nest(&format!("/{}", config.prefix), api)
    };

    router.layer(cors).layer(TraceLayer::new_for_http())
}
