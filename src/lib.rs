use std::sync::Arc;

use axum::{Router, routing::get};

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod store;

use middleware::{RateLimiter, rate_limit};

/// Assembles the service router with the rate limiter in front of every route.
pub fn app(limiter: Arc<RateLimiter>) -> Router {
    Router::new()
        .route("/hello", get(routes::hello))
        .layer(axum::middleware::from_fn_with_state(limiter, rate_limit))
}
