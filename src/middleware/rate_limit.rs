use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::store::VisitStore;

const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Per-request admission control. Holds no mutable state of its own;
/// every decision comes from one touch of the shared visit store.
pub struct RateLimiter {
    store: Arc<dyn VisitStore>,
    max_visit_count: i64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn VisitStore>, max_visit_count: i64) -> Self {
        Self {
            store,
            max_visit_count,
        }
    }

    pub async fn check(&self, req: Request<Body>, next: Next) -> Result<Response, AppError> {
        let ip = client_ip(&req);

        // Any store failure denies the request; admitting on error would
        // defeat the limiter.
        let record = self.store.touch(&ip).await.map_err(|err| {
            tracing::error!("visit counter touch failed for {ip}: {err}");
            AppError::from(err)
        })?;

        let remaining = (self.max_visit_count - record.count).max(0);
        let mut response = if record.count > self.max_visit_count {
            tracing::debug!("rate limit exceeded for {ip}: {} visits", record.count);
            StatusCode::TOO_MANY_REQUESTS.into_response()
        } else {
            next.run(req).await
        };

        // Quota metadata goes on rejected responses too.
        let headers = response.headers_mut();
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining as u64));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(record.ttl.as_secs()));
        Ok(response)
    }
}

/// Client identity: proxy headers first, then the peer address.
fn client_ip(req: &Request<Body>) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    limiter.check(req, next).await
}
