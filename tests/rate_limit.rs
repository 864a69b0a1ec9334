use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response, StatusCode};
use tower::ServiceExt;
use visitgate::middleware::RateLimiter;
use visitgate::store::{MemoryVisitStore, StoreError, VisitRecord, VisitStore};

const WINDOW: Duration = Duration::from_secs(10);

fn app(max_visit_count: i64) -> Router {
    let store = Arc::new(MemoryVisitStore::new(WINDOW));
    visitgate::app(Arc::new(RateLimiter::new(store, max_visit_count)))
}

async fn get_as(app: &Router, ip: &str) -> Response<Body> {
    let req = Request::builder()
        .uri("/hello")
        .header("x-real-ip", ip)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(req).await.unwrap()
}

fn header(response: &Response<Body>, name: &str) -> u64 {
    response
        .headers()
        .get(name)
        .expect(name)
        .to_str()
        .unwrap()
        .parse()
        .unwrap()
}

#[tokio::test]
async fn admits_up_to_the_quota_then_rejects() {
    let app = app(5);

    for expected_remaining in [4, 3, 2, 1, 0] {
        let response = get_as(&app, "203.0.113.7").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-ratelimit-remaining"), expected_remaining);
    }

    let response = get_as(&app, "203.0.113.7").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(&response, "x-ratelimit-remaining"), 0);
    // Rejections still carry the reset header.
    assert!(header(&response, "x-ratelimit-reset") <= WINDOW.as_secs());
}

#[tokio::test(start_paused = true)]
async fn quota_resets_once_the_window_lapses() {
    let app = app(2);

    assert_eq!(get_as(&app, "203.0.113.7").await.status(), StatusCode::OK);
    assert_eq!(get_as(&app, "203.0.113.7").await.status(), StatusCode::OK);
    assert_eq!(
        get_as(&app, "203.0.113.7").await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    // One second short of expiry the client is still blocked.
    tokio::time::advance(WINDOW - Duration::from_secs(1)).await;
    assert_eq!(
        get_as(&app, "203.0.113.7").await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    // After expiry the client looks brand new again.
    tokio::time::advance(Duration::from_secs(1)).await;
    let response = get_as(&app, "203.0.113.7").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-ratelimit-remaining"), 1);
    assert_eq!(header(&response, "x-ratelimit-reset"), WINDOW.as_secs());
}

#[tokio::test(start_paused = true)]
async fn window_is_fixed_not_sliding() {
    let app = app(5);

    let first = get_as(&app, "203.0.113.7").await;
    assert_eq!(header(&first, "x-ratelimit-reset"), WINDOW.as_secs());

    tokio::time::advance(Duration::from_secs(4)).await;
    let second = get_as(&app, "203.0.113.7").await;
    // Later visits must not push the reset point out.
    assert_eq!(header(&second, "x-ratelimit-reset"), WINDOW.as_secs() - 4);
}

#[tokio::test]
async fn clients_are_counted_independently() {
    let app = app(1);

    assert_eq!(get_as(&app, "203.0.113.7").await.status(), StatusCode::OK);
    assert_eq!(
        get_as(&app, "203.0.113.7").await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    let response = get_as(&app, "198.51.100.1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-ratelimit-remaining"), 0);
}

#[tokio::test]
async fn peer_address_identifies_clients_without_proxy_headers() {
    let app = app(1);

    let mut req = Request::builder()
        .uri("/hello")
        .body(Body::empty())
        .unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 4], 40000))));
    assert_eq!(app.clone().oneshot(req).await.unwrap().status(), StatusCode::OK);

    let mut req = Request::builder()
        .uri("/hello")
        .body(Body::empty())
        .unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 5], 40000))));
    assert_eq!(app.clone().oneshot(req).await.unwrap().status(), StatusCode::OK);
}

struct BrokenStore;

#[async_trait]
impl VisitStore for BrokenStore {
    async fn touch(&self, key: &str) -> Result<VisitRecord, StoreError> {
        Err(StoreError::MissingExpiry(format!("rate_limit:{key}")))
    }
}

#[tokio::test]
async fn store_failure_denies_instead_of_failing_open() {
    let app = visitgate::app(Arc::new(RateLimiter::new(Arc::new(BrokenStore), 5)));

    let response = get_as(&app, "203.0.113.7").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], 500);
    assert_eq!(body["error_message"], "visit counter has no expiry");
}
