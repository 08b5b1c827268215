use super::*;
use crate::Config;
use crate::classify::{FailureOrigin, UpstreamFailure};
use crate::delivery::test_support::{Call, FakePlatform};
use crate::error::ApiError;
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tower::ServiceExt;


/// Configuration with a token and main channel, probing off
fn test_config(extra: &[(&str, &str)]) -> Config {
    let mut vars = vec![
        ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ("TELEGRAM_CHANNEL_ID", "@main"),
        ("SIZE_PROBE", "false"),
    ];
    vars.extend_from_slice(extra);
    let mut config = Config::from_vars(vars).unwrap();
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(5);
    config.retry.jitter = false;
    config
}

/// Router over a fake platform, returned so tests can inspect its calls
fn test_app(config: Config) -> (Router, Arc<FakePlatform>) {
    let platform = Arc::new(FakePlatform::new());
    let relay = MediaRelay::new(config.clone())
        .unwrap()
        .with_platform(platform.clone());
    let app = create_router(Arc::new(relay), Arc::new(config));
    (app, platform)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body<T: DeserializeOwned>(response: Response) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns() {
    let mut config = test_config(&[]);
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port
    let config = Arc::new(config);
    let relay = Arc::new(MediaRelay::new((*config).clone()).unwrap());

    let api_handle = tokio::spawn({
        let config = config.clone();
        async move { start_api_server(relay, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished(), "server should still be serving");
    api_handle.abort();
}

#[tokio::test]
async fn test_cors_enabled() {
    let mut config = test_config(&[]);
    config.server.api.cors_enabled = true;
    config.server.api.cors_origins = vec!["*".to_string()];
    let (app, _) = test_app(config);

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "https://www.xiaohongshu.com")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_cors_preflight_for_configured_origin() {
    let (app, _) = test_app(test_config(&[("CORS_ORIGINS", "https://www.xiaohongshu.com")]));

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/send")
        .header("Origin", "https://www.xiaohongshu.com")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "https://www.xiaohongshu.com"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let mut config = test_config(&[]);
    config.server.api.cors_enabled = false;
    let (app, _) = test_app(config);

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "https://www.xiaohongshu.com")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get("access-control-allow-origin")
            .is_none()
    );
}

#[tokio::test]
async fn test_api_key_protects_everything_but_health() {
    let (app, _) = test_app(test_config(&[("API_KEY", "secret")]));

    let health = app.clone().oneshot(get_request("/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let banner = app.clone().oneshot(get_request("/")).await.unwrap();
    assert_eq!(banner.status(), StatusCode::OK);

    let spec = app.clone().oneshot(get_request("/openapi.json")).await.unwrap();
    assert_eq!(spec.status(), StatusCode::UNAUTHORIZED);

    let body = serde_json::json!({"items": [{"url": "https://cdn.example/a.jpg"}]});
    let denied = app
        .clone()
        .oneshot(post_json("/send", body.clone()))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
    let error: ApiError = json_body(denied).await;
    assert_eq!(error.code, "unauthorized");

    let mut request = post_json("/send", body);
    request
        .headers_mut()
        .insert("x-api-key", "secret".parse().unwrap());
    let allowed = app.oneshot(request).await.unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_router_builds_with_default_api_config() {
    let mut config = test_config(&[]);
    config.server.api = crate::config::ApiConfig::default();
    assert!(config.server.api.swagger_ui);
    let (app, _) = test_app(config);

    let spec = app.clone().oneshot(get_request("/openapi.json")).await.unwrap();
    assert_eq!(spec.status(), StatusCode::OK);

    let swagger_spec = app
        .clone()
        .oneshot(get_request("/api/v1/openapi.json"))
        .await
        .unwrap();
    assert_eq!(swagger_spec.status(), StatusCode::OK);

    let ui = app.oneshot(get_request("/swagger-ui/")).await.unwrap();
    assert_ne!(ui.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_swagger_ui_can_be_disabled() {
    let mut config = test_config(&[]);
    config.server.api.swagger_ui = false;
    let (app, _) = test_app(config);

    let response = app.oneshot(get_request("/swagger-ui/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
