//! Common test utilities for media-relay integration tests

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use media_relay::{Config, MediaRelay};
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

/// Bot token used against the mock Bot API
pub const TOKEN: &str = "123456:TEST";

/// Path of a Bot API method on the mock server
pub fn bot_path(method: &str) -> String {
    format!("/bot{TOKEN}/{method}")
}

/// Configuration talking to `bot_api`, with fast retries and probing off
///
/// `extra` entries are applied after the defaults, so they can override them.
pub fn mock_config(bot_api: &MockServer, extra: &[(&str, String)]) -> Config {
    let mut vars: Vec<(String, String)> = vec![
        ("TELEGRAM_BOT_TOKEN".into(), TOKEN.into()),
        ("TELEGRAM_API_BASE".into(), bot_api.uri()),
        ("TELEGRAM_CHANNEL_ID".into(), "@main".into()),
        ("SIZE_PROBE".into(), "false".into()),
        ("RETRY_MAX_ATTEMPTS".into(), "2".into()),
    ];
    vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.clone())));

    let mut config = Config::from_vars(vars).expect("test config should parse");
    config.retry.initial_delay = Duration::from_millis(5);
    config.retry.max_delay = Duration::from_millis(20);
    config.retry.jitter = false;
    config
}

/// Router over the real pipeline built from `config`
pub fn app(config: Config) -> Router {
    let relay = MediaRelay::new(config.clone()).expect("pipeline should build");
    media_relay::api::create_router(Arc::new(relay), Arc::new(config))
}

/// JSON POST to `/send`
pub fn send_request(body: serde_json::Value) -> Request {
    Request::builder()
        .method("POST")
        .uri("/send")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

/// Read a JSON response body
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&body).expect("body should be JSON")
}

/// Successful Bot API envelope
pub fn ok_reply(result: serde_json::Value) -> wiremock::ResponseTemplate {
    wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "ok": true,
        "result": result,
    }))
}

/// Failed Bot API envelope
pub fn error_reply(code: u16, description: &str) -> wiremock::ResponseTemplate {
    wiremock::ResponseTemplate::new(code).set_body_json(serde_json::json!({
        "ok": false,
        "error_code": code,
        "description": description,
    }))
}

/// Load a live Bot API configuration from `.env`, or None when it is absent
pub fn live_config() -> Option<Config> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().ok()?;
    config.check_required().ok()?;
    Some(config)
}

/// Skip a live test when credentials are missing
#[macro_export]
macro_rules! skip_if_no_credentials {
    () => {
        if common::live_config().is_none() {
            eprintln!("Skipping: TELEGRAM_BOT_TOKEN / TELEGRAM_CHANNEL_ID not set");
            return;
        }
    };
}
