//! End-to-end tests: HTTP request in, Bot API and relay calls out
//!
//! The Bot API, the media host and the large-file relay are all wiremock
//! servers; everything in between is the real pipeline.

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::http::StatusCode;
use common::{app, bot_path, error_reply, json_body, mock_config, ok_reply, send_request};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, body_string_contains, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn note(items: serde_json::Value) -> serde_json::Value {
    json!({
        "title": "Spring walk (day 1)",
        "author": "mei",
        "sourceTag": "xhs",
        "canonicalLink": "https://www.xiaohongshu.com/explore/1",
        "items": items,
    })
}

#[tokio::test]
async fn batch_goes_out_as_one_media_group_per_destination() {
    let bot_api = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(bot_path("sendMediaGroup")))
        .and(body_partial_json(json!({"chat_id": "@main"})))
        .and(body_string_contains("Spring walk \\\\(day 1\\\\)"))
        .and(body_string_contains("MarkdownV2"))
        .respond_with(ok_reply(json!([{"message_id": 1}, {"message_id": 2}])))
        .expect(1)
        .mount(&bot_api)
        .await;

    Mock::given(method("POST"))
        .and(path(bot_path("sendMediaGroup")))
        .and(body_partial_json(json!({"chat_id": "@xhs_channel"})))
        .and(body_string_contains("#小红书"))
        .respond_with(ok_reply(json!([{"message_id": 7}, {"message_id": 8}])))
        .expect(1)
        .mount(&bot_api)
        .await;

    let config = mock_config(&bot_api, &[("TELEGRAM_CHANNEL_XHS", "@xhs_channel".into())]);
    let response = app(config)
        .oneshot(send_request(note(json!([
            {"url": "https://cdn.example/a.jpg", "kind": "photo"},
            {"url": "https://cdn.example/b.mp4", "kind": "video"},
        ]))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let reply = json_body(response).await;
    assert_eq!(reply["ok"], true);
    assert_eq!(reply["data"]["delivered"], 4);

    let destinations = reply["data"]["destinations"].as_array().unwrap();
    assert_eq!(destinations[0]["channel"], "@main");
    assert_eq!(destinations[0]["captionPolicy"], "richLinked");
    assert_eq!(destinations[1]["channel"], "@xhs_channel");
    assert_eq!(destinations[1]["caption"], "#小红书");
    assert_eq!(destinations[0]["outcomes"][0]["tierUsed"], "byReference");
}

#[tokio::test]
async fn eleven_items_make_two_groups_with_one_caption() {
    let bot_api = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(bot_path("sendMediaGroup")))
        .and(body_string_contains("/10.jpg"))
        .respond_with(ok_reply(json!([])))
        .expect(1)
        .mount(&bot_api)
        .await;

    // The trailing singleton group carries no caption
    Mock::given(method("POST"))
        .and(path(bot_path("sendPhoto")))
        .and(body_partial_json(
            json!({"chat_id": "@main", "photo": "https://cdn.example/11.jpg"}),
        ))
        .respond_with(ok_reply(json!({"message_id": 11})))
        .expect(1)
        .mount(&bot_api)
        .await;

    let items: Vec<_> = (1..=11)
        .map(|i| json!({"url": format!("https://cdn.example/{i}.jpg")}))
        .collect();
    let response = app(mock_config(&bot_api, &[]))
        .oneshot(send_request(note(json!(items))))
        .await
        .unwrap();

    let reply = json_body(response).await;
    assert_eq!(reply["data"]["delivered"], 11);

    let outcomes = reply["data"]["destinations"][0]["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["items"].as_array().unwrap().len(), 10);
    assert_eq!(outcomes[1]["items"], json!([10]));

    let received = bot_api.received_requests().await.unwrap();
    let single = received
        .iter()
        .find(|r| r.url.path().ends_with("/sendPhoto"))
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&single.body).unwrap();
    assert!(body.get("caption").is_none());
}

#[tokio::test]
async fn rejected_reference_falls_back_to_streamed_reupload() {
    let bot_api = MockServer::start().await;
    let media_host = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/img/cat.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(b"JPEGDATA".to_vec()),
        )
        .expect(1)
        .mount(&media_host)
        .await;

    Mock::given(method("POST"))
        .and(path(bot_path("sendPhoto")))
        .and(header_regex("content-type", "^application/json"))
        .respond_with(error_reply(400, "Bad Request: failed to get HTTP URL content"))
        .expect(1)
        .mount(&bot_api)
        .await;

    Mock::given(method("POST"))
        .and(path(bot_path("sendPhoto")))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("JPEGDATA"))
        .and(body_string_contains("filename=\"cat.jpg\""))
        .respond_with(ok_reply(json!({"message_id": 3})))
        .expect(1)
        .mount(&bot_api)
        .await;

    let url = format!("{}/img/cat.jpg", media_host.uri());
    let response = app(mock_config(&bot_api, &[]))
        .oneshot(send_request(note(json!([{"url": url}]))))
        .await
        .unwrap();

    let reply = json_body(response).await;
    assert_eq!(reply["ok"], true);
    let outcome = &reply["data"]["destinations"][0]["outcomes"][0];
    assert_eq!(outcome["tierUsed"], "streamedReupload");
    assert_eq!(outcome["tiersAttempted"], json!(["byReference", "streamedReupload"]));
    assert_eq!(outcome["attempts"], 2);
}

#[tokio::test]
async fn oversize_rejection_escalates_to_relay() {
    let bot_api = MockServer::start().await;
    let relay = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(bot_path("sendVideo")))
        .respond_with(error_reply(413, "Request Entity Too Large"))
        .expect(1)
        .mount(&bot_api)
        .await;

    Mock::given(method("POST"))
        .and(path("/relay"))
        .and(body_partial_json(json!({
            "destinationChannel": "@main",
            "fileUrl": "https://cdn.example/big.mp4",
            "useRichFormatting": true,
            "kind": "video",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&relay)
        .await;

    let config = mock_config(&bot_api, &[("RELAY_URL", format!("{}/relay", relay.uri()))]);
    let response = app(config)
        .oneshot(send_request(note(json!([
            {"url": "https://cdn.example/big.mp4", "kind": "video"}
        ]))))
        .await
        .unwrap();

    let reply = json_body(response).await;
    assert_eq!(reply["ok"], true);
    let outcome = &reply["data"]["destinations"][0]["outcomes"][0];
    assert_eq!(outcome["tierUsed"], "externalRelay");
    assert_eq!(outcome["tiersAttempted"], json!(["byReference", "externalRelay"]));
}

#[tokio::test]
async fn probed_oversize_item_skips_the_platform() {
    let bot_api = MockServer::start().await;
    let media_host = MockServer::start().await;
    let relay = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/big.mp4"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", "73400320"))
        .mount(&media_host)
        .await;

    Mock::given(method("POST"))
        .respond_with(ok_reply(json!({"message_id": 1})))
        .expect(0)
        .mount(&bot_api)
        .await;

    Mock::given(method("POST"))
        .and(path("/relay"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&relay)
        .await;

    let config = mock_config(
        &bot_api,
        &[
            ("SIZE_PROBE", "true".into()),
            ("RELAY_URL", format!("{}/relay", relay.uri())),
        ],
    );
    let url = format!("{}/big.mp4", media_host.uri());
    let response = app(config)
        .oneshot(send_request(note(json!([{"url": url, "kind": "video"}]))))
        .await
        .unwrap();

    let reply = json_body(response).await;
    let outcome = &reply["data"]["destinations"][0]["outcomes"][0];
    assert_eq!(outcome["tierUsed"], "externalRelay");
    assert_eq!(outcome["tiersAttempted"], json!(["externalRelay"]));
}

#[tokio::test]
async fn declined_relay_is_reported_not_raised() {
    let bot_api = MockServer::start().await;
    let relay = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(bot_path("sendVideo")))
        .respond_with(error_reply(413, "Request Entity Too Large"))
        .mount(&bot_api)
        .await;

    Mock::given(method("POST"))
        .and(path("/relay"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": false, "message": "quota exceeded"})),
        )
        .mount(&relay)
        .await;

    let config = mock_config(&bot_api, &[("RELAY_URL", format!("{}/relay", relay.uri()))]);
    let response = app(config)
        .oneshot(send_request(note(json!([
            {"url": "https://cdn.example/big.mp4", "kind": "video"}
        ]))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let reply = json_body(response).await;
    assert_eq!(reply["ok"], false);
    assert_eq!(reply["data"]["failed"], 1);
    let error = &reply["data"]["destinations"][0]["outcomes"][0]["error"];
    assert_eq!(error["kind"], "relay_failure");
    assert_eq!(error["tier"], "externalRelay");
    assert!(error["message"].as_str().unwrap().contains("quota exceeded"));
}

#[tokio::test]
async fn rate_limit_is_retried_then_delivered() {
    let bot_api = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(bot_path("sendPhoto")))
        .respond_with(error_reply(429, "Too Many Requests: retry after 0"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&bot_api)
        .await;

    Mock::given(method("POST"))
        .and(path(bot_path("sendPhoto")))
        .respond_with(ok_reply(json!({"message_id": 9})))
        .with_priority(2)
        .mount(&bot_api)
        .await;

    let response = app(mock_config(&bot_api, &[]))
        .oneshot(send_request(note(json!([{"url": "https://cdn.example/a.jpg"}]))))
        .await
        .unwrap();

    let reply = json_body(response).await;
    assert_eq!(reply["ok"], true);
    let outcome = &reply["data"]["destinations"][0]["outcomes"][0];
    assert_eq!(outcome["tierUsed"], "byReference");
    assert_eq!(outcome["attempts"], 2);
}

#[tokio::test]
async fn token_never_appears_in_reported_errors() {
    // Nothing listens on the Bot API port, so every call fails at the transport;
    // the media host has no mocks and answers 404 to the re-upload download
    let media_host = MockServer::start().await;
    let mut config = mock_config(&media_host, &[("RETRY_MAX_ATTEMPTS", "1".into())]);
    config.telegram.api_base = "http://127.0.0.1:9".to_string();

    let url = format!("{}/a.jpg", media_host.uri());
    let response = app(config)
        .oneshot(send_request(note(json!([{"url": url}]))))
        .await
        .unwrap();

    let body = json_body(response).await.to_string();
    assert!(body.contains("\"ok\":false"));
    assert!(!body.contains(common::TOKEN));
}
