//! Contract tests for the HTTP text-generation clients.
//!
//! Verifies exact wire format against a mock server: request bodies,
//! success parsing, and the failure taxonomy (non-2xx and malformed
//! bodies are both request failures).

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use mira::config::UpstreamConfig;
use mira::error::AvatarError;
use mira::llm::ResponseGenerator;
use mira::llm::api::{AvatarChatClient, CompletionsClient};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Avatar-chat client ──────────────────────────────────────────────────

#[tokio::test]
async fn avatar_chat_sends_text_and_parses_ai_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_partial_json(json!({ "text": "Hello" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ai_response": "Hi there"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AvatarChatClient::new(format!("{}/chat", server.uri()));
    let reply = client.generate("Hello").await.unwrap();
    assert_eq!(reply, "Hi there");
}

#[tokio::test]
async fn avatar_chat_non_2xx_is_a_request_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "upstream exploded"
        })))
        .mount(&server)
        .await;

    let client = AvatarChatClient::new(format!("{}/chat", server.uri()));
    let err = client.generate("Hello").await.unwrap_err();
    assert!(matches!(err, AvatarError::Request(_)));
}

#[tokio::test]
async fn avatar_chat_malformed_body_is_a_request_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "unexpected": "shape"
        })))
        .mount(&server)
        .await;

    let client = AvatarChatClient::new(format!("{}/chat", server.uri()));
    let err = client.generate("Hello").await.unwrap_err();
    assert!(matches!(err, AvatarError::Request(_)));
}

#[tokio::test]
async fn avatar_chat_rereads_the_endpoint_preference_per_request() {
    use mira::prefs::Preferences;

    let first = MockServer::start().await;
    let second = MockServer::start().await;
    for server in [&first, &second] {
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ai_response": "ok"
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let prefs_path = dir.path().join("preferences.toml");
    let client = AvatarChatClient::from_preferences(
        prefs_path.clone(),
        format!("{}/chat", first.uri()),
    );

    // No preference file yet: the default endpoint is used.
    client.generate("hello").await.unwrap();

    // Point the preference at the second server; the next request follows
    // without rebuilding the client.
    Preferences {
        api_endpoint: format!("{}/chat", second.uri()),
        ..Preferences::default()
    }
    .save_to_file(&prefs_path)
    .unwrap();
    client.generate("hello again").await.unwrap();
}

// ── Completions client ──────────────────────────────────────────────────

fn upstream(server: &MockServer) -> UpstreamConfig {
    UpstreamConfig {
        api_url: server.uri(),
        api_model: "test-model".to_owned(),
        api_key: "test-key".to_owned(),
        ..UpstreamConfig::default()
    }
}

#[tokio::test]
async fn completions_request_carries_model_messages_and_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "messages": [
                { "role": "system" },
                { "role": "user", "content": "What's new?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "  Not much.  " },
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = CompletionsClient::new(&upstream(&server));
    let reply = client.generate("What's new?").await.unwrap();
    assert_eq!(reply, "Not much.", "reply is trimmed");
}

#[tokio::test]
async fn completions_without_key_omits_authorization() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "role": "assistant", "content": "ok" }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = UpstreamConfig {
        api_key: String::new(),
        ..upstream(&server)
    };
    let client = CompletionsClient::new(&config);
    assert_eq!(client.generate("hi").await.unwrap(), "ok");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn completions_missing_content_is_a_request_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": []
        })))
        .mount(&server)
        .await;

    let client = CompletionsClient::new(&upstream(&server));
    let err = client.generate("hi").await.unwrap_err();
    assert!(matches!(err, AvatarError::Request(_)));
}

#[tokio::test]
async fn completions_non_2xx_is_a_request_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = CompletionsClient::new(&upstream(&server));
    let err = client.generate("hi").await.unwrap_err();
    assert!(matches!(err, AvatarError::Request(_)));
}
