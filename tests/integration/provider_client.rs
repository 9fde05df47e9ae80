//! Integration tests for the OpenAI-compatible provider client
//!
//! Tests cover:
//! - Rate limiting surfaces as its own error, after exactly one request
//! - Hard timeout on a provider that never answers
//! - Success envelopes, including token-limit truncation
//! - Upstream failures and errors reported inside a 200 payload

use std::time::{Duration, Instant};
use taleforge::error::ProviderError;
use taleforge::provider::{ChatMessage, CompletionRequest, OpenAiCompatibleClient, ProviderClient};
use tokio_util::sync::CancellationToken;

use super::test_utils::{completion_body, StubProvider, StubReply};

fn request() -> CompletionRequest {
    CompletionRequest {
        messages: vec![
            ChatMessage::system("Respond with a JSON object."),
            ChatMessage::user("A tavern keeper"),
        ],
        temperature: None,
        max_tokens: None,
    }
}

#[tokio::test]
async fn rate_limit_is_reported_without_retry() {
    let stub = StubProvider::start(StubReply::Respond {
        status: 429,
        body: "{\"error\":{\"message\":\"Rate limit reached\"}}".to_string(),
    })
    .await;
    let client = OpenAiCompatibleClient::new(&stub.provider_config(5)).unwrap();

    let err = client
        .call(&request(), CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        ProviderError::RateLimited { body } => assert!(body.contains("Rate limit reached")),
        other => panic!("expected rate limit, got {:?}", other),
    }
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn hanging_provider_times_out() {
    let stub = StubProvider::start(StubReply::Hang).await;
    let client = OpenAiCompatibleClient::new(&stub.provider_config(1)).unwrap();

    let started = Instant::now();
    let err = client
        .call(&request(), CancellationToken::new())
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(
        err,
        ProviderError::Timeout {
            after: Duration::from_secs(1)
        }
    );
    assert!(elapsed >= Duration::from_millis(900), "returned too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(4), "timeout overshot: {:?}", elapsed);
}

#[tokio::test]
async fn cancelled_call_returns_promptly() {
    let stub = StubProvider::start(StubReply::Hang).await;
    let client = OpenAiCompatibleClient::new(&stub.provider_config(30)).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = client.call(&request(), cancel).await.unwrap_err();
    assert!(matches!(err, ProviderError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn success_envelope_returns_content() {
    let stub = StubProvider::start(StubReply::Respond {
        status: 200,
        body: completion_body("{\"name\":\"Mira\"}", "stop"),
    })
    .await;
    let client = OpenAiCompatibleClient::new(&stub.provider_config(5)).unwrap();

    let raw = client.call(&request(), CancellationToken::new()).await.unwrap();
    assert_eq!(raw.content, "{\"name\":\"Mira\"}");
    assert!(!raw.is_truncated());
    assert!(stub.base_url().ends_with("/v1"));
}

#[tokio::test]
async fn length_finish_reason_marks_truncation() {
    let stub = StubProvider::start(StubReply::Respond {
        status: 200,
        body: completion_body("{\"name\":\"Mira\",\"backstory\":\"Born in", "length"),
    })
    .await;
    let client = OpenAiCompatibleClient::new(&stub.provider_config(5)).unwrap();

    let raw = client.call(&request(), CancellationToken::new()).await.unwrap();
    assert!(raw.is_truncated());
    assert_eq!(raw.finish_reason.as_deref(), Some("length"));
}

#[tokio::test]
async fn server_error_is_upstream_failure() {
    let stub = StubProvider::start(StubReply::Respond {
        status: 503,
        body: "overloaded".to_string(),
    })
    .await;
    let client = OpenAiCompatibleClient::new(&stub.provider_config(5)).unwrap();

    let err = client
        .call(&request(), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ProviderError::Upstream {
            status: 503,
            body: "overloaded".to_string()
        }
    );
}

#[tokio::test]
async fn error_inside_ok_payload_is_upstream_failure() {
    let stub = StubProvider::start(StubReply::Respond {
        status: 200,
        body: "{\"error\":{\"message\":\"quota exhausted\"}}".to_string(),
    })
    .await;
    let client = OpenAiCompatibleClient::new(&stub.provider_config(5)).unwrap();

    let err = client
        .call(&request(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Upstream { status: 200, .. }));
}

#[tokio::test]
async fn unreachable_provider_is_transport_error() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = taleforge::provider::ProviderConfig {
        base_url: format!("http://{}/v1", addr),
        timeout_secs: 5,
        ..Default::default()
    };
    let client = OpenAiCompatibleClient::new(&config).unwrap();

    let err = client
        .call(&request(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)), "got {:?}", err);
}
