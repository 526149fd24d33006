#![cfg(feature = "openai")]

use advieswijzer::advisory::{generate, AdvisorySource, ModelSettings};
use advieswijzer::backend::{BackendError, ChatMessage, CompletionBackend, CompletionRequest, OpenAiBackend};
use advieswijzer::prompt::AdvisoryRequest;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> CompletionRequest {
    CompletionRequest {
        model: "gpt-4o-mini".to_string(),
        temperature: 0.3,
        messages: vec![ChatMessage::system("Je bent adviseur."), ChatMessage::user("Help")],
        max_tokens: Some(600),
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content }, "finish_reason": "stop" }
        ]
    })
}

#[test_log::test(tokio::test)]
async fn test_sends_bearer_token_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 600,
            "messages": [
                { "role": "system", "content": "Je bent adviseur." },
                { "role": "user", "content": "Help" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("  Begin klein.\n")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(format!("{}/v1", server.uri()), "sk-test");
    let text = backend.complete(&request()).await.unwrap();
    assert_eq!(text, "Begin klein.");
}

#[tokio::test]
async fn test_unauthorized_is_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(server.uri(), "sk-wrong");
    let err = backend.complete(&request()).await.unwrap_err();
    assert!(matches!(err, BackendError::Authentication { status: 401, .. }));
    assert!(err.to_string().contains("invalid api key"));
}

#[tokio::test]
async fn test_server_error_is_status_error_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(server.uri(), "sk-test");
    let err = backend.complete(&request()).await.unwrap_err();
    assert_eq!(err.kind(), "ApiStatusError");
}

#[tokio::test]
async fn test_garbage_body_is_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(server.uri(), "sk-test");
    let err = backend.complete(&request()).await.unwrap_err();
    assert_eq!(err.kind(), "MalformedResponse");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;
    let backend = OpenAiBackend::new(server.uri(), "sk-test");
    let err = backend.complete(&request()).await.unwrap_err();
    assert_eq!(err.kind(), "MalformedResponse");
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Nothing listens on a port we bound and released.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = OpenAiBackend::new(format!("http://{addr}"), "sk-test");
    let err = backend.complete(&request()).await.unwrap_err();
    assert_eq!(err.kind(), "NetworkError");
}

#[tokio::test]
async fn test_generate_against_live_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "test-model" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("## Diagnose\nVeel handwerk.")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(server.uri(), "sk-test");
    let request = AdvisoryRequest {
        system_instruction: "systeem".to_string(),
        user_instruction: "opdracht".to_string(),
    };
    let model = ModelSettings { model: "test-model".to_string(), temperature: 0.2 };
    let result = generate(&request, true, Some(&backend), &model).await;
    assert_eq!(result.source, AdvisorySource::LiveModel);
    assert_eq!(result.text, "## Diagnose\nVeel handwerk.");
}
