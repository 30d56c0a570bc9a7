//! OpenAI provider against a local mock server: request shape and error
//! classification.

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use company_analyst::config::ConfigSources;
use company_analyst::providers::{CompletionRequest, LLMProvider, Message, OpenAIProvider};
use company_analyst::RequestError;

fn request() -> CompletionRequest {
    CompletionRequest {
        model: "gpt-3.5-turbo".to_string(),
        messages: vec![
            Message::system("You are a business analyst providing detailed company analysis."),
            Message::user("Analyze Acme Corp"),
        ],
        max_tokens: 1000,
        temperature: 0.7,
    }
}

fn provider_for(server: &MockServer) -> OpenAIProvider {
    OpenAIProvider::new("sk-test".to_string())
        .with_base_url(format!("{}/v1", server.uri()))
}

async fn respond_with(template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_successful_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "max_tokens": 1000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "{\"main_twitter_handle\": \"@acme\"}"
                },
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = provider_for(&server).complete(request()).await.unwrap();
    assert_eq!(text, "{\"main_twitter_handle\": \"@acme\"}");
}

#[tokio::test]
async fn test_unauthorized_is_authentication_error() {
    let server = respond_with(ResponseTemplate::new(401).set_body_json(json!({
        "error": {
            "message": "Incorrect API key provided",
            "type": "invalid_request_error",
            "code": "invalid_api_key"
        }
    })))
    .await;

    let err = provider_for(&server).complete(request()).await.unwrap_err();
    assert_eq!(
        err,
        RequestError::Authentication {
            status: 401,
            message: "Incorrect API key provided".to_string(),
        }
    );
}

#[tokio::test]
async fn test_rate_limit_and_quota_are_distinct() {
    let limited = respond_with(ResponseTemplate::new(429).set_body_json(json!({
        "error": {
            "message": "Rate limit reached for requests",
            "type": "requests",
            "code": "rate_limit_exceeded"
        }
    })))
    .await;
    let err = provider_for(&limited).complete(request()).await.unwrap_err();
    assert!(matches!(err, RequestError::RateLimited { .. }));

    let quota = respond_with(ResponseTemplate::new(429).set_body_json(json!({
        "error": {
            "message": "You exceeded your current quota",
            "type": "insufficient_quota",
            "code": "insufficient_quota"
        }
    })))
    .await;
    let err = provider_for(&quota).complete(request()).await.unwrap_err();
    assert!(matches!(err, RequestError::QuotaExceeded { .. }));
}

#[tokio::test]
async fn test_malformed_bodies() {
    let html = ResponseTemplate::new(200).set_body_string("<html>oops</html>");
    let not_json = respond_with(html).await;
    let err = provider_for(&not_json).complete(request()).await.unwrap_err();
    assert!(matches!(err, RequestError::MalformedResponse(_)));

    let empty = ResponseTemplate::new(200).set_body_json(json!({"choices": []}));
    let no_choices = respond_with(empty).await;
    let err = provider_for(&no_choices).complete(request()).await.unwrap_err();
    assert_eq!(
        err,
        RequestError::MalformedResponse("no choices in response".to_string())
    );

    let null_content = respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": null}}]
    })))
    .await;
    let err = provider_for(&null_content).complete(request()).await.unwrap_err();
    assert!(matches!(err, RequestError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let server = respond_with(ResponseTemplate::new(500).set_body_string("internal")).await;
    let err = provider_for(&server).complete(request()).await.unwrap_err();
    assert_eq!(
        err,
        RequestError::Api {
            status: 500,
            message: "internal".to_string(),
        }
    );
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = respond_with(
        ResponseTemplate::new(200)
            .set_body_json(json!({"choices": []}))
            .set_delay(Duration::from_secs(5)),
    )
    .await;

    let provider = provider_for(&server)
        .with_timeout(Duration::from_millis(200))
        .unwrap();
    let err = provider.complete(request()).await.unwrap_err();
    assert!(matches!(err, RequestError::Timeout(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    // nothing listens on a port freed right after binding it
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let provider = OpenAIProvider::new("sk-test".to_string())
        .with_base_url(format!("http://127.0.0.1:{}/v1", port));
    let err = provider.complete(request()).await.unwrap_err();
    assert!(matches!(err, RequestError::Network(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_provider_from_resolved_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-from-env-block"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "ok"}}]
        })))
        .mount(&server)
        .await;

    let config = ConfigSources::new()
        .with_env_block(&format!(
            "OPENAI_API_KEY=sk-from-env-block\nOPENAI_BASE_URL={}/v1\nREQUEST_TIMEOUT_SECS=10",
            server.uri()
        ))
        .resolve()
        .unwrap();
    let provider = OpenAIProvider::from_config(&config).unwrap();

    assert_eq!(provider.complete(request()).await.unwrap(), "ok");
}
