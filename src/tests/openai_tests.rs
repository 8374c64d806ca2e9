use crate::config::AppSettings;
use crate::openai::{
    build_review_request, OpenAIApiClient, OpenAIClient, OPENAI_CHAT_COMPLETIONS_PATH,
};
use mockito::Matcher;
use reqwest::StatusCode;
use serde_json::json;

fn create_test_settings(base_url: String) -> AppSettings {
    AppSettings {
        api_key: "test_api_key".to_string(),
        api_endpoint: base_url,
        model_name: "deepseek-reasoner".to_string(),
        temperature: 0.2,
        max_tokens: 0,
        system_prompt: "You are a code reviewer.".to_string(),
        ..AppSettings::default()
    }
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1677652288,
        "model": "deepseek-reasoner",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": content,
                "reasoning_content": "Thinking about the diff..."
            },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 9,
            "completion_tokens": 12,
            "total_tokens": 21
        }
    })
}

#[test]
fn test_completions_url_keeps_base_path() {
    let client =
        OpenAIApiClient::new(&create_test_settings("https://api.deepseek.com/v1".to_string()))
            .unwrap();
    assert_eq!(
        client.completions_url().as_str(),
        "https://api.deepseek.com/v1/chat/completions"
    );

    let client =
        OpenAIApiClient::new(&create_test_settings("https://api.openai.com/v1/".to_string()))
            .unwrap();
    assert_eq!(
        client.completions_url().as_str(),
        "https://api.openai.com/v1/chat/completions"
    );
}

#[test]
fn test_new_openai_api_client_invalid_url() {
    let settings = create_test_settings("not a valid url".to_string());
    match OpenAIApiClient::new(&settings).err().unwrap() {
        OpenAIClient::UrlParse(_) => {} // Expected error
        e => panic!("Expected UrlParse, got {:?}", e),
    }
}

#[test]
fn test_review_request_omits_unset_max_tokens() {
    let settings = create_test_settings("http://localhost".to_string());
    let request = serde_json::to_value(build_review_request(&settings, "Review this")).unwrap();

    assert!(request.get("max_tokens").is_none(), "{request}");
    assert_eq!(request["model"], "deepseek-reasoner");
    assert_eq!(request["messages"][0]["role"], "system");
    assert_eq!(request["messages"][0]["content"], "You are a code reviewer.");
    assert_eq!(request["messages"][1]["role"], "user");
    assert_eq!(request["messages"][1]["content"], "Review this");
}

#[test]
fn test_review_request_includes_configured_max_tokens() {
    let mut settings = create_test_settings("http://localhost".to_string());
    settings.max_tokens = 500;
    let request = serde_json::to_value(build_review_request(&settings, "Review this")).unwrap();

    assert_eq!(request["max_tokens"], 500);
}

#[tokio::test]
async fn test_request_review_success() {
    let mut server = mockito::Server::new_async().await;
    let mut settings = create_test_settings(server.url());
    settings.max_tokens = 500;
    let client = OpenAIApiClient::new(&settings).unwrap();

    let mock = server
        .mock(
            "POST",
            Matcher::Exact(format!("/{}", OPENAI_CHAT_COMPLETIONS_PATH)),
        )
        .match_header("Authorization", "Bearer test_api_key")
        .match_body(Matcher::PartialJson(json!({
            "model": "deepseek-reasoner",
            "max_tokens": 500,
            "messages": [
                {"role": "system", "content": "You are a code reviewer."},
                {"role": "user", "content": "Review commit abc123"}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body("Looks good to me.").to_string())
        .create_async()
        .await;

    let review = client
        .request_review(&settings, "Review commit abc123")
        .await;

    mock.assert_async().await;
    assert_eq!(review.unwrap(), "Looks good to me.");
}

#[tokio::test]
async fn test_request_review_api_error() {
    let mut server = mockito::Server::new_async().await;
    let settings = create_test_settings(server.url());
    let client = OpenAIApiClient::new(&settings).unwrap();

    let error_body = json!({"error": {"message": "Invalid API key", "type": "auth_error"}});
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(error_body.to_string())
        .create_async()
        .await;

    let result = client.request_review(&settings, "Review").await;

    mock.assert_async().await;
    match result.err().unwrap() {
        OpenAIClient::Api { status, body } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body, error_body.to_string());
        }
        e => panic!("Expected Api, got {:?}", e),
    }
}

#[tokio::test]
async fn test_request_review_empty_choices() {
    let mut server = mockito::Server::new_async().await;
    let settings = create_test_settings(server.url());
    let client = OpenAIApiClient::new(&settings).unwrap();

    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "chatcmpl-456",
                "object": "chat.completion",
                "created": 1677652300,
                "model": "deepseek-reasoner",
                "choices": []
            })
            .to_string(),
        )
        .create_async()
        .await;

    let result = client.request_review(&settings, "Review").await;

    mock.assert_async().await;
    assert!(matches!(result, Err(OpenAIClient::EmptyResponse)));
}

#[tokio::test]
async fn test_request_review_malformed_response() {
    let mut server = mockito::Server::new_async().await;
    let settings = create_test_settings(server.url());
    let client = OpenAIApiClient::new(&settings).unwrap();

    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{\"unexpected\": true}")
        .create_async()
        .await;

    let result = client.request_review(&settings, "Review").await;
    assert!(matches!(result, Err(OpenAIClient::Deserialization(_))));
}

#[tokio::test]
async fn test_request_review_partial_usage() {
    let mut server = mockito::Server::new_async().await;
    let settings = create_test_settings(server.url());
    let client = OpenAIApiClient::new(&settings).unwrap();

    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "chatcmpl-789",
                "object": "chat.completion",
                "created": 1677652400,
                "model": "deepseek-reasoner",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Rename the helper."},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 9, "completion_tokens": 3}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let review = client.request_review(&settings, "Review").await;

    mock.assert_async().await;
    assert_eq!(review.unwrap(), "Rename the helper.");
}

#[test]
fn test_usage_counters_are_optional() {
    let usage: crate::models::OpenAIUsage = serde_json::from_value(json!({})).unwrap();
    assert_eq!(usage.prompt_tokens, None);
    assert_eq!(usage.completion_tokens, None);
    assert_eq!(usage.total_tokens, None);
}
