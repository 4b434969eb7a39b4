use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lore_core::config::AppConfig;
use lore_core::error::{LoreError, Result};
use lore_core::llm::{ChatMessage, GenerationOptions, LanguageModel};

/// Client for an OpenAI-compatible `chat/completions` endpoint serving a
/// Llama-family model.
pub struct LlamaClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

// ── Chat completions request/response types ────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ── Implementation ─────────────────────────────────────────────────────────

impl LlamaClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs))
            .danger_accept_invalid_certs(config.llm_accept_invalid_certs)
            .build()
            .map_err(|e| LoreError::Config(format!("failed to build model HTTP client: {e}")))?;

        if config.llm_accept_invalid_certs {
            tracing::warn!(url = %config.llama_api_url, "TLS verification disabled for model endpoint");
        }

        Ok(Self {
            client,
            api_url: config.llama_api_url.clone(),
            api_key: config.llm_api_key.clone(),
            model: config.llama_model.clone(),
        })
    }

    fn first_choice_text(response: ChatCompletionResponse) -> String {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for LlamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: GenerationOptions,
    ) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            max_tokens = options.max_tokens,
            "Sending chat completion request"
        );

        let mut builder = self.client.post(&self.api_url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LoreError::Llm(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(LoreError::Llm(format!(
                "model endpoint returned status {status}: {body}"
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LoreError::Llm(format!("Failed to parse model response: {e}")))?;

        let text = Self::first_choice_text(completion);

        tracing::debug!(response_len = text.len(), "Received chat completion");

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_url: String, api_key: Option<&str>) -> AppConfig {
        let mut config = AppConfig::from_env();
        config.llama_api_url = api_url;
        config.llama_model = "llama-test".to_string();
        config.llm_api_key = api_key.map(str::to_string);
        config.llm_timeout_secs = 5;
        config.llm_accept_invalid_certs = false;
        config
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    #[tokio::test]
    async fn generate_returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "llama-test",
                "max_tokens": 256,
                "messages": [{ "role": "user", "content": "hello" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("hi there")))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            LlamaClient::new(&test_config(format!("{}/v1/chat/completions", server.uri()), None))
                .unwrap();
        let text = client
            .generate(
                &[ChatMessage::user("hello")],
                GenerationOptions::with_max_tokens(256),
            )
            .await
            .unwrap();

        assert_eq!(text, "hi there");
    }

    #[tokio::test]
    async fn generate_sends_bearer_token_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let client = LlamaClient::new(&test_config(server.uri(), Some("secret"))).unwrap();
        let text = client
            .generate(&[ChatMessage::user("x")], GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn generate_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = LlamaClient::new(&test_config(server.uri(), None)).unwrap();
        let err = client
            .generate(&[ChatMessage::user("x")], GenerationOptions::default())
            .await
            .unwrap_err();

        match err {
            LoreError::Llm(message) => {
                assert!(message.contains("503"));
                assert!(message.contains("overloaded"));
            }
            other => panic!("expected Llm error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generate_returns_empty_text_without_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let client = LlamaClient::new(&test_config(server.uri(), None)).unwrap();
        let text = client
            .generate(&[ChatMessage::user("x")], GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn generate_fails_when_unreachable() {
        let client = LlamaClient::new(&test_config("http://127.0.0.1:9/v1".into(), None)).unwrap();
        let err = client
            .generate(&[ChatMessage::user("x")], GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LoreError::Llm(_)));
    }

    #[test]
    fn request_serializes_openai_shape() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("u")];
        let request = ChatCompletionRequest {
            model: "m",
            messages: &messages,
            max_tokens: 10,
            temperature: 0.2,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "u");
        assert_eq!(value["max_tokens"], 10);
    }
}
