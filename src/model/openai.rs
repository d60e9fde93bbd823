//! OpenAI-compatible provider

use crate::content::output_reserve;
use crate::model::error::{classify_failure, ModelError, ModelErrorKind};
use crate::model::gateway::LanguageModel;
use crate::model::json::try_parse_json_from_str;
use crate::model::registry::{ModelConfig, ModelInterface};
use crate::model::types::{ExtractionRequest, ExtractionResult, TokenUsage};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Name of the implicit function used in function-call mode
pub const EXTRACT_FUNCTION_NAME: &str = "extract_function";

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<Value>,
}

/// Talks to an OpenAI-compatible HTTP API
#[derive(Clone)]
pub struct OpenAiModel {
    http_client: Client,
    api_key: String,
    base_url: String,
    config: ModelConfig,
}

impl OpenAiModel {
    /// Creates a provider for `config` using the given API key
    pub fn new(config: ModelConfig, api_key: impl Into<String>) -> Result<Self, ModelError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(150))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ModelError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            config,
        })
    }

    /// Creates a provider reading the key from `OPENAI_API_KEY`
    pub fn from_env(config: ModelConfig) -> Result<Self, ModelError> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| ModelError::Config(format!("{} not set", API_KEY_ENV)))?;
        Self::new(config, api_key)
    }

    /// Sets a custom API root (proxies, compatible servers, tests)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn uses_function_call(&self, request: &ExtractionRequest) -> bool {
        request.schema.is_some() && self.config.supports_schema()
    }

    fn chat_body(&self, request: &ExtractionRequest) -> Value {
        let mut body = json!({
            "model": self.config.api_name,
            "messages": [{ "role": "user", "content": request.prompt() }],
            "temperature": request.settings.temperature,
            "top_p": request.settings.top_p,
            "frequency_penalty": request.settings.frequency_penalty,
            "presence_penalty": request.settings.presence_penalty,
        });

        if let (true, Some(schema)) = (self.uses_function_call(request), &request.schema) {
            let description = request
                .schema_description
                .clone()
                .unwrap_or_else(|| request.instructions.clone());
            body["functions"] = json!([{
                "name": EXTRACT_FUNCTION_NAME,
                "description": description,
                "parameters": schema,
            }]);
            body["function_call"] = json!({ "name": EXTRACT_FUNCTION_NAME });
        }

        body
    }

    fn completion_body(&self, request: &ExtractionRequest) -> Value {
        json!({
            "model": self.config.api_name,
            "prompt": request.prompt(),
            "max_tokens": output_reserve(self.config.max_tokens),
            "temperature": request.settings.temperature,
            "top_p": request.settings.top_p,
            "frequency_penalty": request.settings.frequency_penalty,
            "presence_penalty": request.settings.presence_penalty,
        })
    }

    /// Posts `body` to `endpoint` and returns the raw success body
    async fn post(&self, endpoint: &str, body: &Value) -> Result<String, ModelError> {
        let response = self
            .http_client
            .post(format!("{}/{}", self.base_url, endpoint))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| classify_failure(None, None, &e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify_failure(None, None, &e.to_string()))?;

        if !status.is_success() {
            let (message, code) = parse_error_body(&text);
            return Err(classify_failure(
                Some(status.as_u16()),
                code.as_deref(),
                &message,
            ));
        }

        Ok(text)
    }

    async fn chat(&self, request: &ExtractionRequest) -> Result<ExtractionResult, ModelError> {
        let text = self.post("chat/completions", &self.chat_body(request)).await?;
        let response: ChatResponse = serde_json::from_str(&text).map_err(malformed)?;

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| malformed("response has no choices"))?;
        let arguments = message.function_call.and_then(|call| call.arguments);

        Ok(build_result(message.content, arguments, response.usage))
    }

    async fn text(&self, request: &ExtractionRequest) -> Result<ExtractionResult, ModelError> {
        let text = self.post("completions", &self.completion_body(request)).await?;
        let response: CompletionResponse = serde_json::from_str(&text).map_err(malformed)?;

        let answer = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.text);

        Ok(build_result(answer, None, response.usage))
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn complete(&self, request: &ExtractionRequest) -> Result<ExtractionResult, ModelError> {
        tracing::debug!("Calling OpenAI API with model {}", self.config.api_name);
        match self.config.interface {
            ModelInterface::Chat => self.chat(request).await,
            ModelInterface::Text => self.text(request).await,
        }
    }
}

/// Combines the text answer and function arguments into a result
///
/// The structured answer comes from the function arguments when present,
/// otherwise from the text answer. When the model only returned function
/// arguments, they double as the text answer.
fn build_result(
    answer: Option<String>,
    function_arguments: Option<String>,
    usage: Option<TokenUsage>,
) -> ExtractionResult {
    let answer = answer.filter(|a| !a.trim().is_empty());
    let possible_json = function_arguments
        .filter(|a| !a.trim().is_empty())
        .or_else(|| answer.clone());
    let json_answer = possible_json.as_deref().and_then(try_parse_json_from_str);

    ExtractionResult {
        answer: answer.or(possible_json),
        json_answer,
        usage,
    }
}

/// Pulls the message and code out of an error body
fn parse_error_body(body: &str) -> (String, Option<String>) {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let error = envelope.error;
            let code = error
                .code
                .as_ref()
                .and_then(|c| c.as_str().map(str::to_string))
                .or(error.error_type);
            let message = error.message.unwrap_or_else(|| body.to_string());
            (message, code)
        }
        Err(_) => (body.to_string(), None),
    }
}

fn malformed(error: impl std::fmt::Display) -> ModelError {
    ModelError::provider(
        ModelErrorKind::ServerError,
        format!("Malformed response from provider: {}", error),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::registry::model_config_by_name;
    use crate::model::types::ModelSettings;
    use wiremock::matchers::{body_partial_json, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(schema: Option<Value>) -> ExtractionRequest {
        ExtractionRequest {
            instructions: "Extract the title.".to_string(),
            content: "# Hello".to_string(),
            schema,
            schema_description: None,
            settings: ModelSettings::default(),
        }
    }

    fn provider(server: &MockServer, model: &str) -> OpenAiModel {
        OpenAiModel::new(*model_config_by_name(model).unwrap(), "test-key")
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_function_call_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header_matcher("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "gpt-4-1106-preview",
                "function_call": { "name": "extract_function" },
                "functions": [{ "name": "extract_function", "description": "Extract the title." }],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": {
                    "role": "assistant",
                    "content": null,
                    "function_call": { "name": "extract_function", "arguments": "{\"title\":\"Hello\"}" }
                }}],
                "usage": { "prompt_tokens": 40, "completion_tokens": 8, "total_tokens": 48 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let schema = json!({"type": "object", "properties": {"title": {"type": "string"}}});
        let result = provider(&server, "gpt-4-turbo")
            .complete(&request(Some(schema)))
            .await
            .unwrap();

        assert_eq!(result.json_answer, Some(json!({"title": "Hello"})));
        assert_eq!(result.answer.as_deref(), Some("{\"title\":\"Hello\"}"));
        assert_eq!(result.usage.unwrap().total_tokens, 48);
    }

    #[tokio::test]
    async fn test_plain_chat_parses_embedded_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [{ "role": "user", "content": "Extract the title.```# Hello```" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Here: {\"title\": \"Hello\"}" }}],
                "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
            })))
            .mount(&server)
            .await;

        let result = provider(&server, "gpt-3.5-turbo")
            .complete(&request(None))
            .await
            .unwrap();

        assert_eq!(result.answer.as_deref(), Some("Here: {\"title\": \"Hello\"}"));
        assert_eq!(result.json_answer, Some(json!({"title": "Hello"})));
    }

    #[tokio::test]
    async fn test_text_model_ignores_schema() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "text": "Hello" }],
                "usage": { "prompt_tokens": 10, "completion_tokens": 1, "total_tokens": 11 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider(&server, "text-davinci-003")
            .complete(&request(Some(json!({"type": "object"}))))
            .await
            .unwrap();

        assert_eq!(result.answer.as_deref(), Some("Hello"));
        assert_eq!(result.json_answer, None);
    }

    #[tokio::test]
    async fn test_error_payloads_are_classified() {
        let cases = vec![
            (500, json!({"error": {"message": "The server had an error"}}), ModelErrorKind::ServerError),
            (429, json!({"error": {"message": "Rate limit reached", "type": "requests", "code": "rate_limit_exceeded"}}), ModelErrorKind::RateLimited),
            (429, json!({"error": {"message": "You exceeded your current quota", "type": "insufficient_quota", "code": "insufficient_quota"}}), ModelErrorKind::QuotaExceeded),
            (400, json!({"error": {"message": "This prompt contains repetitive patterns"}}), ModelErrorKind::RepetitiveContent),
            (400, json!({"error": {"message": "'Long text' is too long - 'functions.0.description'"}}), ModelErrorKind::OversizedSchema),
            (404, json!({"error": {"message": "The model does not exist", "code": "model_not_found"}}), ModelErrorKind::Unknown),
        ];

        for (status, body, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .respond_with(ResponseTemplate::new(status).set_body_json(body))
                .mount(&server)
                .await;

            let error = provider(&server, "gpt-4")
                .complete(&request(None))
                .await
                .unwrap_err();
            assert_eq!(error.kind(), Some(expected), "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let error = provider(&server, "gpt-4")
            .complete(&request(None))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), Some(ModelErrorKind::ServerError));
        assert!(error.to_string().contains("upstream unavailable"));
    }

    #[test]
    fn test_build_result_defaults_answer_to_arguments() {
        let result = build_result(None, Some("{\"a\":1}".to_string()), None);
        assert_eq!(result.answer.as_deref(), Some("{\"a\":1}"));
        assert_eq!(result.json_answer, Some(json!({"a": 1})));

        let result = build_result(Some(String::new()), None, None);
        assert_eq!(result.answer, None);
        assert_eq!(result.json_answer, None);
    }
}
