use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Chat endpoint family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Provider {
    /// OpenAI-compatible chat completions (supports strict JSON mode)
    #[default]
    OpenAi,
    /// Anthropic Messages API (JSON shape requested in the prompt only)
    Anthropic,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => f.write_str("openai"),
            Provider::Anthropic => f.write_str("anthropic"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(format!(
                "unknown provider '{}' (expected openai or anthropic)",
                other
            )),
        }
    }
}

/// Configuration for the language-model client
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    /// API key (from OPENAI_API_KEY / ANTHROPIC_API_KEY)
    pub api_key: String,
    /// Model to use (from OPENAI_MODEL / ANTHROPIC_MODEL, with a fixed default)
    pub model: String,
    /// Endpoint base URL (OpenAI-compatible only, from OPENAI_BASE_URL)
    pub base_url: String,
    /// Sampling temperature; non-zero so answers vary naturally
    pub temperature: f64,
    /// Maximum tokens in the reply
    pub max_tokens: u32,
}

impl LlmConfig {
    /// Create config from environment variables
    pub fn from_env(provider: Provider) -> Result<Self> {
        match provider {
            Provider::OpenAi => {
                let api_key = std::env::var("OPENAI_API_KEY")
                    .context("OPENAI_API_KEY environment variable not set")?;
                let model = std::env::var("OPENAI_MODEL")
                    .unwrap_or_else(|_| OPENAI_DEFAULT_MODEL.to_string());
                let base_url = std::env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| OPENAI_DEFAULT_BASE_URL.to_string());
                Ok(Self {
                    base_url,
                    ..Self::new(provider, api_key, model)
                })
            }
            Provider::Anthropic => {
                let api_key = std::env::var("ANTHROPIC_API_KEY")
                    .context("ANTHROPIC_API_KEY environment variable not set")?;
                let model = std::env::var("ANTHROPIC_MODEL")
                    .unwrap_or_else(|_| ANTHROPIC_DEFAULT_MODEL.to_string());
                Ok(Self::new(provider, api_key, model))
            }
        }
    }

    /// Create with custom settings
    pub fn new(provider: Provider, api_key: String, model: String) -> Self {
        let base_url = match provider {
            Provider::OpenAi => OPENAI_DEFAULT_BASE_URL.to_string(),
            Provider::Anthropic => ANTHROPIC_URL.to_string(),
        };
        Self {
            provider,
            api_key,
            model,
            base_url,
            temperature: 0.7,
            max_tokens: 128,
        }
    }
}

/// Token usage reported by the endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Raw reply from one chat call
#[derive(Debug, Clone, Default)]
pub struct ChatReply {
    /// Text content of the reply, expected to hold a JSON object
    pub content: String,
    pub usage: Usage,
}

/// A chat endpoint that answers a single prompt with a JSON-shaped reply
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Issue exactly one call. `prompt` carries the whole instruction.
    async fn complete_json(&self, prompt: &str) -> Result<ChatReply>;

    /// Model identifier, for logging
    fn model_name(&self) -> &str;
}

/// Build the configured client
pub fn build_client(config: LlmConfig) -> Box<dyn ChatModel> {
    match config.provider {
        Provider::OpenAi => Box::new(OpenAiClient::new(config)),
        Provider::Anthropic => Box::new(AnthropicClient::new(config)),
    }
}

/// OpenAI-compatible chat completions client
pub struct OpenAiClient {
    client: Client,
    config: LlmConfig,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn request<'a>(&'a self, prompt: &'a str) -> OpenAiRequest<'a> {
        OpenAiRequest {
            model: &self.config.model,
            messages: vec![OpenAiMessage {
                role: "system",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete_json(&self, prompt: &str) -> Result<ChatReply> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&self.request(prompt))
            .send()
            .await
            .context("Failed to send request to chat completions API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completions API error: {} - {}", status, body);
        }

        let response: OpenAiResponse = response
            .json()
            .await
            .context("Failed to parse chat completions response")?;

        Ok(response.into_reply())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Anthropic API client
pub struct AnthropicClient {
    client: Client,
    config: LlmConfig,
}

impl AnthropicClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn request<'a>(&'a self, prompt: &'a str) -> AnthropicRequest<'a> {
        AnthropicRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        }
    }
}

#[async_trait]
impl ChatModel for AnthropicClient {
    async fn complete_json(&self, prompt: &str) -> Result<ChatReply> {
        let response = self
            .client
            .post(&self.config.base_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&self.request(prompt))
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error: {} - {}", status, body);
        }

        let response: AnthropicResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic API response")?;

        Ok(response.into_reply())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiReplyMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl OpenAiResponse {
    /// An absent choice or null content becomes an empty reply, which
    /// validation then rejects as malformed
    fn into_reply(self) -> ChatReply {
        let content = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!("Chat completion content: {}", content);

        ChatReply {
            content,
            usage: self
                .usage
                .map(|u| Usage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                })
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

impl AnthropicResponse {
    fn into_reply(self) -> ChatReply {
        // Concatenate text blocks
        let content: String = self
            .content
            .into_iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text)
            .collect();
        debug!("Anthropic reply content: {}", content);

        ChatReply {
            content,
            usage: self.usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: Provider) -> LlmConfig {
        LlmConfig::new(provider, "key".to_string(), "test-model".to_string())
    }

    #[test]
    fn test_config_defaults() {
        let config = config(Provider::OpenAi);
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 128);
        assert_eq!(config.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("anthropic".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert!("cohere".parse::<Provider>().is_err());
    }

    #[test]
    fn test_openai_request_uses_json_mode() {
        let client = OpenAiClient::new(config(Provider::OpenAi));
        let body = serde_json::to_value(client.request("PROMPT")).unwrap();

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "PROMPT");
        assert_eq!(body["max_tokens"], 128);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_parse_openai_response() {
        let json = r#"{
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "{\"answer\": \"Blue\", \"confidence\": 0.8}"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 210, "completion_tokens": 14, "total_tokens": 224}
        }"#;

        let response: OpenAiResponse = serde_json::from_str(json).unwrap();
        let reply = response.into_reply();

        assert_eq!(reply.content, r#"{"answer": "Blue", "confidence": 0.8}"#);
        assert_eq!(reply.usage.total(), 224);
    }

    #[test]
    fn test_parse_openai_response_null_content() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let reply = serde_json::from_str::<OpenAiResponse>(json)
            .unwrap()
            .into_reply();

        assert!(reply.content.is_empty());
        assert_eq!(reply.usage, Usage::default());
    }

    #[test]
    fn test_parse_anthropic_response() {
        let json = r#"{
            "content": [{"type": "text", "text": "{\"answer\": \"No\"}"}],
            "usage": {"input_tokens": 100, "output_tokens": 7}
        }"#;

        let reply = serde_json::from_str::<AnthropicResponse>(json)
            .unwrap()
            .into_reply();

        assert_eq!(reply.content, r#"{"answer": "No"}"#);
        assert_eq!(reply.usage.input_tokens, 100);
        assert_eq!(reply.usage.output_tokens, 7);
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = Usage::default();
        total.add(Usage {
            input_tokens: 10,
            output_tokens: 2,
        });
        total.add(Usage {
            input_tokens: 5,
            output_tokens: 1,
        });
        assert_eq!(total.total(), 18);
    }
}
