use anyhow::{anyhow, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, error};

use crate::config::LLMConfig;

/// Remote text-completion service used for AI grading.
///
/// Implementations are injected into `LLMService`; tests substitute stubs.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, system_message: Option<&str>, prompt: &str) -> Result<String>;

    fn provider_name(&self) -> &str;
}

/// Common message structure for LLM requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMMessage {
    pub role: String,
    pub content: String,
}

/// Enum-based LLM provider implementation for better compatibility
#[derive(Debug, Clone)]
pub enum LLMProvider {
    OpenAI(OpenAIProvider),
    Gemini(GeminiProvider),
}

#[async_trait]
impl TextCompletion for LLMProvider {
    async fn complete(&self, system_message: Option<&str>, prompt: &str) -> Result<String> {
        match self {
            LLMProvider::OpenAI(provider) => provider.make_request(system_message, prompt).await,
            LLMProvider::Gemini(provider) => provider.make_request(system_message, prompt).await,
        }
    }

    fn provider_name(&self) -> &str {
        match self {
            LLMProvider::OpenAI(_) => "OpenAI",
            LLMProvider::Gemini(_) => "Gemini",
        }
    }
}

impl LLMProvider {
    /// Get the model name being used
    pub fn model_name(&self) -> &str {
        match self {
            LLMProvider::OpenAI(provider) => &provider.model,
            LLMProvider::Gemini(provider) => &provider.model,
        }
    }
}

/// Grading wants repeatable scores, so sampling is kept cold.
const GRADING_TEMPERATURE: f32 = 0.2;

/// OpenAI provider implementation
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<LLMMessage>,
    temperature: f32,
    response_format: OpenAIResponseFormat,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIChoice {
    message: LLMMessage,
}

impl OpenAIProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
        }
    }

    pub async fn make_request(&self, system_message: Option<&str>, prompt: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys_msg) = system_message {
            messages.push(LLMMessage {
                role: "system".to_string(),
                content: sys_msg.to_string(),
            });
        }
        messages.push(LLMMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages,
            temperature: GRADING_TEMPERATURE,
            response_format: OpenAIResponseFormat { kind: "json_object" },
        };

        debug!(
            provider = "OpenAI",
            model = %self.model,
            prompt_length = prompt.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(provider = "OpenAI", status = %status, error = %error_text, "LLM API request failed");
            return Err(anyhow!("OpenAI API request failed ({}): {}", status, error_text));
        }

        let openai_response: OpenAIResponse = response.json().await?;
        openai_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("No choices in OpenAI response"))
    }
}

/// Gemini provider implementation
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: i32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            model: model.unwrap_or_else(|| "gemini-2.0-flash".to_string()),
        }
    }

    pub async fn make_request(&self, system_message: Option<&str>, prompt: &str) -> Result<String> {
        // generateContent has no system role here, so the instruction is prepended
        let full_prompt = match system_message {
            Some(sys_msg) => format!("{}\n\n{}", sys_msg, prompt),
            None => prompt.to_string(),
        };

        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: full_prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: GRADING_TEMPERATURE,
                max_output_tokens: 1024,
                response_mime_type: "application/json".to_string(),
            },
        };

        debug!(
            provider = "Gemini",
            model = %self.model,
            prompt_length = prompt.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(provider = "Gemini", status = %status, error = %error_text, "LLM API request failed");
            return Err(anyhow!("Gemini API request failed ({}): {}", status, error_text));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| anyhow!("No content in Gemini response"))
    }
}

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)\s*```").expect("fence pattern is a valid regex")
    })
}

/// Best-effort extraction of a JSON object from free-form completion text
#[derive(Clone)]
pub struct JsonResponseParser;

impl JsonResponseParser {
    /// Strip ```json / ``` fence markers, otherwise fall back to the outermost `{...}` span
    pub fn extract_json_from_response(content: &str) -> String {
        if let Some(inner) = fence_pattern()
            .captures(content)
            .and_then(|captures| captures.get(1))
        {
            return inner.as_str().trim().to_string();
        }

        if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
            if end > start {
                return content[start..=end].to_string();
            }
        }

        content.trim().to_string()
    }

    /// Parse JSON response into a specific type with error handling
    pub fn parse_json_response<T>(content: &str) -> serde_json::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_str::<T>(&Self::extract_json_from_response(content))
    }
}

/// Factory for creating LLM providers based on provider type
pub struct LLMProviderFactory;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum LLMProviderType {
    OpenAI,
    Gemini,
}

impl LLMProviderFactory {
    /// Create a new LLM provider instance based on provider type
    pub fn create_provider(
        provider_type: LLMProviderType,
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
    ) -> LLMProvider {
        match provider_type {
            LLMProviderType::OpenAI => {
                LLMProvider::OpenAI(OpenAIProvider::new(api_key, base_url, model))
            }
            LLMProviderType::Gemini => {
                LLMProvider::Gemini(GeminiProvider::new(api_key, base_url, model))
            }
        }
    }

    pub fn from_config(config: &LLMConfig) -> LLMProvider {
        Self::create_provider(
            config.provider,
            config.api_key.clone(),
            config.base_url.clone(),
            config.model.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_extract_json_from_fenced_block() {
        let content = "Here is the grade:\n```json\n{\"score\": 4, \"feedback\": \"Good\"}\n```\nThanks";
        assert_eq!(
            JsonResponseParser::extract_json_from_response(content),
            "{\"score\": 4, \"feedback\": \"Good\"}"
        );
    }

    #[test]
    fn test_extract_json_from_plain_fence() {
        let content = "```\n{\"score\": 1}\n```";
        assert_eq!(JsonResponseParser::extract_json_from_response(content), "{\"score\": 1}");
    }

    #[test]
    fn test_extract_json_without_fence() {
        let content = "Result: {\"score\": 2, \"feedback\": \"ok\"} end";
        assert_eq!(
            JsonResponseParser::extract_json_from_response(content),
            "{\"score\": 2, \"feedback\": \"ok\"}"
        );
        assert_eq!(JsonResponseParser::extract_json_from_response("  {} "), "{}");
    }

    #[test]
    fn test_parse_failure_is_an_error() {
        assert!(JsonResponseParser::parse_json_response::<Value>("no json here").is_err());
        assert!(JsonResponseParser::parse_json_response::<Value>("```json\n{score: }\n```").is_err());
    }

    #[test]
    fn test_factory_creates_requested_provider() {
        let provider = LLMProviderFactory::create_provider(
            LLMProviderType::Gemini,
            "key".to_string(),
            None,
            None,
        );
        assert_eq!(provider.provider_name(), "Gemini");
        assert_eq!(provider.model_name(), "gemini-2.0-flash");

        let config = LLMConfig {
            api_key: "key".to_string(),
            base_url: Some("http://localhost:9999/v1".to_string()),
            provider: LLMProviderType::OpenAI,
            model: Some("gpt-4o".to_string()),
        };
        let provider = LLMProviderFactory::from_config(&config);
        assert_eq!(provider.provider_name(), "OpenAI");
        assert_eq!(provider.model_name(), "gpt-4o");
    }
}
