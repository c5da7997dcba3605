use anyhow::{anyhow, Result};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

use crate::llm_providers::LLMProviderType;

// Import logging macros
use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LLMConfig,
    pub grading: GradingConfig,
    pub logging: LoggingConfig,
}

/// Large Language Model service configuration
#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub provider: LLMProviderType,
    pub model: Option<String>,
}

/// Tunable constants of the grading pipeline.
///
/// The similarity ladder and keyword cutoff are empirical values kept for
/// behavioural parity; change them only with matching fixture updates.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingConfig {
    /// Answers graded concurrently before moving on to the next batch
    pub batch_size: usize,
    /// Pause between batches, throttles outbound AI calls
    pub batch_pause_ms: u64,
    /// Budget for a single AI grading call
    pub ai_timeout_ms: u64,
    /// Open-ended answers shorter than this (in characters) skip the AI call
    pub short_answer_chars: usize,
    /// Minimum keyword length taken from a model answer
    pub keyword_min_len: usize,
    /// Share of the points awarded when there is no model answer to compare against
    pub no_model_answer_ratio: f64,
    pub similarity_full: f64,
    pub similarity_high: f64,
    pub similarity_partial: f64,
    pub high_credit_ratio: f64,
    pub partial_credit_ratio: f64,
}

/// Logging system configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        log_system_event!(config, "Loading grading configuration from environment variables");

        let config = Config {
            llm: LLMConfig::from_lookup(lookup),
            grading: GradingConfig::from_lookup(lookup)?,
            logging: LoggingConfig::from_lookup(lookup),
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            api_key_masked = %mask_sensitive_data(&self.llm.api_key),
            llm_provider = ?self.llm.provider,
            llm_model = ?self.llm.model,
            batch_size = self.grading.batch_size,
            batch_pause_ms = self.grading.batch_pause_ms,
            ai_timeout_ms = self.grading.ai_timeout_ms,
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.grading.validate()?;

        if self.llm.api_key.is_empty() || self.llm.api_key == "your-api-key" {
            warn!("LLM API key appears to be placeholder or empty - open-ended answers will use keyword grading");
        }

        if !["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|level| self.logging.level.to_lowercase().starts_with(level))
        {
            warn!("Unrecognised log level '{}', using 'info' as fallback", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl LLMConfig {
    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let api_key = lookup("LLM_API_KEY").unwrap_or_else(|| "your-api-key".to_string());
        let base_url = lookup("LLM_BASE_URL");
        let provider_str = lookup("LLM_PROVIDER").unwrap_or_else(|| "openai".to_string());

        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" | "google" => LLMProviderType::Gemini,
            "openai" | "chatgpt" | "gpt" => LLMProviderType::OpenAI,
            _ => {
                info!("Unknown LLM provider '{}', defaulting to OpenAI", provider_str);
                LLMProviderType::OpenAI
            }
        };

        let model = lookup("LLM_MODEL");

        LLMConfig {
            api_key,
            base_url,
            provider,
            model,
        }
    }
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            batch_size: 2,
            batch_pause_ms: 50,
            ai_timeout_ms: 3000,
            short_answer_chars: 10,
            keyword_min_len: 3,
            no_model_answer_ratio: 0.7,
            similarity_full: 0.8,
            similarity_high: 0.6,
            similarity_partial: 0.4,
            high_credit_ratio: 0.8,
            partial_credit_ratio: 0.5,
        }
    }
}

impl GradingConfig {
    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        Ok(GradingConfig {
            batch_size: parse_or(lookup, "GRADING_BATCH_SIZE", defaults.batch_size)?,
            batch_pause_ms: parse_or(lookup, "GRADING_BATCH_PAUSE_MS", defaults.batch_pause_ms)?,
            ai_timeout_ms: parse_or(lookup, "GRADING_AI_TIMEOUT_MS", defaults.ai_timeout_ms)?,
            short_answer_chars: parse_or(
                lookup,
                "GRADING_SHORT_ANSWER_CHARS",
                defaults.short_answer_chars,
            )?,
            keyword_min_len: parse_or(lookup, "GRADING_KEYWORD_MIN_LEN", defaults.keyword_min_len)?,
            no_model_answer_ratio: parse_or(
                lookup,
                "GRADING_NO_MODEL_ANSWER_RATIO",
                defaults.no_model_answer_ratio,
            )?,
            similarity_full: parse_or(lookup, "GRADING_SIMILARITY_FULL", defaults.similarity_full)?,
            similarity_high: parse_or(lookup, "GRADING_SIMILARITY_HIGH", defaults.similarity_high)?,
            similarity_partial: parse_or(
                lookup,
                "GRADING_SIMILARITY_PARTIAL",
                defaults.similarity_partial,
            )?,
            high_credit_ratio: defaults.high_credit_ratio,
            partial_credit_ratio: defaults.partial_credit_ratio,
        })
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_millis(self.ai_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(anyhow!("GRADING_BATCH_SIZE must be greater than 0"));
        }

        if self.ai_timeout_ms == 0 {
            return Err(anyhow!("GRADING_AI_TIMEOUT_MS must be greater than 0"));
        }

        let ratios = [
            ("GRADING_NO_MODEL_ANSWER_RATIO", self.no_model_answer_ratio),
            ("GRADING_SIMILARITY_FULL", self.similarity_full),
            ("GRADING_SIMILARITY_HIGH", self.similarity_high),
            ("GRADING_SIMILARITY_PARTIAL", self.similarity_partial),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be between 0 and 1, got {}", name, value));
            }
        }

        if !(self.similarity_full > self.similarity_high
            && self.similarity_high > self.similarity_partial)
        {
            return Err(anyhow!(
                "Similarity thresholds must be strictly descending (full > high > partial)"
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let level = lookup("RUST_LOG").unwrap_or_else(|| "info,exam_grading=debug".to_string());

        let file_enabled = lookup("LOG_FILE_ENABLED")
            .and_then(|value| value.parse::<bool>().ok())
            .unwrap_or(false);

        let console_enabled = lookup("LOG_CONSOLE_ENABLED")
            .and_then(|value| value.parse::<bool>().ok())
            .unwrap_or(true);

        let log_directory = lookup("LOG_DIRECTORY").unwrap_or_else(|| "logs".to_string());

        LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        }
    }
}

fn parse_or<T>(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("Invalid {} value: '{}'", key, raw)),
        None => Ok(default),
    }
}

/// Mask sensitive data in configuration for safe logging
fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}
