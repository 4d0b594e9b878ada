//! Provider client configuration
//!
//! Endpoints, credentials and limits are passed to the clients at construction.
//! Nothing here is read at request time.

use crate::error::ConfigError;
use serde::Serialize;
use std::time::Duration;

pub const ENV_ANALYSIS_URL: &str = "MEDSCAN_ANALYSIS_URL";
pub const ENV_ANALYSIS_TIMEOUT: &str = "MEDSCAN_ANALYSIS_TIMEOUT_SECS";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_FOLLOWUP_BASE_URL: &str = "MEDSCAN_FOLLOWUP_BASE_URL";
pub const ENV_FOLLOWUP_MODEL: &str = "MEDSCAN_FOLLOWUP_MODEL";
pub const ENV_FOLLOWUP_TIMEOUT: &str = "MEDSCAN_FOLLOWUP_TIMEOUT_SECS";
pub const ENV_MAX_PROMPT_CHARS: &str = "MEDSCAN_MAX_PROMPT_CHARS";

/// OCR/analysis provider settings
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Upload endpoint receiving the multipart `file` field
    pub endpoint: String,

    /// Single bounded wait for the whole upload + analysis round trip
    pub timeout: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/upload/".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Fixed generation parameters sent with every follow-up request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub candidate_count: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            candidate_count: 1,
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 2048,
        }
    }
}

/// Text-completion provider settings
#[derive(Debug, Clone)]
pub struct FollowupConfig {
    /// API key sent in the `x-goog-api-key` header
    pub api_key: String,

    /// Base URL for models (default: Gemini v1beta)
    pub base_url: String,

    /// Model to use (default: gemini-1.5-flash)
    pub model: String,

    pub timeout: Duration,

    /// Largest prompt, in characters, the provider is asked to accept
    pub max_prompt_chars: usize,

    pub generation: GenerationConfig,
}

impl FollowupConfig {
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl Default for FollowupConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: "gemini-1.5-flash".to_string(),
            timeout: Duration::from_secs(60),
            max_prompt_chars: 30_000,
            generation: GenerationConfig::default(),
        }
    }
}

/// Configuration for both provider clients
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub analysis: AnalysisConfig,
    pub followup: FollowupConfig,
}

impl ClientConfig {
    /// Build from process environment (call after loading `.env`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut config = Self::default();

        config.followup.api_key = get(ENV_GEMINI_API_KEY).ok_or(ConfigError::Missing(ENV_GEMINI_API_KEY))?;

        if let Some(url) = get(ENV_ANALYSIS_URL) {
            config.analysis.endpoint = url;
        }
        if let Some(value) = get(ENV_ANALYSIS_TIMEOUT) {
            config.analysis.timeout = parse_secs(ENV_ANALYSIS_TIMEOUT, &value)?;
        }
        if let Some(url) = get(ENV_FOLLOWUP_BASE_URL) {
            config.followup.base_url = url;
        }
        if let Some(model) = get(ENV_FOLLOWUP_MODEL) {
            config.followup.model = model;
        }
        if let Some(value) = get(ENV_FOLLOWUP_TIMEOUT) {
            config.followup.timeout = parse_secs(ENV_FOLLOWUP_TIMEOUT, &value)?;
        }
        if let Some(value) = get(ENV_MAX_PROMPT_CHARS) {
            config.followup.max_prompt_chars = value
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    name: ENV_MAX_PROMPT_CHARS,
                    value,
                })?;
        }

        Ok(config)
    }
}

fn parse_secs(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid {
            name,
            value: value.to_string(),
        })
}
