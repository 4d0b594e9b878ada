//! Text-completion provider client for follow-up questions
//!
//! Speaks the Gemini `generateContent` wire format: one user turn carrying the
//! extracted document text and the question, plus fixed generation parameters
//! and safety settings.

use super::config::{FollowupConfig, GenerationConfig};
use super::http_client::{classify_transport_error, completion_client};
use super::prompts::{build_followup_prompt, prompt_size, CONNECTION_CHECK_PROMPT};
use super::utils::provider_error_text;
use crate::error::{SessionError, SessionResult};
use crate::identity::{authorize, Principal};
use crate::session::AnalysisResult;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Harm categories blocked at medium probability and above
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];
const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

/// Anything that can answer a question about an analyzed document
#[async_trait]
pub trait FollowupProvider: Send + Sync {
    /// Reject a question whose prompt cannot be sent, without making a request
    fn check_prompt(&self, _analysis: &AnalysisResult, _question: &str) -> SessionResult<()> {
        Ok(())
    }

    async fn ask(
        &self,
        analysis: &AnalysisResult,
        question: &str,
        principal: Option<&Principal>,
    ) -> SessionResult<String>;
}

// API request/response types

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content>,
    generation_config: &'a GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Gemini-compatible completion client
pub struct FollowupClient {
    client: Client,
    config: FollowupConfig,
}

impl FollowupClient {
    /// Create a client on the shared completion connection pool
    pub fn new(config: FollowupConfig) -> Self {
        Self::with_client(completion_client().clone(), config)
    }

    pub fn with_client(client: Client, config: FollowupConfig) -> Self {
        Self { client, config }
    }

    /// Build the prompt and enforce the provider's size limit
    fn prepare_prompt(&self, analysis: &AnalysisResult, question: &str) -> SessionResult<String> {
        let prompt = build_followup_prompt(&analysis.extracted_text, question);
        let size = prompt_size(&prompt);

        if size > self.config.max_prompt_chars {
            return Err(SessionError::PromptTooLarge {
                size,
                limit: self.config.max_prompt_chars,
            });
        }

        Ok(prompt)
    }

    fn build_request(&self, prompt: String) -> GenerateContentRequest<'_> {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: &self.config.generation,
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: SAFETY_THRESHOLD,
                })
                .collect(),
        }
    }

    /// Send one prompt and return the reply text
    async fn generate(&self, prompt: String, principal: Option<&Principal>) -> SessionResult<String> {
        let endpoint = self.config.endpoint();
        let body = self.build_request(prompt);

        let mut request = self
            .client
            .post(&endpoint)
            .timeout(self.config.timeout)
            .json(&body);
        if !self.config.api_key.is_empty() {
            request = request.header("x-goog-api-key", &self.config.api_key);
        }

        let response = authorize(request, principal)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, self.config.timeout))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| classify_transport_error(&e, self.config.timeout))?;

        parse_completion_response(status, &text)
    }

    /// Probe the provider with a trivial prompt
    ///
    /// Returns `Ok(false)` when the provider answers but not with "ok".
    pub async fn check_connection(&self) -> SessionResult<bool> {
        let reply = self.generate(CONNECTION_CHECK_PROMPT.to_string(), None).await?;
        let ok = reply.to_lowercase().contains("ok");
        tracing::info!(model = %self.config.model, ok, "Follow-up provider connection check");
        Ok(ok)
    }
}

#[async_trait]
impl FollowupProvider for FollowupClient {
    fn check_prompt(&self, analysis: &AnalysisResult, question: &str) -> SessionResult<()> {
        self.prepare_prompt(analysis, question).map(|_| ())
    }

    async fn ask(
        &self,
        analysis: &AnalysisResult,
        question: &str,
        principal: Option<&Principal>,
    ) -> SessionResult<String> {
        let prompt = self.prepare_prompt(analysis, question)?;
        let started = Instant::now();

        tracing::info!(
            analysis = %analysis.id,
            model = %self.config.model,
            prompt_chars = prompt_size(&prompt),
            "Sending follow-up question"
        );

        let result = self.generate(prompt, principal).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(answer) => tracing::info!(analysis = %analysis.id, chars = answer.len(), elapsed_ms, "Follow-up answered"),
            Err(e) => tracing::warn!(analysis = %analysis.id, kind = %e.kind(), elapsed_ms, "Follow-up failed: {}", e),
        }

        result
    }
}

/// Parse a `generateContent` HTTP response into the answer text
///
/// The parts of the first candidate that carries text are joined with a space.
pub fn parse_completion_response(status: u16, body: &str) -> SessionResult<String> {
    if !(200..300).contains(&status) {
        return Err(SessionError::ProviderError {
            status: Some(status),
            message: provider_error_text(body),
        });
    }

    let response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| SessionError::MalformedProviderResponse {
            message: format!("invalid JSON: {}", e),
        })?;

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(SessionError::ProviderError {
            status: None,
            message: format!("request blocked: {}", reason),
        });
    }

    for candidate in response.candidates {
        let Some(content) = candidate.content else {
            continue;
        };

        let texts: Vec<String> = content.parts.into_iter().filter_map(|p| p.text).collect();
        let answer = texts.join(" ").trim().to_string();
        if !answer.is_empty() {
            return Ok(answer);
        }
    }

    Err(SessionError::MalformedProviderResponse {
        message: "no text at candidates[].content.parts[].text".to_string(),
    })
}
