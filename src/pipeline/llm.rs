//! LLM backend for summarization: a trait so the pipeline can be exercised
//! with a mock, and a Gemini-style `generateContent` REST client.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;

const LLM_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Transport(String),

    #[error("LLM returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM response carried no text content")]
    MissingContent,
}

/// Single-shot text generation. Implementations must be shareable across
/// tasks: the orchestrator runs the call in a detached task so a client
/// disconnect cannot cancel an already-started, cost-bearing call.
pub trait LlmGenerate: Send + Sync + 'static {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, LlmError>> + Send;
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl LlmGenerate for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                response_mime_type: "application/json",
            },
        };

        let response = self
            .http
            .post(&url)
            .timeout(std::time::Duration::from_secs(LLM_TIMEOUT_SECS))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: crate::platform::truncate_detail(&body, 300),
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("response undecodable: {e}")))?;

        parsed
            .candidates
            .into_iter()
            .flatten()
            .filter_map(|c| c.content)
            .filter_map(|c| c.parts)
            .flatten()
            .find_map(|p| p.text)
            .ok_or(LlmError::MissingContent)
    }
}

/// Mock backend for tests: canned response, invocation counter, optional
/// failure mode.
pub struct MockLlm {
    response: String,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl MockLlm {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: String::new(),
            fail: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of `generate` invocations.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl LlmGenerate for MockLlm {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(LlmError::Transport("mock transport failure".into()))
        } else {
            Ok(self.response.clone())
        }
    }
}
