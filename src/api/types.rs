//! Shared context and request/response shapes for the API layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::pipeline::fetch::FetchLimits;
use crate::pipeline::llm::GeminiClient;
use crate::pipeline::Orchestrator;
use crate::platform::PlatformClient;

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppContext {
    pub orchestrator: Arc<Orchestrator<GeminiClient>>,
}

impl AppContext {
    /// Wire the pipeline from configuration. A missing LLM config leaves the
    /// summarizer disabled and the pipeline degrades explicitly.
    pub fn new(config: &Config) -> Self {
        let platform = PlatformClient::new(&config.platform);
        let llm = config.llm.as_ref().map(GeminiClient::new);
        Self {
            orchestrator: Arc::new(Orchestrator::new(platform, llm)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UrlsRequest {
    pub patient_id: String,
    #[serde(default)]
    pub page_no: u32,
}

#[derive(Debug, Serialize)]
pub struct UrlsResponse {
    pub patient_id: String,
    pub count: usize,
    pub urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    pub patient_id: String,
    #[serde(default)]
    pub page_no: u32,
    #[serde(default = "default_max_docs")]
    pub max_docs: usize,
    #[serde(default = "default_per_doc_max_chars")]
    pub per_doc_max_chars: usize,
}

impl SummaryRequest {
    pub fn limits(&self) -> FetchLimits {
        FetchLimits {
            max_docs: self.max_docs,
            per_doc_max_chars: self.per_doc_max_chars,
        }
    }
}

fn default_max_docs() -> usize {
    FetchLimits::default().max_docs
}

fn default_per_doc_max_chars() -> usize {
    FetchLimits::default().per_doc_max_chars
}
