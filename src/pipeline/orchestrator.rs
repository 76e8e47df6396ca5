//! Composition of the pipeline stages behind the two public operations.
//!
//! Stage order within one request is strict: token → discovery → fetch →
//! summarize. Hard failures (auth, upstream) abort; per-document failures
//! and model-output parse failures degrade, so a request that got past
//! discovery always reaches a terminal success shape.

use std::sync::Arc;

use crate::models::{CandidateUrl, MentalState, JourneySummary, SummaryEnvelope};
use crate::pipeline::fetch::{fetch_documents, FetchLimits};
use crate::pipeline::llm::LlmGenerate;
use crate::pipeline::parser::{parse_summary_response, DecodeTier};
use crate::pipeline::prompt::{build_summary_prompt, DocumentSnippet};
use crate::pipeline::scanner::{scan_with, ScanOptions};
use crate::platform::{PlatformClient, PlatformError};

/// Result of the discovery stage: the ordered candidate list for one patient.
#[derive(Debug)]
pub struct Discovery {
    pub patient_id: String,
    pub urls: Vec<CandidateUrl>,
}

pub struct Orchestrator<L> {
    platform: PlatformClient,
    llm: Option<Arc<L>>,
    scan_options: ScanOptions,
}

impl<L: LlmGenerate> Orchestrator<L> {
    pub fn new(platform: PlatformClient, llm: Option<L>) -> Self {
        Self {
            platform,
            llm: llm.map(Arc::new),
            scan_options: ScanOptions::default(),
        }
    }

    /// Token → appointment listing → link scan. An empty result is a valid
    /// "zero documents found" outcome, not an error.
    pub async fn discover(
        &self,
        patient_id: &str,
        page_no: u32,
    ) -> Result<Discovery, PlatformError> {
        let listing = self.platform.appointments(patient_id, page_no).await?;
        let urls = scan_with(&listing, &self.scan_options);
        tracing::info!(patient_id, count = urls.len(), "document discovery complete");
        Ok(Discovery {
            patient_id: patient_id.to_string(),
            urls,
        })
    }

    /// Full pipeline: discover, fetch, extract, summarize, normalize.
    pub async fn summarize(
        &self,
        patient_id: &str,
        page_no: u32,
        limits: FetchLimits,
    ) -> Result<SummaryEnvelope, PlatformError> {
        let discovery = self.discover(patient_id, page_no).await?;
        let source_count = discovery.urls.len();

        if source_count == 0 {
            tracing::info!(patient_id, "no documents found; skipping fetch and LLM");
            return Ok(no_documents_envelope(patient_id));
        }

        let Some(llm) = &self.llm else {
            // Without a summarizer there is no point paying for downloads.
            return Ok(degraded_envelope(
                patient_id,
                0,
                source_count,
                "Summarizer not configured; document downloads skipped",
            ));
        };

        let documents = fetch_documents(&self.platform, &discovery.urls, &limits).await;
        let snippets: Vec<DocumentSnippet> = documents
            .iter()
            .enumerate()
            .filter_map(|(i, doc)| {
                doc.usable_text().map(|text| DocumentSnippet {
                    name: format!("doc_{}", i + 1),
                    source_url: doc.source_url.clone(),
                    text: text.to_string(),
                })
            })
            .collect();
        let ingested_docs = snippets.len();

        if ingested_docs == 0 {
            tracing::warn!(patient_id, source_count, "no document yielded usable text");
            return Ok(degraded_envelope(
                patient_id,
                0,
                source_count,
                "Documents were found but none yielded extractable text",
            ));
        }

        let prompt = build_summary_prompt(&snippets, patient_id);

        // Detached task: if the caller disconnects mid-request, the
        // already-started (cost-bearing) LLM call still completes and its
        // result is simply discarded with the request.
        let llm = Arc::clone(llm);
        let call = tokio::spawn(async move { llm.generate(&prompt).await });

        let body = match call.await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                tracing::warn!(patient_id, error = %e, "LLM call failed");
                return Ok(degraded_envelope(
                    patient_id,
                    ingested_docs,
                    source_count,
                    "Summarizer call failed; no summary produced",
                ));
            }
            Err(e) => {
                tracing::error!(patient_id, error = %e, "LLM task aborted");
                return Ok(degraded_envelope(
                    patient_id,
                    ingested_docs,
                    source_count,
                    "Summarizer task aborted; no summary produced",
                ));
            }
        };

        let (summary, tier) = parse_summary_response(&body, patient_id);
        if tier == DecodeTier::Fallback {
            tracing::warn!(patient_id, "model output unparseable; returning flagged summary");
        } else {
            tracing::info!(patient_id, ?tier, "summary produced");
        }

        Ok(SummaryEnvelope {
            summary,
            ingested_docs,
            source_count,
            debug: None,
        })
    }
}

fn no_documents_envelope(patient_id: &str) -> SummaryEnvelope {
    SummaryEnvelope {
        summary: JourneySummary::empty(
            patient_id,
            "No prescription/document URLs were found for this patient. \
             Verify the patient id or the API scopes.",
            MentalState::amber("Insufficient data", 0.2),
        ),
        ingested_docs: 0,
        source_count: 0,
        debug: Some(serde_json::json!({"note": "no documents found"})),
    }
}

fn degraded_envelope(
    patient_id: &str,
    ingested_docs: usize,
    source_count: usize,
    note: &str,
) -> SummaryEnvelope {
    SummaryEnvelope {
        summary: JourneySummary::empty(
            patient_id,
            note,
            MentalState::amber("Insufficient data", 0.2),
        ),
        ingested_docs,
        source_count,
        debug: Some(serde_json::json!({"note": note})),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;

    use axum::extract::{Host, Query};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    use super::*;
    use crate::config::PlatformConfig;
    use crate::models::MentalStateColor;
    use crate::pipeline::llm::MockLlm;

    async fn handle_login() -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "access_token": "t", "refresh_token": "r",
            "expires_in": 600.0, "refresh_expires_in": 86400.0,
        }))
    }

    /// Appointment listing whose document URLs point back at this stub.
    /// The patient id selects the scenario.
    async fn handle_appointments(
        Host(host): Host,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<serde_json::Value> {
        let listing = match params.get("patient_id").map(String::as_str) {
            Some("empty") => serde_json::json!({"appointments": []}),
            Some("one-bad") => serde_json::json!({"appointments": [
                {"file_url": format!("http://{host}/docs/missing.txt")},
                {"file_url": format!("http://{host}/docs/a.txt")},
            ]}),
            _ => serde_json::json!({"appointments": [
                {"file_url": format!("http://{host}/docs/a.txt")},
                {"documents": [{"download_url": format!("http://{host}/docs/b.txt")}]},
            ]}),
        };
        Json(listing)
    }

    async fn spawn_stub() -> String {
        async fn doc_a() -> impl IntoResponse {
            ([("content-type", "text/plain")], "Visit 1: fever and cough.")
        }
        async fn doc_b() -> impl IntoResponse {
            ([("content-type", "text/plain")], "Visit 2: improving, continue meds.")
        }
        async fn missing() -> impl IntoResponse {
            StatusCode::NOT_FOUND
        }

        let app = Router::new()
            .route("/connect-auth/v1/account/login", post(handle_login))
            .route("/dr/v1/appointment", get(handle_appointments))
            .route("/docs/a.txt", get(doc_a))
            .route("/docs/b.txt", get(doc_b))
            .route("/docs/missing.txt", get(missing));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn platform(base: &str) -> PlatformClient {
        PlatformClient::new(&PlatformConfig {
            base_url: base.to_string(),
            api_key: "k".into(),
            client_id: "c".into(),
            client_secret: "s".into(),
            user_token: None,
        })
    }

    fn valid_model_output() -> String {
        serde_json::json!({
            "summary": "Short febrile illness with full recovery.",
            "timeline": [{"date": "2024-01-05", "title": "Initial visit", "details": "Fever."}],
            "key_findings": ["Fever at onset"],
            "medications_mentioned": ["Paracetamol (500mg)"],
            "followups_or_actions": ["Routine follow-up"],
            "mental_state": {"color": "Green", "explanation": "Stable", "confidence": 0.7}
        })
        .to_string()
    }

    #[tokio::test]
    async fn discover_orders_and_tags_candidates() {
        let base = spawn_stub().await;
        let orchestrator = Orchestrator::new(platform(&base), Some(MockLlm::new("")));

        let discovery = orchestrator.discover("pat-1", 0).await.unwrap();
        assert_eq!(discovery.urls.len(), 2);
        assert!(discovery.urls[0].url.ends_with("/docs/a.txt"));
        assert!(discovery.urls[1].url.ends_with("/docs/b.txt"));
    }

    #[tokio::test]
    async fn zero_urls_short_circuit_without_llm_call() {
        let base = spawn_stub().await;
        let mock = MockLlm::new(&valid_model_output());
        let calls = mock.call_counter();
        let orchestrator = Orchestrator::new(platform(&base), Some(mock));

        let envelope = orchestrator
            .summarize("empty", 0, FetchLimits::default())
            .await
            .unwrap();

        assert_eq!(envelope.source_count, 0);
        assert_eq!(envelope.ingested_docs, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(envelope.debug.is_some());
    }

    #[tokio::test]
    async fn happy_path_summarizes_all_documents() {
        let base = spawn_stub().await;
        let mock = MockLlm::new(&valid_model_output());
        let calls = mock.call_counter();
        let orchestrator = Orchestrator::new(platform(&base), Some(mock));

        let envelope = orchestrator
            .summarize("pat-1", 0, FetchLimits::default())
            .await
            .unwrap();

        assert_eq!(envelope.source_count, 2);
        assert_eq!(envelope.ingested_docs, 2);
        assert_eq!(envelope.summary.mental_state.color, MentalStateColor::Green);
        assert_eq!(envelope.summary.patient_id, "pat-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_model_output_degrades_not_errors() {
        let base = spawn_stub().await;
        let orchestrator =
            Orchestrator::new(platform(&base), Some(MockLlm::new("certainly! here you go")));

        let envelope = orchestrator
            .summarize("pat-1", 0, FetchLimits::default())
            .await
            .unwrap();

        assert_eq!(envelope.summary.mental_state.color, MentalStateColor::Amber);
        assert_eq!(envelope.summary.mental_state.confidence, 0.0);
        assert!(envelope.summary.raw_model_output.is_some());
        assert_eq!(envelope.ingested_docs, 2);
    }

    #[tokio::test]
    async fn per_document_failure_is_absorbed() {
        let base = spawn_stub().await;
        let orchestrator =
            Orchestrator::new(platform(&base), Some(MockLlm::new(&valid_model_output())));

        let envelope = orchestrator
            .summarize("one-bad", 0, FetchLimits::default())
            .await
            .unwrap();

        assert_eq!(envelope.source_count, 2);
        assert_eq!(envelope.ingested_docs, 1);
    }

    #[tokio::test]
    async fn missing_llm_skips_downloads_and_degrades() {
        let base = spawn_stub().await;
        let orchestrator: Orchestrator<MockLlm> = Orchestrator::new(platform(&base), None);

        let envelope = orchestrator
            .summarize("pat-1", 0, FetchLimits::default())
            .await
            .unwrap();

        assert_eq!(envelope.source_count, 2);
        assert_eq!(envelope.ingested_docs, 0);
        assert!(envelope.debug.is_some());
        assert_eq!(envelope.summary.mental_state.color, MentalStateColor::Amber);
    }

    #[tokio::test]
    async fn llm_transport_failure_degrades() {
        let base = spawn_stub().await;
        let orchestrator = Orchestrator::new(platform(&base), Some(MockLlm::failing()));

        let envelope = orchestrator
            .summarize("pat-1", 0, FetchLimits::default())
            .await
            .unwrap();

        assert_eq!(envelope.ingested_docs, 2);
        assert_eq!(envelope.summary.mental_state.color, MentalStateColor::Amber);
        assert!(envelope.debug.is_some());
    }

    #[tokio::test]
    async fn upstream_failure_aborts_discovery() {
        // No platform stub at all: transport error surfaces as a hard failure.
        let orchestrator = Orchestrator::new(
            platform("http://127.0.0.1:1"),
            Some(MockLlm::new("")),
        );
        let err = orchestrator.discover("pat-1", 0).await.unwrap_err();
        assert!(matches!(err, PlatformError::Auth(_)));
    }
}
