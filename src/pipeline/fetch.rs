//! Per-document download and text extraction.
//!
//! Candidates are fetched concurrently but results come back in input order,
//! so the downstream prompt is deterministic for a given discovery. Failure
//! is local: one bad document never invalidates its siblings.

use futures_util::future::join_all;

use crate::models::{CandidateUrl, FetchStatus, FetchedDocument};
use crate::platform::PlatformClient;

const TRUNCATION_MARKER: &str = "\n...[truncated]";

#[derive(Debug, Clone)]
pub struct FetchLimits {
    /// Hard cap on how many candidates are fetched at all.
    pub max_docs: usize,
    /// Per-document character cap, to keep the LLM payload bounded.
    pub per_doc_max_chars: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            max_docs: 15,
            per_doc_max_chars: 40_000,
        }
    }
}

/// Fetch and extract every candidate (up to `max_docs`), one result per
/// input, in input order.
pub async fn fetch_documents(
    platform: &PlatformClient,
    candidates: &[CandidateUrl],
    limits: &FetchLimits,
) -> Vec<FetchedDocument> {
    let capped = &candidates[..candidates.len().min(limits.max_docs)];
    if capped.len() < candidates.len() {
        tracing::info!(
            total = candidates.len(),
            cap = limits.max_docs,
            "capping document fetch"
        );
    }

    // join_all yields results in the order of its input futures, which is
    // the ordering guarantee the summarizer relies on.
    join_all(
        capped
            .iter()
            .map(|candidate| fetch_one(platform, &candidate.url, limits)),
    )
    .await
}

async fn fetch_one(
    platform: &PlatformClient,
    url: &str,
    limits: &FetchLimits,
) -> FetchedDocument {
    let download = match platform.download(url).await {
        Ok(download) => download,
        Err(e) => {
            tracing::warn!(url, error = %e, "document download failed");
            return FetchedDocument {
                source_url: url.to_string(),
                text: None,
                status: FetchStatus::DownloadFailed,
            };
        }
    };

    match extract_text(&download.bytes, download.content_type.as_deref()) {
        Ok(text) => FetchedDocument {
            source_url: url.to_string(),
            text: Some(truncate_chars(&text, limits.per_doc_max_chars)),
            status: FetchStatus::Ok,
        },
        Err(detail) => {
            tracing::warn!(url, %detail, "text extraction failed");
            FetchedDocument {
                source_url: url.to_string(),
                text: None,
                status: FetchStatus::ExtractFailed,
            }
        }
    }
}

/// Extract plain text from a downloaded body. PDFs go through the text-layer
/// extractor page by page; anything else is attempted as UTF-8 text.
pub(crate) fn extract_text(bytes: &[u8], content_type: Option<&str>) -> Result<String, String> {
    let text = if looks_like_pdf(bytes, content_type) {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| format!("PDF extraction error: {e}"))?
            .join("\n")
    } else {
        std::str::from_utf8(bytes)
            .map_err(|e| format!("not decodable as UTF-8 text: {e}"))?
            .to_string()
    };
    Ok(text.replace('\0', " ").trim().to_string())
}

fn looks_like_pdf(bytes: &[u8], content_type: Option<&str>) -> bool {
    bytes.starts_with(b"%PDF")
        || content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("pdf"))
}

/// Character-count truncation, safe on multi-byte content.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{TRUNCATION_MARKER}", &text[..byte_idx]),
        None => text.to_string(),
    }
}
