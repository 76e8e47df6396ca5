//! Core domain types shared across the discovery and summarization pipeline.

use serde::{Deserialize, Serialize};

/// How confident the link scanner is that a URL points at a real document.
///
/// Ordering matters: when the same URL is matched by several rules, the
/// highest-ranked confidence wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    ExplicitKey,
    PdfSuffix,
    KeywordMatch,
}

impl Confidence {
    /// Precedence rank: explicit_key > pdf_suffix > keyword_match.
    pub fn rank(self) -> u8 {
        match self {
            Confidence::ExplicitKey => 2,
            Confidence::PdfSuffix => 1,
            Confidence::KeywordMatch => 0,
        }
    }
}

/// A document URL discovered in a clinical-platform response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateUrl {
    pub url: String,
    pub confidence: Confidence,
}

/// Outcome of downloading and extracting one candidate document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Ok,
    DownloadFailed,
    ExtractFailed,
}

/// One fetched document. Failure of a sibling never invalidates this one.
#[derive(Debug, Clone, Serialize)]
pub struct FetchedDocument {
    pub source_url: String,
    pub text: Option<String>,
    pub status: FetchStatus,
}

impl FetchedDocument {
    pub fn usable_text(&self) -> Option<&str> {
        match self.status {
            FetchStatus::Ok => self.text.as_deref().filter(|t| !t.trim().is_empty()),
            _ => None,
        }
    }
}

/// Triage color for the patient's overall mental state, estimated from the
/// notes. Non-diagnostic by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MentalStateColor {
    Green,
    Amber,
    Red,
}

impl MentalStateColor {
    /// Lenient parse of whatever casing the model returned.
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" => Some(MentalStateColor::Green),
            "amber" => Some(MentalStateColor::Amber),
            "red" => Some(MentalStateColor::Red),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentalState {
    pub color: MentalStateColor,
    pub explanation: String,
    /// Model-reported scalar, clamped into [0, 1] on ingestion.
    pub confidence: f64,
}

impl MentalState {
    /// Neutral, non-dismissive default used when the model output could not
    /// be parsed or mental health was not assessed.
    pub fn amber(explanation: impl Into<String>, confidence: f64) -> Self {
        Self {
            color: MentalStateColor::Amber,
            explanation: explanation.into(),
            confidence: clamp_confidence(confidence),
        }
    }
}

/// Clamp a model-reported confidence into [0, 1]; NaN collapses to 0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// `YYYY-MM-DD` when the model could date the event, `null` otherwise.
    pub date: Option<String>,
    pub title: String,
    pub details: String,
}

/// Terminal artifact of the pipeline. Never cached server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneySummary {
    pub patient_id: String,
    pub summary: String,
    pub timeline: Vec<TimelineEvent>,
    pub key_findings: Vec<String>,
    pub medications_mentioned: Vec<String>,
    pub followups_or_actions: Vec<String>,
    pub mental_state: MentalState,
    /// Present only when structured parsing of the model output failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_model_output: Option<String>,
}

impl JourneySummary {
    /// Empty summary carrying only the neutral mental-state default.
    pub fn empty(patient_id: &str, summary: impl Into<String>, mental_state: MentalState) -> Self {
        Self {
            patient_id: patient_id.to_string(),
            summary: summary.into(),
            timeline: vec![],
            key_findings: vec![],
            medications_mentioned: vec![],
            followups_or_actions: vec![],
            mental_state,
            raw_model_output: None,
        }
    }
}

/// Summary plus the bookkeeping counters the UI renders.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryEnvelope {
    #[serde(flatten)]
    pub summary: JourneySummary,
    #[serde(rename = "_ingested_docs")]
    pub ingested_docs: usize,
    #[serde(rename = "_source_count")]
    pub source_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<serde_json::Value>,
}
