//! Three-tier decode of the model's summary output.
//!
//! Strict: the whole body is the JSON object we asked for. Lenient: the
//! object is embedded in prose or a Markdown fence. Fallback: nothing
//! parseable — return a flagged, empty summary carrying the raw output.
//! A malformed model response is never a pipeline failure.

use serde::Deserialize;
use serde_json::Value;

use crate::models::{
    clamp_confidence, JourneySummary, MentalState, MentalStateColor, TimelineEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeTier {
    Strict,
    Lenient,
    Fallback,
}

/// Everything optional: the model may drop fields, and each array is parsed
/// item-by-item so one bad entry does not sink the rest.
#[derive(Debug, Deserialize)]
struct RawSummary {
    summary: Option<String>,
    timeline: Option<Vec<Value>>,
    key_findings: Option<Vec<Value>>,
    medications_mentioned: Option<Vec<Value>>,
    followups_or_actions: Option<Vec<Value>>,
    mental_state: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawMentalState {
    color: Option<String>,
    explanation: Option<String>,
    confidence: Option<f64>,
}

/// Decode the model output, reporting which tier succeeded.
pub fn parse_summary_response(body: &str, patient_id: &str) -> (JourneySummary, DecodeTier) {
    if let Ok(raw) = serde_json::from_str::<RawSummary>(body) {
        return (normalize(raw, patient_id), DecodeTier::Strict);
    }

    if let Some(embedded) = extract_embedded_json(body) {
        if let Ok(raw) = serde_json::from_str::<RawSummary>(&embedded) {
            return (normalize(raw, patient_id), DecodeTier::Lenient);
        }
    }

    let mut summary = JourneySummary::empty(
        patient_id,
        "The model response could not be parsed as structured JSON.",
        MentalState::amber("Model output parsing failed", 0.0),
    );
    summary.raw_model_output = Some(body.to_string());
    (summary, DecodeTier::Fallback)
}

/// Locate a structured fragment inside prose: a ```json fence first, then
/// the outermost brace pair.
fn extract_embedded_json(body: &str) -> Option<String> {
    if let Some(fence_start) = body.find("```json") {
        let content_start = fence_start + 7;
        if let Some(fence_len) = body[content_start..].find("```") {
            return Some(body[content_start..content_start + fence_len].trim().to_string());
        }
    }
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| body[start..=end].to_string())
}

fn normalize(raw: RawSummary, patient_id: &str) -> JourneySummary {
    JourneySummary {
        patient_id: patient_id.to_string(),
        summary: raw.summary.unwrap_or_default(),
        timeline: parse_array_lenient(raw.timeline.as_deref()),
        key_findings: string_array_lenient(raw.key_findings.as_deref()),
        medications_mentioned: string_array_lenient(raw.medications_mentioned.as_deref()),
        followups_or_actions: string_array_lenient(raw.followups_or_actions.as_deref()),
        mental_state: normalize_mental_state(raw.mental_state),
        raw_model_output: None,
    }
}

fn normalize_mental_state(value: Option<Value>) -> MentalState {
    let Some(raw) = value.and_then(|v| serde_json::from_value::<RawMentalState>(v).ok()) else {
        return MentalState::amber("Mental state not provided by the model", 0.0);
    };
    MentalState {
        color: raw
            .color
            .as_deref()
            .and_then(MentalStateColor::parse_lenient)
            .unwrap_or(MentalStateColor::Amber),
        explanation: raw
            .explanation
            .unwrap_or_else(|| "No explanation provided".to_string()),
        confidence: clamp_confidence(raw.confidence.unwrap_or(0.0)),
    }
}

/// Parse an array leniently, skipping items that fail to deserialize.
fn parse_array_lenient<T: for<'de> Deserialize<'de>>(items: Option<&[Value]>) -> Vec<T> {
    items
        .unwrap_or_default()
        .iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect()
}

fn string_array_lenient(items: Option<&[Value]>) -> Vec<String> {
    items
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_body() -> String {
        serde_json::json!({
            "patient_id": "ignored-model-echo",
            "summary": "Two visits, improving course.",
            "timeline": [
                {"date": "2024-01-05", "title": "Initial visit", "details": "Fever and cough."},
                {"date": null, "title": "Follow-up", "details": "Improving."}
            ],
            "key_findings": ["Fever at onset", "Improvement"],
            "medications_mentioned": ["Paracetamol (500mg, PRN)"],
            "followups_or_actions": ["Reconcile medications"],
            "mental_state": {"color": "Green", "explanation": "Stable notes", "confidence": 0.8}
        })
        .to_string()
    }

    #[test]
    fn strict_tier_decodes_full_body() {
        let (summary, tier) = parse_summary_response(&full_body(), "pat-1");
        assert_eq!(tier, DecodeTier::Strict);
        assert_eq!(summary.patient_id, "pat-1");
        assert_eq!(summary.timeline.len(), 2);
        assert_eq!(summary.timeline[1].date, None);
        assert_eq!(summary.mental_state.color, MentalStateColor::Green);
        assert!(summary.raw_model_output.is_none());
    }

    #[test]
    fn lenient_tier_handles_markdown_fence() {
        let body = format!("Here you go:\n\n```json\n{}\n```\nHope that helps!", full_body());
        let (summary, tier) = parse_summary_response(&body, "pat-1");
        assert_eq!(tier, DecodeTier::Lenient);
        assert_eq!(summary.summary, "Two visits, improving course.");
    }

    #[test]
    fn lenient_tier_handles_braces_in_prose() {
        let body = format!("The result is {} as requested.", full_body());
        let (_, tier) = parse_summary_response(&body, "pat-1");
        assert_eq!(tier, DecodeTier::Lenient);
    }

    #[test]
    fn prose_falls_back_flagged_and_amber() {
        let body = "I'm sorry, I cannot produce JSON today.";
        let (summary, tier) = parse_summary_response(body, "pat-1");
        assert_eq!(tier, DecodeTier::Fallback);
        assert_eq!(summary.mental_state.color, MentalStateColor::Amber);
        assert_eq!(summary.mental_state.confidence, 0.0);
        assert_eq!(summary.raw_model_output.as_deref(), Some(body));
        assert!(summary.timeline.is_empty());
    }

    #[test]
    fn empty_body_falls_back() {
        let (summary, tier) = parse_summary_response("", "pat-1");
        assert_eq!(tier, DecodeTier::Fallback);
        assert!(summary.raw_model_output.is_some());
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        let body = serde_json::json!({
            "summary": "s",
            "mental_state": {"color": "red", "explanation": "x", "confidence": 1.8}
        })
        .to_string();
        let (summary, _) = parse_summary_response(&body, "p");
        assert_eq!(summary.mental_state.color, MentalStateColor::Red);
        assert_eq!(summary.mental_state.confidence, 1.0);
    }

    #[test]
    fn bad_timeline_items_are_skipped() {
        let body = serde_json::json!({
            "summary": "s",
            "timeline": [
                {"date": "2024-01-01", "title": "ok", "details": "fine"},
                {"when": "not the schema"},
                "just a string"
            ]
        })
        .to_string();
        let (summary, tier) = parse_summary_response(&body, "p");
        assert_eq!(tier, DecodeTier::Strict);
        assert_eq!(summary.timeline.len(), 1);
    }

    #[test]
    fn missing_mental_state_defaults_amber_zero() {
        let (summary, tier) = parse_summary_response(r#"{"summary": "s"}"#, "p");
        assert_eq!(tier, DecodeTier::Strict);
        assert_eq!(summary.mental_state.color, MentalStateColor::Amber);
        assert_eq!(summary.mental_state.confidence, 0.0);
    }

    #[test]
    fn non_string_array_entries_are_dropped() {
        let body = serde_json::json!({
            "summary": "s",
            "key_findings": ["real finding", 42, null]
        })
        .to_string();
        let (summary, _) = parse_summary_response(&body, "p");
        assert_eq!(summary.key_findings, vec!["real finding"]);
    }

    #[test]
    fn timeline_events_keep_order() {
        let (summary, _) = parse_summary_response(&full_body(), "p");
        assert_eq!(summary.timeline[0].title, "Initial visit");
        assert_eq!(summary.timeline[1].title, "Follow-up");
        let _: &TimelineEvent = &summary.timeline[0];
    }
}
