//! Prompt construction for the patient-journey summary.
//!
//! One prompt, one call: the instruction pins the exact JSON output schema
//! and non-diagnostic framing; the documents follow as named blocks.

/// One extracted document, named for traceability in the prompt.
#[derive(Debug, Clone)]
pub struct DocumentSnippet {
    pub name: String,
    pub source_url: String,
    pub text: String,
}

const SCHEMA_AND_RULES: &str = r#"Return ONLY valid JSON that conforms to this schema (no Markdown, no extra text):

{
  "patient_id": "string",
  "summary": "2-3 short paragraphs summarizing the patient's journey.",
  "timeline": [
    {"date": "YYYY-MM-DD or null if unknown", "title": "Short event title", "details": "1-2 lines"}
  ],
  "key_findings": [
    "bullet finding 1", "bullet finding 2"
  ],
  "medications_mentioned": [
    "Drug name (strength, frequency)"
  ],
  "followups_or_actions": [
    "Non-diagnostic suggestions for clinicians (e.g., reconcile meds, check adherence, consider labs)"
  ],
  "mental_state": {
    "color": "Green|Amber|Red",
    "explanation": "Why you chose this color from the notes",
    "confidence": 0.0
  }
}

Rules:
- "mental_state.color" approximates overall mental/psychological well-being implied by the notes:
  Green = generally stable/positive; Amber = mild/moderate concerns or inconsistent adherence;
  Red = clear distress, significant depressive/anxiety symptoms, suicidality, or severe psychosocial factors.
- If mental health is not discussed, choose "Amber" with low confidence and explain uncertainty.
- Do NOT invent diagnoses. Mark unknown fields as null where appropriate.
- Keep the whole output under ~1200 words."#;

/// Build the single summarization prompt for one patient.
pub fn build_summary_prompt(snippets: &[DocumentSnippet], patient_id: &str) -> String {
    let mut doc_blocks = String::new();
    for snippet in snippets {
        doc_blocks.push_str(&format!(
            "### {} ({})\n{}\n\n",
            snippet.name,
            snippet.source_url,
            snippet.text.trim()
        ));
    }

    format!(
        "You are a clinical documentation AI assisting doctors at a primary care clinic.\n\
         You will receive multiple prescription/consultation notes for a single patient (id: {patient_id}).\n\
         Create a concise but comprehensive \"Patient Journey\" summary across time with a short timeline\n\
         of key events, medications, diagnoses, and follow-ups. Be factual and only use information\n\
         present in the provided documents. If dates are missing, infer relative order conservatively\n\
         and mention uncertainty.\n\n\
         {SCHEMA_AND_RULES}\n\n\
         Documents:\n{doc_blocks}"
    )
    .trim_end()
    .to_string()
}
