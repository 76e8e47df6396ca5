//! Best-effort discovery of document URLs in arbitrary platform JSON.
//!
//! The response schema is not contractually fixed, so the scanner walks the
//! whole structure and matches on heuristics instead of paths. False
//! positives are acceptable (the fetch stage will simply fail on them);
//! false negatives are the risk the heuristics try to minimize.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::models::{CandidateUrl, Confidence};

/// Mapping keys whose string values are taken as document URLs outright.
const URL_KEYS: &[&str] = &[
    "url",
    "file_url",
    "download_url",
    "prescription_url",
    "document_url",
    "link",
    "href",
];

static PDF_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.pdf($|\?)").unwrap());

static KEYWORD_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)rx|prescription|consult|medication|treatment").unwrap());

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// When set, a string is only a candidate if it starts with an HTTP(S)
    /// scheme — free text like "see prescription here" is never emitted.
    pub require_url_scheme: bool,
    /// Safety cap against pathological nesting.
    pub max_depth: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            require_url_scheme: true,
            max_depth: 50,
        }
    }
}

/// Scan with default options.
pub fn scan(value: &Value) -> Vec<CandidateUrl> {
    scan_with(value, &ScanOptions::default())
}

/// Depth-first walk emitting candidates in first-seen order, deduplicated by
/// exact URL. When several rules match the same URL the higher confidence
/// wins. Never fails; unscannable fragments are skipped.
pub fn scan_with(value: &Value, options: &ScanOptions) -> Vec<CandidateUrl> {
    let mut found: Vec<CandidateUrl> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    walk(value, None, 0, options, &mut found, &mut index);
    found
}

fn walk(
    node: &Value,
    key: Option<&str>,
    depth: usize,
    options: &ScanOptions,
    found: &mut Vec<CandidateUrl>,
    index: &mut HashMap<String, usize>,
) {
    if depth > options.max_depth {
        tracing::debug!(depth, "scan depth cap reached; skipping subtree");
        return;
    }
    match node {
        Value::Object(map) => {
            for (k, v) in map {
                walk(v, Some(k), depth + 1, options, found, index);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, None, depth + 1, options, found, index);
            }
        }
        Value::String(s) => {
            if let Some(confidence) = classify(key, s, options) {
                emit(s, confidence, found, index);
            }
        }
        _ => {}
    }
}

fn classify(key: Option<&str>, value: &str, options: &ScanOptions) -> Option<Confidence> {
    if options.require_url_scheme && !has_url_scheme(value) {
        return None;
    }
    if key.is_some_and(|k| URL_KEYS.contains(&k.to_ascii_lowercase().as_str())) {
        return Some(Confidence::ExplicitKey);
    }
    if PDF_SUFFIX.is_match(value) {
        return Some(Confidence::PdfSuffix);
    }
    if KEYWORD_HINT.is_match(value) {
        return Some(Confidence::KeywordMatch);
    }
    None
}

fn has_url_scheme(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn emit(
    url: &str,
    confidence: Confidence,
    found: &mut Vec<CandidateUrl>,
    index: &mut HashMap<String, usize>,
) {
    match index.get(url) {
        Some(&i) => {
            // Keep first-seen position, upgrade confidence if this rule
            // ranks higher.
            if confidence.rank() > found[i].confidence.rank() {
                found[i].confidence = confidence;
            }
        }
        None => {
            index.insert(url.to_string(), found.len());
            found.push(CandidateUrl {
                url: url.to_string(),
                confidence,
            });
        }
    }
}
