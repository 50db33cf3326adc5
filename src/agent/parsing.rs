//! Extraction of structured findings from free-form model output.
//!
//! The model is asked to finish with a JSON object of the shape
//! `{"issues": [...]}`, ideally inside a fenced ```` ```json ```` block.
//! Nothing here ever fails: text that does not carry such an object yields
//! an empty list.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

#[allow(clippy::expect_used)] // hardcoded pattern
static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("fenced json pattern should be valid")
});

/// Finds the first JSON object embedded in `text`.
///
/// A fenced ```` ```json ```` block wins; failing that, the span from the
/// first `{` to the last `}` is tried.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let fenced = FENCED_JSON
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_object(m.as_str()));
    if fenced.is_some() {
        return fenced;
    }

    let first = text.find('{')?;
    let last = text.rfind('}')?;
    if first >= last {
        return None;
    }
    parse_object(&text[first..=last])
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Returns the object entries of the `issues` array found in `text`.
///
/// Non-object entries are dropped; a missing or non-array `issues` key
/// yields an empty list.
#[must_use]
pub fn extract_issues(text: &str) -> Vec<Map<String, Value>> {
    let Some(mut payload) = extract_json_object(text) else {
        return Vec::new();
    };
    match payload.remove("issues") {
        Some(Value::Array(entries)) => entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::Object(issue) => Some(issue),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
