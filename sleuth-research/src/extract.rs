//! Structured-output extraction from free-form model responses
//!
//! Strategies, tried in order:
//! 1. parse the whole response
//! 2. parse the first fenced code block
//! 3. parse the span from the first `[`/`{` to the last matching closer
//! 4. repair common defects (fences, trailing commas, `}{`) and parse again

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sleuth_core::{ErrorContext, SleuthError, SleuthResult};
use std::sync::OnceLock;
use tracing::debug;

fn fenced_block() -> &'static Regex {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    FENCED.get_or_init(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("static pattern"))
}

fn fence_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"```(?:json)?").expect("static pattern"))
}

fn trailing_comma() -> &'static Regex {
    static TRAILING: OnceLock<Regex> = OnceLock::new();
    TRAILING.get_or_init(|| Regex::new(r",(\s*[\]}])").expect("static pattern"))
}

fn adjacent_objects() -> &'static Regex {
    static ADJACENT: OnceLock<Regex> = OnceLock::new();
    ADJACENT.get_or_init(|| Regex::new(r"\}\s*\{").expect("static pattern"))
}

fn parse(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

fn from_fenced_block(response: &str) -> Option<Value> {
    let captures = fenced_block().captures(response)?;
    parse(captures.get(1)?.as_str())
}

fn from_bracketed_span(response: &str) -> Option<Value> {
    let start = response.find(|c: char| c == '[' || c == '{')?;
    let close = if response[start..].starts_with('[') { ']' } else { '}' };
    let end = response.rfind(close)?;
    if end <= start {
        return None;
    }
    parse(&response[start..=end])
}

/// Strip fences, drop trailing commas, and separate adjacent objects.
pub fn repair_json(text: &str) -> String {
    let text = fence_marker().replace_all(text, "");
    let text = trailing_comma().replace_all(text.trim(), "$1");
    adjacent_objects().replace_all(&text, "},{").into_owned()
}

/// Extract a JSON value from a model response.
pub fn extract_json(response: &str) -> SleuthResult<Value> {
    if let Some(value) = parse(response) {
        return Ok(value);
    }
    if let Some(value) = from_fenced_block(response) {
        debug!("Extracted JSON from fenced block");
        return Ok(value);
    }
    if let Some(value) = from_bracketed_span(response) {
        debug!("Extracted JSON from bracketed span");
        return Ok(value);
    }
    if let Some(value) = parse(&repair_json(response)) {
        debug!("Extracted JSON after repair");
        return Ok(value);
    }

    let preview: String = response.chars().take(200).collect();
    Err(SleuthError::Extraction {
        message: format!("No JSON found in response. First 200 chars: {}", preview),
        context: ErrorContext::new("extract")
            .with_operation("extract_json")
            .with_suggestion("Ask the model to return only JSON"),
    })
}

/// Extract and deserialize into `T`.
pub fn extract_as<T: DeserializeOwned>(response: &str) -> SleuthResult<T> {
    let value = extract_json(response)?;
    serde_json::from_value(value).map_err(|e| SleuthError::Extraction {
        message: format!("Extracted JSON has unexpected shape: {}", e),
        context: ErrorContext::new("extract").with_operation("extract_as"),
    })
}

/// Extract `T`, or build a fallback when every strategy fails.
pub fn extract_or_else<T, F>(response: &str, fallback: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match extract_as(response) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "Using fallback for unparseable response");
            fallback()
        }
    }
}
