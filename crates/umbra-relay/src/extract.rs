//! Text extraction from loosely-shaped provider payloads

use serde_json::Value;

/// Flatten a content field into text
///
/// Accepts a plain string, an array of parts (strings or objects with a
/// `text` field), or a single object with `text`. Anything else is empty.
pub fn content_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(text) => Some(text.as_str()),
                Value::Object(map) => map.get("text").and_then(Value::as_str),
                _ => None,
            })
            .collect(),
        Some(Value::Object(map)) => map.get("text").and_then(Value::as_str).unwrap_or_default().to_owned(),
        _ => String::new(),
    }
}

/// Flatten a reasoning payload into text
///
/// Reasoning arrives as a string, a list of segments, or an object carrying
/// `text`, `reasoning`, `content` (string or list), or `output_text`.
pub fn reasoning_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(items)) => items.iter().map(|item| reasoning_text(Some(item))).collect(),
        Some(Value::Object(map)) => {
            for key in ["text", "reasoning"] {
                if let Some(text) = map.get(key).and_then(Value::as_str) {
                    return text.to_owned();
                }
            }
            match map.get("content") {
                Some(Value::Array(items)) => items.iter().map(|item| reasoning_text(Some(item))).collect(),
                Some(Value::String(text)) => text.clone(),
                _ => map
                    .get("output_text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
            }
        }
        _ => String::new(),
    }
}

/// Reasoning fragment from a streaming delta (`reasoning_content`, else `reasoning`)
pub fn delta_reasoning(delta: Option<&Value>) -> String {
    let Some(Value::Object(map)) = delta else {
        return String::new();
    };
    let source = map
        .get("reasoning_content")
        .filter(|v| !v.is_null())
        .or_else(|| map.get("reasoning"));
    reasoning_text(source)
}

/// Portion of a cumulative snapshot not yet emitted
///
/// When `full` extends `seen` only the new suffix is returned. A snapshot
/// that is shorter than or diverges from `seen` is returned whole; this is
/// a best-effort shim for providers that resend the full message per chunk.
pub fn remainder<'a>(full: &'a str, seen: &str) -> &'a str {
    if seen.is_empty() {
        return full;
    }
    full.strip_prefix(seen).unwrap_or(full)
}

/// Answer text from a non-streaming payload, searching the fallback fields
///
/// Order: top-level `message`, `reply`, `content` strings, then the first
/// choice's `message.content`, `text`, and `delta.content`. Values are
/// trimmed and blanks skipped.
pub fn response_text(payload: &Value) -> Option<String> {
    let first_choice = payload.pointer("/choices/0");

    let candidates = [
        payload.get("message"),
        payload.get("reply"),
        payload.get("content"),
        first_choice.and_then(|c| c.pointer("/message/content")),
        first_choice.and_then(|c| c.get("text")),
        first_choice.and_then(|c| c.pointer("/delta/content")),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_owned)
}

/// Reasoning from the first choice of a non-streaming payload
pub fn choice_reasoning(payload: &Value) -> Option<String> {
    let choice = payload.pointer("/choices/0")?;

    [
        choice.pointer("/message/reasoning_content"),
        choice.get("reasoning_content"),
    ]
    .into_iter()
    .map(reasoning_text)
    .find(|text| !text.is_empty())
}
