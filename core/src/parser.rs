//! Defensive handling of model output: JSON extraction, shape checks and
//! tool-argument normalization.
use serde_json::Value;
use tracing::warn;

use crate::error::{ChartError, Result};
use crate::search::SearchArgs;

/// Parses model content as JSON, tolerating prose or fences around one object.
///
/// Strict parsing is tried first. If that fails, the text between the first `{`
/// and the last `}` is parsed instead.
pub fn parse_json(raw: &str) -> Result<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return Ok(value);
    }
    warn!(target: "parser", raw = %raw, "Strict JSON parse failed, trying embedded object");

    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => {
            serde_json::from_str(&raw[start..=end]).map_err(|_| ChartError::MalformedResponse)
        }
        _ => Err(ChartError::MalformedResponse),
    }
}

/// The only structural check applied to chart payloads: `labels` and `series`
/// are non-empty arrays. Element types and alignment are not inspected.
pub fn is_valid_chart_data(value: &Value) -> bool {
    let non_empty = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_array)
            .is_some_and(|items| !items.is_empty())
    };
    non_empty("labels") && non_empty("series")
}

/// True when the content is really search arguments, i.e. an object with a
/// non-empty string `query`.
pub fn looks_like_tool_args(value: &Value) -> bool {
    value
        .get("query")
        .and_then(Value::as_str)
        .is_some_and(|q| !q.is_empty())
}

/// Turns tool-call arguments into search arguments. Upstreams send them either
/// JSON-encoded in a string or as an object.
pub fn normalize_tool_arguments(raw: &Value) -> Result<SearchArgs> {
    let structured = match raw {
        Value::String(text) if text.trim().is_empty() => Value::Object(Default::default()),
        Value::String(text) => serde_json::from_str(text)
            .map_err(|e| ChartError::ToolArguments(format!("not JSON ({}): {}", e, text)))?,
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };

    if !structured.is_object() {
        return Err(ChartError::ToolArguments(format!(
            "expected an object, got {}",
            structured
        )));
    }

    serde_json::from_value(structured).map_err(|e| ChartError::ToolArguments(e.to_string()))
}

/// Cuts `text` to at most `max` characters, on a character boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
