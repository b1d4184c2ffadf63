//! Committed-path extraction from accumulated outputs.
//!
//! A path source such as `router.response.target` is walked through the
//! previous outputs one segment at a time. The value found at the end is
//! decoded by trying each [`PathShape`] in priority order.

use serde_json::Value;

use waypoint_core::error::{Result, WaypointError};
use waypoint_core::types::Outputs;

/// Sibling keys listed when a segment is missing.
const MAX_SIBLING_KEYS: usize = 5;

/// The shapes a committed path may take, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathShape {
    /// `["a", {"node_id": "b"}, {"path": ["c", "d"]}]`
    List,
    /// `{"target": [...]}` or `{"target": "a"}`
    TargetWrapper,
    /// `{"path": [...]}`
    PathWrapper,
    /// A JSON document of one of the shapes above, encoded as a string.
    JsonString,
    /// `{"response": ...}` wrapping any shape above, or `result.target` / `result.path`.
    ResponseEnvelope,
}

impl PathShape {
    pub const PRIORITY: [PathShape; 5] = [
        PathShape::List,
        PathShape::TargetWrapper,
        PathShape::PathWrapper,
        PathShape::JsonString,
        PathShape::ResponseEnvelope,
    ];

    /// Try to read `value` as this shape.
    pub fn decode(self, value: &Value) -> Option<Vec<String>> {
        match self {
            Self::List => value.as_array().map(|items| flatten_items(items)),
            Self::TargetWrapper => match value.get("target")? {
                Value::Array(items) => Some(flatten_items(items)),
                Value::String(id) => Some(vec![id.clone()]),
                _ => None,
            },
            Self::PathWrapper => value.get("path")?.as_array().map(|items| flatten_items(items)),
            Self::JsonString => {
                let decoded: Value = serde_json::from_str(value.as_str()?).ok()?;
                decode_with(&Self::PRIORITY[..3], &decoded).map(|(_, path)| path)
            }
            Self::ResponseEnvelope => {
                let inner = value.get("response")?;
                decode_with(&Self::PRIORITY[..4], inner)
                    .map(|(_, path)| path)
                    .or_else(|| {
                        let result = inner.get("result")?;
                        decode_with(&[Self::TargetWrapper, Self::PathWrapper], result).map(|(_, path)| path)
                    })
            }
        }
    }
}

fn decode_with(shapes: &[PathShape], value: &Value) -> Option<(PathShape, Vec<String>)> {
    shapes
        .iter()
        .find_map(|shape| shape.decode(value).map(|path| (*shape, path)))
}

/// List elements: ids, `{"node_id"}` entries and nested `{"path"}` lists.
/// Anything else is skipped.
fn flatten_items(items: &[Value]) -> Vec<String> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::String(id) => out.push(id.clone()),
            Value::Object(map) => {
                if let Some(id) = map.get("node_id").and_then(Value::as_str) {
                    out.push(id.to_string());
                } else if let Some(path) = map.get("path").and_then(Value::as_array) {
                    out.extend(path.iter().filter_map(Value::as_str).map(str::to_string));
                }
            }
            _ => {}
        }
    }
    out
}

/// Decode a leaf value, reporting which shape matched.
pub fn decode_path(value: &Value) -> Option<(PathShape, Vec<String>)> {
    decode_with(&PathShape::PRIORITY, value)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

fn missing_key(partial: &str, segment: &str, keys: Vec<&String>) -> WaypointError {
    let siblings: Vec<&str> = keys.into_iter().take(MAX_SIBLING_KEYS).map(String::as_str).collect();
    WaypointError::Extraction(format!(
        "key '{}' not found at '{}'; available keys: [{}]",
        segment,
        if partial.is_empty() { "<previous_outputs>" } else { partial },
        siblings.join(", ")
    ))
}

/// Walk `path_source` through the previous outputs.
pub fn navigate<'a>(outputs: &'a Outputs, path_source: &str) -> Result<&'a Value> {
    let mut segments = path_source.split('.');
    let first = segments
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WaypointError::Extraction("empty path_source".into()))?;

    let mut current = outputs
        .get(first)
        .ok_or_else(|| missing_key("", first, outputs.keys().collect()))?;
    let mut partial = first.to_string();

    for segment in segments {
        let map = current.as_object().ok_or_else(|| {
            WaypointError::Extraction(format!(
                "'{}' is a {}, not a mapping; cannot read '{}'",
                partial,
                type_name(current),
                segment
            ))
        })?;
        current = map
            .get(segment)
            .ok_or_else(|| missing_key(&partial, segment, map.keys().collect()))?;
        partial.push('.');
        partial.push_str(segment);
    }
    Ok(current)
}

/// Extract the committed agent path named by `path_source`.
pub fn extract_agent_path(outputs: &Outputs, path_source: &str) -> Result<Vec<String>> {
    let leaf = navigate(outputs, path_source)?;
    decode_path(leaf).map(|(_, path)| path).ok_or_else(|| {
        WaypointError::Extraction(format!(
            "value at '{}' is a {} that does not describe an agent path",
            path_source,
            type_name(leaf)
        ))
    })
}
