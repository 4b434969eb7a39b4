use serde_json::{Map, Value};

/// How a JSON object was recovered from model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The whole text parsed as an object.
    Strict,
    /// The slice from the first `{` to the last `}` parsed as an object.
    Extracted,
    /// Nothing usable; an empty object was substituted.
    Failed,
}

fn as_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Parse free-form model output as a JSON object. Never fails: when neither
/// the full text nor its outermost braces parse, an empty object is returned.
pub fn parse_json_object(raw: &str) -> (Map<String, Value>, Recovery) {
    if let Some(map) = as_object(raw.trim()) {
        return (map, Recovery::Strict);
    }

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            if let Some(map) = as_object(&raw[start..=end]) {
                tracing::debug!(prefix = start, "Recovered JSON object from surrounding text");
                return (map, Recovery::Extracted);
            }
        }
    }

    tracing::warn!(raw_len = raw.len(), "Model output contained no parseable JSON object");
    (Map::new(), Recovery::Failed)
}

/// A list of trimmed, non-empty strings from a value that may be a list or a
/// single string. Anything else yields an empty list.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    let items: Vec<&Value> = match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::String(_)) => vec![single],
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
