//! Turns raw model text into slide operations.

use serde_json::Value;
use slide_protocol::SlideOperation;

use crate::error::GenerationError;

/// Outermost JSON array in `text`, or the outermost object when there is no
/// array. Models often wrap the payload in prose or code fences.
pub fn extract_json(text: &str) -> Option<&str> {
    outermost(text, '[', ']').or_else(|| outermost(text, '{', '}'))
}

fn outermost(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a model response into operations.
///
/// A single object is accepted as a one-element list. Deletions (negative
/// numbers) only need `slide_number`; every other entry needs `title` and
/// `content`.
pub fn parse_operations(text: &str) -> Result<Vec<SlideOperation>, GenerationError> {
    let json = extract_json(text).ok_or_else(|| malformed("response contains no JSON"))?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => return Err(malformed("expected a list of slide objects")),
    };

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| parse_operation(idx, item))
        .collect()
}

fn parse_operation(idx: usize, item: &Value) -> Result<SlideOperation, GenerationError> {
    let obj = item
        .as_object()
        .ok_or_else(|| malformed(format!("entry {idx} is not an object")))?;

    let number = obj
        .get("slide_number")
        .and_then(parse_number)
        .ok_or_else(|| malformed(format!("entry {idx} has no numeric slide_number")))?;

    let title = obj.get("title").map(flatten_content);
    let content = obj.get("content").map(flatten_content);
    let (title, content) = if number < 0.0 {
        (title.unwrap_or_default(), content.unwrap_or_default())
    } else {
        match (title, content) {
            (Some(title), Some(content)) => (title, content),
            (None, _) => return Err(malformed(format!("entry {idx} is missing title"))),
            (_, None) => return Err(malformed(format!("entry {idx} is missing content"))),
        }
    };

    let narration = obj
        .get("narration")
        .map(flatten_content)
        .filter(|n| !n.trim().is_empty());
    let image_keyword = obj
        .get("image_keyword")
        .and_then(Value::as_str)
        .filter(|k| !k.trim().is_empty())
        .map(str::to_string);

    Ok(SlideOperation { number, title, content, narration, image_keyword })
}

fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Render a content value as slide text: strings as-is, objects as
/// `key: value` lines, lists one item per line.
pub fn flatten_content(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", scalar_text(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Array(items) => items
            .iter()
            .flat_map(|item| match item {
                Value::Object(map) => map
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", scalar_text(v)))
                    .collect::<Vec<_>>(),
                other => vec![scalar_text(other)],
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn malformed(reason: impl Into<String>) -> GenerationError {
    GenerationError::Malformed { reason: reason.into() }
}
