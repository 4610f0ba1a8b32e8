use serde_json::Value;
use tracing::warn;

use crate::error::MalformedResponseError;
use crate::models::GeneratedAnswer;

/// Parse a model reply into a validated answer.
///
/// Rules:
/// 1. The reply must be a JSON object (a surrounding code fence is tolerated)
/// 2. `answer` is required and must be non-blank text; numbers and booleans
///    are rendered as text
/// 3. `confidence` is optional; when absent, null, or not numeric the answer
///    is kept as unrated. Out-of-range values are clamped to [0, 1]
pub fn parse_answer_reply(raw: &str) -> Result<GeneratedAnswer, MalformedResponseError> {
    let body = strip_code_fence(raw.trim());
    if body.is_empty() {
        return Err(MalformedResponseError::new("empty reply", raw));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| MalformedResponseError::new(format!("invalid JSON: {}", e), raw))?;

    let object = value
        .as_object()
        .ok_or_else(|| MalformedResponseError::new("reply is not a JSON object", raw))?;

    let answer = match object.get("answer") {
        None | Some(Value::Null) => {
            return Err(MalformedResponseError::new("missing 'answer' field", raw));
        }
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(_) => {
            return Err(MalformedResponseError::new("'answer' is not text", raw));
        }
    };

    if answer.is_empty() {
        return Err(MalformedResponseError::new("'answer' is empty", raw));
    }

    let confidence = match object.get("confidence") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    }
    .filter(|c| c.is_finite());

    match confidence {
        Some(c) => {
            if !(0.0..=1.0).contains(&c) {
                warn!("Confidence {} outside [0, 1], clamping", c);
            }
            Ok(GeneratedAnswer::new(answer, c))
        }
        None => {
            if object.get("confidence").is_some_and(|v| !v.is_null()) {
                warn!("Unreadable confidence {:?}, treating as unrated", object["confidence"]);
            }
            Ok(GeneratedAnswer::unrated(answer))
        }
    }
}

/// Remove a ```json ... ``` fence if the whole reply is wrapped in one
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
