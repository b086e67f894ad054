//! Parsing of the model's selection reply.

use serde_json::Value;
use thiserror::Error;

/// One entry of the model's reply, still addressed by prompt key.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub key: String,
    pub order: Option<u32>,
    pub reason: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ResponseError {
    #[error("reply is not valid JSON: {0}")]
    NotJson(String),

    #[error("reply JSON has an unexpected shape: {0}")]
    UnexpectedShape(String),
}

/// Parses a reply into selections.
///
/// Accepts `{"selections": [...]}`, a bare array of selection objects, or an
/// object keyed by candidate key. Markdown code fences and prose around the JSON
/// are ignored.
pub fn parse_selections(content: &str) -> Result<Vec<Selection>, ResponseError> {
    let json = extract_json(content)
        .ok_or_else(|| ResponseError::NotJson("no JSON object or array found".to_string()))?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| ResponseError::NotJson(e.to_string()))?;

    match value {
        Value::Array(entries) => parse_entries(&entries),
        Value::Object(map) => {
            for wrapper in ["selections", "playlist", "items"] {
                if let Some(inner) = map.get(wrapper) {
                    return match inner {
                        Value::Array(entries) => parse_entries(entries),
                        _ => Err(ResponseError::UnexpectedShape(format!(
                            "`{}` is not an array",
                            wrapper
                        ))),
                    };
                }
            }
            parse_key_map(&map)
        }
        other => Err(ResponseError::UnexpectedShape(format!(
            "expected object or array, got {}",
            type_name(&other)
        ))),
    }
}

fn extract_json(content: &str) -> Option<&str> {
    let start = content.find(|c: char| c == '{' || c == '[')?;
    let closing = if content[start..].starts_with('{') { '}' } else { ']' };
    let end = content.rfind(closing)?;
    (end > start).then(|| &content[start..=end])
}

fn parse_entries(entries: &[Value]) -> Result<Vec<Selection>, ResponseError> {
    let mut selections = Vec::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        let selection = match entry {
            Value::String(key) => Selection {
                key: key.clone(),
                order: Some(position as u32 + 1),
                reason: None,
            },
            Value::Object(obj) => {
                let key = ["key", "id", "candidate"]
                    .iter()
                    .find_map(|k| obj.get(*k))
                    .and_then(key_value)
                    .ok_or_else(|| {
                        ResponseError::UnexpectedShape(format!(
                            "selection {} has no key",
                            position + 1
                        ))
                    })?;
                Selection {
                    key,
                    order: obj.get("order").and_then(order_value),
                    reason: obj.get("reason").and_then(reason_value),
                }
            }
            other => {
                return Err(ResponseError::UnexpectedShape(format!(
                    "selection {} is {}",
                    position + 1,
                    type_name(other)
                )))
            }
        };
        selections.push(selection);
    }
    Ok(selections)
}

fn parse_key_map(map: &serde_json::Map<String, Value>) -> Result<Vec<Selection>, ResponseError> {
    if map.is_empty() {
        return Err(ResponseError::UnexpectedShape("empty object".to_string()));
    }
    let mut selections = Vec::with_capacity(map.len());
    for (key, entry) in map {
        let selection = match entry {
            Value::Object(obj) => Selection {
                key: key.clone(),
                order: obj.get("order").and_then(order_value),
                reason: obj.get("reason").and_then(reason_value),
            },
            Value::Number(_) => Selection {
                key: key.clone(),
                order: order_value(entry),
                reason: None,
            },
            other => {
                return Err(ResponseError::UnexpectedShape(format!(
                    "entry {} is {}",
                    key,
                    type_name(other)
                )))
            }
        };
        selections.push(selection);
    }
    Ok(selections)
}

fn key_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn order_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn reason_value(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(key: &str, order: u32) -> Selection {
        Selection {
            key: key.to_string(),
            order: Some(order),
            reason: None,
        }
    }

    #[test]
    fn test_parse_wrapped_selections() {
        let reply = r#"{"selections": [
            {"key": "c3", "order": 1, "reason": "Strong opener"},
            {"key": "c1", "order": 2}
        ]}"#;
        let parsed = parse_selections(reply).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].key, "c3");
        assert_eq!(parsed[0].reason.as_deref(), Some("Strong opener"));
        assert_eq!(parsed[1], sel("c1", 2));
    }

    #[test]
    fn test_parse_code_fenced_bare_array() {
        let reply = "Here is the lineup:\n```json\n[{\"key\": \"c2\", \"order\": \"1\"}, \"c5\"]\n```";
        let parsed = parse_selections(reply).unwrap();
        assert_eq!(parsed, vec![sel("c2", 1), sel("c5", 2)]);
    }

    #[test]
    fn test_parse_key_map() {
        let reply = r#"{"c4": {"order": 2, "reason": "closer"}, "c1": 1}"#;
        let mut parsed = parse_selections(reply).unwrap();
        parsed.sort_by_key(|s| s.order);
        assert_eq!(parsed[0], sel("c1", 1));
        assert_eq!(parsed[1].key, "c4");
        assert_eq!(parsed[1].reason.as_deref(), Some("closer"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_selections("I would pick Alien and Aliens."),
            Err(ResponseError::NotJson(_))
        ));
        assert!(matches!(
            parse_selections(r#"{"selections": "c1,c2"}"#),
            Err(ResponseError::UnexpectedShape(_))
        ));
        assert!(matches!(
            parse_selections(r#"{"selections": [{"order": 1}]}"#),
            Err(ResponseError::UnexpectedShape(_))
        ));
        assert!(matches!(
            parse_selections(r#"{"selections": [{"key": "c1"}"#),
            Err(ResponseError::NotJson(_))
        ));
    }

    #[test]
    fn test_parse_empty_selection_list_is_valid() {
        assert_eq!(parse_selections(r#"{"selections": []}"#).unwrap(), vec![]);
    }
}
