use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::warn;

/// Normalizes an inbound event before resolution.
///
/// A top-level string must be JSON and failing to parse it is fatal. An
/// HTTP-gateway shaped event carrying a string `body` is sniffed by its
/// `content-type` header: JSON bodies are parsed in place, urlencoded bodies
/// are decoded to an object, and anything else is left as the raw string
/// with a warning, since the action itself may still be able to consume the
/// raw text.
pub fn normalize_event(event: Value) -> Result<Value> {
    let mut event = match event {
        Value::String(s) => serde_json::from_str(&s)
            .with_context(|| format!("can not parse event: '{}'", s))?,
        other => other,
    };

    let body_str = event.get("body").and_then(|b| b.as_str()).map(str::to_string);
    if let Some(body) = body_str {
        let content_type = event
            .get("headers")
            .and_then(|h| h.get("content-type"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_lowercase();

        match content_type.as_str() {
            "application/json" => match serde_json::from_str::<Value>(&body) {
                Ok(parsed) => event["body"] = parsed,
                Err(e) => warn!("event has a body which is not JSON: {}", e),
            },
            "application/x-www-form-urlencoded" => {
                let parsed: Map<String, Value> = url::form_urlencoded::parse(body.as_bytes())
                    .into_owned()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect();
                event["body"] = Value::Object(parsed);
            }
            other => warn!("unsupported event content type: '{}'", other),
        }
    }

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_event_must_be_json() {
        let event = normalize_event(json!(r#"{"name": "world"}"#)).unwrap();
        assert_eq!(event, json!({"name": "world"}));

        assert!(normalize_event(json!("not json at all")).is_err());
    }

    #[test]
    fn test_json_body_parsed_in_place() {
        let event = normalize_event(json!({
            "headers": {"content-type": "application/json"},
            "body": r#"{"name": "world"}"#
        }))
        .unwrap();

        assert_eq!(event["body"], json!({"name": "world"}));
    }

    #[test]
    fn test_bad_json_body_kept_as_raw_string() {
        let event = normalize_event(json!({
            "headers": {"content-type": "application/json"},
            "body": "{ truncated"
        }))
        .unwrap();

        // Warned about, not fatal.
        assert_eq!(event["body"], json!("{ truncated"));
    }

    #[test]
    fn test_urlencoded_body_decoded() {
        let event = normalize_event(json!({
            "headers": {"content-type": "application/x-www-form-urlencoded"},
            "body": "name=world&count=3&empty="
        }))
        .unwrap();

        assert_eq!(event["body"], json!({"name": "world", "count": "3", "empty": ""}));
    }

    #[test]
    fn test_unknown_content_type_left_alone() {
        let event = normalize_event(json!({
            "headers": {"content-type": "text/plain"},
            "body": "plain text"
        }))
        .unwrap();

        assert_eq!(event["body"], json!("plain text"));
    }

    #[test]
    fn test_structured_body_untouched() {
        let original = json!({"body": {"already": "parsed"}});
        let event = normalize_event(original.clone()).unwrap();
        assert_eq!(event, original);
    }
}
