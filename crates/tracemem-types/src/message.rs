use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool invocation within an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// Framework-agnostic message, discriminated by role.
///
/// Event-source adapters convert external chat formats into this shape
/// before handing them to the ingestion engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        content: String,
        #[serde(default)]
        tool_call_id: Option<String>,
    },
    System {
        #[serde(default)]
        content: String,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Canonical UTF-8 string form of a raw tool result, as hashed by the
/// resource-versioning procedure.
///
/// Strings pass through verbatim. Maps are checked for a string `content`
/// key, then `result`; anything else serializes as canonical JSON
/// (serde_json's default map ordering is already key-sorted). `null` is the
/// empty string.
pub fn canonical_tool_content(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            for key in ["content", "result"] {
                if let Some(Value::String(s)) = map.get(key) {
                    return s.clone();
                }
            }
            serde_json::to_string(value).unwrap_or_default()
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_round_trip() {
        let raw = r#"{"role": "assistant", "content": "ok", "tool_calls": [
            {"id": "c1", "name": "read_file", "args": {"path": "/tmp/a"}}
        ]}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        match &msg {
            Message::Assistant { content, tool_calls } => {
                assert_eq!(content, "ok");
                assert_eq!(tool_calls.len(), 1);
                assert_eq!(tool_calls[0].name, "read_file");
            }
            _ => panic!("expected assistant message"),
        }
        let encoded = serde_json::to_value(&msg).unwrap();
        assert_eq!(encoded["role"], "assistant");
    }

    #[test]
    fn test_tool_message_without_call_id() {
        let msg: Message = serde_json::from_str(r#"{"role": "tool", "content": "x"}"#).unwrap();
        assert!(matches!(msg, Message::Tool { tool_call_id: None, .. }));
    }

    #[test]
    fn test_canonical_content_string_verbatim() {
        assert_eq!(canonical_tool_content(&json!("hello")), "hello");
    }

    #[test]
    fn test_canonical_content_null_is_empty() {
        assert_eq!(canonical_tool_content(&Value::Null), "");
    }

    #[test]
    fn test_canonical_content_map_prefers_content_key() {
        let value = json!({"result": "b", "content": "a"});
        assert_eq!(canonical_tool_content(&value), "a");
        let value = json!({"result": "b"});
        assert_eq!(canonical_tool_content(&value), "b");
    }

    #[test]
    fn test_canonical_content_map_without_known_keys_is_json() {
        let value = json!({"b": 2, "a": 1});
        // serde_json sorts object keys, so the canonical form is stable.
        assert_eq!(canonical_tool_content(&value), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_canonical_content_list_is_json() {
        assert_eq!(canonical_tool_content(&json!([1, "x"])), r#"[1,"x"]"#);
    }
}
