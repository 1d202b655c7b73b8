use serde::{Deserialize, Serialize};

// ─── Message types ────────────────────────────────────────────────────────────

/// A single message in the model-visible conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: MessageContent::Text(text.into()) }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: MessageContent::Text(text.into()) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: MessageContent::Text(text.into()) }
    }

    /// An assistant turn that requested a tool invocation.
    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: String) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::ToolCall {
                tool_call_id: id.into(),
                name: name.into(),
                arguments,
            },
        }
    }

    pub fn tool_result(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult {
                tool_call_id: id.into(),
                content: content.into(),
            },
        }
    }

    /// Return the plain text of this message, if it is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// The content of a message.
///
/// - `Text` – simple string (most messages)
/// - `ToolCall` – the assistant requests a tool invocation
/// - `ToolResult` – the receipt or result string fed back for a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    ToolCall {
        tool_call_id: String,
        name: String,
        /// JSON-encoded argument object
        arguments: String,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
    },
}

// ─── Tool schema & invocation ─────────────────────────────────────────────────

/// A tool schema provided to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameters object
    pub parameters: serde_json::Value,
}

/// A single tool invocation emitted by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    /// Opaque identifier assigned by the model (forwarded verbatim)
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub arguments: serde_json::Value,
}

// ─── Requests & responses ─────────────────────────────────────────────────────

/// Reasoning-effort hint forwarded to providers that support it.
///
/// The orchestrator sets a per-phase profile on the request; how the hint is
/// encoded on the wire is the transport's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    None,
    Low,
    Medium,
    High,
}

/// Request sent to a model transport.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSchema>,
    /// Per-phase reasoning-effort override.  `None` means "no override":
    /// the transport uses its provider default.
    pub reasoning_effort: Option<ReasoningEffort>,
}

/// A completed (non-streaming) model turn: final text plus any tool
/// invocations the model emitted before stopping.
#[derive(Debug, Clone, Default)]
pub struct ChatTurn {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
}

impl ChatTurn {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self { text: text.into(), tool_calls: Vec::new() }
    }
}

/// A single streamed event from the model.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A text delta streamed from the model
    TextDelta(String),
    /// The model wants to call a tool
    ToolCall {
        /// Parallel-tool-call index from the provider; used to reassemble
        /// interleaved argument chunks.
        index: u32,
        id: String,
        name: String,
        /// Accumulated JSON arguments (may arrive across multiple deltas)
        arguments: String,
    },
    /// The stream finished normally
    Done,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_user_sets_role_and_text() {
        let m = ChatMessage::user("hello");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.as_text(), Some("hello"));
    }

    #[test]
    fn message_tool_result_sets_role_and_content() {
        let m = ChatMessage::tool_result("id-1", "output");
        assert_eq!(m.role, Role::Tool);
        assert!(m.as_text().is_none(), "tool_result has no text accessor");
        match &m.content {
            MessageContent::ToolResult { tool_call_id, content } => {
                assert_eq!(tool_call_id, "id-1");
                assert_eq!(content, "output");
            }
            _ => panic!("wrong content variant"),
        }
    }

    #[test]
    fn tool_call_carries_raw_arguments() {
        let m = ChatMessage::tool_call("c1", "read_file", r#"{"path":"a.txt"}"#.into());
        match &m.content {
            MessageContent::ToolCall { name, arguments, .. } => {
                assert_eq!(name, "read_file");
                assert!(arguments.contains("a.txt"));
            }
            _ => panic!("wrong content variant"),
        }
    }

    #[test]
    fn message_serialises_and_deserialises() {
        let original = ChatMessage::user("test payload");
        let json = serde_json::to_string(&original).unwrap();
        let decoded: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.role, Role::User);
        assert_eq!(decoded.as_text(), Some("test payload"));
    }

    #[test]
    fn reasoning_effort_serialises_lowercase() {
        let json = serde_json::to_string(&ReasoningEffort::High).unwrap();
        assert_eq!(json, "\"high\"");
    }

    #[test]
    fn chat_turn_text_only_has_no_calls() {
        let t = ChatTurn::text_only("done");
        assert_eq!(t.text, "done");
        assert!(t.tool_calls.is_empty());
    }
}
