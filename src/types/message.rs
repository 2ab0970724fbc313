//! Conversation turn types, shaped for the chat-completions wire format.

use serde::{Deserialize, Serialize};

/// A single turn in a conversation.
///
/// This round-trips the OpenAI-style message object: `content` may be null
/// (an assistant turn that only carries tool calls), `tool_calls` appears
/// only on assistant turns, and `tool_call_id` only on tool-result turns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<TurnToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ConversationTurn {
    /// Create a system turn.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(text.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(text.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create an assistant text turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(text.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create the assistant turn echoing a tool call the upstream requested.
    ///
    /// `arguments` is the raw accumulated JSON string, echoed verbatim.
    pub fn assistant_tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(vec![TurnToolCall {
                id: id.into(),
                kind: "function".to_string(),
                function: TurnToolFunction {
                    name: name.into(),
                    arguments: arguments.into(),
                },
            }]),
            tool_call_id: None,
        }
    }

    /// Create a tool-result turn carrying the JSON-serialized result.
    pub fn tool_result(tool_call_id: impl Into<String>, result: &serde_json::Value) -> Self {
        Self {
            role: Role::Tool,
            content: Some(result.to_string()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call attached to an assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: TurnToolFunction,
}

/// The function half of a tool call; `arguments` is a JSON-encoded string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnToolFunction {
    pub name: String,
    pub arguments: String,
}
