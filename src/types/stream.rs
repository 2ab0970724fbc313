//! Client-facing stream events.

/// An event emitted on the relay's SSE stream.
///
/// The terminal `[DONE]` frame is not an event; the server appends it after
/// the stream ends, whichever path the relay took.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// An incremental assistant text fragment.
    Content(String),
    /// A named tool ran; `flag` is the cache-invalidation key the client
    /// uses to refresh affected views (mutating tools only).
    ToolExecuted {
        tool: String,
        flag: Option<&'static str>,
    },
}

impl RelayEvent {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content(text.into())
    }

    pub fn tool_executed(tool: impl Into<String>, flag: Option<&'static str>) -> Self {
        Self::ToolExecuted {
            tool: tool.into(),
            flag,
        }
    }

    /// Render the JSON payload for the `data:` frame.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Content(text) => serde_json::json!({ "content": text }),
            Self::ToolExecuted { tool, flag } => {
                let mut obj = serde_json::Map::new();
                obj.insert("toolExecuted".to_string(), tool.clone().into());
                if let Some(flag) = flag {
                    obj.insert(flag.to_string(), true.into());
                }
                serde_json::Value::Object(obj)
            }
        }
    }
}
