//! Shared types: conversation turns and client-facing stream events.

pub mod message;
pub mod stream;

pub use message::{ConversationTurn, Role, TurnToolCall, TurnToolFunction};
pub use stream::RelayEvent;
