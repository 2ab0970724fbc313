//! Stride Relay — streaming chat relay for the Stride fitness coach.
//!
//! Accepts a conversation over `POST /api/chat`, forwards it to an upstream
//! OpenAI-compatible chat-completions API together with the coach tool
//! catalog, and streams the assistant's reply back to the caller as
//! Server-Sent Events. If the upstream decides to call a tool, the relay
//! executes it against the local data layer, appends the tool turns to the
//! conversation, and streams the continuation. At most one tool call is
//! resolved per request cycle.

pub mod config;
pub mod data;
pub mod error;
pub mod relay;
pub mod server;
pub mod sse;
pub mod tools;
pub mod types;
pub mod upstream;
