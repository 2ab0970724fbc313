//! Tool system for coach function calling.

pub mod catalog;
pub mod registry;

pub use catalog::default_registry;
pub use registry::{CoachTool, DataTool, ToolRegistry};
