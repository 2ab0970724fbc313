//! Data-layer collaborator behind the tool catalog.
//!
//! The relay never touches application tables directly; each tool delegates
//! to one method here. Methods take the model-provided argument bag as-is
//! and return a JSON-serializable result object.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;

/// Application data access used by the coach tools, one method per tool.
///
/// Implementations should reserve `Err` for malformed arguments or storage
/// failures; domain outcomes ("no entries yet") belong in the result object.
#[async_trait]
pub trait CoachData: Send + Sync {
    async fn save_runner_profile(&self, args: serde_json::Value) -> Result<serde_json::Value>;
    async fn get_running_events(&self, args: serde_json::Value) -> Result<serde_json::Value>;
    async fn create_running_event(&self, args: serde_json::Value) -> Result<serde_json::Value>;
    async fn log_weight(&self, args: serde_json::Value) -> Result<serde_json::Value>;
    async fn get_weight_history(&self, args: serde_json::Value) -> Result<serde_json::Value>;
    async fn log_meal(&self, args: serde_json::Value) -> Result<serde_json::Value>;
    async fn get_nutrition_summary(&self, args: serde_json::Value) -> Result<serde_json::Value>;
    async fn set_nutrition_goals(&self, args: serde_json::Value) -> Result<serde_json::Value>;
}
