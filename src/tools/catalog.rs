//! The fixed coach tool catalog: 8 function schemas over the data layer.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use super::registry::{DataTool, ToolRegistry};
use crate::data::CoachData;
use crate::error::Result;

/// Fold a data-layer outcome into the tool-result shape. Tools never throw;
/// failures come back as `{"success": false, "message": ...}`.
fn fold(tool: &'static str, outcome: Result<Value>) -> Value {
    match outcome {
        Ok(result) => result,
        Err(err) => {
            warn!(tool, error = %err, "tool execution failed");
            json!({ "success": false, "message": err.to_string() })
        }
    }
}

/// Build the registry with the full 8-tool catalog over `data`.
pub fn default_registry(data: Arc<dyn CoachData>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    let d = data.clone();
    registry.register(Arc::new(DataTool::new(
        "save_runner_profile",
        "Save or update the user's runner profile (goal, experience, weekly volume)",
        Some("profileSaved"),
        json!({
            "type": "object",
            "properties": {
                "goal": { "type": "string", "description": "Main running goal, e.g. 'sub-50 10K'" },
                "experience": {
                    "type": "string",
                    "description": "Experience level",
                    "enum": ["beginner", "intermediate", "advanced"],
                },
                "weekly_km": { "type": "number", "description": "Current weekly volume in km" },
                "age": { "type": "number", "description": "Age in years" },
            },
            "required": [],
        }),
        move |args| {
            let d = d.clone();
            async move { fold("save_runner_profile", d.save_runner_profile(args).await) }
        },
    )));

    let d = data.clone();
    registry.register(Arc::new(DataTool::new(
        "get_running_events",
        "List the user's planned running events, optionally within a date range",
        None,
        json!({
            "type": "object",
            "properties": {
                "from": { "type": "string", "description": "Earliest date, YYYY-MM-DD" },
                "to": { "type": "string", "description": "Latest date, YYYY-MM-DD" },
            },
            "required": [],
        }),
        move |args| {
            let d = d.clone();
            async move { fold("get_running_events", d.get_running_events(args).await) }
        },
    )));

    let d = data.clone();
    registry.register(Arc::new(DataTool::new(
        "create_running_event",
        "Add a running event (race or key workout) to the user's calendar",
        Some("eventCreated"),
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Event name" },
                "date": { "type": "string", "description": "Event date, YYYY-MM-DD" },
                "distance_km": { "type": "number", "description": "Distance in km" },
                "location": { "type": "string", "description": "Where the event takes place" },
                "notes": { "type": "string", "description": "Free-form notes" },
            },
            "required": ["name", "date"],
        }),
        move |args| {
            let d = d.clone();
            async move { fold("create_running_event", d.create_running_event(args).await) }
        },
    )));

    let d = data.clone();
    registry.register(Arc::new(DataTool::new(
        "log_weight",
        "Record a body-weight measurement in kilograms",
        Some("weightLogged"),
        json!({
            "type": "object",
            "properties": {
                "weight": { "type": "number", "description": "Weight in kg" },
                "date": { "type": "string", "description": "Measurement date, YYYY-MM-DD; defaults to today" },
            },
            "required": ["weight"],
        }),
        move |args| {
            let d = d.clone();
            async move { fold("log_weight", d.log_weight(args).await) }
        },
    )));

    let d = data.clone();
    registry.register(Arc::new(DataTool::new(
        "get_weight_history",
        "Fetch recent body-weight entries",
        None,
        json!({
            "type": "object",
            "properties": {
                "days": { "type": "number", "description": "How many days back to look; defaults to 30" },
            },
            "required": [],
        }),
        move |args| {
            let d = d.clone();
            async move { fold("get_weight_history", d.get_weight_history(args).await) }
        },
    )));

    let d = data.clone();
    registry.register(Arc::new(DataTool::new(
        "log_meal",
        "Record a meal with optional calories and macros",
        Some("mealLogged"),
        json!({
            "type": "object",
            "properties": {
                "description": { "type": "string", "description": "What was eaten" },
                "calories": { "type": "number", "description": "Estimated calories" },
                "protein": { "type": "number", "description": "Protein in grams" },
                "carbs": { "type": "number", "description": "Carbohydrates in grams" },
                "fat": { "type": "number", "description": "Fat in grams" },
                "date": { "type": "string", "description": "Meal date, YYYY-MM-DD; defaults to today" },
            },
            "required": ["description"],
        }),
        move |args| {
            let d = d.clone();
            async move { fold("log_meal", d.log_meal(args).await) }
        },
    )));

    let d = data.clone();
    registry.register(Arc::new(DataTool::new(
        "get_nutrition_summary",
        "Summarize calories and macros for a day against the user's goals",
        None,
        json!({
            "type": "object",
            "properties": {
                "date": { "type": "string", "description": "Day to summarize, YYYY-MM-DD; defaults to today" },
            },
            "required": [],
        }),
        move |args| {
            let d = d.clone();
            async move { fold("get_nutrition_summary", d.get_nutrition_summary(args).await) }
        },
    )));

    let d = data;
    registry.register(Arc::new(DataTool::new(
        "set_nutrition_goals",
        "Set daily calorie and macro targets",
        Some("goalsUpdated"),
        json!({
            "type": "object",
            "properties": {
                "calories": { "type": "number", "description": "Daily calorie target" },
                "protein": { "type": "number", "description": "Daily protein target in grams" },
                "carbs": { "type": "number", "description": "Daily carbohydrate target in grams" },
                "fat": { "type": "number", "description": "Daily fat target in grams" },
            },
            "required": [],
        }),
        move |args| {
            let d = d.clone();
            async move { fold("set_nutrition_goals", d.set_nutrition_goals(args).await) }
        },
    )));

    registry
}
