//! In-memory [`CoachData`] implementation.
//!
//! Backs the default binary and the test suite. State lives behind a single
//! `RwLock`; no method awaits while holding it.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::CoachData;
use crate::error::{RelayError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningEvent {
    pub id: Uuid,
    pub name: String,
    pub date: NaiveDate,
    pub distance_km: Option<f64>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightEntry {
    pub weight_kg: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealEntry {
    pub description: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NutritionGoals {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

#[derive(Debug, Default)]
struct Inner {
    profile: Option<Value>,
    events: Vec<RunningEvent>,
    weights: Vec<WeightEntry>,
    meals: Vec<MealEntry>,
    goals: Option<NutritionGoals>,
}

/// In-memory store for profile, events, weight, and nutrition data.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn arg_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn arg_f64(args: &Value, key: &str) -> Option<f64> {
    args.get(key).and_then(|v| v.as_f64())
}

fn require_str(args: &Value, key: &str) -> Result<String> {
    arg_str(args, key).ok_or_else(|| RelayError::InvalidArgument(format!("{key} is required")))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| RelayError::InvalidArgument(format!("invalid date: {raw}")))
}

/// Date argument with a today default.
fn arg_date_or_today(args: &Value, key: &str) -> Result<NaiveDate> {
    match arg_str(args, key) {
        Some(raw) => parse_date(&raw),
        None => Ok(Utc::now().date_naive()),
    }
}

#[async_trait]
impl CoachData for MemoryStore {
    async fn save_runner_profile(&self, args: Value) -> Result<Value> {
        if !args.is_object() {
            return Err(RelayError::InvalidArgument(
                "profile must be an object".to_string(),
            ));
        }
        let mut inner = self.inner.write().unwrap();
        // Merge onto any existing profile so partial updates keep prior fields.
        let mut profile = inner.profile.take().unwrap_or_else(|| json!({}));
        if let (Some(existing), Some(incoming)) = (profile.as_object_mut(), args.as_object()) {
            for (k, v) in incoming {
                existing.insert(k.clone(), v.clone());
            }
        }
        inner.profile = Some(profile.clone());
        Ok(json!({
            "success": true,
            "message": "Runner profile saved",
            "profile": profile,
        }))
    }

    async fn get_running_events(&self, args: Value) -> Result<Value> {
        let from = arg_str(&args, "from").map(|s| parse_date(&s)).transpose()?;
        let to = arg_str(&args, "to").map(|s| parse_date(&s)).transpose()?;

        let inner = self.inner.read().unwrap();
        let mut events: Vec<RunningEvent> = inner
            .events
            .iter()
            .filter(|e| from.map_or(true, |d| e.date >= d) && to.map_or(true, |d| e.date <= d))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.date);

        Ok(json!({
            "success": true,
            "count": events.len(),
            "events": events,
        }))
    }

    async fn create_running_event(&self, args: Value) -> Result<Value> {
        let name = require_str(&args, "name")?;
        let date = parse_date(&require_str(&args, "date")?)?;

        let event = RunningEvent {
            id: Uuid::new_v4(),
            name: name.clone(),
            date,
            distance_km: arg_f64(&args, "distance_km"),
            location: arg_str(&args, "location"),
            notes: arg_str(&args, "notes"),
        };

        self.inner.write().unwrap().events.push(event.clone());
        Ok(json!({
            "success": true,
            "message": format!("Event '{name}' scheduled for {date}"),
            "event": event,
        }))
    }

    async fn log_weight(&self, args: Value) -> Result<Value> {
        let weight_kg = arg_f64(&args, "weight")
            .ok_or_else(|| RelayError::InvalidArgument("weight is required".to_string()))?;
        let date = arg_date_or_today(&args, "date")?;

        let entry = WeightEntry { weight_kg, date };
        self.inner.write().unwrap().weights.push(entry.clone());
        Ok(json!({
            "success": true,
            "message": format!("Logged {weight_kg} kg on {date}"),
            "entry": entry,
        }))
    }

    async fn get_weight_history(&self, args: Value) -> Result<Value> {
        // The model supplies `days`; clamp it so a wild value cannot push
        // the cutoff date out of chrono's range.
        let days = arg_f64(&args, "days")
            .filter(|d| d.is_finite())
            .map(|d| d.clamp(0.0, 36_500.0) as i64)
            .unwrap_or(30);
        let cutoff = Utc::now().date_naive() - Duration::days(days);

        let inner = self.inner.read().unwrap();
        let mut entries: Vec<WeightEntry> = inner
            .weights
            .iter()
            .filter(|e| e.date >= cutoff)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.date);
        let latest = entries.last().map(|e| e.weight_kg);

        Ok(json!({
            "success": true,
            "days": days,
            "latest_kg": latest,
            "entries": entries,
        }))
    }

    async fn log_meal(&self, args: Value) -> Result<Value> {
        let description = require_str(&args, "description")?;
        let date = arg_date_or_today(&args, "date")?;

        let meal = MealEntry {
            description: description.clone(),
            calories: arg_f64(&args, "calories").unwrap_or(0.0),
            protein: arg_f64(&args, "protein").unwrap_or(0.0),
            carbs: arg_f64(&args, "carbs").unwrap_or(0.0),
            fat: arg_f64(&args, "fat").unwrap_or(0.0),
            date,
        };

        self.inner.write().unwrap().meals.push(meal.clone());
        Ok(json!({
            "success": true,
            "message": format!("Logged meal: {description}"),
            "meal": meal,
        }))
    }

    async fn get_nutrition_summary(&self, args: Value) -> Result<Value> {
        let date = arg_date_or_today(&args, "date")?;

        let inner = self.inner.read().unwrap();
        let meals: Vec<&MealEntry> = inner.meals.iter().filter(|m| m.date == date).collect();
        let calories: f64 = meals.iter().map(|m| m.calories).sum();
        let protein: f64 = meals.iter().map(|m| m.protein).sum();
        let carbs: f64 = meals.iter().map(|m| m.carbs).sum();
        let fat: f64 = meals.iter().map(|m| m.fat).sum();

        Ok(json!({
            "success": true,
            "date": date,
            "meals": meals.len(),
            "totals": {
                "calories": calories,
                "protein": protein,
                "carbs": carbs,
                "fat": fat,
            },
            "goals": inner.goals,
        }))
    }

    async fn set_nutrition_goals(&self, args: Value) -> Result<Value> {
        let incoming = NutritionGoals {
            calories: arg_f64(&args, "calories"),
            protein: arg_f64(&args, "protein"),
            carbs: arg_f64(&args, "carbs"),
            fat: arg_f64(&args, "fat"),
        };
        if incoming.calories.is_none()
            && incoming.protein.is_none()
            && incoming.carbs.is_none()
            && incoming.fat.is_none()
        {
            return Err(RelayError::InvalidArgument(
                "at least one goal is required".to_string(),
            ));
        }

        let mut inner = self.inner.write().unwrap();
        let mut goals = inner.goals.take().unwrap_or_default();
        goals.calories = incoming.calories.or(goals.calories);
        goals.protein = incoming.protein.or(goals.protein);
        goals.carbs = incoming.carbs.or(goals.carbs);
        goals.fat = incoming.fat.or(goals.fat);
        inner.goals = Some(goals.clone());

        Ok(json!({
            "success": true,
            "message": "Nutrition goals updated",
            "goals": goals,
        }))
    }
}
