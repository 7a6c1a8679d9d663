//! Nutrition alerts
//!
//! Flags whole-day totals outside the configured ranges and meal slots left
//! empty. Alerts are advisory; nothing is blocked by them.

use serde::{Deserialize, Serialize};

use crate::models::{Nutrients, CALORIES, CARBOHYDRATE, FIBER, PROTEIN};
use super::Session;

/// Ranges checked against session totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub min_calories: f64,
    pub max_calories: f64,
    pub min_protein: f64,
    pub max_protein: f64,
    pub max_carbohydrate: f64,
    pub min_fiber: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            min_calories: 1200.0,
            max_calories: 3000.0,
            min_protein: 50.0,
            max_protein: 150.0,
            max_carbohydrate: 350.0,
            min_fiber: 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "alert", rename_all = "snake_case")]
pub enum NutritionAlert {
    LowCalories { value: f64, min: f64 },
    HighCalories { value: f64, max: f64 },
    LowProtein { value: f64, min: f64 },
    HighProtein { value: f64, max: f64 },
    HighCarbohydrate { value: f64, max: f64 },
    LowFiber { value: f64, min: f64 },
    EmptyMeal { slot: String },
}

impl NutritionAlert {
    pub fn message(&self) -> String {
        match self {
            NutritionAlert::LowCalories { .. } => "Low calorie intake".to_string(),
            NutritionAlert::HighCalories { .. } => "Calories above the recommended range".to_string(),
            NutritionAlert::LowProtein { .. } => "Insufficient protein".to_string(),
            NutritionAlert::HighProtein { .. } => "Excess protein".to_string(),
            NutritionAlert::HighCarbohydrate { .. } => "Excess carbohydrate".to_string(),
            NutritionAlert::LowFiber { .. } => "Insufficient fiber".to_string(),
            NutritionAlert::EmptyMeal { slot } => format!("Empty meal: {}", slot),
        }
    }
}

/// Alerts for a session's totals, nutrient alerts first then empty slots in order
pub fn evaluate(totals: &Nutrients, session: &Session, thresholds: &AlertThresholds) -> Vec<NutritionAlert> {
    let mut alerts = Vec::new();

    let calories = totals.get(CALORIES);
    if calories < thresholds.min_calories {
        alerts.push(NutritionAlert::LowCalories { value: calories, min: thresholds.min_calories });
    }
    if calories > thresholds.max_calories {
        alerts.push(NutritionAlert::HighCalories { value: calories, max: thresholds.max_calories });
    }

    let protein = totals.get(PROTEIN);
    if protein < thresholds.min_protein {
        alerts.push(NutritionAlert::LowProtein { value: protein, min: thresholds.min_protein });
    }
    if protein > thresholds.max_protein {
        alerts.push(NutritionAlert::HighProtein { value: protein, max: thresholds.max_protein });
    }

    let carbohydrate = totals.get(CARBOHYDRATE);
    if carbohydrate > thresholds.max_carbohydrate {
        alerts.push(NutritionAlert::HighCarbohydrate { value: carbohydrate, max: thresholds.max_carbohydrate });
    }

    let fiber = totals.get(FIBER);
    if fiber < thresholds.min_fiber {
        alerts.push(NutritionAlert::LowFiber { value: fiber, min: thresholds.min_fiber });
    }

    for (slot, entries) in session.iter() {
        if entries.is_empty() {
            alerts.push(NutritionAlert::EmptyMeal { slot: slot.to_string() });
        }
    }

    alerts
}
