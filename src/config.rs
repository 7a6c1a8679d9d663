//! Runtime configuration
//!
//! Read once from the environment at startup.

use std::path::PathBuf;

use crate::error::PlanResult;
use crate::nutrition::{AlertThresholds, DisplayPrecision, MealSlotRegistry};

pub const DATABASE_PATH_VAR: &str = "NUTRIPLAN_DATABASE_PATH";
pub const MEAL_SLOTS_VAR: &str = "NUTRIPLAN_MEAL_SLOTS";
pub const REPORT_DIR_VAR: &str = "NUTRIPLAN_REPORT_DIR";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub report_dir: PathBuf,
    pub meal_slots: MealSlotRegistry,
    pub thresholds: AlertThresholds,
    pub precision: DisplayPrecision,
}

impl AppConfig {
    pub fn from_env() -> PlanResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; unset or blank values fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> PlanResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_path = var(DATABASE_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| project_root().join("data").join("nutriplan.db"));

        let report_dir = var(REPORT_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| project_root().join("reports"));

        let meal_slots = match var(MEAL_SLOTS_VAR) {
            Some(raw) => MealSlotRegistry::new(raw.split(','))?,
            None => MealSlotRegistry::default(),
        };

        Ok(Self {
            database_path,
            report_dir,
            meal_slots,
            thresholds: AlertThresholds::default(),
            precision: DisplayPrecision::default(),
        })
    }
}

/// Directory of the executable, or the project root when run from target/
fn project_root() -> PathBuf {
    let mut path = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));

    if path.ends_with("release") || path.ends_with("debug") {
        if let Some(root) = path.parent().and_then(|p| p.parent()) {
            path = root.to_path_buf();
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> PlanResult<AppConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert!(cfg.database_path.ends_with("data/nutriplan.db"));
        assert!(cfg.report_dir.ends_with("reports"));
        assert_eq!(cfg.meal_slots, MealSlotRegistry::default());
        assert_eq!(cfg.precision, DisplayPrecision::default());
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            (DATABASE_PATH_VAR, "/tmp/plan.db"),
            (MEAL_SLOTS_VAR, "Breakfast, Lunch ,Dinner"),
            (REPORT_DIR_VAR, "   "),
        ])
        .unwrap();
        assert_eq!(cfg.database_path, PathBuf::from("/tmp/plan.db"));
        assert_eq!(cfg.meal_slots.slots(), &["Breakfast", "Lunch", "Dinner"]);
        assert!(cfg.report_dir.ends_with("reports"));
    }

    #[test]
    fn test_bad_slot_list_is_rejected() {
        assert!(config(&[(MEAL_SLOTS_VAR, "Lunch,,Dinner")]).is_err());
        assert!(config(&[(MEAL_SLOTS_VAR, "Lunch,Lunch")]).is_err());
    }
}
