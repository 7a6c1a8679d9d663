//! Meal slot registry
//!
//! The ordered set of named subdivisions of a day. Order drives display and
//! report layout only; aggregation does not depend on it.

use serde::Serialize;

use crate::error::{PlanError, PlanResult};

/// Slots used when configuration does not override them
pub const DEFAULT_MEAL_SLOTS: [&str; 6] = [
    "Breakfast",
    "Morning Snack",
    "Lunch",
    "Afternoon Snack",
    "Dinner",
    "Supper",
];

/// Fixed, ordered list of meal slot names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MealSlotRegistry {
    slots: Vec<String>,
}

impl MealSlotRegistry {
    /// Build a registry; names are trimmed and must be unique and non-empty
    pub fn new<I, S>(names: I) -> PlanResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut slots: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                return Err(PlanError::Validation("Meal slot names cannot be empty".to_string()));
            }
            if slots.iter().any(|s| s == name) {
                return Err(PlanError::Validation(format!("Duplicate meal slot '{}'", name)));
            }
            slots.push(name.to_string());
        }

        if slots.is_empty() {
            return Err(PlanError::Validation("At least one meal slot is required".to_string()));
        }

        Ok(Self { slots })
    }

    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    pub fn is_valid(&self, name: &str) -> bool {
        self.slots.iter().any(|s| s == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s == name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for MealSlotRegistry {
    fn default() -> Self {
        Self {
            slots: DEFAULT_MEAL_SLOTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_six_ordered_slots() {
        let registry = MealSlotRegistry::default();
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.slots()[0], "Breakfast");
        assert_eq!(registry.position("Lunch"), Some(2));
        assert!(registry.is_valid("Supper"));
        assert!(!registry.is_valid("lunch"));
    }

    #[test]
    fn test_rejects_duplicates_and_blanks() {
        assert!(MealSlotRegistry::new(["Lunch", " Lunch "]).is_err());
        assert!(MealSlotRegistry::new(["Lunch", ""]).is_err());
        assert!(MealSlotRegistry::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_custom_slots() {
        let registry = MealSlotRegistry::new(["Pre-workout", "Post-workout"]).unwrap();
        assert_eq!(registry.slots(), &["Pre-workout".to_string(), "Post-workout".to_string()]);
    }
}
