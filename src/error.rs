//! Error taxonomy
//!
//! Validation errors are raised before any storage call and never leave partial
//! state behind. Storage errors carry the step that failed so the caller can
//! decide whether to retry the whole operation.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::diet::StoreError;
use crate::models::{DietId, FoodId};

/// A single storage call made by the catalog or the diet reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StoreStep {
    ListFoods,
    InsertFood,
    ListDiets,
    ReadDiet,
    InsertDiet,
    ListMeals,
    ReadMealItems { slot: String },
    InsertMeal { slot: String },
    DeleteMealItems { slot: String },
    InsertMealItems { slot: String },
    DeleteDiet,
}

impl fmt::Display for StoreStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreStep::ListFoods => write!(f, "list foods"),
            StoreStep::InsertFood => write!(f, "insert food"),
            StoreStep::ListDiets => write!(f, "list diets"),
            StoreStep::ReadDiet => write!(f, "read diet"),
            StoreStep::InsertDiet => write!(f, "insert diet"),
            StoreStep::ListMeals => write!(f, "list meals"),
            StoreStep::ReadMealItems { slot } => write!(f, "read items of '{}'", slot),
            StoreStep::InsertMeal { slot } => write!(f, "insert meal '{}'", slot),
            StoreStep::DeleteMealItems { slot } => write!(f, "delete items of '{}'", slot),
            StoreStep::InsertMealItems { slot } => write!(f, "insert items of '{}'", slot),
            StoreStep::DeleteDiet => write!(f, "delete diet"),
        }
    }
}

/// Errors raised by the planning core
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Unknown meal slot '{0}'")]
    InvalidSlot(String),

    #[error("Food {0} is not in the catalog")]
    InvalidFood(FoodId),

    #[error("Invalid quantity {quantity} g in '{slot}': must be greater than 0")]
    InvalidQuantity { slot: String, quantity: f64 },

    #[error("Index {index} out of range for '{slot}' ({len} entries)")]
    IndexOutOfRange { slot: String, index: usize, len: usize },

    #[error("Diet is empty: add at least one food")]
    EmptyDiet,

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("Storage unavailable ({step}): {source}")]
    StorageUnavailable {
        step: StoreStep,
        #[source]
        source: StoreError,
    },

    #[error("Diet {diet_id} was partially written; failed at {step}: {source}")]
    PartialWriteFailure {
        diet_id: DietId,
        step: StoreStep,
        #[source]
        source: StoreError,
    },

    #[error("{0}")]
    Validation(String),

    #[error("Report generation failed: {0}")]
    Report(String),
}

impl PlanError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            PlanError::InvalidSlot(_) => "INVALID_SLOT",
            PlanError::InvalidFood(_) => "INVALID_FOOD",
            PlanError::InvalidQuantity { .. } => "INVALID_QUANTITY",
            PlanError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            PlanError::EmptyDiet => "EMPTY_DIET",
            PlanError::NotFound { .. } => "NOT_FOUND",
            PlanError::StorageUnavailable { .. } => "STORAGE_UNAVAILABLE",
            PlanError::PartialWriteFailure { .. } => "PARTIAL_WRITE_FAILURE",
            PlanError::Validation(_) => "VALIDATION",
            PlanError::Report(_) => "REPORT",
        }
    }

    pub(crate) fn food_not_found(id: FoodId) -> Self {
        PlanError::NotFound { kind: "Food", id }
    }

    pub(crate) fn diet_not_found(id: DietId) -> Self {
        PlanError::NotFound { kind: "Diet", id }
    }
}

/// Result type for planning operations
pub type PlanResult<T> = Result<T, PlanError>;
