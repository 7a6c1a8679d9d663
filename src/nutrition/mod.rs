//! Nutrition planning core
//!
//! Catalog lookup, meal slots, the editable session and nutrient aggregation.

pub mod aggregator;
pub mod alerts;
pub mod catalog;
pub mod display;
pub mod session;
pub mod slots;

pub use aggregator::{aggregate_entry, aggregate_session, aggregate_slot};
pub use alerts::{evaluate as evaluate_alerts, AlertThresholds, NutritionAlert};
pub use catalog::FoodCatalog;
pub use display::{format_amount, DisplayPrecision};
pub use session::{AddOutcome, DuplicateEntry, MealSlotEntries, MergeDecision, Session, SessionEntry};
pub use slots::{MealSlotRegistry, DEFAULT_MEAL_SLOTS};
