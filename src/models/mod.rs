//! Data models
//!
//! Rust structs representing database entities.

mod anamnesis;
mod anthropometry;
mod columns;
mod consultation;
mod diet;
mod food_item;
mod nutrients;
mod patient;

/// Identifiers are storage row ids; callers treat them as opaque.
pub type FoodId = i64;
pub type PatientId = i64;
pub type DietId = i64;
pub type MealId = i64;
pub type ConsultationId = i64;

pub use anamnesis::{Anamnesis, AnamnesisRecord};
pub use anthropometry::{bmi, AnthropometryCreate, AnthropometryRecord, BmiClass};
pub use consultation::{Consultation, ConsultationCreate, ConsultationKind};
pub use diet::{Diet, DietSummary, MealItem, MealRecord};
pub use food_item::{FoodItem, FoodItemCreate, DEFAULT_QUANTITY_GRAMS};
pub use nutrients::{
    Nutrients, CALORIES, CARBOHYDRATE, FAT, FIBER, OPTIONAL_NUTRIENTS, PROTEIN, REQUIRED_NUTRIENTS,
};
pub use patient::{age_on, Patient, PatientCreate};
