//! Storage contract used by the catalog and the diet reconciler
//!
//! Each method is one independent call; nothing spans calls, so a save made of
//! several calls can stop halfway.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::db::DbError;
use crate::models::{
    DietId, DietSummary, FoodItem, FoodItemCreate, MealId, MealItem, MealRecord, PatientId,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error("Malformed stored data: {0}")]
    Malformed(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait DietStore: Send + Sync {
    /// Every food in the catalog
    async fn list_foods(&self) -> StoreResult<Vec<FoodItem>>;

    /// Persist an already validated food and return it with its id
    async fn insert_food(&self, data: &FoodItemCreate) -> StoreResult<FoodItem>;

    /// Diet headers of a patient, newest first
    async fn list_diets_for_patient(&self, patient_id: PatientId) -> StoreResult<Vec<DietSummary>>;

    async fn get_diet(&self, diet_id: DietId) -> StoreResult<Option<DietSummary>>;

    async fn insert_diet(
        &self,
        patient_id: PatientId,
        name: &str,
        objective: &str,
        created_at: NaiveDate,
    ) -> StoreResult<DietSummary>;

    async fn list_meals_for_diet(&self, diet_id: DietId) -> StoreResult<Vec<MealRecord>>;

    /// Items of a meal in their stored order
    async fn list_meal_items(&self, meal_id: MealId) -> StoreResult<Vec<MealItem>>;

    async fn insert_meal(&self, diet_id: DietId, slot_name: &str) -> StoreResult<MealRecord>;

    async fn delete_meal_items(&self, meal_id: MealId) -> StoreResult<()>;

    async fn insert_meal_items(&self, meal_id: MealId, items: &[MealItem]) -> StoreResult<()>;

    /// Delete a diet with its meals and items; false when it did not exist
    async fn delete_diet(&self, diet_id: DietId) -> StoreResult<bool>;
}
