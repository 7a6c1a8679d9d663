//! SQLite-backed diet store
//!
//! Each trait call runs one model operation on a pooled connection inside
//! `spawn_blocking`.

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::Connection;

use crate::diet::{DietStore, StoreError, StoreResult};
use crate::models::{
    DietId, DietSummary, FoodItem, FoodItemCreate, MealId, MealItem, MealRecord, PatientId,
};
use super::{Database, DbResult};

#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| StoreError::Unavailable(format!("database task failed: {}", e)))?
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl DietStore for SqliteStore {
    async fn list_foods(&self) -> StoreResult<Vec<FoodItem>> {
        self.run(FoodItem::list_all).await
    }

    async fn insert_food(&self, data: &FoodItemCreate) -> StoreResult<FoodItem> {
        let data = data.clone();
        self.run(move |conn| FoodItem::create(conn, &data)).await
    }

    async fn list_diets_for_patient(&self, patient_id: PatientId) -> StoreResult<Vec<DietSummary>> {
        self.run(move |conn| DietSummary::list_for_patient(conn, patient_id)).await
    }

    async fn get_diet(&self, diet_id: DietId) -> StoreResult<Option<DietSummary>> {
        self.run(move |conn| DietSummary::get_by_id(conn, diet_id)).await
    }

    async fn insert_diet(
        &self,
        patient_id: PatientId,
        name: &str,
        objective: &str,
        created_at: NaiveDate,
    ) -> StoreResult<DietSummary> {
        let name = name.to_string();
        let objective = objective.to_string();
        self.run(move |conn| DietSummary::create(conn, patient_id, &name, &objective, created_at))
            .await
    }

    async fn list_meals_for_diet(&self, diet_id: DietId) -> StoreResult<Vec<MealRecord>> {
        self.run(move |conn| MealRecord::list_for_diet(conn, diet_id)).await
    }

    async fn list_meal_items(&self, meal_id: MealId) -> StoreResult<Vec<MealItem>> {
        self.run(move |conn| MealItem::list_for_meal(conn, meal_id)).await
    }

    async fn insert_meal(&self, diet_id: DietId, slot_name: &str) -> StoreResult<MealRecord> {
        let slot_name = slot_name.to_string();
        self.run(move |conn| MealRecord::create(conn, diet_id, &slot_name)).await
    }

    async fn delete_meal_items(&self, meal_id: MealId) -> StoreResult<()> {
        self.run(move |conn| MealItem::delete_for_meal(conn, meal_id).map(|_| ())).await
    }

    async fn insert_meal_items(&self, meal_id: MealId, items: &[MealItem]) -> StoreResult<()> {
        let items = items.to_vec();
        self.run(move |conn| MealItem::insert_for_meal(conn, meal_id, &items)).await
    }

    async fn delete_diet(&self, diet_id: DietId) -> StoreResult<bool> {
        self.run(move |conn| DietSummary::delete(conn, diet_id)).await
    }
}
