//! In-memory store
//!
//! Behaves like the SQLite store (ordering, cascade delete, one meal per
//! slot) and records every call. Failures can be injected per operation to
//! exercise partial saves.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Local, NaiveDate};

use crate::models::{
    DietId, DietSummary, FoodItem, FoodItemCreate, MealId, MealItem, MealRecord, PatientId,
    DEFAULT_QUANTITY_GRAMS,
};
use super::store::{DietStore, StoreError, StoreResult};

/// One `DietStore` method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ListFoods,
    InsertFood,
    ListDiets,
    GetDiet,
    InsertDiet,
    ListMeals,
    ListMealItems,
    InsertMeal,
    DeleteMealItems,
    InsertMealItems,
    DeleteDiet,
}

impl StoreOp {
    pub fn is_write(self) -> bool {
        matches!(
            self,
            StoreOp::InsertFood
                | StoreOp::InsertDiet
                | StoreOp::InsertMeal
                | StoreOp::DeleteMealItems
                | StoreOp::InsertMealItems
                | StoreOp::DeleteDiet
        )
    }
}

#[derive(Default)]
struct State {
    next_id: i64,
    foods: Vec<FoodItem>,
    diets: Vec<DietSummary>,
    meals: Vec<MealRecord>,
    items: HashMap<MealId, Vec<MealItem>>,
    calls: Vec<StoreOp>,
    writes: Vec<StoreOp>,
    seen: HashMap<StoreOp, usize>,
    faults: HashMap<StoreOp, usize>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the first `after` calls of `op` succeed, then fail every later one
    pub fn fail_on(&self, op: StoreOp, after: usize) {
        if let Ok(mut state) = self.state.lock() {
            let seen = state.seen.get(&op).copied().unwrap_or(0);
            state.faults.insert(op, seen + after);
        }
    }

    /// Remove every injected failure
    pub fn heal(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.faults.clear();
        }
    }

    /// Every call made so far, failed ones included
    pub fn calls(&self) -> Vec<StoreOp> {
        self.state.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    /// Successful writes, in order
    pub fn write_log(&self) -> Vec<StoreOp> {
        self.state.lock().map(|s| s.writes.clone()).unwrap_or_default()
    }

    pub fn meal_count(&self) -> usize {
        self.state.lock().map(|s| s.meals.len()).unwrap_or(0)
    }

    pub fn item_count(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.items.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    fn begin(&self, op: StoreOp) -> StoreResult<MutexGuard<'_, State>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;

        state.calls.push(op);
        let seen = state.seen.entry(op).or_insert(0);
        let index = *seen;
        *seen += 1;

        if let Some(&limit) = state.faults.get(&op) {
            if index >= limit {
                return Err(StoreError::Unavailable(format!("injected failure on {:?}", op)));
            }
        }
        if op.is_write() {
            state.writes.push(op);
        }
        Ok(state)
    }
}

#[async_trait]
impl DietStore for MemoryStore {
    async fn list_foods(&self) -> StoreResult<Vec<FoodItem>> {
        let state = self.begin(StoreOp::ListFoods)?;
        let mut foods = state.foods.clone();
        foods.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(foods)
    }

    async fn insert_food(&self, data: &FoodItemCreate) -> StoreResult<FoodItem> {
        let mut state = self.begin(StoreOp::InsertFood)?;
        let item = FoodItem {
            id: state.next_id(),
            name: data.name.clone(),
            nutrients: data.nutrients.clone(),
            default_quantity_grams: data.default_quantity_grams.unwrap_or(DEFAULT_QUANTITY_GRAMS),
            created_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        state.foods.push(item.clone());
        Ok(item)
    }

    async fn list_diets_for_patient(&self, patient_id: PatientId) -> StoreResult<Vec<DietSummary>> {
        let state = self.begin(StoreOp::ListDiets)?;
        let mut diets: Vec<DietSummary> = state
            .diets
            .iter()
            .filter(|d| d.patient_id == patient_id)
            .cloned()
            .collect();
        diets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(diets)
    }

    async fn get_diet(&self, diet_id: DietId) -> StoreResult<Option<DietSummary>> {
        let state = self.begin(StoreOp::GetDiet)?;
        Ok(state.diets.iter().find(|d| d.id == diet_id).cloned())
    }

    async fn insert_diet(
        &self,
        patient_id: PatientId,
        name: &str,
        objective: &str,
        created_at: NaiveDate,
    ) -> StoreResult<DietSummary> {
        let mut state = self.begin(StoreOp::InsertDiet)?;
        let diet = DietSummary {
            id: state.next_id(),
            patient_id,
            name: name.to_string(),
            objective: objective.to_string(),
            created_at,
        };
        state.diets.push(diet.clone());
        Ok(diet)
    }

    async fn list_meals_for_diet(&self, diet_id: DietId) -> StoreResult<Vec<MealRecord>> {
        let state = self.begin(StoreOp::ListMeals)?;
        Ok(state.meals.iter().filter(|m| m.diet_id == diet_id).cloned().collect())
    }

    async fn list_meal_items(&self, meal_id: MealId) -> StoreResult<Vec<MealItem>> {
        let state = self.begin(StoreOp::ListMealItems)?;
        Ok(state.items.get(&meal_id).cloned().unwrap_or_default())
    }

    async fn insert_meal(&self, diet_id: DietId, slot_name: &str) -> StoreResult<MealRecord> {
        let mut state = self.begin(StoreOp::InsertMeal)?;
        if !state.diets.iter().any(|d| d.id == diet_id) {
            return Err(StoreError::Malformed(format!("diet {} does not exist", diet_id)));
        }
        if state.meals.iter().any(|m| m.diet_id == diet_id && m.slot_name == slot_name) {
            return Err(StoreError::Malformed(format!(
                "diet {} already has a meal for '{}'",
                diet_id, slot_name
            )));
        }

        let meal = MealRecord {
            id: state.next_id(),
            diet_id,
            slot_name: slot_name.to_string(),
        };
        state.meals.push(meal.clone());
        Ok(meal)
    }

    async fn delete_meal_items(&self, meal_id: MealId) -> StoreResult<()> {
        let mut state = self.begin(StoreOp::DeleteMealItems)?;
        state.items.remove(&meal_id);
        Ok(())
    }

    async fn insert_meal_items(&self, meal_id: MealId, items: &[MealItem]) -> StoreResult<()> {
        let mut state = self.begin(StoreOp::InsertMealItems)?;
        if !state.meals.iter().any(|m| m.id == meal_id) {
            return Err(StoreError::Malformed(format!("meal {} does not exist", meal_id)));
        }
        state.items.entry(meal_id).or_default().extend_from_slice(items);
        Ok(())
    }

    async fn delete_diet(&self, diet_id: DietId) -> StoreResult<bool> {
        let mut state = self.begin(StoreOp::DeleteDiet)?;
        let before = state.diets.len();
        state.diets.retain(|d| d.id != diet_id);
        if state.diets.len() == before {
            return Ok(false);
        }

        let meal_ids: Vec<MealId> = state
            .meals
            .iter()
            .filter(|m| m.diet_id == diet_id)
            .map(|m| m.id)
            .collect();
        state.meals.retain(|m| m.diet_id != diet_id);
        for id in meal_ids {
            state.items.remove(&id);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[tokio::test]
    async fn test_delete_diet_cascades() {
        let store = MemoryStore::new();
        let diet = store.insert_diet(1, "Cut", "", date()).await.unwrap();
        let meal = store.insert_meal(diet.id, "Lunch").await.unwrap();
        store
            .insert_meal_items(meal.id, &[MealItem { food_id: 9, quantity_grams: 50.0 }])
            .await
            .unwrap();

        assert!(store.delete_diet(diet.id).await.unwrap());
        assert_eq!(store.meal_count(), 0);
        assert_eq!(store.item_count(), 0);
        assert!(!store.delete_diet(diet.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_one_meal_per_slot() {
        let store = MemoryStore::new();
        let diet = store.insert_diet(1, "Cut", "", date()).await.unwrap();
        store.insert_meal(diet.id, "Lunch").await.unwrap();
        assert!(store.insert_meal(diet.id, "Lunch").await.is_err());
    }

    #[tokio::test]
    async fn test_fail_on_after_n_calls() {
        let store = MemoryStore::new();
        store.fail_on(StoreOp::InsertDiet, 1);

        assert!(store.insert_diet(1, "A", "", date()).await.is_ok());
        assert!(matches!(
            store.insert_diet(1, "B", "", date()).await,
            Err(StoreError::Unavailable(_))
        ));
        assert_eq!(store.write_log(), vec![StoreOp::InsertDiet]);
        assert_eq!(store.calls().len(), 2);

        store.heal();
        assert!(store.insert_diet(1, "C", "", date()).await.is_ok());
    }

    #[tokio::test]
    async fn test_diets_newest_first() {
        let store = MemoryStore::new();
        let old = store.insert_diet(1, "Old", "", date()).await.unwrap();
        let new = store
            .insert_diet(1, "New", "", NaiveDate::from_ymd_opt(2026, 4, 1).unwrap())
            .await
            .unwrap();
        store.insert_diet(2, "Other", "", date()).await.unwrap();

        let ids: Vec<DietId> = store
            .list_diets_for_patient(1)
            .await
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }
}
