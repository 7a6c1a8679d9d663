//! Food catalog
//!
//! In-memory lookup of food id -> per-100g profile, loaded in bulk from the
//! store when a session starts. Foods are immutable once registered.

use std::collections::HashMap;

use crate::diet::DietStore;
use crate::error::{PlanError, PlanResult, StoreStep};
use crate::models::{FoodId, FoodItem, FoodItemCreate};

#[derive(Debug, Clone, Default)]
pub struct FoodCatalog {
    foods: HashMap<FoodId, FoodItem>,
}

impl FoodCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items<I: IntoIterator<Item = FoodItem>>(items: I) -> Self {
        Self {
            foods: items.into_iter().map(|f| (f.id, f)).collect(),
        }
    }

    /// Read every food from the store
    pub async fn load<S: DietStore + ?Sized>(store: &S) -> PlanResult<Self> {
        let items = store
            .list_foods()
            .await
            .map_err(|source| PlanError::StorageUnavailable { step: StoreStep::ListFoods, source })?;

        tracing::info!(foods = items.len(), "food catalog loaded");
        Ok(Self::from_items(items))
    }

    /// Validate and persist a new food, then make it available immediately
    pub async fn register<S: DietStore + ?Sized>(
        &mut self,
        store: &S,
        data: &FoodItemCreate,
    ) -> PlanResult<FoodId> {
        let data = data.validated().map_err(PlanError::Validation)?;

        let item = store
            .insert_food(&data)
            .await
            .map_err(|source| PlanError::StorageUnavailable { step: StoreStep::InsertFood, source })?;

        let id = item.id;
        tracing::info!(food_id = id, name = %item.name, "food registered");
        self.foods.insert(id, item);
        Ok(id)
    }

    pub fn get(&self, id: FoodId) -> PlanResult<&FoodItem> {
        self.foods.get(&id).ok_or_else(|| PlanError::food_not_found(id))
    }

    pub fn lookup(&self, id: FoodId) -> Option<&FoodItem> {
        self.foods.get(&id)
    }

    pub fn contains(&self, id: FoodId) -> bool {
        self.foods.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.foods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.foods.is_empty()
    }

    /// Case-insensitive name search, ordered by name
    pub fn search(&self, query: &str, limit: usize) -> Vec<&FoodItem> {
        let needle = query.trim().to_lowercase();
        let mut matches: Vec<&FoodItem> = self
            .foods
            .values()
            .filter(|f| needle.is_empty() || f.name.to_lowercase().contains(&needle))
            .collect();

        matches.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then(a.id.cmp(&b.id)));
        matches.truncate(limit);
        matches
    }
}
