//! Diet reconciler
//!
//! Turns a session into stored diet/meal/item rows and back. A save is a
//! sequence of independent store calls with no rollback: when one fails, the
//! error names the step and whether anything had already been written.
//!
//! Every slot write goes through the same find-or-create of the
//! `(diet, slot)` meal row followed by replace-all of its items, so running a
//! failed save again converges on the session's content.

use std::collections::HashMap;

use chrono::Local;

use crate::error::{PlanError, PlanResult, StoreStep};
use crate::models::{Diet, DietId, DietSummary, MealItem, MealRecord, PatientId};
use crate::nutrition::{MealSlotRegistry, Session, SessionEntry};
use super::store::{DietStore, StoreError};
use super::EditingContext;

/// Tracks whether a multi-step save has written anything yet
struct WriteProgress {
    diet_id: Option<DietId>,
    wrote: bool,
}

impl WriteProgress {
    fn new(diet_id: Option<DietId>) -> Self {
        Self { diet_id, wrote: false }
    }

    fn wrote(&mut self, diet_id: DietId) {
        self.diet_id = Some(diet_id);
        self.wrote = true;
    }

    fn fail(&self, step: StoreStep, source: StoreError) -> PlanError {
        match (self.wrote, self.diet_id) {
            (true, Some(diet_id)) => {
                tracing::error!(diet_id, %step, error = %source, "diet partially written");
                PlanError::PartialWriteFailure { diet_id, step, source }
            }
            _ => {
                tracing::warn!(%step, error = %source, "store unavailable");
                PlanError::StorageUnavailable { step, source }
            }
        }
    }
}

fn to_items(entries: &[SessionEntry]) -> Vec<MealItem> {
    entries
        .iter()
        .map(|e| MealItem {
            food_id: e.food_id,
            quantity_grams: e.quantity_grams,
        })
        .collect()
}

fn unavailable(step: StoreStep) -> impl FnOnce(StoreError) -> PlanError {
    move |source| PlanError::StorageUnavailable { step, source }
}

pub struct DietReconciler<'a, S: DietStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: DietStore + ?Sized> DietReconciler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Persist a session as a new diet for a patient
    pub async fn create_diet(
        &self,
        patient_id: PatientId,
        name: &str,
        objective: &str,
        session: &Session,
    ) -> PlanResult<Diet> {
        if session.is_empty() {
            return Err(PlanError::EmptyDiet);
        }
        session.validate_quantities()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(PlanError::Validation("Diet name cannot be empty".to_string()));
        }

        let mut progress = WriteProgress::new(None);
        let header = self
            .store
            .insert_diet(patient_id, name, objective.trim(), Local::now().date_naive())
            .await
            .map_err(|e| progress.fail(StoreStep::InsertDiet, e))?;
        progress.wrote(header.id);

        let mut meals = self.meal_rows(header.id, &progress).await?;
        for (slot, entries) in session.iter() {
            if entries.is_empty() {
                continue;
            }
            self.write_slot(header.id, slot, entries, &mut meals, &mut progress).await?;
        }

        tracing::info!(
            diet_id = header.id,
            patient_id,
            entries = session.entry_count(),
            "diet created"
        );
        Ok(Diet::from_summary(header, session.snapshot()))
    }

    /// Replace a stored diet's meals with the session, slot by slot
    ///
    /// Every slot of the session is written, including ones that are now
    /// empty, so items removed since loading do not survive.
    pub async fn update_diet(&self, diet_id: DietId, session: &Session) -> PlanResult<Diet> {
        session.validate_quantities()?;

        let mut progress = WriteProgress::new(Some(diet_id));
        let header = self
            .store
            .get_diet(diet_id)
            .await
            .map_err(|e| progress.fail(StoreStep::ReadDiet, e))?
            .ok_or_else(|| PlanError::diet_not_found(diet_id))?;

        let mut meals = self.meal_rows(diet_id, &progress).await?;
        for (slot, entries) in session.iter() {
            self.write_slot(diet_id, slot, entries, &mut meals, &mut progress).await?;
        }

        tracing::info!(diet_id, entries = session.entry_count(), "diet updated");
        Ok(Diet::from_summary(header, session.snapshot()))
    }

    /// Read a stored diet into a fresh session laid out by `registry`
    ///
    /// Stored slots the registry does not know are skipped.
    pub async fn read_diet(&self, registry: &MealSlotRegistry, diet_id: DietId) -> PlanResult<Diet> {
        let header = self
            .store
            .get_diet(diet_id)
            .await
            .map_err(unavailable(StoreStep::ReadDiet))?
            .ok_or_else(|| PlanError::diet_not_found(diet_id))?;

        let meals = self
            .store
            .list_meals_for_diet(diet_id)
            .await
            .map_err(unavailable(StoreStep::ListMeals))?;

        let mut session = Session::new(registry);
        for meal in meals {
            if !registry.is_valid(&meal.slot_name) {
                tracing::debug!(diet_id, slot = %meal.slot_name, "skipping unknown meal slot");
                continue;
            }
            let items = self
                .store
                .list_meal_items(meal.id)
                .await
                .map_err(unavailable(StoreStep::ReadMealItems { slot: meal.slot_name.clone() }))?;

            let entries = items
                .into_iter()
                .map(|i| SessionEntry {
                    food_id: i.food_id,
                    quantity_grams: i.quantity_grams,
                })
                .collect();
            session.replace_slot(&meal.slot_name, entries);
        }

        Ok(Diet::from_summary(header, session))
    }

    /// Load a stored diet into the context, replacing its session
    ///
    /// A diet of another patient switches the context to that patient and
    /// re-lists their diets; every read happens before the context changes.
    pub async fn load_diet(&self, ctx: &mut EditingContext, diet_id: DietId) -> PlanResult<Diet> {
        let diet = self.read_diet(ctx.registry(), diet_id).await?;

        let other_patient = ctx.patient_id() != Some(diet.patient_id);
        let diets = if other_patient {
            let diets = self
                .store
                .list_diets_for_patient(diet.patient_id)
                .await
                .map_err(unavailable(StoreStep::ListDiets))?;
            Some(diets)
        } else {
            None
        };

        ctx.mark_loaded(diet.summary(), diet.meals.snapshot());
        if let Some(diets) = diets {
            ctx.set_diets(diets);
        }
        tracing::info!(diet_id, entries = diet.meals.entry_count(), "diet loaded");
        Ok(diet)
    }

    /// Delete a diet once `confirm` agrees; declining makes no store call
    pub async fn delete_diet<F>(&self, ctx: &mut EditingContext, diet_id: DietId, confirm: F) -> PlanResult<bool>
    where
        F: FnOnce(DietId) -> bool,
    {
        if !confirm(diet_id) {
            return Ok(false);
        }

        let deleted = self
            .store
            .delete_diet(diet_id)
            .await
            .map_err(unavailable(StoreStep::DeleteDiet))?;
        if !deleted {
            return Err(PlanError::diet_not_found(diet_id));
        }

        ctx.forget_diet(diet_id);
        tracing::info!(diet_id, "diet deleted");
        Ok(true)
    }

    /// Save the context's session as a new diet of its patient
    pub async fn save_as_new(&self, ctx: &mut EditingContext, name: &str, objective: &str) -> PlanResult<Diet> {
        let patient_id = ctx
            .patient_id()
            .ok_or_else(|| PlanError::Validation("No patient selected".to_string()))?;

        match self.create_diet(patient_id, name, objective, ctx.session()).await {
            Ok(diet) => {
                ctx.mark_saved(diet.summary());
                Ok(diet)
            }
            Err(err) => {
                // The header exists; later saves must go to it, not create another
                if let PlanError::PartialWriteFailure { diet_id, .. } = &err {
                    ctx.mark_partially_saved(DietSummary {
                        id: *diet_id,
                        patient_id,
                        name: name.trim().to_string(),
                        objective: objective.trim().to_string(),
                        created_at: Local::now().date_naive(),
                    });
                }
                Err(err)
            }
        }
    }

    /// Save the context's session over the diet it was loaded from
    pub async fn save(&self, ctx: &mut EditingContext) -> PlanResult<Diet> {
        let diet_id = ctx
            .current_diet()
            .map(|d| d.id)
            .ok_or_else(|| PlanError::Validation("No diet loaded; save it as a new diet".to_string()))?;

        let diet = self.update_diet(diet_id, ctx.session()).await?;
        ctx.mark_saved(diet.summary());
        Ok(diet)
    }

    /// Re-read the selected patient's diets into the context
    pub async fn refresh_diets<'c>(&self, ctx: &'c mut EditingContext) -> PlanResult<&'c [DietSummary]> {
        let patient_id = ctx
            .patient_id()
            .ok_or_else(|| PlanError::Validation("No patient selected".to_string()))?;

        let diets = self
            .store
            .list_diets_for_patient(patient_id)
            .await
            .map_err(unavailable(StoreStep::ListDiets))?;
        ctx.set_diets(diets);
        Ok(ctx.diets())
    }

    async fn meal_rows(
        &self,
        diet_id: DietId,
        progress: &WriteProgress,
    ) -> PlanResult<HashMap<String, MealRecord>> {
        let meals = self
            .store
            .list_meals_for_diet(diet_id)
            .await
            .map_err(|e| progress.fail(StoreStep::ListMeals, e))?;

        Ok(meals.into_iter().map(|m| (m.slot_name.clone(), m)).collect())
    }

    async fn write_slot(
        &self,
        diet_id: DietId,
        slot: &str,
        entries: &[SessionEntry],
        meals: &mut HashMap<String, MealRecord>,
        progress: &mut WriteProgress,
    ) -> PlanResult<()> {
        let existing = meals.get(slot).map(|m| m.id);
        let meal_id = match existing {
            Some(meal_id) => {
                self.store
                    .delete_meal_items(meal_id)
                    .await
                    .map_err(|e| progress.fail(StoreStep::DeleteMealItems { slot: slot.to_string() }, e))?;
                progress.wrote(diet_id);
                meal_id
            }
            None => {
                let meal = self
                    .store
                    .insert_meal(diet_id, slot)
                    .await
                    .map_err(|e| progress.fail(StoreStep::InsertMeal { slot: slot.to_string() }, e))?;
                progress.wrote(diet_id);
                let meal_id = meal.id;
                meals.insert(slot.to_string(), meal);
                meal_id
            }
        };

        if !entries.is_empty() {
            self.store
                .insert_meal_items(meal_id, &to_items(entries))
                .await
                .map_err(|e| progress.fail(StoreStep::InsertMealItems { slot: slot.to_string() }, e))?;
            progress.wrote(diet_id);
        }

        tracing::debug!(diet_id, slot, items = entries.len(), "meal written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diet::{MemoryStore, StoreOp};
    use crate::models::{FoodId, FoodItem, Nutrients, CALORIES};
    use crate::nutrition::{FoodCatalog, MergeDecision};

    fn catalog() -> FoodCatalog {
        FoodCatalog::from_items((1..=4).map(|id| FoodItem {
            id,
            name: format!("Food {}", id),
            nutrients: Nutrients::new().with(CALORIES, 100.0),
            default_quantity_grams: 100.0,
            created_at: String::new(),
        }))
    }

    fn add(ctx: &mut EditingContext, catalog: &FoodCatalog, slot: &str, id: FoodId, grams: f64) {
        ctx.add_entry(catalog, slot, id, grams, |_| MergeDecision::Merge).unwrap();
    }

    fn context(catalog: &FoodCatalog) -> EditingContext {
        let mut ctx = EditingContext::new(MealSlotRegistry::default());
        ctx.select_patient(1);
        add(&mut ctx, catalog, "Breakfast", 1, 60.0);
        add(&mut ctx, catalog, "Lunch", 2, 150.0);
        add(&mut ctx, catalog, "Lunch", 3, 200.0);
        ctx
    }

    fn sorted(entries: &[SessionEntry]) -> Vec<(FoodId, u64)> {
        let mut v: Vec<(FoodId, u64)> = entries.iter().map(|e| (e.food_id, e.quantity_grams.to_bits())).collect();
        v.sort();
        v
    }

    fn same_content(a: &Session, b: &Session) {
        for (slot, entries) in a.iter() {
            assert_eq!(sorted(entries), sorted(b.entries(slot).unwrap()), "slot {}", slot);
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let mut ctx = context(&catalog);
        let reconciler = DietReconciler::new(&store);

        let diet = reconciler.save_as_new(&mut ctx, "Weight loss", "lose 5kg").await.unwrap();
        assert!(!ctx.is_dirty());
        assert_eq!(ctx.current_diet().map(|d| d.id), Some(diet.id));

        let original = ctx.session().snapshot();
        reconciler.update_diet(diet.id, &original).await.unwrap();

        let loaded = reconciler.load_diet(&mut ctx, diet.id).await.unwrap();
        same_content(&original, &loaded.meals);
        same_content(&loaded.meals, &original);
        assert_eq!(loaded.name, "Weight loss");
    }

    #[tokio::test]
    async fn test_create_empty_makes_no_store_calls() {
        let store = MemoryStore::new();
        let mut ctx = EditingContext::new(MealSlotRegistry::default());
        ctx.select_patient(1);
        let reconciler = DietReconciler::new(&store);

        let err = reconciler.save_as_new(&mut ctx, "Empty", "").await.unwrap_err();
        assert!(matches!(err, PlanError::EmptyDiet));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let mut ctx = context(&catalog);

        let err = DietReconciler::new(&store).save_as_new(&mut ctx, "  ", "").await.unwrap_err();
        assert!(matches!(err, PlanError::Validation(_)));
        assert!(store.calls().is_empty());
        assert!(ctx.is_dirty());
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let ctx = context(&catalog);
        let reconciler = DietReconciler::new(&store);

        let diet = reconciler.create_diet(1, "Plan", "", ctx.session()).await.unwrap();
        reconciler.update_diet(diet.id, ctx.session()).await.unwrap();
        let meals_after_first = store.meal_count();
        let items_after_first = store.item_count();

        reconciler.update_diet(diet.id, ctx.session()).await.unwrap();
        assert_eq!(store.meal_count(), meals_after_first);
        assert_eq!(store.item_count(), items_after_first);
        assert_eq!(store.item_count(), 3);
    }

    #[tokio::test]
    async fn test_update_clears_emptied_slots() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let mut ctx = context(&catalog);
        let reconciler = DietReconciler::new(&store);

        reconciler.save_as_new(&mut ctx, "Plan", "").await.unwrap();
        ctx.remove_entry("Breakfast", 0).unwrap();
        assert!(ctx.is_dirty());

        let diet = reconciler.save(&mut ctx).await.unwrap();
        assert!(!ctx.is_dirty());

        let loaded = reconciler.read_diet(ctx.registry(), diet.id).await.unwrap();
        assert!(loaded.meals.entries("Breakfast").unwrap().is_empty());
        assert_eq!(loaded.meals.entries("Lunch").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_unknown_diet_is_not_found() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let ctx = context(&catalog);

        let err = DietReconciler::new(&store).update_diet(42, ctx.session()).await.unwrap_err();
        assert!(matches!(err, PlanError::NotFound { kind: "Diet", id: 42 }));
        assert!(store.write_log().is_empty());
    }

    #[tokio::test]
    async fn test_failure_before_any_write_is_unavailable() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let mut ctx = context(&catalog);
        store.fail_on(StoreOp::InsertDiet, 0);

        let err = DietReconciler::new(&store).save_as_new(&mut ctx, "Plan", "").await.unwrap_err();
        assert!(matches!(err, PlanError::StorageUnavailable { step: StoreStep::InsertDiet, .. }));
        assert!(ctx.is_dirty());
        assert!(ctx.current_diet().is_none());
    }

    #[tokio::test]
    async fn test_partial_write_names_the_step() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let mut ctx = context(&catalog);
        // Breakfast items go in, Lunch items fail
        store.fail_on(StoreOp::InsertMealItems, 1);

        let err = DietReconciler::new(&store).save_as_new(&mut ctx, "Plan", "").await.unwrap_err();
        match err {
            PlanError::PartialWriteFailure { step, .. } => {
                assert_eq!(step, StoreStep::InsertMealItems { slot: "Lunch".to_string() });
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ctx.is_dirty());
        assert!(ctx.current_diet().is_none());
        // No rollback: the header and the Breakfast meal remain
        assert_eq!(store.meal_count(), 2);
        assert_eq!(store.item_count(), 1);
    }

    #[tokio::test]
    async fn test_save_retry_after_partial_failure_converges() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let mut ctx = context(&catalog);
        let reconciler = DietReconciler::new(&store);

        let diet = reconciler.save_as_new(&mut ctx, "Plan", "").await.unwrap();
        add(&mut ctx, &catalog, "Dinner", 4, 90.0);

        store.fail_on(StoreOp::InsertMealItems, 1);
        let err = reconciler.save(&mut ctx).await.unwrap_err();
        assert!(matches!(err, PlanError::PartialWriteFailure { diet_id, .. } if diet_id == diet.id));
        assert!(ctx.is_dirty());

        store.heal();
        reconciler.save(&mut ctx).await.unwrap();
        let loaded = reconciler.read_diet(ctx.registry(), diet.id).await.unwrap();
        same_content(ctx.session(), &loaded.meals);
    }

    #[tokio::test]
    async fn test_partial_create_is_finished_by_save() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let mut ctx = context(&catalog);
        add(&mut ctx, &catalog, "Dinner", 4, 90.0);
        let reconciler = DietReconciler::new(&store);

        store.fail_on(StoreOp::InsertMeal, 1);
        let err = reconciler.save_as_new(&mut ctx, "Plan", "").await.unwrap_err();
        let PlanError::PartialWriteFailure { diet_id, .. } = err else {
            panic!("expected a partial write, got {:?}", err);
        };
        assert_eq!(ctx.current_diet().map(|d| d.id), Some(diet_id));
        assert!(ctx.is_dirty());

        store.heal();
        let saved = reconciler.save(&mut ctx).await.unwrap();
        assert_eq!(saved.id, diet_id);
        assert_eq!(ctx.diets().len(), 1);
        let loaded = reconciler.read_diet(ctx.registry(), diet_id).await.unwrap();
        same_content(ctx.session(), &loaded.meals);
    }

    #[tokio::test]
    async fn test_loading_another_patients_diet_relists_diets() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let reconciler = DietReconciler::new(&store);

        let mut other = EditingContext::new(MealSlotRegistry::default());
        other.select_patient(2);
        add(&mut other, &catalog, "Supper", 4, 40.0);
        let theirs = reconciler.save_as_new(&mut other, "Theirs", "").await.unwrap();

        let mut ctx = context(&catalog);
        let mine = reconciler.save_as_new(&mut ctx, "Mine", "").await.unwrap();
        assert_eq!(ctx.diets().len(), 1);

        reconciler.load_diet(&mut ctx, theirs.id).await.unwrap();
        assert_eq!(ctx.patient_id(), Some(2));
        let listed: Vec<_> = ctx.diets().iter().map(|d| (d.id, d.patient_id)).collect();
        assert_eq!(listed, vec![(theirs.id, 2)]);

        // Same patient again: the cached list is kept as is
        let calls = store.calls().len();
        reconciler.load_diet(&mut ctx, theirs.id).await.unwrap();
        assert!(!store.calls()[calls..].contains(&StoreOp::ListDiets));
        assert!(ctx.diets().iter().all(|d| d.id != mine.id));
    }

    #[tokio::test]
    async fn test_failed_patient_switch_leaves_context_alone() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let reconciler = DietReconciler::new(&store);

        let mut other = EditingContext::new(MealSlotRegistry::default());
        other.select_patient(2);
        add(&mut other, &catalog, "Supper", 4, 40.0);
        let theirs = reconciler.save_as_new(&mut other, "Theirs", "").await.unwrap();

        let mut ctx = context(&catalog);
        let mine = reconciler.save_as_new(&mut ctx, "Mine", "").await.unwrap();

        store.fail_on(StoreOp::ListDiets, 0);
        let err = reconciler.load_diet(&mut ctx, theirs.id).await.unwrap_err();
        assert!(matches!(err, PlanError::StorageUnavailable { .. }));
        assert_eq!(ctx.patient_id(), Some(1));
        assert_eq!(ctx.current_diet().map(|d| d.id), Some(mine.id));
        assert_eq!(ctx.diets().len(), 1);
    }

    #[tokio::test]
    async fn test_load_drops_unknown_slots() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let wide = context(&catalog);
        let reconciler = DietReconciler::new(&store);
        let diet = reconciler.create_diet(1, "Plan", "", wide.session()).await.unwrap();

        let mut narrow = EditingContext::new(MealSlotRegistry::new(["Lunch", "Dinner"]).unwrap());
        let loaded = reconciler.load_diet(&mut narrow, diet.id).await.unwrap();
        assert_eq!(loaded.meals.slot_names().collect::<Vec<_>>(), vec!["Lunch", "Dinner"]);
        assert_eq!(narrow.session().entries("Lunch").unwrap().len(), 2);
        assert!(!narrow.is_dirty());
        assert_eq!(narrow.patient_id(), Some(1));
    }

    #[tokio::test]
    async fn test_delete_declined_makes_no_call() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let mut ctx = context(&catalog);
        let reconciler = DietReconciler::new(&store);
        let diet = reconciler.save_as_new(&mut ctx, "Plan", "").await.unwrap();
        let calls = store.calls().len();

        assert!(!reconciler.delete_diet(&mut ctx, diet.id, |_| false).await.unwrap());
        assert_eq!(store.calls().len(), calls);
        assert_eq!(ctx.diets().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_purges_cache_and_current() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let mut ctx = context(&catalog);
        let reconciler = DietReconciler::new(&store);
        let diet = reconciler.save_as_new(&mut ctx, "Plan", "").await.unwrap();
        reconciler.refresh_diets(&mut ctx).await.unwrap();
        assert_eq!(ctx.diets().len(), 1);

        assert!(reconciler.delete_diet(&mut ctx, diet.id, |id| id == diet.id).await.unwrap());
        assert!(ctx.diets().is_empty());
        assert!(ctx.current_diet().is_none());
        assert_eq!(store.meal_count(), 0);

        let err = reconciler.delete_diet(&mut ctx, diet.id, |_| true).await.unwrap_err();
        assert!(matches!(err, PlanError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_save_without_loaded_diet_is_rejected() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let mut ctx = context(&catalog);

        let err = DietReconciler::new(&store).save(&mut ctx).await.unwrap_err();
        assert!(matches!(err, PlanError::Validation(_)));
        assert!(store.calls().is_empty());
    }
}
