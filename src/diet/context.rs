//! Editing context
//!
//! Owns the working session for one user together with the patient being
//! edited, the diet the session came from and whether it has unsaved changes.

use crate::error::PlanResult;
use crate::models::{DietId, DietSummary, FoodId, PatientId};
use crate::nutrition::{
    AddOutcome, DuplicateEntry, FoodCatalog, MealSlotRegistry, MergeDecision, Session, SessionEntry,
};

#[derive(Debug, Clone)]
pub struct EditingContext {
    registry: MealSlotRegistry,
    session: Session,
    dirty: bool,
    patient_id: Option<PatientId>,
    current_diet: Option<DietSummary>,
    diets: Vec<DietSummary>,
}

impl EditingContext {
    pub fn new(registry: MealSlotRegistry) -> Self {
        let session = Session::new(&registry);
        Self {
            registry,
            session,
            dirty: false,
            patient_id: None,
            current_diet: None,
            diets: Vec::new(),
        }
    }

    pub fn registry(&self) -> &MealSlotRegistry {
        &self.registry
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// True when the session differs from what was last saved or loaded
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn patient_id(&self) -> Option<PatientId> {
        self.patient_id
    }

    pub fn current_diet(&self) -> Option<&DietSummary> {
        self.current_diet.as_ref()
    }

    /// Diets of the selected patient as last listed
    pub fn diets(&self) -> &[DietSummary] {
        &self.diets
    }

    pub fn add_entry<F>(
        &mut self,
        catalog: &FoodCatalog,
        slot: &str,
        food_id: FoodId,
        quantity_grams: f64,
        decide: F,
    ) -> PlanResult<AddOutcome>
    where
        F: FnOnce(&DuplicateEntry<'_>) -> MergeDecision,
    {
        let outcome = self.session.add_entry(catalog, slot, food_id, quantity_grams, decide)?;
        if outcome.changed() {
            self.dirty = true;
        }
        Ok(outcome)
    }

    pub fn remove_entry(&mut self, slot: &str, index: usize) -> PlanResult<SessionEntry> {
        let removed = self.session.remove_entry(slot, index)?;
        self.dirty = true;
        Ok(removed)
    }

    pub fn clear_all(&mut self) {
        if !self.session.is_empty() {
            self.session.clear_all();
            self.dirty = true;
        }
    }

    /// Switch to another patient; the session starts over empty
    pub fn select_patient(&mut self, patient_id: PatientId) {
        self.patient_id = Some(patient_id);
        self.diets.clear();
        self.discard_changes();
    }

    /// Drop the working session and start a new, unsaved one
    pub fn discard_changes(&mut self) {
        self.session = Session::new(&self.registry);
        self.current_diet = None;
        self.dirty = false;
    }

    pub(crate) fn mark_saved(&mut self, diet: DietSummary) {
        match self.diets.iter_mut().find(|d| d.id == diet.id) {
            Some(existing) => *existing = diet.clone(),
            None => self.diets.insert(0, diet.clone()),
        }
        self.current_diet = Some(diet);
        self.dirty = false;
    }

    /// A new diet whose header was written but whose meals were not all saved
    pub(crate) fn mark_partially_saved(&mut self, diet: DietSummary) {
        if !self.diets.iter().any(|d| d.id == diet.id) {
            self.diets.insert(0, diet.clone());
        }
        self.current_diet = Some(diet);
    }

    pub(crate) fn mark_loaded(&mut self, diet: DietSummary, session: Session) {
        if self.patient_id != Some(diet.patient_id) {
            self.diets.clear();
            self.patient_id = Some(diet.patient_id);
        }
        self.session = session;
        self.current_diet = Some(diet);
        self.dirty = false;
    }

    pub(crate) fn set_diets(&mut self, diets: Vec<DietSummary>) {
        self.diets = diets;
    }

    /// Purge a deleted diet; the session stays but is no longer tied to it
    pub(crate) fn forget_diet(&mut self, diet_id: DietId) {
        self.diets.retain(|d| d.id != diet_id);
        if self.current_diet.as_ref().map(|d| d.id) == Some(diet_id) {
            self.current_diet = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FoodItem, Nutrients, CALORIES};

    fn catalog() -> FoodCatalog {
        FoodCatalog::from_items([FoodItem {
            id: 1,
            name: "Apple".to_string(),
            nutrients: Nutrients::new().with(CALORIES, 52.0),
            default_quantity_grams: 100.0,
            created_at: String::new(),
        }])
    }

    #[test]
    fn test_dirty_follows_real_changes() {
        let catalog = catalog();
        let mut ctx = EditingContext::new(MealSlotRegistry::default());
        assert!(!ctx.is_dirty());

        ctx.clear_all();
        assert!(!ctx.is_dirty());

        assert!(ctx.add_entry(&catalog, "Brunch", 1, 10.0, |_| MergeDecision::Merge).is_err());
        assert!(!ctx.is_dirty());

        ctx.add_entry(&catalog, "Lunch", 1, 100.0, |_| MergeDecision::Merge).unwrap();
        assert!(ctx.is_dirty());
    }

    #[test]
    fn test_declined_merge_does_not_dirty() {
        let catalog = catalog();
        let mut ctx = EditingContext::new(MealSlotRegistry::default());
        ctx.add_entry(&catalog, "Lunch", 1, 100.0, |_| MergeDecision::Merge).unwrap();
        ctx.mark_saved(DietSummary {
            id: 5,
            patient_id: 1,
            name: "Plan".to_string(),
            objective: String::new(),
            created_at: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        });
        assert!(!ctx.is_dirty());

        ctx.add_entry(&catalog, "Lunch", 1, 30.0, |_| MergeDecision::Keep).unwrap();
        assert!(!ctx.is_dirty());
    }

    fn summary(id: DietId, patient_id: PatientId) -> DietSummary {
        DietSummary {
            id,
            patient_id,
            name: format!("Diet {}", id),
            objective: String::new(),
            created_at: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        }
    }

    #[test]
    fn test_loading_for_another_patient_drops_cached_diets() {
        let mut ctx = EditingContext::new(MealSlotRegistry::default());
        ctx.select_patient(1);
        ctx.mark_saved(summary(3, 1));
        assert_eq!(ctx.diets().len(), 1);

        ctx.mark_loaded(summary(3, 1), Session::new(&MealSlotRegistry::default()));
        assert_eq!(ctx.diets().len(), 1);

        ctx.mark_loaded(summary(8, 2), Session::new(&MealSlotRegistry::default()));
        assert_eq!(ctx.patient_id(), Some(2));
        assert!(ctx.diets().is_empty());

        ctx.forget_diet(3);
        assert_eq!(ctx.current_diet().map(|d| d.id), Some(8));
    }

    #[test]
    fn test_select_patient_resets_session() {
        let catalog = catalog();
        let mut ctx = EditingContext::new(MealSlotRegistry::default());
        ctx.add_entry(&catalog, "Dinner", 1, 80.0, |_| MergeDecision::Merge).unwrap();

        ctx.select_patient(3);
        assert_eq!(ctx.patient_id(), Some(3));
        assert!(ctx.session().is_empty());
        assert!(!ctx.is_dirty());
        assert!(ctx.current_diet().is_none());
    }
}
