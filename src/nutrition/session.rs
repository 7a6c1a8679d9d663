//! Session model
//!
//! The editable working set of (food, grams) entries per meal slot. Every
//! mutation validates first, so a rejected call leaves the session untouched.

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::models::FoodId;
use super::{FoodCatalog, MealSlotRegistry};

/// One planned food in a slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub food_id: FoodId,
    pub quantity_grams: f64,
}

/// Entries of a single slot, in insertion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealSlotEntries {
    pub slot: String,
    pub entries: Vec<SessionEntry>,
}

/// What the caller is asked when a food is added twice to the same slot
#[derive(Debug)]
pub struct DuplicateEntry<'a> {
    pub slot: &'a str,
    pub existing: &'a SessionEntry,
    pub added_grams: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// Sum the quantities into the existing entry
    Merge,
    /// Leave the existing entry as it is and drop the new one
    Keep,
}

/// Result of a successful `add_entry`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AddOutcome {
    Appended { index: usize },
    Merged { index: usize, quantity_grams: f64 },
    Declined { index: usize },
}

impl AddOutcome {
    /// Whether the session was modified
    pub fn changed(&self) -> bool {
        !matches!(self, AddOutcome::Declined { .. })
    }
}

/// Meal slot -> entries, one list per registered slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    meals: Vec<MealSlotEntries>,
}

impl Session {
    /// An empty list for every slot of the registry
    pub fn new(registry: &MealSlotRegistry) -> Self {
        Self {
            meals: registry
                .slots()
                .iter()
                .map(|slot| MealSlotEntries {
                    slot: slot.clone(),
                    entries: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.meals.iter().map(|m| m.slot.as_str())
    }

    pub fn has_slot(&self, slot: &str) -> bool {
        self.meals.iter().any(|m| m.slot == slot)
    }

    /// (slot, entries) pairs in slot order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[SessionEntry])> {
        self.meals.iter().map(|m| (m.slot.as_str(), m.entries.as_slice()))
    }

    pub fn entries(&self, slot: &str) -> PlanResult<&[SessionEntry]> {
        self.meals
            .iter()
            .find(|m| m.slot == slot)
            .map(|m| m.entries.as_slice())
            .ok_or_else(|| PlanError::InvalidSlot(slot.to_string()))
    }

    fn slot_mut(&mut self, slot: &str) -> PlanResult<&mut Vec<SessionEntry>> {
        self.meals
            .iter_mut()
            .find(|m| m.slot == slot)
            .map(|m| &mut m.entries)
            .ok_or_else(|| PlanError::InvalidSlot(slot.to_string()))
    }

    /// Add grams of a food to a slot
    ///
    /// A food already present in the slot is never duplicated silently:
    /// `decide` chooses between summing the quantities and keeping the
    /// existing entry unchanged.
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
        if !self.has_slot(slot) {
            return Err(PlanError::InvalidSlot(slot.to_string()));
        }
        if !catalog.contains(food_id) {
            return Err(PlanError::InvalidFood(food_id));
        }
        if !quantity_grams.is_finite() || quantity_grams <= 0.0 {
            return Err(PlanError::InvalidQuantity {
                slot: slot.to_string(),
                quantity: quantity_grams,
            });
        }

        let entries = self.slot_mut(slot)?;

        if let Some(index) = entries.iter().position(|e| e.food_id == food_id) {
            let decision = decide(&DuplicateEntry {
                slot,
                existing: &entries[index],
                added_grams: quantity_grams,
            });
            return Ok(match decision {
                MergeDecision::Merge => {
                    entries[index].quantity_grams += quantity_grams;
                    AddOutcome::Merged {
                        index,
                        quantity_grams: entries[index].quantity_grams,
                    }
                }
                MergeDecision::Keep => AddOutcome::Declined { index },
            });
        }

        entries.push(SessionEntry { food_id, quantity_grams });
        Ok(AddOutcome::Appended { index: entries.len() - 1 })
    }

    /// Remove the entry at `index`, keeping the order of the rest
    pub fn remove_entry(&mut self, slot: &str, index: usize) -> PlanResult<SessionEntry> {
        let entries = self.slot_mut(slot)?;
        if index >= entries.len() {
            return Err(PlanError::IndexOutOfRange {
                slot: slot.to_string(),
                index,
                len: entries.len(),
            });
        }
        Ok(entries.remove(index))
    }

    pub fn clear_all(&mut self) {
        for meal in &mut self.meals {
            meal.entries.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.meals.iter().all(|m| m.entries.is_empty())
    }

    pub fn entry_count(&self) -> usize {
        self.meals.iter().map(|m| m.entries.len()).sum()
    }

    /// Deep, independent copy
    pub fn snapshot(&self) -> Session {
        self.clone()
    }

    /// Every quantity must be positive; names the first offending slot
    pub fn validate_quantities(&self) -> PlanResult<()> {
        for (slot, entries) in self.iter() {
            if let Some(bad) = entries
                .iter()
                .find(|e| !e.quantity_grams.is_finite() || e.quantity_grams <= 0.0)
            {
                return Err(PlanError::InvalidQuantity {
                    slot: slot.to_string(),
                    quantity: bad.quantity_grams,
                });
            }
        }
        Ok(())
    }

    /// Overwrite a slot's list when rebuilding from storage.
    /// Returns false for a slot this session does not know.
    pub(crate) fn replace_slot(&mut self, slot: &str, entries: Vec<SessionEntry>) -> bool {
        match self.slot_mut(slot) {
            Ok(list) => {
                *list = entries;
                true
            }
            Err(_) => false,
        }
    }
}
