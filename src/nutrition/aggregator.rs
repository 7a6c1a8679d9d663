//! Nutrient aggregation
//!
//! Scales each entry's per-100g profile by its grams and sums key by key.
//! Pure functions of (session, catalog): iteration follows slot order, then
//! insertion order, then key order, so repeated runs are bit-identical.
//! No rounding happens here; see `display` for presentation.

use crate::error::PlanResult;
use crate::models::Nutrients;
use super::{FoodCatalog, Session, SessionEntry};

/// Contribution of a single entry; zero for a food missing from the catalog
pub fn aggregate_entry(catalog: &FoodCatalog, entry: &SessionEntry) -> Nutrients {
    let mut totals = Nutrients::zero();
    add_entry(&mut totals, catalog, entry);
    totals
}

fn add_entry(totals: &mut Nutrients, catalog: &FoodCatalog, entry: &SessionEntry) {
    match catalog.lookup(entry.food_id) {
        Some(food) => totals.accumulate_scaled(&food.nutrients, entry.quantity_grams / 100.0),
        None => {
            tracing::warn!(
                food_id = entry.food_id,
                quantity_grams = entry.quantity_grams,
                "session references a food missing from the catalog; counting it as zero"
            );
        }
    }
}

/// Totals for one slot; an empty slot yields the zero map
pub fn aggregate_slot(session: &Session, catalog: &FoodCatalog, slot: &str) -> PlanResult<Nutrients> {
    let entries = session.entries(slot)?;
    let mut totals = Nutrients::zero();
    for entry in entries {
        add_entry(&mut totals, catalog, entry);
    }
    Ok(totals)
}

/// Totals for the whole session: the sum of every slot's totals
pub fn aggregate_session(session: &Session, catalog: &FoodCatalog) -> Nutrients {
    let mut totals = Nutrients::zero();
    for (_, entries) in session.iter() {
        let mut slot_totals = Nutrients::zero();
        for entry in entries {
            add_entry(&mut slot_totals, catalog, entry);
        }
        totals.accumulate(&slot_totals);
    }
    totals
}
