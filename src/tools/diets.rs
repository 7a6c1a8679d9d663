//! Session and diet MCP tools
//!
//! Every session response carries the whole day laid out by slot, with
//! rounded per-entry and per-slot totals and the current alerts.

use chrono::NaiveDate;
use serde::Serialize;

use crate::diet::{DietReconciler, DietStore, EditingContext};
use crate::models::{Diet, DietId, DietSummary, FoodId, Nutrients, PatientId};
use crate::nutrition::{
    aggregate_entry, aggregate_session, aggregate_slot, evaluate_alerts, AddOutcome, MergeDecision,
    SessionEntry,
};
use super::{plan_error, Workspace};

#[derive(Debug, Serialize)]
pub struct EntryView {
    pub index: usize,
    pub food_id: FoodId,
    pub food_name: String,
    pub quantity_grams: f64,
    pub nutrients: Nutrients,
}

#[derive(Debug, Serialize)]
pub struct SlotView {
    pub slot: String,
    pub entries: Vec<EntryView>,
    pub totals: Nutrients,
}

#[derive(Debug, Serialize)]
pub struct AlertView {
    #[serde(flatten)]
    pub alert: crate::nutrition::NutritionAlert,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub patient_id: Option<PatientId>,
    pub current_diet: Option<DietSummary>,
    pub dirty: bool,
    pub meals: Vec<SlotView>,
    pub totals: Nutrients,
    pub alerts: Vec<AlertView>,
}

impl SessionView {
    pub fn build(ws: &Workspace) -> Self {
        let ctx = &ws.context;
        let catalog = &ws.catalog;
        let precision = ws.config.precision;
        let session = ctx.session();

        let meals = session
            .iter()
            .map(|(slot, entries)| {
                let totals = aggregate_slot(session, catalog, slot).unwrap_or_else(|_| Nutrients::zero());
                SlotView {
                    slot: slot.to_string(),
                    entries: entries
                        .iter()
                        .enumerate()
                        .map(|(index, entry)| EntryView {
                            index,
                            food_id: entry.food_id,
                            food_name: catalog
                                .lookup(entry.food_id)
                                .map(|f| f.name.clone())
                                .unwrap_or_else(|| format!("Unknown food {}", entry.food_id)),
                            quantity_grams: entry.quantity_grams,
                            nutrients: precision.round_all(&aggregate_entry(catalog, entry)),
                        })
                        .collect(),
                    totals: precision.round_all(&totals),
                }
            })
            .collect();

        let totals = aggregate_session(session, catalog);
        let alerts = evaluate_alerts(&totals, session, &ws.config.thresholds)
            .into_iter()
            .map(|alert| AlertView {
                message: alert.message(),
                alert,
            })
            .collect();

        Self {
            patient_id: ctx.patient_id(),
            current_diet: ctx.current_diet().cloned(),
            dirty: ctx.is_dirty(),
            meals,
            totals: precision.round_all(&totals),
            alerts,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AddEntryResponse {
    pub outcome: AddOutcome,
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
pub struct RemoveEntryResponse {
    pub removed: SessionEntry,
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
pub struct SaveDietResponse {
    pub diet_id: DietId,
    pub name: String,
    pub created_at: NaiveDate,
    pub entries: usize,
}

impl From<&Diet> for SaveDietResponse {
    fn from(diet: &Diet) -> Self {
        Self {
            diet_id: diet.id,
            name: diet.name.clone(),
            created_at: diet.created_at,
            entries: diet.meals.entry_count(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListDietsResponse {
    pub patient_id: PatientId,
    pub diets: Vec<DietSummary>,
}

#[derive(Debug, Serialize)]
pub struct DeleteDietResponse {
    pub deleted: bool,
    pub diet_id: DietId,
    pub message: String,
}

/// Add a food to a slot. `quantity_grams` defaults to the food's usual portion;
/// adding a food already in the slot sums quantities unless `merge_duplicates` is false.
pub fn add_session_entry(
    ws: &mut Workspace,
    slot: &str,
    food_id: FoodId,
    quantity_grams: Option<f64>,
    merge_duplicates: bool,
) -> Result<AddEntryResponse, String> {
    let quantity = match quantity_grams {
        Some(q) => q,
        None => ws.catalog.get(food_id).map_err(plan_error)?.default_quantity_grams,
    };
    let decision = if merge_duplicates {
        MergeDecision::Merge
    } else {
        MergeDecision::Keep
    };

    let outcome = ws
        .context
        .add_entry(&ws.catalog, slot, food_id, quantity, |_| decision)
        .map_err(plan_error)?;

    Ok(AddEntryResponse {
        outcome,
        session: SessionView::build(ws),
    })
}

pub fn remove_session_entry(ws: &mut Workspace, slot: &str, index: usize) -> Result<RemoveEntryResponse, String> {
    let removed = ws.context.remove_entry(slot, index).map_err(plan_error)?;
    Ok(RemoveEntryResponse {
        removed,
        session: SessionView::build(ws),
    })
}

pub fn clear_session(ws: &mut Workspace) -> SessionView {
    ws.context.clear_all();
    SessionView::build(ws)
}

pub fn get_session(ws: &Workspace) -> SessionView {
    SessionView::build(ws)
}

pub async fn save_diet_as_new<S: DietStore + ?Sized>(
    store: &S,
    ws: &mut Workspace,
    name: &str,
    objective: Option<&str>,
) -> Result<SaveDietResponse, String> {
    let diet = DietReconciler::new(store)
        .save_as_new(&mut ws.context, name, objective.unwrap_or(""))
        .await
        .map_err(plan_error)?;
    Ok(SaveDietResponse::from(&diet))
}

pub async fn save_diet<S: DietStore + ?Sized>(store: &S, ws: &mut Workspace) -> Result<SaveDietResponse, String> {
    let diet = DietReconciler::new(store)
        .save(&mut ws.context)
        .await
        .map_err(plan_error)?;
    Ok(SaveDietResponse::from(&diet))
}

/// Replace the session with a stored diet; refuses to drop unsaved work unless told to
pub async fn load_diet<S: DietStore + ?Sized>(
    store: &S,
    ws: &mut Workspace,
    diet_id: DietId,
    discard_unsaved: bool,
) -> Result<SessionView, String> {
    if ws.context.is_dirty() && !discard_unsaved {
        return Err("The current diet has unsaved changes. Save it or pass discard_unsaved=true".to_string());
    }

    DietReconciler::new(store)
        .load_diet(&mut ws.context, diet_id)
        .await
        .map_err(plan_error)?;
    Ok(SessionView::build(ws))
}

pub async fn list_diets<S: DietStore + ?Sized>(store: &S, ctx: &mut EditingContext) -> Result<ListDietsResponse, String> {
    let diets = DietReconciler::new(store)
        .refresh_diets(ctx)
        .await
        .map_err(plan_error)?
        .to_vec();

    Ok(ListDietsResponse {
        patient_id: ctx.patient_id().unwrap_or_default(),
        diets,
    })
}

/// Delete a stored diet; `confirm` must be true for anything to happen
pub async fn delete_diet<S: DietStore + ?Sized>(
    store: &S,
    ctx: &mut EditingContext,
    diet_id: DietId,
    confirm: bool,
) -> Result<DeleteDietResponse, String> {
    let deleted = DietReconciler::new(store)
        .delete_diet(ctx, diet_id, |_| confirm)
        .await
        .map_err(plan_error)?;

    let message = if deleted {
        format!("Diet {} deleted", diet_id)
    } else {
        "Deletion not confirmed; nothing was changed".to_string()
    };

    Ok(DeleteDietResponse {
        deleted,
        diet_id,
        message,
    })
}
