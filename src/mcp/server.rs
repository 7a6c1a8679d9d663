//! Nutriplan MCP Server Implementation
//!
//! Exposes the catalog, patient records, the editing session and diet
//! persistence as MCP tools. All session state lives behind one lock, so
//! saves and loads never interleave.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::db::SqliteStore;
use crate::models::{
    AnamnesisRecord, AnthropometryCreate, ConsultationCreate, ConsultationKind, FoodItemCreate, Nutrients,
    PatientCreate,
};
use crate::tools::status::StatusTracker;
use crate::tools::{consultations, diets, foods, patients, reports, Workspace};

/// Nutriplan MCP Service
#[derive(Clone)]
pub struct NutriplanService {
    status_tracker: Arc<StatusTracker>,
    store: SqliteStore,
    workspace: Arc<Mutex<Workspace>>,
    tool_router: ToolRouter<NutriplanService>,
}

impl NutriplanService {
    pub fn new(database_path: PathBuf, store: SqliteStore, workspace: Workspace) -> Self {
        Self {
            status_tracker: Arc::new(StatusTracker::new(database_path)),
            store,
            workspace: Arc::new(Mutex::new(workspace)),
            tool_router: Self::tool_router(),
        }
    }
}

fn to_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, McpError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        McpError::invalid_params(format!("{} must be YYYY-MM-DD, got '{}'", field, value), None)
    })
}

/// Accepts "YYYY-MM-DD HH:MM", with a space or a T, seconds optional
fn parse_datetime(field: &str, value: &str) -> Result<NaiveDateTime, McpError> {
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value.trim(), format).ok())
        .ok_or_else(|| {
            McpError::invalid_params(format!("{} must be YYYY-MM-DD HH:MM, got '{}'", field, value), None)
        })
}

// ============================================================================
// Food Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddFoodParams {
    pub name: String,
    /// Nutrient amounts per 100 g, keyed by nutrient name. `calories` is required.
    pub nutrients: BTreeMap<String, f64>,
    /// Usual portion in grams (defaults to 100)
    pub default_quantity_grams: Option<f64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchFoodsParams {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
}

fn default_search_limit() -> i64 { 20 }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetFoodParams {
    pub id: i64,
}

// ============================================================================
// Patient Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddPatientParams {
    pub name: String,
    /// Birth date (YYYY-MM-DD)
    pub birth_date: Option<String>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SelectPatientParams {
    pub patient_id: i64,
    /// Drop unsaved session changes instead of refusing
    #[serde(default)]
    pub discard_unsaved: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddMeasurementParams {
    pub patient_id: i64,
    /// Consultation the measurement was taken at
    pub consultation_id: Option<i64>,
    /// Measurement date (YYYY-MM-DD)
    pub measured_on: String,
    pub weight_kg: Option<f64>,
    pub height_m: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListMeasurementsParams {
    pub patient_id: i64,
}

// ============================================================================
// Consultation Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddConsultationParams {
    pub patient_id: i64,
    /// Date and time (YYYY-MM-DD HH:MM)
    pub scheduled_at: String,
    /// first_visit, follow_up, assessment or other
    pub kind: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListConsultationsParams {
    pub patient_id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RecordAnamnesisParams {
    pub consultation_id: i64,
    pub clinical_history: Option<String>,
    pub family_history: Option<String>,
    pub allergies: Option<String>,
    pub restrictions: Option<String>,
    pub routine: Option<String>,
    pub water_intake: Option<String>,
    pub sleep: Option<String>,
    pub medications: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetAnamnesisParams {
    pub consultation_id: i64,
}

// ============================================================================
// Session Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddSessionEntryParams {
    /// Meal slot name, exactly as listed by status
    pub slot: String,
    pub food_id: i64,
    /// Grams; the food's default portion when omitted
    pub quantity_grams: Option<f64>,
    /// Sum into an existing entry for the same food (default true)
    #[serde(default = "default_true")]
    pub merge_duplicates: bool,
}

fn default_true() -> bool { true }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RemoveSessionEntryParams {
    pub slot: String,
    /// Position of the entry within the slot, starting at 0
    pub index: usize,
}

// ============================================================================
// Diet Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SaveDietAsNewParams {
    pub name: String,
    pub objective: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LoadDietParams {
    pub diet_id: i64,
    #[serde(default)]
    pub discard_unsaved: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteDietParams {
    pub diet_id: i64,
    /// Must be true for the diet to be deleted
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExportDietReportParams {
    /// File name inside the report directory (defaults to one derived from the diet)
    pub file_name: Option<String>,
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl NutriplanService {
    // --- Status ---

    #[tool(description = "Get the current status of the Nutriplan service including build info, database status, meal slots and the editing session state")]
    async fn status(&self) -> Result<CallToolResult, McpError> {
        let ws = self.workspace.lock().await;
        to_result(&self.status_tracker.get_status(&ws))
    }

    #[tool(description = "Get step-by-step instructions for planning a diet. Call this when starting a planning session or when unsure how to use the tools.")]
    fn diet_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::DIET_INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(DIET_INSTRUCTIONS)]))
    }

    // --- Foods ---

    #[tool(description = "Register a food with nutrients per 100 g. It is usable in the session immediately.")]
    async fn add_food(&self, Parameters(p): Parameters<AddFoodParams>) -> Result<CallToolResult, McpError> {
        let data = FoodItemCreate {
            name: p.name,
            nutrients: p.nutrients.into_iter().collect::<Nutrients>(),
            default_quantity_grams: p.default_quantity_grams,
        };
        let mut ws = self.workspace.lock().await;
        let result = foods::add_food(&self.store, &mut ws, data)
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    #[tool(description = "Search the food catalog by name (case-insensitive substring)")]
    async fn search_foods(&self, Parameters(p): Parameters<SearchFoodsParams>) -> Result<CallToolResult, McpError> {
        let ws = self.workspace.lock().await;
        to_result(&foods::search_foods(&ws, &p.query, p.limit))
    }

    #[tool(description = "Get a food's full nutrient profile per 100 g")]
    async fn get_food(&self, Parameters(p): Parameters<GetFoodParams>) -> Result<CallToolResult, McpError> {
        let ws = self.workspace.lock().await;
        let result = foods::get_food(&ws, p.id).map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    // --- Patients ---

    #[tool(description = "Register a patient")]
    fn add_patient(&self, Parameters(p): Parameters<AddPatientParams>) -> Result<CallToolResult, McpError> {
        let birth_date = p.birth_date.as_deref().map(|d| parse_date("birth_date", d)).transpose()?;
        let data = PatientCreate {
            name: p.name,
            birth_date,
            gender: p.gender,
            email: p.email,
            phone: p.phone,
            notes: p.notes,
        };
        let result = patients::add_patient(self.store.database(), data).map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    #[tool(description = "List all patients, sorted by name")]
    fn list_patients(&self) -> Result<CallToolResult, McpError> {
        let result = patients::list_patients(self.store.database()).map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    #[tool(description = "Make a patient current. Starts an empty session and lists the patient's saved diets. Refuses when there are unsaved changes unless discard_unsaved is true.")]
    async fn select_patient(&self, Parameters(p): Parameters<SelectPatientParams>) -> Result<CallToolResult, McpError> {
        let mut ws = self.workspace.lock().await;
        let result = patients::select_patient(self.store.database(), &self.store, &mut ws, p.patient_id, p.discard_unsaved)
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    #[tool(description = "Record a weight/height measurement for a patient, optionally at one of their consultations. BMI is computed when both are given.")]
    fn add_measurement(&self, Parameters(p): Parameters<AddMeasurementParams>) -> Result<CallToolResult, McpError> {
        let data = AnthropometryCreate {
            patient_id: p.patient_id,
            consultation_id: p.consultation_id,
            measured_on: parse_date("measured_on", &p.measured_on)?,
            weight_kg: p.weight_kg,
            height_m: p.height_m,
            notes: p.notes,
        };
        let result = patients::add_measurement(self.store.database(), data).map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    #[tool(description = "List a patient's measurements, newest first")]
    fn list_measurements(&self, Parameters(p): Parameters<ListMeasurementsParams>) -> Result<CallToolResult, McpError> {
        let result = patients::list_measurements(self.store.database(), p.patient_id)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    // --- Consultations ---

    #[tool(description = "Book a consultation for a patient. kind is first_visit, follow_up, assessment or other.")]
    fn add_consultation(&self, Parameters(p): Parameters<AddConsultationParams>) -> Result<CallToolResult, McpError> {
        let kind: ConsultationKind = p.kind.parse().map_err(|e: String| McpError::invalid_params(e, None))?;
        let data = ConsultationCreate {
            patient_id: p.patient_id,
            scheduled_at: parse_datetime("scheduled_at", &p.scheduled_at)?,
            kind,
            notes: p.notes,
        };
        let result = consultations::add_consultation(self.store.database(), data)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    #[tool(description = "List a patient's consultations, newest first, with counts by kind and month")]
    fn list_consultations(&self, Parameters(p): Parameters<ListConsultationsParams>) -> Result<CallToolResult, McpError> {
        let result = consultations::list_consultations(self.store.database(), p.patient_id)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    #[tool(description = "Record the anamnesis of a consultation. Recording again replaces every field; omitted fields are cleared.")]
    fn record_anamnesis(&self, Parameters(p): Parameters<RecordAnamnesisParams>) -> Result<CallToolResult, McpError> {
        let data = AnamnesisRecord {
            clinical_history: p.clinical_history,
            family_history: p.family_history,
            allergies: p.allergies,
            restrictions: p.restrictions,
            routine: p.routine,
            water_intake: p.water_intake,
            sleep: p.sleep,
            medications: p.medications,
            notes: p.notes,
        };
        let result = consultations::record_anamnesis(self.store.database(), p.consultation_id, data)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    #[tool(description = "Get a consultation with its anamnesis and the measurements taken at it")]
    fn get_anamnesis(&self, Parameters(p): Parameters<GetAnamnesisParams>) -> Result<CallToolResult, McpError> {
        let result = consultations::get_anamnesis(self.store.database(), p.consultation_id)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    // --- Session ---

    #[tool(description = "Add a food to a meal slot of the current session. Returns the updated session with totals and alerts.")]
    async fn add_session_entry(&self, Parameters(p): Parameters<AddSessionEntryParams>) -> Result<CallToolResult, McpError> {
        let mut ws = self.workspace.lock().await;
        let result = diets::add_session_entry(&mut ws, &p.slot, p.food_id, p.quantity_grams, p.merge_duplicates)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    #[tool(description = "Remove the entry at an index from a meal slot of the current session")]
    async fn remove_session_entry(&self, Parameters(p): Parameters<RemoveSessionEntryParams>) -> Result<CallToolResult, McpError> {
        let mut ws = self.workspace.lock().await;
        let result = diets::remove_session_entry(&mut ws, &p.slot, p.index)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    #[tool(description = "Remove every entry from every meal slot of the current session")]
    async fn clear_session(&self) -> Result<CallToolResult, McpError> {
        let mut ws = self.workspace.lock().await;
        to_result(&diets::clear_session(&mut ws))
    }

    #[tool(description = "Get the current session: entries per slot, per-slot and overall totals, and nutrition alerts")]
    async fn get_session(&self) -> Result<CallToolResult, McpError> {
        let ws = self.workspace.lock().await;
        to_result(&diets::get_session(&ws))
    }

    // --- Diets ---

    #[tool(description = "Save the session as a new diet for the selected patient")]
    async fn save_diet_as_new(&self, Parameters(p): Parameters<SaveDietAsNewParams>) -> Result<CallToolResult, McpError> {
        let mut ws = self.workspace.lock().await;
        let result = diets::save_diet_as_new(&self.store, &mut ws, &p.name, p.objective.as_deref())
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    #[tool(description = "Save the session over the currently loaded diet. Retrying after a partial failure completes the save.")]
    async fn save_diet(&self) -> Result<CallToolResult, McpError> {
        let mut ws = self.workspace.lock().await;
        let result = diets::save_diet(&self.store, &mut ws)
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    #[tool(description = "Replace the session with a saved diet. Refuses when there are unsaved changes unless discard_unsaved is true.")]
    async fn load_diet(&self, Parameters(p): Parameters<LoadDietParams>) -> Result<CallToolResult, McpError> {
        let mut ws = self.workspace.lock().await;
        let result = diets::load_diet(&self.store, &mut ws, p.diet_id, p.discard_unsaved)
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    #[tool(description = "List the selected patient's saved diets, newest first")]
    async fn list_diets(&self) -> Result<CallToolResult, McpError> {
        let mut ws = self.workspace.lock().await;
        let result = diets::list_diets(&self.store, &mut ws.context)
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    #[tool(description = "Delete a saved diet and all its meals. Does nothing unless confirm is true.")]
    async fn delete_diet(&self, Parameters(p): Parameters<DeleteDietParams>) -> Result<CallToolResult, McpError> {
        let mut ws = self.workspace.lock().await;
        let result = diets::delete_diet(&self.store, &mut ws.context, p.diet_id, p.confirm)
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }

    // --- Reports ---

    #[tool(description = "Export the current session as a PDF report with a macronutrient chart")]
    async fn export_diet_report(&self, Parameters(p): Parameters<ExportDietReportParams>) -> Result<CallToolResult, McpError> {
        let ws = self.workspace.lock().await;
        let result = reports::export_diet_report(self.store.database(), &ws, p.file_name.as_deref())
            .map_err(|e| McpError::internal_error(e, None))?;
        to_result(&result)
    }
}

// ============================================================================
// Server Handler
// ============================================================================

#[tool_handler]
impl ServerHandler for NutriplanService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "nutriplan".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("Nutriplan".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Nutriplan - clinical diet planning. \
                 IMPORTANT: Call diet_instructions before planning a diet. \
                 Foods: add_food/search_foods/get_food. \
                 Patients: add_patient/list_patients/select_patient, add_measurement/list_measurements. \
                 Consultations: add_consultation/list_consultations, record_anamnesis/get_anamnesis. \
                 Session: add_session_entry/remove_session_entry/clear_session/get_session. \
                 Diets: save_diet_as_new/save_diet/load_diet/list_diets/delete_diet (delete requires confirm=true). \
                 Reports: export_diet_report."
                    .into(),
            ),
        }
    }
}
