//! Patient and anthropometry MCP tools

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::db::Database;
use crate::diet::{DietReconciler, DietStore};
use crate::models::{
    AnthropometryCreate, AnthropometryRecord, Consultation, ConsultationId, DietSummary, Patient,
    PatientCreate, PatientId,
};
use super::{plan_error, Workspace};

#[derive(Debug, Serialize)]
pub struct PatientSummary {
    pub id: PatientId,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub age: Option<u32>,
    pub gender: Option<String>,
}

impl PatientSummary {
    fn new(patient: &Patient, today: NaiveDate) -> Self {
        Self {
            id: patient.id,
            name: patient.name.clone(),
            birth_date: patient.birth_date,
            age: patient.age_on(today),
            gender: patient.gender.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListPatientsResponse {
    pub patients: Vec<PatientSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SelectPatientResponse {
    pub patient: PatientSummary,
    pub diets: Vec<DietSummary>,
    pub discarded_unsaved_changes: bool,
}

#[derive(Debug, Serialize)]
pub struct MeasurementView {
    pub id: i64,
    pub consultation_id: Option<ConsultationId>,
    pub measured_on: NaiveDate,
    pub weight_kg: Option<f64>,
    pub height_m: Option<f64>,
    pub bmi: Option<f64>,
    pub classification: Option<&'static str>,
    pub notes: Option<String>,
}

impl From<AnthropometryRecord> for MeasurementView {
    fn from(record: AnthropometryRecord) -> Self {
        let classification = record.classification().map(|c| c.label());
        Self {
            id: record.id,
            consultation_id: record.consultation_id,
            measured_on: record.measured_on,
            weight_kg: record.weight_kg,
            height_m: record.height_m,
            bmi: record.bmi,
            classification,
            notes: record.notes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListMeasurementsResponse {
    pub patient_id: PatientId,
    pub measurements: Vec<MeasurementView>,
}

pub(crate) fn find_patient(db: &Database, id: PatientId) -> Result<Patient, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    Patient::get_by_id(&conn, id)
        .map_err(|e| format!("Failed to get patient: {}", e))?
        .ok_or_else(|| format!("Patient not found with id: {}", id))
}

pub fn add_patient(db: &Database, data: PatientCreate) -> Result<PatientSummary, String> {
    data.validate()?;
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let patient = Patient::create(&conn, &data).map_err(|e| format!("Failed to create patient: {}", e))?;
    tracing::info!(patient_id = patient.id, "patient registered");

    Ok(PatientSummary::new(&patient, Local::now().date_naive()))
}

pub fn list_patients(db: &Database) -> Result<ListPatientsResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let today = Local::now().date_naive();

    let patients: Vec<PatientSummary> = Patient::list(&conn)
        .map_err(|e| format!("Failed to list patients: {}", e))?
        .iter()
        .map(|p| PatientSummary::new(p, today))
        .collect();
    let total = patients.len();

    Ok(ListPatientsResponse { patients, total })
}

/// Make a patient current; the session starts over and their diets are listed
pub async fn select_patient<S: DietStore + ?Sized>(
    db: &Database,
    store: &S,
    ws: &mut Workspace,
    patient_id: PatientId,
    discard_unsaved: bool,
) -> Result<SelectPatientResponse, String> {
    let patient = find_patient(db, patient_id)?;

    let dirty = ws.context.is_dirty();
    if dirty && !discard_unsaved {
        return Err("The current diet has unsaved changes. Save it or pass discard_unsaved=true".to_string());
    }

    ws.context.select_patient(patient_id);
    let diets = DietReconciler::new(store)
        .refresh_diets(&mut ws.context)
        .await
        .map_err(plan_error)?
        .to_vec();

    Ok(SelectPatientResponse {
        patient: PatientSummary::new(&patient, Local::now().date_naive()),
        diets,
        discarded_unsaved_changes: dirty,
    })
}

pub fn add_measurement(db: &Database, data: AnthropometryCreate) -> Result<MeasurementView, String> {
    data.validate()?;
    find_patient(db, data.patient_id)?;
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    if let Some(consultation_id) = data.consultation_id {
        let consultation = Consultation::get_by_id(&conn, consultation_id)
            .map_err(|e| format!("Failed to get consultation: {}", e))?
            .ok_or_else(|| format!("Consultation not found with id: {}", consultation_id))?;
        if consultation.patient_id != data.patient_id {
            return Err(format!(
                "Consultation {} belongs to another patient",
                consultation_id
            ));
        }
    }

    let record = AnthropometryRecord::create(&conn, &data)
        .map_err(|e| format!("Failed to record measurement: {}", e))?;

    Ok(MeasurementView::from(record))
}

pub fn list_measurements(db: &Database, patient_id: PatientId) -> Result<ListMeasurementsResponse, String> {
    find_patient(db, patient_id)?;
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let measurements = AnthropometryRecord::list_for_patient(&conn, patient_id)
        .map_err(|e| format!("Failed to list measurements: {}", e))?
        .into_iter()
        .map(MeasurementView::from)
        .collect();

    Ok(ListMeasurementsResponse {
        patient_id,
        measurements,
    })
}
