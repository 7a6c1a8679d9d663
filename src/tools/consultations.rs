//! Consultation and anamnesis MCP tools

use std::collections::BTreeMap;

use chrono::{Local, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::Database;
use crate::models::{
    Anamnesis, AnamnesisRecord, AnthropometryRecord, Consultation, ConsultationCreate, ConsultationId,
    ConsultationKind, PatientId,
};
use super::patients::{find_patient, MeasurementView};

#[derive(Debug, Serialize)]
pub struct ConsultationView {
    pub id: ConsultationId,
    pub patient_id: PatientId,
    pub scheduled_at: String,
    pub kind: ConsultationKind,
    pub notes: Option<String>,
    pub has_anamnesis: bool,
}

impl ConsultationView {
    fn new(consultation: Consultation, has_anamnesis: bool) -> Self {
        Self {
            id: consultation.id,
            patient_id: consultation.patient_id,
            scheduled_at: consultation.scheduled_at.format("%Y-%m-%d %H:%M").to_string(),
            kind: consultation.kind,
            notes: consultation.notes,
            has_anamnesis,
        }
    }
}

/// Counts over a patient's consultations
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct ConsultationStats {
    pub total: usize,
    pub by_kind: BTreeMap<ConsultationKind, usize>,
    /// Keyed by YYYY-MM
    pub by_month: BTreeMap<String, usize>,
    pub first_at: Option<NaiveDateTime>,
    pub latest_at: Option<NaiveDateTime>,
    /// Scheduled after `now`
    pub upcoming: usize,
}

impl ConsultationStats {
    pub fn compute(consultations: &[Consultation], now: NaiveDateTime) -> Self {
        let mut stats = Self {
            total: consultations.len(),
            ..Default::default()
        };
        for c in consultations {
            *stats.by_kind.entry(c.kind).or_default() += 1;
            *stats.by_month.entry(c.scheduled_at.format("%Y-%m").to_string()).or_default() += 1;
            if c.scheduled_at > now {
                stats.upcoming += 1;
            }
        }
        stats.first_at = consultations.iter().map(|c| c.scheduled_at).min();
        stats.latest_at = consultations.iter().map(|c| c.scheduled_at).max();
        stats
    }
}

#[derive(Debug, Serialize)]
pub struct ListConsultationsResponse {
    pub patient_id: PatientId,
    pub consultations: Vec<ConsultationView>,
    pub stats: ConsultationStats,
}

#[derive(Debug, Serialize)]
pub struct GetAnamnesisResponse {
    pub consultation: ConsultationView,
    pub anamnesis: Option<Anamnesis>,
    pub measurements: Vec<MeasurementView>,
}

fn find_consultation(conn: &Connection, id: ConsultationId) -> Result<Consultation, String> {
    Consultation::get_by_id(conn, id)
        .map_err(|e| format!("Failed to get consultation: {}", e))?
        .ok_or_else(|| format!("Consultation not found with id: {}", id))
}

fn has_anamnesis(conn: &Connection, id: ConsultationId) -> Result<bool, String> {
    Anamnesis::get_for_consultation(conn, id)
        .map(|a| a.is_some())
        .map_err(|e| format!("Failed to get anamnesis: {}", e))
}

pub fn add_consultation(db: &Database, data: ConsultationCreate) -> Result<ConsultationView, String> {
    find_patient(db, data.patient_id)?;
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let consultation = Consultation::create(&conn, &data)
        .map_err(|e| format!("Failed to create consultation: {}", e))?;
    tracing::info!(
        consultation_id = consultation.id,
        patient_id = consultation.patient_id,
        kind = %consultation.kind,
        "consultation booked"
    );

    Ok(ConsultationView::new(consultation, false))
}

pub fn list_consultations(db: &Database, patient_id: PatientId) -> Result<ListConsultationsResponse, String> {
    find_patient(db, patient_id)?;
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let consultations = Consultation::list_for_patient(&conn, patient_id)
        .map_err(|e| format!("Failed to list consultations: {}", e))?;
    let stats = ConsultationStats::compute(&consultations, Local::now().naive_local());

    let consultations = consultations
        .into_iter()
        .map(|c| {
            let recorded = has_anamnesis(&conn, c.id)?;
            Ok(ConsultationView::new(c, recorded))
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(ListConsultationsResponse {
        patient_id,
        consultations,
        stats,
    })
}

/// Store the anamnesis of a consultation, replacing any earlier one
pub fn record_anamnesis(
    db: &Database,
    consultation_id: ConsultationId,
    data: AnamnesisRecord,
) -> Result<Anamnesis, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    find_consultation(&conn, consultation_id)?;

    let anamnesis = Anamnesis::upsert(&conn, consultation_id, &data)
        .map_err(|e| format!("Failed to record anamnesis: {}", e))?;
    tracing::info!(consultation_id, "anamnesis recorded");

    Ok(anamnesis)
}

/// A consultation with its anamnesis, if any, and the measurements taken at it
pub fn get_anamnesis(db: &Database, consultation_id: ConsultationId) -> Result<GetAnamnesisResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let consultation = find_consultation(&conn, consultation_id)?;

    let anamnesis = Anamnesis::get_for_consultation(&conn, consultation_id)
        .map_err(|e| format!("Failed to get anamnesis: {}", e))?;
    let measurements = AnthropometryRecord::list_for_consultation(&conn, consultation_id)
        .map_err(|e| format!("Failed to list measurements: {}", e))?
        .into_iter()
        .map(MeasurementView::from)
        .collect();

    Ok(GetAnamnesisResponse {
        consultation: ConsultationView::new(consultation, anamnesis.is_some()),
        anamnesis,
        measurements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::db::migrations::run_migrations;
    use crate::models::{AnthropometryCreate, PatientCreate};
    use crate::tools::patients::{add_measurement, add_patient};

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(run_migrations).unwrap();
        db
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn patient(db: &Database, name: &str) -> PatientId {
        add_patient(
            db,
            PatientCreate {
                name: name.to_string(),
                ..Default::default()
            },
        )
        .unwrap()
        .id
    }

    fn book(db: &Database, patient_id: PatientId, when: NaiveDateTime, kind: ConsultationKind) -> ConsultationView {
        add_consultation(
            db,
            ConsultationCreate {
                patient_id,
                scheduled_at: when,
                kind,
                notes: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_consultations_listed_newest_first_with_stats() {
        let db = db();
        let ana = patient(&db, "Ana");
        let other = patient(&db, "Bia");
        book(&db, ana, at(2026, 1, 10, 9), ConsultationKind::FirstVisit);
        book(&db, ana, at(2026, 2, 14, 15), ConsultationKind::FollowUp);
        book(&db, ana, at(2026, 2, 28, 8), ConsultationKind::FollowUp);
        book(&db, other, at(2026, 3, 1, 8), ConsultationKind::FirstVisit);

        let listed = list_consultations(&db, ana).unwrap();
        let dates: Vec<&str> = listed.consultations.iter().map(|c| c.scheduled_at.as_str()).collect();
        assert_eq!(dates, vec!["2026-02-28 08:00", "2026-02-14 15:00", "2026-01-10 09:00"]);
        assert_eq!(listed.stats.total, 3);
        assert_eq!(listed.stats.by_kind[&ConsultationKind::FollowUp], 2);
        assert_eq!(listed.stats.by_month["2026-02"], 2);
        assert_eq!(listed.stats.first_at, Some(at(2026, 1, 10, 9)));

        assert!(add_consultation(
            &db,
            ConsultationCreate {
                patient_id: 999,
                scheduled_at: at(2026, 1, 1, 9),
                kind: ConsultationKind::Other,
                notes: None,
            },
        )
        .is_err());
    }

    #[test]
    fn test_stats_count_upcoming_consultations() {
        let consultations: Vec<Consultation> = [at(2026, 5, 1, 9), at(2026, 6, 1, 9), at(2026, 7, 1, 9)]
            .into_iter()
            .enumerate()
            .map(|(i, when)| Consultation {
                id: i as i64 + 1,
                patient_id: 1,
                scheduled_at: when,
                kind: ConsultationKind::FollowUp,
                notes: None,
            })
            .collect();
        let stats = ConsultationStats::compute(&consultations, at(2026, 6, 1, 9));
        assert_eq!(stats.upcoming, 1);
        assert_eq!(stats.latest_at, Some(at(2026, 7, 1, 9)));
        assert_eq!(ConsultationStats::compute(&[], at(2026, 6, 1, 9)), ConsultationStats::default());
    }

    #[test]
    fn test_recording_anamnesis_twice_replaces_it() {
        let db = db();
        let ana = patient(&db, "Ana");
        let visit = book(&db, ana, at(2026, 1, 10, 9), ConsultationKind::FirstVisit);

        let empty = get_anamnesis(&db, visit.id).unwrap();
        assert!(empty.anamnesis.is_none());
        assert!(!empty.consultation.has_anamnesis);

        record_anamnesis(
            &db,
            visit.id,
            AnamnesisRecord {
                allergies: Some("peanuts".to_string()),
                sleep: Some("6h".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        let second = record_anamnesis(
            &db,
            visit.id,
            AnamnesisRecord {
                allergies: Some("peanuts, shellfish".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(second.record.allergies.as_deref(), Some("peanuts, shellfish"));
        assert_eq!(second.record.sleep, None);

        let count: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM anamneses", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(count, 1);
        assert!(list_consultations(&db, ana).unwrap().consultations[0].has_anamnesis);
        assert!(record_anamnesis(&db, 999, AnamnesisRecord::default()).is_err());
    }

    #[test]
    fn test_measurements_attach_to_own_patients_consultation() {
        let db = db();
        let ana = patient(&db, "Ana");
        let bia = patient(&db, "Bia");
        let visit = book(&db, ana, at(2026, 1, 10, 9), ConsultationKind::FirstVisit);

        let measurement = |patient_id, consultation_id| AnthropometryCreate {
            patient_id,
            consultation_id: Some(consultation_id),
            measured_on: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            weight_kg: Some(64.0),
            height_m: Some(1.62),
            notes: None,
        };

        let view = add_measurement(&db, measurement(ana, visit.id)).unwrap();
        assert_eq!(view.consultation_id, Some(visit.id));
        assert!(add_measurement(&db, measurement(bia, visit.id)).is_err());
        assert!(add_measurement(&db, measurement(ana, 999)).is_err());

        let taken = get_anamnesis(&db, visit.id).unwrap().measurements;
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].bmi, Some(24.4));
    }
}
