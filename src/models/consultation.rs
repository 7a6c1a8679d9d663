//! Consultation model
//!
//! A dated appointment with a patient. Measurements and the anamnesis hang
//! off it.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use super::columns::{datetime_column, format_datetime};
use super::{ConsultationId, PatientId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationKind {
    FirstVisit,
    FollowUp,
    Assessment,
    Other,
}

impl ConsultationKind {
    pub const ALL: [ConsultationKind; 4] = [
        ConsultationKind::FirstVisit,
        ConsultationKind::FollowUp,
        ConsultationKind::Assessment,
        ConsultationKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationKind::FirstVisit => "first_visit",
            ConsultationKind::FollowUp => "follow_up",
            ConsultationKind::Assessment => "assessment",
            ConsultationKind::Other => "other",
        }
    }
}

impl fmt::Display for ConsultationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsultationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
                format!("Unknown consultation kind '{}'. Expected one of: {}", s, names.join(", "))
            })
    }
}

/// A stored consultation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    pub id: ConsultationId,
    pub patient_id: PatientId,
    pub scheduled_at: NaiveDateTime,
    pub kind: ConsultationKind,
    pub notes: Option<String>,
}

/// Data for booking a consultation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationCreate {
    pub patient_id: PatientId,
    pub scheduled_at: NaiveDateTime,
    pub kind: ConsultationKind,
    pub notes: Option<String>,
}

impl Consultation {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let idx = row.as_ref().column_index("kind")?;
        let kind: String = row.get(idx)?;
        let kind = kind
            .parse()
            .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))?;
        Ok(Self {
            id: row.get("id")?,
            patient_id: row.get("patient_id")?,
            scheduled_at: datetime_column(row, "scheduled_at")?,
            kind,
            notes: row.get("notes")?,
        })
    }

    pub fn create(conn: &Connection, data: &ConsultationCreate) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO consultations (patient_id, scheduled_at, kind, notes) VALUES (?1, ?2, ?3, ?4)",
            params![
                data.patient_id,
                format_datetime(data.scheduled_at),
                data.kind.as_str(),
                data.notes,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_by_id(conn: &Connection, id: ConsultationId) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM consultations WHERE id = ?1")?;

        match stmt.query_row([id], Self::from_row) {
            Ok(consultation) => Ok(Some(consultation)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Consultations of a patient, newest first
    pub fn list_for_patient(conn: &Connection, patient_id: PatientId) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM consultations WHERE patient_id = ?1 ORDER BY scheduled_at DESC, id DESC",
        )?;

        let consultations = stmt
            .query_map([patient_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(consultations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing_is_lenient_about_spelling() {
        assert_eq!("Follow up".parse::<ConsultationKind>(), Ok(ConsultationKind::FollowUp));
        assert_eq!("first-visit".parse::<ConsultationKind>(), Ok(ConsultationKind::FirstVisit));
        assert_eq!("ASSESSMENT".parse::<ConsultationKind>(), Ok(ConsultationKind::Assessment));
        let err = "checkup".parse::<ConsultationKind>().unwrap_err();
        assert!(err.contains("follow_up"));
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ConsultationKind::ALL {
            assert_eq!(kind.as_str().parse::<ConsultationKind>(), Ok(kind));
        }
    }
}
