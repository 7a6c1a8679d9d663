//! Anamnesis model
//!
//! Free-text history taken at a consultation. A consultation has at most one;
//! recording it again replaces the stored text.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use super::ConsultationId;

/// A stored anamnesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anamnesis {
    pub id: i64,
    pub consultation_id: ConsultationId,
    #[serde(flatten)]
    pub record: AnamnesisRecord,
    pub updated_at: String,
}

/// The history fields, all optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnamnesisRecord {
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

impl AnamnesisRecord {
    /// Blank strings are stored as NULL
    fn normalized(&self) -> Self {
        let clean = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            clinical_history: clean(&self.clinical_history),
            family_history: clean(&self.family_history),
            allergies: clean(&self.allergies),
            restrictions: clean(&self.restrictions),
            routine: clean(&self.routine),
            water_intake: clean(&self.water_intake),
            sleep: clean(&self.sleep),
            medications: clean(&self.medications),
            notes: clean(&self.notes),
        }
    }
}

impl Anamnesis {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            consultation_id: row.get("consultation_id")?,
            record: AnamnesisRecord {
                clinical_history: row.get("clinical_history")?,
                family_history: row.get("family_history")?,
                allergies: row.get("allergies")?,
                restrictions: row.get("restrictions")?,
                routine: row.get("routine")?,
                water_intake: row.get("water_intake")?,
                sleep: row.get("sleep")?,
                medications: row.get("medications")?,
                notes: row.get("notes")?,
            },
            updated_at: row.get("updated_at")?,
        })
    }

    /// Insert the anamnesis of a consultation, or replace the existing one
    pub fn upsert(conn: &Connection, consultation_id: ConsultationId, data: &AnamnesisRecord) -> DbResult<Self> {
        let data = data.normalized();
        conn.execute(
            r#"
            INSERT INTO anamneses (
                consultation_id, clinical_history, family_history, allergies, restrictions,
                routine, water_intake, sleep, medications, notes
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(consultation_id) DO UPDATE SET
                clinical_history = excluded.clinical_history,
                family_history = excluded.family_history,
                allergies = excluded.allergies,
                restrictions = excluded.restrictions,
                routine = excluded.routine,
                water_intake = excluded.water_intake,
                sleep = excluded.sleep,
                medications = excluded.medications,
                notes = excluded.notes,
                updated_at = datetime('now')
            "#,
            params![
                consultation_id,
                data.clinical_history,
                data.family_history,
                data.allergies,
                data.restrictions,
                data.routine,
                data.water_intake,
                data.sleep,
                data.medications,
                data.notes,
            ],
        )?;

        Self::get_for_consultation(conn, consultation_id)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_for_consultation(conn: &Connection, consultation_id: ConsultationId) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM anamneses WHERE consultation_id = ?1")?;

        match stmt.query_row([consultation_id], Self::from_row) {
            Ok(anamnesis) => Ok(Some(anamnesis)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
