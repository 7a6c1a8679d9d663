//! Patient model

use chrono::{Datelike, NaiveDate};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use super::columns::{format_date, optional_date_column};
use super::PatientId;

/// A registered patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

/// Data for registering a patient
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientCreate {
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl PatientCreate {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Patient name cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Patient {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            birth_date: optional_date_column(row, "birth_date")?,
            gender: row.get("gender")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn create(conn: &Connection, data: &PatientCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO patients (name, birth_date, gender, email, phone, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                data.name.trim(),
                data.birth_date.map(format_date),
                data.gender,
                data.email,
                data.phone,
                data.notes,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_by_id(conn: &Connection, id: PatientId) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM patients WHERE id = ?1")?;

        match stmt.query_row([id], Self::from_row) {
            Ok(patient) => Ok(Some(patient)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All patients ordered by name
    pub fn list(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM patients ORDER BY name COLLATE NOCASE, id")?;

        let patients = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(patients)
    }

    /// Age in whole years on the given day
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        age_on(self.birth_date?, today)
    }
}

/// Completed years between a birth date and a day; None if born after it
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> Option<u32> {
    if birth_date > today {
        return None;
    }
    let mut years = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        assert_eq!(age_on(date(1988, 5, 15), date(2026, 5, 14)), Some(37));
        assert_eq!(age_on(date(1988, 5, 15), date(2026, 5, 15)), Some(38));
    }

    #[test]
    fn test_name_is_required() {
        let data = PatientCreate { name: "   ".to_string(), ..Default::default() };
        assert!(data.validate().is_err());
    }

    #[test]
    fn test_age_of_future_birth_date() {
        assert_eq!(age_on(date(2030, 1, 1), date(2026, 1, 1)), None);
    }
}
