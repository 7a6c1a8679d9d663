//! Anthropometry records
//!
//! Weight and height measured at a consultation, with the derived BMI.

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use super::columns::{date_column, format_date};
use super::{ConsultationId, PatientId};

/// BMI bands used in clinical screening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BmiClass {
    Underweight,
    Normal,
    Overweight,
    ObesityI,
    ObesityII,
    ObesityIII,
}

impl BmiClass {
    pub fn classify(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiClass::Underweight
        } else if bmi < 25.0 {
            BmiClass::Normal
        } else if bmi < 30.0 {
            BmiClass::Overweight
        } else if bmi < 35.0 {
            BmiClass::ObesityI
        } else if bmi < 40.0 {
            BmiClass::ObesityII
        } else {
            BmiClass::ObesityIII
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BmiClass::Underweight => "Underweight",
            BmiClass::Normal => "Normal weight",
            BmiClass::Overweight => "Overweight",
            BmiClass::ObesityI => "Obesity class I",
            BmiClass::ObesityII => "Obesity class II",
            BmiClass::ObesityIII => "Obesity class III",
        }
    }
}

/// Body mass index rounded to one decimal; None unless both inputs are positive
pub fn bmi(weight_kg: f64, height_m: f64) -> Option<f64> {
    if !(weight_kg > 0.0 && height_m > 0.0) || !weight_kg.is_finite() || !height_m.is_finite() {
        return None;
    }
    let raw = weight_kg / (height_m * height_m);
    Some((raw * 10.0).round() / 10.0)
}

/// A stored measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropometryRecord {
    pub id: i64,
    pub patient_id: PatientId,
    pub consultation_id: Option<ConsultationId>,
    pub measured_on: NaiveDate,
    pub weight_kg: Option<f64>,
    pub height_m: Option<f64>,
    pub bmi: Option<f64>,
    pub notes: Option<String>,
}

/// Data for recording a measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropometryCreate {
    pub patient_id: PatientId,
    /// Consultation the measurement was taken at
    pub consultation_id: Option<ConsultationId>,
    pub measured_on: NaiveDate,
    pub weight_kg: Option<f64>,
    pub height_m: Option<f64>,
    pub notes: Option<String>,
}

impl AnthropometryCreate {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(w) = self.weight_kg {
            if !w.is_finite() || w <= 0.0 {
                return Err("weight_kg must be greater than 0".to_string());
            }
        }
        if let Some(h) = self.height_m {
            if !h.is_finite() || h <= 0.0 {
                return Err("height_m must be greater than 0".to_string());
            }
        }
        Ok(())
    }

    pub fn bmi(&self) -> Option<f64> {
        bmi(self.weight_kg?, self.height_m?)
    }
}

impl AnthropometryRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            patient_id: row.get("patient_id")?,
            consultation_id: row.get("consultation_id")?,
            measured_on: date_column(row, "measured_on")?,
            weight_kg: row.get("weight_kg")?,
            height_m: row.get("height_m")?,
            bmi: row.get("bmi")?,
            notes: row.get("notes")?,
        })
    }

    pub fn classification(&self) -> Option<BmiClass> {
        self.bmi.map(BmiClass::classify)
    }

    pub fn create(conn: &Connection, data: &AnthropometryCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO anthropometry (patient_id, consultation_id, measured_on, weight_kg, height_m, bmi, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                data.patient_id,
                data.consultation_id,
                format_date(data.measured_on),
                data.weight_kg,
                data.height_m,
                data.bmi(),
                data.notes,
            ],
        )?;

        let id = conn.last_insert_rowid();
        let mut stmt = conn.prepare("SELECT * FROM anthropometry WHERE id = ?1")?;
        match stmt.query_row([id], Self::from_row) {
            Ok(record) => Ok(record),
            Err(e) => Err(DbError::Sqlite(e)),
        }
    }

    /// Measurements of a patient, newest first
    pub fn list_for_patient(conn: &Connection, patient_id: PatientId) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM anthropometry WHERE patient_id = ?1 ORDER BY measured_on DESC, id DESC",
        )?;

        let records = stmt
            .query_map([patient_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Measurements taken at one consultation
    pub fn list_for_consultation(conn: &Connection, consultation_id: ConsultationId) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM anthropometry WHERE consultation_id = ?1 ORDER BY id")?;

        let records = stmt
            .query_map([consultation_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bmi_rounds_to_one_decimal() {
        assert_eq!(bmi(70.0, 1.75), Some(22.9));
        assert_eq!(bmi(70.0, 0.0), None);
        assert_eq!(bmi(-1.0, 1.7), None);
    }

    #[test]
    fn test_classification_bands() {
        assert_eq!(BmiClass::classify(18.4), BmiClass::Underweight);
        assert_eq!(BmiClass::classify(18.5), BmiClass::Normal);
        assert_eq!(BmiClass::classify(27.0), BmiClass::Overweight);
        assert_eq!(BmiClass::classify(30.0), BmiClass::ObesityI);
        assert_eq!(BmiClass::classify(39.9), BmiClass::ObesityII);
        assert_eq!(BmiClass::classify(40.0), BmiClass::ObesityIII);
    }

    #[test]
    fn test_create_validation() {
        let data = AnthropometryCreate {
            patient_id: 1,
            consultation_id: None,
            measured_on: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            weight_kg: Some(0.0),
            height_m: Some(1.7),
            notes: None,
        };
        assert!(data.validate().is_err());
    }
}
