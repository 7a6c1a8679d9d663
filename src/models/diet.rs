//! Diet, meal and meal item records
//!
//! A diet owns one meal row per slot and each meal owns its items. Deleting a
//! diet cascades through both tables.

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use crate::nutrition::Session;
use super::columns::{date_column, format_date};
use super::{DietId, FoodId, MealId, PatientId};

/// Header of a persisted diet, as listed for a patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietSummary {
    pub id: DietId,
    pub patient_id: PatientId,
    pub name: String,
    pub objective: String,
    pub created_at: NaiveDate,
}

/// A persisted plan together with its meal snapshot
#[derive(Debug, Clone, Serialize)]
pub struct Diet {
    pub id: DietId,
    pub patient_id: PatientId,
    pub name: String,
    pub objective: String,
    pub created_at: NaiveDate,
    pub meals: Session,
}

impl Diet {
    pub fn from_summary(summary: DietSummary, meals: Session) -> Self {
        Self {
            id: summary.id,
            patient_id: summary.patient_id,
            name: summary.name,
            objective: summary.objective,
            created_at: summary.created_at,
            meals,
        }
    }

    pub fn summary(&self) -> DietSummary {
        DietSummary {
            id: self.id,
            patient_id: self.patient_id,
            name: self.name.clone(),
            objective: self.objective.clone(),
            created_at: self.created_at,
        }
    }
}

/// One (diet, slot) row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealRecord {
    pub id: MealId,
    pub diet_id: DietId,
    pub slot_name: String,
}

/// A food and the grams planned for it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MealItem {
    pub food_id: FoodId,
    pub quantity_grams: f64,
}

impl DietSummary {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            patient_id: row.get("patient_id")?,
            name: row.get("name")?,
            objective: row.get("objective")?,
            created_at: date_column(row, "created_on")?,
        })
    }

    pub fn create(
        conn: &Connection,
        patient_id: PatientId,
        name: &str,
        objective: &str,
        created_at: NaiveDate,
    ) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO diets (patient_id, name, objective, created_on) VALUES (?1, ?2, ?3, ?4)",
            params![patient_id, name, objective, format_date(created_at)],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_by_id(conn: &Connection, id: DietId) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM diets WHERE id = ?1")?;

        match stmt.query_row([id], Self::from_row) {
            Ok(diet) => Ok(Some(diet)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Diets of a patient, newest first
    pub fn list_for_patient(conn: &Connection, patient_id: PatientId) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM diets WHERE patient_id = ?1 ORDER BY created_on DESC, id DESC",
        )?;

        let diets = stmt
            .query_map([patient_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(diets)
    }

    /// Delete a diet; meals and items go with it
    pub fn delete(conn: &Connection, id: DietId) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM diets WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

impl MealRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            diet_id: row.get("diet_id")?,
            slot_name: row.get("slot_name")?,
        })
    }

    pub fn create(conn: &Connection, diet_id: DietId, slot_name: &str) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO meals (diet_id, slot_name) VALUES (?1, ?2)",
            params![diet_id, slot_name],
        )?;

        Ok(Self {
            id: conn.last_insert_rowid(),
            diet_id,
            slot_name: slot_name.to_string(),
        })
    }

    pub fn list_for_diet(conn: &Connection, diet_id: DietId) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM meals WHERE diet_id = ?1 ORDER BY id")?;

        let meals = stmt
            .query_map([diet_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(meals)
    }
}

impl MealItem {
    pub fn list_for_meal(conn: &Connection, meal_id: MealId) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT food_id, quantity_grams FROM meal_items WHERE meal_id = ?1 ORDER BY position, id",
        )?;

        let items = stmt
            .query_map([meal_id], |row| {
                Ok(Self {
                    food_id: row.get(0)?,
                    quantity_grams: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    pub fn delete_for_meal(conn: &Connection, meal_id: MealId) -> DbResult<usize> {
        Ok(conn.execute("DELETE FROM meal_items WHERE meal_id = ?1", [meal_id])?)
    }

    /// Insert a meal's items in list order, all or nothing
    pub fn insert_for_meal(conn: &Connection, meal_id: MealId, items: &[MealItem]) -> DbResult<()> {
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO meal_items (meal_id, food_id, quantity_grams, position) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, item) in items.iter().enumerate() {
                stmt.execute(params![meal_id, item.food_id, item.quantity_grams, position as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
