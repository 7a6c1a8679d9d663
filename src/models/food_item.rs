//! Food Item model
//!
//! A catalog entry with its nutrient profile normalized to 100 grams.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use super::columns::json_column;
use super::{FoodId, Nutrients, CALORIES};

/// Quantity offered by default when adding a food to a meal
pub const DEFAULT_QUANTITY_GRAMS: f64 = 100.0;

/// A food with nutrient values per 100 g
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: FoodId,
    pub name: String,
    pub nutrients: Nutrients,
    pub default_quantity_grams: f64,
    pub created_at: String,
}

/// Data for registering a new food
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodItemCreate {
    pub name: String,
    pub nutrients: Nutrients,
    #[serde(default)]
    pub default_quantity_grams: Option<f64>,
}

impl FoodItemCreate {
    pub fn new(name: impl Into<String>, nutrients: Nutrients) -> Self {
        Self {
            name: name.into(),
            nutrients,
            default_quantity_grams: None,
        }
    }

    /// Required-field checks; returns the normalized record
    pub fn validated(&self) -> Result<FoodItemCreate, String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Food name cannot be empty".to_string());
        }
        if !self.nutrients.contains(CALORIES) {
            return Err("calories is required".to_string());
        }
        self.nutrients.validate()?;

        let default_quantity = self.default_quantity_grams.unwrap_or(DEFAULT_QUANTITY_GRAMS);
        if !default_quantity.is_finite() || default_quantity <= 0.0 {
            return Err("default_quantity_grams must be greater than 0".to_string());
        }

        Ok(FoodItemCreate {
            name: name.to_string(),
            nutrients: self.nutrients.clone(),
            default_quantity_grams: Some(default_quantity),
        })
    }
}

impl FoodItem {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            nutrients: json_column(row, "nutrients")?,
            default_quantity_grams: row.get("default_quantity_grams")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Insert a validated food
    pub fn create(conn: &Connection, data: &FoodItemCreate) -> DbResult<Self> {
        let nutrients = serde_json::to_string(&data.nutrients)?;

        conn.execute(
            r#"
            INSERT INTO foods (name, nutrients, default_quantity_grams)
            VALUES (?1, ?2, ?3)
            "#,
            params![
                data.name,
                nutrients,
                data.default_quantity_grams.unwrap_or(DEFAULT_QUANTITY_GRAMS),
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_by_id(conn: &Connection, id: FoodId) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM foods WHERE id = ?1")?;

        match stmt.query_row([id], Self::from_row) {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The whole catalog, ordered by name
    pub fn list_all(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM foods ORDER BY name ASC, id ASC")?;

        let items = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    pub fn count(conn: &Connection) -> DbResult<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM foods", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PROTEIN;

    #[test]
    fn test_validated_trims_and_defaults() {
        let data = FoodItemCreate::new("  Rice  ", Nutrients::new().with(CALORIES, 130.0));
        let v = data.validated().unwrap();
        assert_eq!(v.name, "Rice");
        assert_eq!(v.default_quantity_grams, Some(DEFAULT_QUANTITY_GRAMS));
    }

    #[test]
    fn test_validated_requires_name_and_calories() {
        let no_name = FoodItemCreate::new("   ", Nutrients::new().with(CALORIES, 1.0));
        assert!(no_name.validated().is_err());

        let no_calories = FoodItemCreate::new("Egg", Nutrients::new().with(PROTEIN, 13.0));
        assert!(no_calories.validated().unwrap_err().contains("calories"));
    }

    #[test]
    fn test_validated_rejects_bad_default_quantity() {
        let mut data = FoodItemCreate::new("Egg", Nutrients::new().with(CALORIES, 143.0));
        data.default_quantity_grams = Some(0.0);
        assert!(data.validated().is_err());
    }
}
