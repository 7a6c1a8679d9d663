//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
const SCHEMA_VERSION: i32 = 2;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
        tracing::info!("applied schema migration v1");
    }

    if current_version < 2 {
        migrate_v2(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (2)", [])?;
        tracing::info!("applied schema migration v2");
    }

    Ok(())
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- FOODS
        -- Composition catalog, values per 100 g
        -- ============================================
        CREATE TABLE foods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            nutrients TEXT NOT NULL,                       -- JSON object: key -> value per 100 g
            default_quantity_grams REAL NOT NULL DEFAULT 100,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_foods_name ON foods(name);

        -- ============================================
        -- PATIENTS
        -- ============================================
        CREATE TABLE patients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            birth_date TEXT,                               -- ISO date
            gender TEXT,
            email TEXT,
            phone TEXT,
            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_patients_name ON patients(name);

        -- ============================================
        -- ANTHROPOMETRY
        -- Body measurements taken at consultations
        -- ============================================
        CREATE TABLE anthropometry (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_id INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
            measured_on TEXT NOT NULL,                     -- ISO date
            weight_kg REAL,
            height_m REAL,
            bmi REAL,
            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_anthropometry_patient ON anthropometry(patient_id);

        -- ============================================
        -- DIETS
        -- A saved meal plan for one patient
        -- ============================================
        CREATE TABLE diets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_id INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            objective TEXT NOT NULL DEFAULT '',
            created_on TEXT NOT NULL,                      -- ISO date
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_diets_patient ON diets(patient_id);

        -- ============================================
        -- MEALS
        -- One row per (diet, slot)
        -- ============================================
        CREATE TABLE meals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            diet_id INTEGER NOT NULL REFERENCES diets(id) ON DELETE CASCADE,
            slot_name TEXT NOT NULL,
            UNIQUE(diet_id, slot_name)
        );

        CREATE INDEX idx_meals_diet ON meals(diet_id);

        -- ============================================
        -- MEAL ITEMS
        -- ============================================
        CREATE TABLE meal_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            meal_id INTEGER NOT NULL REFERENCES meals(id) ON DELETE CASCADE,
            food_id INTEGER NOT NULL,                      -- no FK: stale references are tolerated
            quantity_grams REAL NOT NULL CHECK(quantity_grams > 0),
            position INTEGER NOT NULL
        );

        CREATE INDEX idx_meal_items_meal ON meal_items(meal_id);
        "#,
    )?;

    Ok(())
}

/// Migration v2: consultations and their anamnesis
fn migrate_v2(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- CONSULTATIONS
        -- ============================================
        CREATE TABLE consultations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_id INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
            scheduled_at TEXT NOT NULL,                    -- YYYY-MM-DD HH:MM
            kind TEXT NOT NULL,
            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_consultations_patient ON consultations(patient_id, scheduled_at);

        -- ============================================
        -- ANAMNESES
        -- At most one per consultation
        -- ============================================
        CREATE TABLE anamneses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            consultation_id INTEGER NOT NULL UNIQUE REFERENCES consultations(id) ON DELETE CASCADE,
            clinical_history TEXT,
            family_history TEXT,
            allergies TEXT,
            restrictions TEXT,
            routine TEXT,
            water_intake TEXT,
            sleep TEXT,
            medications TEXT,
            notes TEXT,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        ALTER TABLE anthropometry
            ADD COLUMN consultation_id INTEGER REFERENCES consultations(id) ON DELETE SET NULL;

        CREATE INDEX idx_anthropometry_consultation ON anthropometry(consultation_id);
        "#,
    )?;

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Check if the database needs migration
pub fn needs_migration(conn: &Connection) -> DbResult<bool> {
    let current = get_schema_version(conn)?;
    Ok(current < SCHEMA_VERSION)
}
