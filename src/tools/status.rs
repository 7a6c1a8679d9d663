//! Nutriplan Status Tool
//!
//! Runtime status of the service and a usage guide for assistants.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::build_info::BuildInfo;
use crate::models::{DietId, PatientId};
use super::Workspace;

/// Diet planning workflow for AI assistants
pub const DIET_INSTRUCTIONS: &str = r#"
# Nutriplan Diet Planning Instructions

## Workflow

1. `list_patients` or `add_patient`, then `select_patient` to start a fresh session
   for that patient. Their saved diets are listed in the response.
   At a visit, `add_consultation` first; pass its id to `add_measurement` and
   `record_anamnesis` (allergies and restrictions matter when choosing foods).
2. `search_foods` to find food ids. Register missing foods with `add_food`
   (nutrients per 100 g; `calories` is required, other keys are free-form).
3. `add_session_entry` with a meal slot, a food id and grams. Omitting grams uses
   the food's default portion. Adding a food already in the slot sums the grams
   unless `merge_duplicates` is false.
4. Review totals and alerts in every session response, or call `get_session`.
5. `save_diet_as_new` the first time, `save_diet` afterwards.
6. `export_diet_report` writes a PDF of the session.

## Notes

- Meal slots are fixed and listed by `status`; names must match exactly.
- Entry indexes are per slot and start at 0.
- `load_diet` and `select_patient` refuse to drop unsaved changes unless
  `discard_unsaved` is true.
- `delete_diet` does nothing unless `confirm` is true.
- Errors start with a code in brackets, e.g. `[INVALID_SLOT]`. A
  `[PARTIAL_WRITE_FAILURE]` means the diet was saved partway; calling
  `save_diet` again completes it.
"#;

/// Runtime status of the Nutriplan service
#[derive(Debug, Clone, Serialize)]
pub struct NutriplanStatus {
    /// Build information
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,

    /// Database information
    pub database_path: String,
    pub database_size_bytes: Option<u64>,

    /// Editing state
    pub catalog_foods: usize,
    pub meal_slots: Vec<String>,
    pub patient_id: Option<PatientId>,
    pub current_diet_id: Option<DietId>,
    pub unsaved_changes: bool,

    /// Process information
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub memory_usage_bytes: u64,
}

/// Status tracker for collecting runtime information
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
}

impl StatusTracker {
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            start_time: Instant::now(),
            database_path,
        }
    }

    pub fn get_status(&self, ws: &Workspace) -> NutriplanStatus {
        let build_info = BuildInfo::current();

        let database_size_bytes = std::fs::metadata(&self.database_path).ok().map(|m| m.len());

        let pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]));
        let memory_usage_bytes = sys.process(Pid::from_u32(pid)).map(|p| p.memory()).unwrap_or(0);

        NutriplanStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            catalog_foods: ws.catalog.len(),
            meal_slots: ws.context.registry().slots().to_vec(),
            patient_id: ws.context.patient_id(),
            current_diet_id: ws.context.current_diet().map(|d| d.id),
            unsaved_changes: ws.context.is_dirty(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: pid,
            memory_usage_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::nutrition::FoodCatalog;

    #[test]
    fn test_status_reports_workspace() {
        let ws = Workspace::new(AppConfig::from_lookup(|_| None).unwrap(), FoodCatalog::new());
        let status = StatusTracker::new(PathBuf::from("/nonexistent/nutriplan.db")).get_status(&ws);

        assert_eq!(status.database_size_bytes, None);
        assert_eq!(status.meal_slots.len(), 6);
        assert_eq!(status.process_id, std::process::id());
        assert!(!status.unsaved_changes);
    }
}
