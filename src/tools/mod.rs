//! Nutriplan tools module
//!
//! Tool implementations behind the MCP server. Each returns a serializable
//! response or a message string.

pub mod consultations;
pub mod diets;
pub mod foods;
pub mod patients;
pub mod reports;
pub mod status;

use crate::config::AppConfig;
use crate::diet::EditingContext;
use crate::error::PlanError;
use crate::nutrition::FoodCatalog;

/// Per-server editing state: the loaded catalog and the working session
pub struct Workspace {
    pub config: AppConfig,
    pub catalog: FoodCatalog,
    pub context: EditingContext,
}

impl Workspace {
    pub fn new(config: AppConfig, catalog: FoodCatalog) -> Self {
        let context = EditingContext::new(config.meal_slots.clone());
        Self {
            config,
            catalog,
            context,
        }
    }
}

/// Message for a planning error, prefixed with its code
pub(crate) fn plan_error(e: PlanError) -> String {
    format!("[{}] {}", e.code(), e)
}
