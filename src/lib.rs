//! Nutriplan Library
//!
//! Clinical diet planning: a food catalog, a per-slot editing session,
//! nutrient aggregation and reconciliation of sessions with stored diets.

pub mod build_info;
pub mod config;
pub mod db;
pub mod diet;
pub mod error;
pub mod mcp;
pub mod models;
pub mod nutrition;
pub mod tools;
