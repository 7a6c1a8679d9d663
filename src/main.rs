//! Nutriplan
//!
//! An MCP server for clinical diet planning.

use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

use nutriplan::build_info;
use nutriplan::config::AppConfig;
use nutriplan::db::{self, SqliteStore};
use nutriplan::mcp::NutriplanService;
use nutriplan::nutrition::FoodCatalog;
use nutriplan::tools::Workspace;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never mix with MCP stdio
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("nutriplan=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    build_info::print_startup_banner();
    eprintln!("Starting MCP server on stdio...");

    let config = AppConfig::from_env()?;
    let db_path = config.database_path.clone();
    eprintln!("Database path: {}", db_path.display());
    eprintln!("Meal slots: {}", config.meal_slots.slots().join(", "));

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    eprintln!("Initializing database...");
    let database = db::Database::new(&db_path)?;

    database.with_conn(|conn| {
        db::migrations::run_migrations(conn)?;
        let version = db::migrations::get_schema_version(conn)?;
        eprintln!("Database schema version: {}", version);
        Ok(())
    })?;

    let store = SqliteStore::new(database);
    let catalog = FoodCatalog::load(&store).await?;

    let service = NutriplanService::new(db_path, store.clone(), Workspace::new(config, catalog));

    let server = service.serve((stdin(), stdout())).await?;
    server.waiting().await?;

    Ok(())
}
