pub mod events;
pub mod executor;
pub mod overrides;
pub mod state;

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::time::Duration;

pub use events::*;
pub use executor::{ReplayExecutor, ReplayOutcome};
pub use overrides::Overrides;
pub use state::*;

use crate::driver;
use crate::error::ReplayError;
use crate::recipe::{Recipe, RecipeStore};
use crate::utils::config::Config;

/// Look up a stored recipe by name
pub fn load_recipe(store_path: &Path, name: &str) -> Result<Recipe> {
    let store = RecipeStore::open(store_path)?;
    store
        .find(name)
        .cloned()
        .ok_or_else(|| ReplayError::RecipeNotFound(name.to_string()).into())
}

/// Replay `recipe` in a fresh browser session, printing progress.
///
/// Writes the run report to `report_path` when given, on success and on
/// failure. Returns the report, or the replay failure.
pub async fn replay(
    config: &Config,
    recipe: &Recipe,
    overrides: &Overrides,
    report_path: Option<&Path>,
) -> Result<ReplayReport> {
    let browser = driver::launch(config).await?;

    let executor = ReplayExecutor::new(browser.as_ref())
        .with_close_delay(Duration::from_millis(config.close_delay_ms));
    let listener = tokio::spawn(ConsoleEventListener::listen(executor.subscribe()));

    let outcome = executor.run(recipe, overrides).await;
    let _ = listener.await;

    if let Some(path) = report_path {
        write_report(&outcome.report, path)?;
        println!("{} Report written to {}", "📄".blue(), path.display());
    }

    outcome.result?;
    Ok(outcome.report)
}

fn write_report(report: &ReplayReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
