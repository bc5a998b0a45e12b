use thiserror::Error;

/// Why a replay did not complete
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Recipe '{0}' not found")]
    RecipeNotFound(String),

    /// A driver call failed; remaining steps were not run
    #[error("Step {} ({action}) failed: {source}", .index + 1)]
    StepFailed {
        index: usize,
        action: String,
        #[source]
        source: anyhow::Error,
    },
}
