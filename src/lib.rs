pub mod driver;
pub mod error;
pub mod recipe;
pub mod recorder;
pub mod runner;
pub mod utils;

// Re-export common items
pub use error::ReplayError;
pub use recipe::{Action, Recipe, RecipeStore, Step};
pub use runner::{load_recipe, replay};
