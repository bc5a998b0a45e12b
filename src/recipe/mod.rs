//! Recipe model: the step vocabulary, recipes and the JSON store they live in

pub mod placeholders;
pub mod store;
pub mod types;

pub use placeholders::extract_placeholders;
pub use store::{RecipeStore, StoredRecipe, DEFAULT_STORE_FILE};
pub use types::{Action, Recipe, Step};
