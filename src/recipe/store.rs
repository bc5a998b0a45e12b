//! Recipe store - one JSON document holding every recipe
//!
//! The recorder only ever appends: the whole file is read, the new recipe is
//! pushed, and the file is rewritten. Entries this version can't read are
//! carried through a rewrite unchanged.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::types::Recipe;

/// Store file used when nothing else is configured
pub const DEFAULT_STORE_FILE: &str = "recipes.json";

/// One entry of the store file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredRecipe {
    Readable(Recipe),
    /// Valid JSON that doesn't fit the recipe schema, kept as written
    Unreadable(Value),
}

/// On-disk shape, before each entry is checked against the recipe schema
#[derive(Deserialize)]
struct StoreFile {
    #[serde(default)]
    recipes: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecipeStore {
    recipes: Vec<StoredRecipe>,
}

impl RecipeStore {
    /// Load the store for appending.
    ///
    /// A missing file is an empty store. A file that can't be read, is empty or
    /// isn't a JSON store document is also treated as empty; its content is
    /// dropped on the next save.
    pub fn load_lossy(path: &Path) -> Self {
        if !path.exists() {
            debug!("No recipe store at {}, starting empty", path.display());
            return Self::default();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Could not read {} ({}), reinitializing recipe store",
                    path.display(),
                    e
                );
                return Self::default();
            }
        };
        if content.trim().is_empty() {
            warn!("{} was empty, reinitializing recipe store", path.display());
            return Self::default();
        }

        match Self::parse(&content) {
            Ok(store) => store,
            Err(e) => {
                warn!(
                    "{} is not valid JSON ({}), reinitializing recipe store",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Load the store for reading. Unlike [`RecipeStore::load_lossy`], a
    /// corrupt file is an error here since nothing will overwrite it.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read recipes from {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        Self::parse(&content)
            .with_context(|| format!("Failed to parse recipes from {}", path.display()))
    }

    /// Parse a store document. Only a malformed document is an error; a
    /// single entry that doesn't fit the schema is kept as raw JSON.
    fn parse(content: &str) -> serde_json::Result<Self> {
        let file: StoreFile = serde_json::from_str(content)?;

        let recipes = file
            .recipes
            .into_iter()
            .enumerate()
            .map(|(i, raw)| match Recipe::deserialize(&raw) {
                Ok(recipe) => StoredRecipe::Readable(recipe),
                Err(e) => {
                    let name = raw.get("name").and_then(Value::as_str).unwrap_or("?");
                    warn!("Skipping unreadable recipe #{} '{}': {}", i + 1, name, e);
                    StoredRecipe::Unreadable(raw)
                }
            })
            .collect();

        Ok(Self { recipes })
    }

    /// Overwrite the file with the whole store
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write recipes to {}", path.display()))?;
        Ok(())
    }

    /// Append a recipe to the store at `path` and persist it.
    /// Returns the number of readable recipes now stored.
    pub fn append(path: &Path, recipe: Recipe) -> Result<usize> {
        let mut store = Self::load_lossy(path);
        store.push(recipe);
        store.save(path)?;
        Ok(store.len())
    }

    pub fn push(&mut self, recipe: Recipe) {
        self.recipes.push(StoredRecipe::Readable(recipe));
    }

    /// Readable recipes in file order
    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.iter().filter_map(|entry| match entry {
            StoredRecipe::Readable(recipe) => Some(recipe),
            StoredRecipe::Unreadable(_) => None,
        })
    }

    /// Look up a recipe by name. When several share a name the most recently
    /// appended one wins.
    pub fn find(&self, name: &str) -> Option<&Recipe> {
        self.recipes().filter(|r| r.name == name).last()
    }

    /// Number of readable recipes
    pub fn len(&self) -> usize {
        self.recipes().count()
    }

    /// Entries kept as raw JSON
    pub fn unreadable_count(&self) -> usize {
        self.recipes.len() - self.len()
    }

    /// True when there is no readable recipe
    pub fn is_empty(&self) -> bool {
        self.recipes().next().is_none()
    }
}
