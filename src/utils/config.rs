use std::path::PathBuf;

use crate::driver::web::BrowserType;
use crate::recipe::DEFAULT_STORE_FILE;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Recipe store file
    pub store_path: PathBuf,

    /// Run the browser without a window
    pub headless: bool,

    /// Browser engine to launch
    pub browser: BrowserType,

    /// Pause before closing the browser after a replay (ms)
    pub close_delay_ms: u64,

    /// Page polling interval while recording (ms)
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_FILE),
            headless: false,
            browser: BrowserType::Chromium,
            close_delay_ms: 3000,
            poll_interval_ms: 200,
        }
    }
}

impl Config {
    /// Defaults overridden by `RECIPE_*` environment variables.
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("RECIPE_STORE").filter(|p| !p.trim().is_empty()) {
            config.store_path = PathBuf::from(path);
        }
        if let Some(headless) = lookup("RECIPE_HEADLESS") {
            config.headless = headless == "true" || headless == "1";
        }
        if let Some(browser) = lookup("RECIPE_BROWSER").and_then(|b| b.parse().ok()) {
            config.browser = browser;
        }
        if let Some(delay) = lookup("RECIPE_CLOSE_DELAY_MS").and_then(|d| d.parse().ok()) {
            config.close_delay_ms = delay;
        }
        if let Some(interval) = lookup("RECIPE_POLL_INTERVAL_MS").and_then(|i| i.parse().ok()) {
            config.poll_interval_ms = interval;
        }

        config
    }
}
