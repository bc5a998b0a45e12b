pub mod traits;
pub mod web;

#[cfg(test)]
pub mod mock;

pub use traits::{BrowserDriver, DomEvent, DomEventKind, DriverEvent, EventSink};

use anyhow::Result;

use crate::utils::config::Config;

/// Launch the browser session described by `config`
pub async fn launch(config: &Config) -> Result<Box<dyn BrowserDriver>> {
    let driver = web::WebDriver::new(web::WebDriverConfig::from(config)).await?;
    Ok(Box::new(driver))
}
