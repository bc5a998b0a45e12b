//! Web Driver implementation using Playwright
//!
//! Drives one browser session for replay and, once subscribed, polls the page
//! for captured interactions and main-frame URL changes while recording.

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use log::{debug, warn};
use playwright::api::{Browser, BrowserContext, Page, Viewport};
use playwright::Playwright;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::driver::traits::{BrowserDriver, DomEvent, DriverEvent, EventSink};
use crate::utils::config::Config;

/// Installed in every document once the session is subscribed
const CAPTURE_SCRIPT: &str = include_str!("capture.js");

/// Takes and clears the queue and the dropped-event count written by the
/// capture script
const DRAIN_SCRIPT: &str = r#"() => {
    const drained = { events: [], dropped: 0 };
    try {
        drained.events = JSON.parse(sessionStorage.getItem("__recipe_events") || "[]");
        sessionStorage.removeItem("__recipe_events");
        drained.dropped = Number(sessionStorage.getItem("__recipe_dropped") || "0");
        sessionStorage.removeItem("__recipe_dropped");
    } catch (_) {}
    drained.dropped += window.__recipeDropped || 0;
    window.__recipeDropped = 0;
    return JSON.stringify(drained);
}"#;

/// What one drain of the page's capture queue yielded
#[derive(Debug, Default)]
pub struct DrainedQueue {
    pub events: Vec<DomEvent>,
    /// Events the page could not queue (storage full)
    pub dropped: u64,
}

#[derive(Deserialize)]
struct RawQueue {
    #[serde(default)]
    events: Vec<serde_json::Value>,
    #[serde(default)]
    dropped: u64,
}

/// Decode the drain script's result entry by entry, so one unreadable entry
/// costs only itself
pub fn decode_queue(raw: &str) -> Result<DrainedQueue> {
    let queue: RawQueue = serde_json::from_str(raw).context("Malformed capture queue")?;

    let mut events = Vec::with_capacity(queue.events.len());
    for (i, entry) in queue.events.into_iter().enumerate() {
        match serde_json::from_value::<DomEvent>(entry) {
            Ok(event) => events.push(event),
            Err(e) => warn!("Dropping unreadable capture entry #{}: {}", i + 1, e),
        }
    }

    Ok(DrainedQueue {
        events,
        dropped: queue.dropped,
    })
}

/// Web browser type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BrowserType {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl FromStr for BrowserType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "chromium" | "chrome" => Ok(BrowserType::Chromium),
            "firefox" => Ok(BrowserType::Firefox),
            "webkit" | "safari" => Ok(BrowserType::Webkit),
            other => anyhow::bail!(
                "Unknown browser '{}' (expected chromium, firefox or webkit)",
                other
            ),
        }
    }
}

impl fmt::Display for BrowserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BrowserType::Chromium => "chromium",
            BrowserType::Firefox => "firefox",
            BrowserType::Webkit => "webkit",
        };
        write!(f, "{}", name)
    }
}

/// Web Driver configuration
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub browser_type: BrowserType,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// How often the page is polled for captured events while recording
    pub poll_interval_ms: u64,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            browser_type: BrowserType::Chromium,
            headless: false,
            viewport_width: 1280,
            viewport_height: 720,
            poll_interval_ms: 200,
        }
    }
}

impl From<&Config> for WebDriverConfig {
    fn from(config: &Config) -> Self {
        Self {
            browser_type: config.browser,
            headless: config.headless,
            poll_interval_ms: config.poll_interval_ms,
            ..Default::default()
        }
    }
}

/// Web Driver using Playwright
pub struct WebDriver {
    #[allow(dead_code)]
    playwright: Arc<Playwright>,
    browser: Arc<Browser>,
    context: Arc<BrowserContext>,
    page: Arc<Mutex<Page>>,
    config: WebDriverConfig,
    /// Last main-frame URL seen, so polling only reports changes
    last_url: Arc<Mutex<Option<String>>>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl WebDriver {
    /// Launch a browser and open one page
    pub async fn new(config: WebDriverConfig) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;

        let browser = match config.browser_type {
            BrowserType::Chromium => launch_chromium_browser(&playwright.chromium(), &config).await?,
            BrowserType::Firefox => {
                playwright
                    .firefox()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
            BrowserType::Webkit => {
                playwright
                    .webkit()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
        };

        let context = browser.context_builder().build().await?;
        let page = context.new_page().await?;
        page.set_viewport_size(Viewport {
            width: config.viewport_width as i32,
            height: config.viewport_height as i32,
        })
        .await?;

        Ok(Self {
            playwright: Arc::new(playwright),
            browser: Arc::new(browser),
            context: Arc::new(context),
            page: Arc::new(Mutex::new(page)),
            config,
            last_url: Arc::new(Mutex::new(None)),
            poller: Mutex::new(None),
        })
    }
}

#[async_trait]
impl BrowserDriver for WebDriver {
    fn name(&self) -> &str {
        match self.config.browser_type {
            BrowserType::Chromium => "chromium",
            BrowserType::Firefox => "firefox",
            BrowserType::Webkit => "webkit",
        }
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.goto_builder(url)
            .goto()
            .await
            .with_context(|| format!("Failed to navigate to {}", url))?;

        // The operator didn't cause this load; don't report it back
        let current = page.url().unwrap_or_else(|_| url.to_string());
        *self.last_url.lock().await = Some(current);
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.click_builder(selector)
            .click()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to click: {}. Error: {:?}", selector, e))?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.fill_builder(selector, value)
            .fill()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fill: {}. Error: {:?}", selector, e))?;
        Ok(())
    }

    async fn subscribe(&self, sink: EventSink) -> Result<()> {
        let mut poller = self.poller.lock().await;
        if poller.is_some() {
            anyhow::bail!("Already subscribed to browser events");
        }

        // Applies to every document loaded from here on
        self.context
            .add_init_script(CAPTURE_SCRIPT)
            .await
            .context("Failed to install capture script")?;

        let page = self.page.clone();
        let last_url = self.last_url.clone();
        let interval = Duration::from_millis(self.config.poll_interval_ms.max(10));

        *poller = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if sink.is_closed() {
                    break;
                }

                let page = page.lock().await;

                // Drain before checking the URL so a click that caused a
                // navigation is reported ahead of it
                match page.evaluate::<(), String>(DRAIN_SCRIPT, ()).await {
                    Ok(raw) => match decode_queue(&raw) {
                        Ok(drained) => {
                            if drained.dropped > 0 {
                                warn!(
                                    "{} interaction(s) were lost because page storage is full",
                                    drained.dropped
                                );
                            }
                            for event in drained.events {
                                if sink.send(DriverEvent::Dom(event)).is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => warn!("{:#}", e),
                    },
                    Err(e) => debug!("Capture queue not readable yet: {:?}", e),
                }

                let url = match page.url() {
                    Ok(url) => url,
                    Err(e) => {
                        debug!("Page is gone, stopping event polling: {:?}", e);
                        break;
                    }
                };
                drop(page);

                if url == "about:blank" {
                    continue;
                }

                let mut last = last_url.lock().await;
                match last.as_deref() {
                    Some(previous) if previous == url => {}
                    Some(_) => {
                        *last = Some(url.clone());
                        if sink.send(DriverEvent::Navigation { url }).is_err() {
                            return;
                        }
                    }
                    None => *last = Some(url),
                }
            }
        }));

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(handle) = self.poller.lock().await.take() {
            handle.abort();
        }
        self.browser
            .close()
            .await
            .context("Failed to close browser")?;
        Ok(())
    }
}

/// Launch Chromium, preferring an installed Chrome over Playwright's download
async fn launch_chromium_browser(
    chromium: &playwright::api::BrowserType,
    config: &WebDriverConfig,
) -> Result<Browser> {
    let mut launcher = chromium.launcher();
    launcher = launcher.headless(config.headless);

    let env_path = std::env::var("PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH")
        .ok()
        .map(std::path::PathBuf::from);
    let system_path = find_system_browser();

    if let Some(ref path) = env_path {
        println!("{} Using browser from env: {}", "🌐".blue(), path.display());
        launcher = launcher.executable(path);
    } else if let Some(ref path) = system_path {
        println!(
            "{} Using discovered browser: {}",
            "🌐".blue(),
            path.display()
        );
        launcher = launcher.executable(path);
    } else {
        debug!("No system browser found, using Playwright's bundled Chromium");
    }

    let args: Vec<String> = [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    launcher = launcher.args(&args);

    launcher
        .launch()
        .await
        .context("Failed to launch Chromium")
}

fn find_system_browser() -> Option<std::path::PathBuf> {
    let common_paths = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
    ];

    common_paths
        .iter()
        .map(std::path::Path::new)
        .find(|p| p.exists())
        .map(|p| p.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_browser_type_parsing() {
        assert_eq!("Chromium".parse::<BrowserType>().unwrap(), BrowserType::Chromium);
        assert_eq!("firefox".parse::<BrowserType>().unwrap(), BrowserType::Firefox);
        assert_eq!(" webkit ".parse::<BrowserType>().unwrap(), BrowserType::Webkit);
        assert!("netscape".parse::<BrowserType>().is_err());
        assert_eq!(BrowserType::Firefox.to_string(), "firefox");
    }

    fn flat_page() -> serde_json::Value {
        json!([
            {"tag": "html", "attributes": {}},
            {"tag": "head", "attributes": {}, "parent": 0},
            {"tag": "body", "attributes": {}, "parent": 0},
            {"tag": "input", "attributes": {"id": "q"}, "parent": 2}
        ])
    }

    #[test]
    fn test_queue_entries_decode_as_dom_events() {
        let raw = json!({
            "events": [{"type": "input", "target": [1, 0], "content": "abc", "document": flat_page()}],
            "dropped": 0
        })
        .to_string();

        let drained = decode_queue(&raw).unwrap();
        assert_eq!(drained.events.len(), 1);
        assert_eq!(drained.events[0].target.indices(), &[1, 0]);
        assert_eq!(drained.events[0].content, "abc");
        assert_eq!(drained.dropped, 0);
    }

    #[test]
    fn test_unreadable_entry_does_not_drop_the_batch() {
        let raw = json!({
            "events": [
                {"type": "click", "target": [1, 0], "content": "Go", "document": flat_page()},
                {"type": "hover", "target": [1, 0], "document": flat_page()},
                {"type": "input", "target": [1, 0], "content": "x", "document": []}
            ],
            "dropped": 2
        })
        .to_string();

        let drained = decode_queue(&raw).unwrap();
        assert_eq!(drained.events.len(), 1);
        assert_eq!(drained.events[0].content, "Go");
        assert_eq!(drained.dropped, 2);
    }

    #[test]
    fn test_deeply_nested_page_is_decoded() {
        let depth = 200;
        let mut nodes = vec![json!({"tag": "html"}), json!({"tag": "body", "parent": 0})];
        for i in 0..depth {
            nodes.push(json!({"tag": "div", "parent": i + 1}));
        }
        let mut target = vec![0];
        target.extend(std::iter::repeat(0).take(depth));
        let raw = json!({
            "events": [{"type": "click", "target": target, "content": "", "document": nodes}]
        })
        .to_string();

        let drained = decode_queue(&raw).unwrap();
        assert_eq!(drained.events.len(), 1);
        assert_eq!(drained.events[0].target.indices().len(), depth + 1);
    }

    #[test]
    fn test_malformed_queue_is_an_error() {
        assert!(decode_queue("not json").is_err());
        assert!(decode_queue("{}").unwrap().events.is_empty());
    }

    #[test]
    fn test_config_carries_browser_settings() {
        let config = Config {
            headless: true,
            browser: BrowserType::Webkit,
            poll_interval_ms: 50,
            ..Config::default()
        };
        let web = WebDriverConfig::from(&config);
        assert!(web.headless);
        assert_eq!(web.browser_type, BrowserType::Webkit);
        assert_eq!(web.poll_interval_ms, 50);
        assert_eq!(web.viewport_width, 1280);
    }
}
