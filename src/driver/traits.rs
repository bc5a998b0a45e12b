use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::recorder::dom::{Document, NodePath};

/// Kind of DOM interaction the page reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomEventKind {
    Click,
    Input,
}

/// One DOM interaction captured in the page
///
/// The target is identified by its child-index path in `document`, the
/// snapshot taken when the event fired. `content` is the element's visible
/// text for clicks and its current value for inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomEvent {
    #[serde(rename = "type")]
    pub kind: DomEventKind,
    pub target: NodePath,
    #[serde(default)]
    pub content: String,
    pub document: Document,
}

/// Events a driver pushes while a recording is running
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    Dom(DomEvent),
    /// The main frame moved to a new URL
    Navigation { url: String },
}

/// Where a driver delivers events once subscribed
pub type EventSink = mpsc::UnboundedSender<DriverEvent>;

/// Browser session interface
///
/// Covers what recording and replay need from a browser: driving the page and,
/// when recording, reporting what the operator does in it. One driver owns one
/// browser session; `close` releases it.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Driver name for console output (e.g. "chromium")
    fn name(&self) -> &str;

    /// Load a URL in the main frame
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Click the element matching a CSS selector
    async fn click(&self, selector: &str) -> Result<()>;

    /// Set the value of the input matching a CSS selector
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Start reporting DOM interactions and main-frame navigations to `sink`.
    /// Nothing is captured before this call. Reporting stops when the sink is
    /// dropped or the session is closed.
    async fn subscribe(&self, sink: EventSink) -> Result<()>;

    /// Close the browser session
    async fn close(&self) -> Result<()>;
}
