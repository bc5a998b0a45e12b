//! In-memory driver for tests
//!
//! Records every call, can be told to fail on a given call, and replays a
//! scripted list of events once subscribed.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::traits::{BrowserDriver, DriverEvent, EventSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Navigate(String),
    Click(String),
    Fill(String, String),
}

#[derive(Default)]
pub struct ScriptedDriver {
    calls: Mutex<Vec<DriverCall>>,
    fail_on: Option<DriverCall>,
    events: Vec<DriverEvent>,
    subscribe_count: AtomicUsize,
    close_count: AtomicUsize,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call equal to `call`
    pub fn failing_on(mut self, call: DriverCall) -> Self {
        self.fail_on = Some(call);
        self
    }

    /// Events delivered, in order, as soon as someone subscribes
    pub fn with_events(mut self, events: Vec<DriverEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribe_count.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    fn record(&self, call: DriverCall) -> Result<()> {
        let fails = self.fail_on.as_ref() == Some(&call);
        self.calls.lock().unwrap().push(call.clone());
        if fails {
            anyhow::bail!("scripted failure on {:?}", call);
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.record(DriverCall::Navigate(url.to_string()))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.record(DriverCall::Click(selector.to_string()))
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.record(DriverCall::Fill(selector.to_string(), value.to_string()))
    }

    async fn subscribe(&self, sink: EventSink) -> Result<()> {
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        for event in self.events.iter().cloned() {
            let _ = sink.send(event);
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
