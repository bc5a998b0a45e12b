//! Recording sessions
//!
//! [`RecordingSession`] is the capture state machine: it turns driver events
//! and operator commands into steps. [`Recorder`] drives a browser session
//! around it and saves the result.

use anyhow::{Context, Result};
use colored::Colorize;
use log::{debug, warn};
use std::path::PathBuf;
use tokio::sync::mpsc;

use super::commands::ControlCommand;
use super::reducer::{collapse_fills, Reducer};
use super::selector::SelectorSynthesizer;
use crate::driver::traits::{BrowserDriver, DomEvent, DomEventKind, DriverEvent};
use crate::recipe::{Action, Recipe, RecipeStore, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Browser open, capturing
    Armed,
    /// Terminal
    Stopped,
}

/// Steps captured by a finished session
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    /// Canonical step sequence
    pub steps: Vec<Step>,
    /// Number of steps submitted before reduction
    pub raw_count: usize,
}

/// Capture state for one recording
#[derive(Debug)]
pub struct RecordingSession {
    state: RecorderState,
    reducer: Reducer,
    steps: Vec<Step>,
    raw_count: usize,
}

impl RecordingSession {
    /// Start capturing. The first step is always the navigation to `start_url`.
    pub fn arm(start_url: &str) -> Self {
        let mut session = Self {
            state: RecorderState::Armed,
            reducer: Reducer::new(),
            steps: Vec::new(),
            raw_count: 0,
        };
        session.submit(Step::navigate(start_url));
        session
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    fn submit(&mut self, step: Step) {
        self.raw_count += 1;
        if let Some(emitted) = self.reducer.submit(step) {
            self.steps.extend(emitted);
        }
    }

    /// Record what the driver reported. Returns the submitted step, `None`
    /// when the event was dropped.
    pub fn handle_driver_event(&mut self, event: DriverEvent) -> Option<Step> {
        if self.state == RecorderState::Stopped {
            debug!("Ignoring driver event after stop: {:?}", event);
            return None;
        }

        let step = match event {
            DriverEvent::Dom(dom) => step_from_dom_event(&dom)?,
            DriverEvent::Navigation { url } => Step::navigate(url),
        };
        self.submit(step.clone());
        Some(step)
    }

    /// Apply an operator command. Returns the inserted step, if any.
    pub fn handle_command(&mut self, command: ControlCommand) -> Option<Step> {
        if self.state == RecorderState::Stopped {
            return None;
        }

        match command {
            ControlCommand::Prompt(message) => {
                let step = Step::prompt(message);
                self.submit(step.clone());
                Some(step)
            }
            ControlCommand::Stop | ControlCommand::Interrupt => {
                self.state = RecorderState::Stopped;
                None
            }
        }
    }

    /// Flush pending fills and run the batch pass
    pub fn finish(mut self) -> Capture {
        self.state = RecorderState::Stopped;
        self.steps.extend(self.reducer.flush());
        Capture {
            steps: collapse_fills(self.steps),
            raw_count: self.raw_count,
        }
    }
}

/// Turn a captured DOM event into a click or fill step
fn step_from_dom_event(event: &DomEvent) -> Option<Step> {
    let selector = match SelectorSynthesizer::new(&event.document).synthesize(&event.target) {
        Some(selector) => selector,
        None => {
            warn!(
                "Dropping {:?} event: target {} is not in its snapshot",
                event.kind, event.target
            );
            return None;
        }
    };

    Some(match event.kind {
        DomEventKind::Click => Step::click(selector, event.content.trim()),
        DomEventKind::Input => Step::fill(selector, event.content.as_str()),
    })
}

/// What the operator supplies before a recording starts
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub name: String,
    pub description: String,
    pub start_url: String,
}

#[derive(Debug)]
pub struct RecordingOutcome {
    pub recipe: Recipe,
    pub raw_count: usize,
    /// Recipes in the store after saving
    pub stored_count: usize,
}

/// Records one recipe through a browser session and appends it to the store
pub struct Recorder<'a> {
    driver: &'a dyn BrowserDriver,
    store_path: PathBuf,
}

impl<'a> Recorder<'a> {
    pub fn new(driver: &'a dyn BrowserDriver, store_path: impl Into<PathBuf>) -> Self {
        Self {
            driver,
            store_path: store_path.into(),
        }
    }

    /// Record until `Stop` or `Interrupt` arrives on `commands` (or it closes),
    /// then save. The browser session is closed on every path.
    pub async fn record(
        &self,
        options: RecordOptions,
        commands: mpsc::UnboundedReceiver<ControlCommand>,
    ) -> Result<RecordingOutcome> {
        if options.name.trim().is_empty() {
            self.close_driver().await;
            anyhow::bail!("Recipe name must not be empty");
        }

        let captured = self.capture(&options, commands).await;
        self.close_driver().await;
        let capture = captured?;

        let recipe = Recipe::new(options.name, options.description, capture.steps)?;
        let stored_count = RecipeStore::append(&self.store_path, recipe.clone())
            .with_context(|| format!("Failed to save recipe '{}'", recipe.name))?;

        Ok(RecordingOutcome {
            recipe,
            raw_count: capture.raw_count,
            stored_count,
        })
    }

    async fn capture(
        &self,
        options: &RecordOptions,
        mut commands: mpsc::UnboundedReceiver<ControlCommand>,
    ) -> Result<Capture> {
        let (sink, mut events) = mpsc::unbounded_channel();
        self.driver
            .subscribe(sink)
            .await
            .context("Failed to listen for browser events")?;

        self.driver
            .navigate(&options.start_url)
            .await
            .with_context(|| format!("Failed to open {}", options.start_url))?;

        let mut session = RecordingSession::arm(&options.start_url);
        report_step(&Step::navigate(options.start_url.as_str()));
        println!(
            "{} Browser opened. Interact with the page, then type 'stop' or ':prompt ...' to continue.",
            "ℹ".cyan()
        );

        while session.state() == RecorderState::Armed {
            tokio::select! {
                biased;

                Some(event) = events.recv() => {
                    if let Some(step) = session.handle_driver_event(event) {
                        report_step(&step);
                    }
                }

                command = commands.recv() => {
                    let command = command.unwrap_or(ControlCommand::Interrupt);

                    // Events that arrived before the command still belong to the recording
                    while let Ok(event) = events.try_recv() {
                        if let Some(step) = session.handle_driver_event(event) {
                            report_step(&step);
                        }
                    }

                    if command == ControlCommand::Interrupt {
                        println!("\n{} Interrupted, saving what was captured", "⚠️".yellow());
                    }
                    if let Some(step) = session.handle_command(command) {
                        report_step(&step);
                    }
                }
            }
        }

        Ok(session.finish())
    }

    async fn close_driver(&self) {
        if let Err(e) = self.driver.close().await {
            warn!("Failed to close {} session: {:#}", self.driver.name(), e);
        }
    }
}

/// Console feedback for a captured step
fn report_step(step: &Step) {
    match &step.action {
        Action::Fill { selector, value } => {
            println!("{} Updated fill: {} → {}", "📝".blue(), selector, value)
        }
        Action::Prompt { message } => {
            println!("{} Added prompt step: {}", "🛑".magenta(), message)
        }
        action => println!("{} Recorded: {}", "📝".blue(), action.describe()),
    }
}
