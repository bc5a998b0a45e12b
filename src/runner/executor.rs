use anyhow::Result;
use colored::Colorize;
use log::{debug, warn};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{EventEmitter, ReplayEvent};
use super::overrides::{resolve_fill_value, Overrides};
use super::state::{ReplayReport, ReplayState};
use crate::driver::traits::BrowserDriver;
use crate::error::ReplayError;
use crate::recipe::{Action, Recipe, Step};

/// How a step that didn't fail ended
enum StepEffect {
    Done,
    /// Step was not executed but the replay goes on
    Skipped(String),
}

/// Result of one replay: the run report plus the failure, if any
#[derive(Debug)]
pub struct ReplayOutcome {
    pub report: ReplayReport,
    pub result: Result<(), ReplayError>,
}

/// Replays a recipe against one browser session.
///
/// Steps run strictly one after another. The first failing driver call stops
/// the replay. The session is closed exactly once when the replay ends,
/// whichever way it ends.
pub struct ReplayExecutor<'a> {
    driver: &'a dyn BrowserDriver,
    emitter: EventEmitter,
    close_delay: Duration,
}

impl<'a> ReplayExecutor<'a> {
    pub fn new(driver: &'a dyn BrowserDriver) -> Self {
        Self {
            driver,
            emitter: EventEmitter::default(),
            close_delay: Duration::ZERO,
        }
    }

    /// Keep the final page visible for a moment before closing the browser
    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = delay;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReplayEvent> {
        self.emitter.subscribe()
    }

    /// Run every step of `recipe`, then close the session
    pub async fn run(self, recipe: &Recipe, overrides: &Overrides) -> ReplayOutcome {
        let steps = recipe.steps();
        let mut state = ReplayState::new(&Uuid::new_v4().to_string(), &recipe.name, steps);

        self.emitter.emit(ReplayEvent::ReplayStarted {
            session_id: state.session_id.clone(),
            recipe_name: recipe.name.clone(),
            step_count: steps.len(),
        });

        state.start();
        let result = self.run_steps(steps, overrides, &mut state).await;
        state.finish();
        if let Err(ref e) = result {
            state.error = Some(e.to_string());
        }

        self.close_session().await;

        self.emitter.emit(ReplayEvent::ReplayFinished {
            status: state.status.clone(),
            summary: state.summary(),
        });

        ReplayOutcome {
            report: state.to_report(),
            result,
        }
    }

    async fn run_steps(
        &self,
        steps: &[Step],
        overrides: &Overrides,
        state: &mut ReplayState,
    ) -> Result<(), ReplayError> {
        for (i, step) in steps.iter().enumerate() {
            let Some(step_state) = state.step_mut(i) else {
                break;
            };
            step_state.start();

            self.emitter.emit(ReplayEvent::StepStarted {
                index: i,
                description: step.action.describe(),
            });

            match self.execute_step(step, overrides).await {
                Ok(StepEffect::Done) => {
                    step_state.pass();
                    self.emitter.emit(ReplayEvent::StepPassed {
                        index: i,
                        duration_ms: step_state.duration_ms.unwrap_or(0),
                    });
                }
                Ok(StepEffect::Skipped(reason)) => {
                    step_state.skip(reason.clone());
                    self.emitter.emit(ReplayEvent::StepSkipped { index: i, reason });
                }
                Err(e) => {
                    step_state.fail(format!("{:#}", e));
                    self.emitter.emit(ReplayEvent::StepFailed {
                        index: i,
                        error: format!("{:#}", e),
                        duration_ms: step_state.duration_ms.unwrap_or(0),
                    });

                    state.skip_remaining(i, "Previous step failed");
                    return Err(ReplayError::StepFailed {
                        index: i,
                        action: step.action.name().to_string(),
                        source: e,
                    });
                }
            }
        }

        Ok(())
    }

    async fn execute_step(&self, step: &Step, overrides: &Overrides) -> Result<StepEffect> {
        match &step.action {
            Action::Navigate { url } => self.driver.navigate(url).await?,
            Action::Click { selector, .. } => self.driver.click(selector).await?,
            Action::Fill { selector, value } => {
                let value = resolve_fill_value(overrides, selector, value);
                debug!("fill {} with {:?}", selector, value);
                self.driver.fill(selector, value).await?
            }
            Action::Wait { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
            }
            Action::Prompt { message } => {
                self.emitter.emit(ReplayEvent::Notice {
                    message: message.clone(),
                });
            }
            Action::Unrecognized { action, .. } => {
                warn!("Unknown action '{}', skipping", action);
                self.emitter.emit(ReplayEvent::Log {
                    message: format!("{} Unknown action: {}", "⚠️".yellow(), action),
                });
                return Ok(StepEffect::Skipped(format!("unknown action '{}'", action)));
            }
        }
        Ok(StepEffect::Done)
    }

    async fn close_session(&self) {
        if !self.close_delay.is_zero() {
            tokio::time::sleep(self.close_delay).await;
        }
        if let Err(e) = self.driver.close().await {
            warn!("Failed to close {} session: {:#}", self.driver.name(), e);
            self.emitter.emit(ReplayEvent::Log {
                message: format!("{} Failed to close browser: {}", "⚠️".yellow(), e),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{DriverCall, ScriptedDriver};
    use crate::runner::state::{ReplayStatus, StepStatus};
    use serde_json::json;

    fn search_recipe() -> Recipe {
        Recipe::new(
            "search",
            "",
            vec![
                Step::navigate("https://example.test"),
                Step::fill("#q", "abc"),
                Step::click("#submit", "Go"),
            ],
        )
        .unwrap()
    }

    fn overrides(pairs: &[(&str, &str)]) -> Overrides {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_override_replaces_recorded_fill_value() {
        let driver = ScriptedDriver::new();
        let outcome = ReplayExecutor::new(&driver)
            .run(&search_recipe(), &overrides(&[("#q", "override-value")]))
            .await;

        assert!(outcome.result.is_ok());
        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::Navigate("https://example.test".to_string()),
                DriverCall::Fill("#q".to_string(), "override-value".to_string()),
                DriverCall::Click("#submit".to_string()),
            ]
        );
        assert_eq!(driver.close_count(), 1);
        assert_eq!(outcome.report.status, ReplayStatus::Passed);
    }

    #[tokio::test]
    async fn test_empty_overrides_use_recorded_value() {
        let driver = ScriptedDriver::new();
        let outcome = ReplayExecutor::new(&driver)
            .run(&search_recipe(), &Overrides::new())
            .await;

        assert!(outcome.result.is_ok());
        assert!(driver
            .calls()
            .contains(&DriverCall::Fill("#q".to_string(), "abc".to_string())));
    }

    #[tokio::test]
    async fn test_failed_click_stops_replay_and_closes_once() {
        let mut recipe_steps = search_recipe().steps().to_vec();
        recipe_steps.push(Step::fill("#after", "never"));
        recipe_steps.push(Step::navigate("https://example.test/never"));
        let recipe = Recipe::new("search", "", recipe_steps).unwrap();

        let driver = ScriptedDriver::new().failing_on(DriverCall::Click("#submit".to_string()));
        let outcome = ReplayExecutor::new(&driver)
            .run(&recipe, &Overrides::new())
            .await;

        assert_eq!(driver.calls().len(), 3);
        assert_eq!(driver.calls()[2], DriverCall::Click("#submit".to_string()));
        assert_eq!(driver.close_count(), 1);

        match outcome.result {
            Err(ReplayError::StepFailed { index, ref action, .. }) => {
                assert_eq!(index, 2);
                assert_eq!(action, "click");
            }
            ref other => panic!("expected step failure, got {:?}", other),
        }
        assert_eq!(outcome.report.status, ReplayStatus::Failed);
        assert!(matches!(
            outcome.report.steps[3].status,
            StepStatus::Skipped { .. }
        ));
        assert_eq!(outcome.report.summary.skipped, 2);
    }

    #[tokio::test]
    async fn test_failed_navigate_still_closes_session() {
        let driver = ScriptedDriver::new()
            .failing_on(DriverCall::Navigate("https://example.test".to_string()));
        let outcome = ReplayExecutor::new(&driver)
            .run(&search_recipe(), &Overrides::new())
            .await;

        assert!(outcome.result.is_err());
        assert_eq!(driver.calls().len(), 1);
        assert_eq!(driver.close_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_action_and_prompt_do_not_stop_replay() {
        let hover: Step = serde_json::from_value(json!({"action": "hover", "selector": "#menu"}))
            .unwrap();
        let recipe = Recipe::new(
            "mixed",
            "",
            vec![
                Step::prompt("Check the captcha"),
                hover,
                Step::wait(1),
                Step::click("#go", ""),
            ],
        )
        .unwrap();

        let driver = ScriptedDriver::new();
        let outcome = ReplayExecutor::new(&driver)
            .run(&recipe, &Overrides::new())
            .await;

        assert!(outcome.result.is_ok());
        assert_eq!(driver.calls(), vec![DriverCall::Click("#go".to_string())]);
        assert!(matches!(
            outcome.report.steps[1].status,
            StepStatus::Skipped { .. }
        ));
        assert_eq!(outcome.report.summary.passed, 3);
    }

    #[tokio::test]
    async fn test_replay_does_not_capture_interactions() {
        let driver = ScriptedDriver::new();
        let outcome = ReplayExecutor::new(&driver)
            .run(&search_recipe(), &Overrides::new())
            .await;

        assert!(outcome.result.is_ok());
        assert_eq!(driver.subscribe_count(), 0);
    }

    #[tokio::test]
    async fn test_events_are_emitted_in_order() {
        let driver = ScriptedDriver::new();
        let executor = ReplayExecutor::new(&driver);
        let mut receiver = executor.subscribe();
        let recipe = Recipe::new("one", "", vec![Step::prompt("hello")]).unwrap();
        executor.run(&recipe, &Overrides::new()).await;

        let mut kinds = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            kinds.push(match event {
                ReplayEvent::ReplayStarted { .. } => "started",
                ReplayEvent::StepStarted { .. } => "step",
                ReplayEvent::Notice { .. } => "notice",
                ReplayEvent::StepPassed { .. } => "passed",
                ReplayEvent::ReplayFinished { .. } => "finished",
                _ => "other",
            });
        }
        assert_eq!(kinds, vec!["started", "step", "notice", "passed", "finished"]);
    }
}
