use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::recipe::Step;

/// Step execution status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Passed,
    Failed { error: String },
    Skipped { reason: String },
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Passed | StepStatus::Failed { .. } | StepStatus::Skipped { .. }
        )
    }
}

/// State for a single step of a replay
#[derive(Debug, Clone)]
pub struct StepState {
    pub index: usize,
    pub action: String,
    pub display: String,
    pub status: StepStatus,
    pub started_at: Option<Instant>,
    pub duration_ms: Option<u64>,
}

impl StepState {
    pub fn new(index: usize, step: &Step) -> Self {
        Self {
            index,
            action: step.action.name().to_string(),
            display: step.action.describe(),
            status: StepStatus::Pending,
            started_at: None,
            duration_ms: None,
        }
    }

    pub fn start(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Instant::now());
    }

    pub fn pass(&mut self) {
        self.finish(StepStatus::Passed);
    }

    pub fn fail(&mut self, error: String) {
        self.finish(StepStatus::Failed { error });
    }

    pub fn skip(&mut self, reason: String) {
        self.status = StepStatus::Skipped { reason };
    }

    fn finish(&mut self, status: StepStatus) {
        self.status = status;
        if let Some(start) = self.started_at {
            self.duration_ms = Some(start.elapsed().as_millis() as u64);
        }
    }

    /// Serializable view (without `Instant`)
    pub fn to_report(&self) -> StepReport {
        StepReport {
            index: self.index,
            action: self.action.clone(),
            display: self.display.clone(),
            status: self.status.clone(),
            duration_ms: self.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub index: usize,
    pub action: String,
    pub display: String,
    pub status: StepStatus,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ReplayStatus {
    Pending,
    Running,
    Passed,
    Failed,
}

/// State for one replay of a recipe
#[derive(Debug, Clone)]
pub struct ReplayState {
    pub session_id: String,
    pub recipe_name: String,
    pub status: ReplayStatus,
    pub steps: Vec<StepState>,
    pub started_at: Option<Instant>,
    pub total_duration_ms: Option<u64>,
    pub error: Option<String>,
}

impl ReplayState {
    pub fn new(session_id: &str, recipe_name: &str, steps: &[Step]) -> Self {
        Self {
            session_id: session_id.to_string(),
            recipe_name: recipe_name.to_string(),
            status: ReplayStatus::Pending,
            steps: steps
                .iter()
                .enumerate()
                .map(|(i, step)| StepState::new(i, step))
                .collect(),
            started_at: None,
            total_duration_ms: None,
            error: None,
        }
    }

    pub fn start(&mut self) {
        self.status = ReplayStatus::Running;
        self.started_at = Some(Instant::now());
    }

    pub fn step_mut(&mut self, index: usize) -> Option<&mut StepState> {
        self.steps.get_mut(index)
    }

    /// Mark every step after `index` that never ran as skipped
    pub fn skip_remaining(&mut self, index: usize, reason: &str) {
        let from = (index + 1).min(self.steps.len());
        for step in &mut self.steps[from..] {
            if matches!(step.status, StepStatus::Pending) {
                step.skip(reason.to_string());
            }
        }
    }

    pub fn finish(&mut self) {
        if let Some(start) = self.started_at {
            self.total_duration_ms = Some(start.elapsed().as_millis() as u64);
        }

        let failed = self
            .steps
            .iter()
            .any(|s| matches!(s.status, StepStatus::Failed { .. }));
        self.status = if failed {
            ReplayStatus::Failed
        } else {
            ReplayStatus::Passed
        };
    }

    pub fn summary(&self) -> ReplaySummary {
        let mut summary = ReplaySummary {
            total_steps: self.steps.len(),
            total_duration_ms: self.total_duration_ms,
            ..Default::default()
        };
        for step in &self.steps {
            match step.status {
                StepStatus::Passed => summary.passed += 1,
                StepStatus::Failed { .. } => summary.failed += 1,
                StepStatus::Skipped { .. } => summary.skipped += 1,
                StepStatus::Pending | StepStatus::Running => {}
            }
        }
        summary
    }

    pub fn to_report(&self) -> ReplayReport {
        ReplayReport {
            session_id: self.session_id.clone(),
            recipe_name: self.recipe_name.clone(),
            status: self.status.clone(),
            steps: self.steps.iter().map(|s| s.to_report()).collect(),
            summary: self.summary(),
            error: self.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub total_steps: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_duration_ms: Option<u64>,
}

/// What gets written by `run --report`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub session_id: String,
    pub recipe_name: String,
    pub status: ReplayStatus,
    pub steps: Vec<StepReport>,
    pub summary: ReplaySummary,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_steps() -> Vec<Step> {
        vec![
            Step::navigate("https://example.test"),
            Step::fill("#q", "abc"),
            Step::click("#submit", "Go"),
        ]
    }

    #[test]
    fn test_failure_skips_rest_and_fails_replay() {
        let mut state = ReplayState::new("s1", "search", &sample_steps());
        state.start();
        state.step_mut(0).unwrap().start();
        state.step_mut(0).unwrap().pass();
        state.step_mut(1).unwrap().start();
        state.step_mut(1).unwrap().fail("boom".to_string());
        state.skip_remaining(1, "previous step failed");
        state.finish();

        assert_eq!(state.status, ReplayStatus::Failed);
        assert!(state.steps.iter().all(|s| s.status.is_terminal()));

        let summary = state.summary();
        assert_eq!(summary.total_steps, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_report_is_camel_case() {
        let mut state = ReplayState::new("s2", "search", &sample_steps());
        state.start();
        for i in 0..3 {
            state.step_mut(i).unwrap().start();
            state.step_mut(i).unwrap().pass();
        }
        state.finish();

        let json = serde_json::to_value(state.to_report()).unwrap();
        assert_eq!(json["sessionId"], "s2");
        assert_eq!(json["recipeName"], "search");
        assert_eq!(json["status"], "passed");
        assert_eq!(json["steps"][1]["display"], "fill #q = \"abc\"");
        assert_eq!(json["steps"][2]["status"]["type"], "passed");
        assert_eq!(json["summary"]["totalSteps"], 3);
    }

    #[test]
    fn test_skip_remaining_after_last_step_is_noop() {
        let mut state = ReplayState::new("s3", "search", &sample_steps());
        state.skip_remaining(2, "nothing left");
        assert!(state
            .steps
            .iter()
            .all(|s| matches!(s.status, StepStatus::Pending)));
    }
}
