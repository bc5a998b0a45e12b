use super::state::{ReplayStatus, ReplaySummary};
use tokio::sync::broadcast;

/// Replay progress events for real-time output
#[derive(Debug, Clone)]
pub enum ReplayEvent {
    ReplayStarted {
        session_id: String,
        recipe_name: String,
        step_count: usize,
    },
    ReplayFinished {
        status: ReplayStatus,
        summary: ReplaySummary,
    },

    StepStarted {
        index: usize,
        description: String,
    },
    StepPassed {
        index: usize,
        duration_ms: u64,
    },
    StepFailed {
        index: usize,
        error: String,
        duration_ms: u64,
    },
    StepSkipped {
        index: usize,
        reason: String,
    },

    /// Operator-facing message, e.g. a recorded prompt
    Notice { message: String },
    Log { message: String },
}

/// Event emitter for broadcasting replay events
pub struct EventEmitter {
    sender: broadcast::Sender<ReplayEvent>,
}

impl EventEmitter {
    pub fn emit(&self, event: ReplayEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReplayEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }
}

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    /// Print events until the channel closes or the replay finishes
    pub async fn listen(mut receiver: broadcast::Receiver<ReplayEvent>) {
        use colored::Colorize;
        use indicatif::ProgressDrawTarget;
        use std::io::IsTerminal;

        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            // Piped output: no escape codes
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let mut spinner: Option<ProgressBar> = None;
        let mut step_text = String::new();
        let mut step_count = 0;

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                ReplayEvent::ReplayStarted {
                    session_id,
                    recipe_name,
                    step_count: count,
                } => {
                    step_count = count;
                    println!(
                        "\n{} Running recipe: {} ({} steps, session {})",
                        "🚀".green(),
                        recipe_name.white().bold(),
                        count,
                        session_id.cyan()
                    );
                }

                ReplayEvent::StepStarted { index, description } => {
                    let pb = multi.add(ProgressBar::new_spinner());
                    if let Ok(style) = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("    {spinner} {msg}")
                    {
                        pb.set_style(style);
                    }

                    step_text = format!("Step {}/{}: {} ", index + 1, step_count, description.dimmed());
                    pb.set_message(step_text.clone());
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                }

                ReplayEvent::StepPassed { duration_ms, .. } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {}({}ms)", "✓".green(), step_text, duration_ms);
                }

                ReplayEvent::StepFailed {
                    error, duration_ms, ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {}({}ms)", "✗".red(), step_text, duration_ms);
                    println!("      {}", error.red());
                }

                ReplayEvent::StepSkipped { index, reason } => {
                    println!(
                        "    {} Step {}/{} ({})",
                        "○".yellow(),
                        index + 1,
                        step_count,
                        reason.dimmed()
                    );
                }

                ReplayEvent::Notice { message } => {
                    multi
                        .println(format!("      {} {}", "🛑".magenta(), message.magenta()))
                        .ok();
                }

                ReplayEvent::Log { message } => {
                    multi.println(format!("      {}", message)).ok();
                }

                ReplayEvent::ReplayFinished { status, summary } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    match status {
                        ReplayStatus::Passed => {
                            println!("\n{} Recipe finished successfully", "✅".green())
                        }
                        _ => println!("\n{} Recipe failed", "❌".red()),
                    }
                    println!(
                        "  {} passed, {} failed, {} skipped",
                        summary.passed.to_string().green(),
                        summary.failed.to_string().red(),
                        summary.skipped.to_string().yellow()
                    );
                    if let Some(duration) = summary.total_duration_ms {
                        println!("  Duration: {}ms", duration);
                    }
                    break;
                }
            }
        }
    }
}
