//! Terminal rendering of [`StepEvent`]s.
//!
//! Three output modes:
//! - `full`: spinner per step list, styled status lines
//! - `minimal`: plain lines, one per event worth reporting
//! - `json`: one JSON object per event, for machine consumption
//!
//! `full` falls back to `minimal` when stdout is not a terminal.

use crate::outcome::BuildOutcome;
use crate::step::{EventSink, StepEvent, StepListKind, StepStage};
use crate::ui::icons::{CHECK, CROSS, HAMMER, RUNNING, SKIPPED, SPARKLE, WARN};
use console::{Term, style};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

/// Output mode for the console sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiMode {
    #[default]
    Full,
    Minimal,
    Json,
}

impl std::str::FromStr for UiMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "minimal" => Self::Minimal,
            _ => Self::Full,
        })
    }
}

/// Renders build events to the terminal.
pub struct ConsoleSink {
    mode: UiMode,
    verbose: bool,
    multi: MultiProgress,
    /// Spinner for the list currently running.
    bar: Mutex<Option<ProgressBar>>,
    term: Term,
}

impl ConsoleSink {
    pub fn new(mode: UiMode, verbose: bool) -> Self {
        let term = Term::stdout();
        let mode = if mode == UiMode::Full && !term.is_term() {
            UiMode::Minimal
        } else {
            mode
        };
        Self {
            mode,
            verbose,
            multi: MultiProgress::new(),
            bar: Mutex::new(None),
            term,
        }
    }

    pub fn mode(&self) -> UiMode {
        self.mode
    }

    fn line(&self, msg: impl AsRef<str>) {
        match self.mode {
            UiMode::Full => {
                if self.multi.println(msg.as_ref()).is_err() {
                    eprintln!("{}", msg.as_ref());
                }
            }
            _ => {
                let _ = writeln!(&self.term, "{}", msg.as_ref());
            }
        }
    }

    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        let mut bar = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut bar);
    }

    fn render_json(&self, event: &StepEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(&self.term, "{}", json);
        }
    }

    fn render_minimal(&self, event: &StepEvent) {
        match event {
            StepEvent::ListStarted { list, steps } if *steps > 0 => {
                self.line(format!("==> {} steps ({})", list, steps));
            }
            StepEvent::StageStarted {
                stage: StepStage::Execute,
                step,
                ..
            } if self.verbose => {
                self.line(format!("--> {}", step));
            }
            StepEvent::StageFinished {
                stage,
                step,
                ok: false,
                ..
            } => {
                self.line(format!("x {} did not complete ({})", step, stage));
            }
            StepEvent::Output { line, .. } => self.line(line),
            StepEvent::ListFinished { list, ok } => {
                let status = if *ok { "completed" } else { "failed" };
                self.line(format!("==> {} steps {}", list, status));
            }
            StepEvent::MainBuildFinished { outcome } => {
                self.line(format!("==> Main build: {}", outcome));
            }
            StepEvent::PostStepsSkipped { threshold, outcome } => {
                self.line(format!(
                    "==> Post-build steps skipped (run_if_result {}, outcome {})",
                    threshold,
                    outcome.map_or("unknown".to_string(), |o| o.to_string())
                ));
            }
            StepEvent::Message { text } => self.line(text),
            _ => {}
        }
    }

    fn render_full(&self, event: &StepEvent) {
        match event {
            StepEvent::ListStarted { list, steps } => self.on_list_started(*list, *steps),
            StepEvent::StageStarted {
                stage, index, step, ..
            } => {
                self.with_bar(|bar| {
                    if let Some(bar) = bar {
                        bar.set_message(format!("{} {}", style(stage).dim(), step));
                    }
                });
                if self.verbose && *stage == StepStage::Execute {
                    self.line(format!("  {}#{} {}", RUNNING, index, style(step).cyan()));
                }
            }
            StepEvent::StageFinished {
                stage, step, ok, ..
            } => {
                self.with_bar(|bar| {
                    if let Some(bar) = bar {
                        bar.inc(1);
                    }
                });
                if !ok {
                    self.line(format!(
                        "  {}{} {} during {}",
                        CROSS,
                        style(step).red().bold(),
                        style("did not complete").red(),
                        stage
                    ));
                }
            }
            StepEvent::Output { line, .. } => {
                self.line(format!("  {} {}", style("│").dim(), line));
            }
            StepEvent::ListFinished { list, ok } => self.on_list_finished(*list, *ok),
            StepEvent::MainBuildFinished { outcome } => {
                self.line(format!(
                    "{}Main build finished: {}",
                    HAMMER,
                    styled_outcome(*outcome)
                ));
            }
            StepEvent::PostStepsSkipped { threshold, outcome } => {
                self.line(format!(
                    "{}Post-build steps skipped {}",
                    SKIPPED,
                    style(format!(
                        "(run_if_result {}, outcome {})",
                        threshold,
                        outcome.map_or("unknown".to_string(), |o| o.to_string())
                    ))
                    .dim()
                ));
            }
            StepEvent::Message { text } => {
                self.line(format!("  {} {}", style("→").dim(), style(text).dim()));
            }
        }
    }

    fn on_list_started(&self, list: StepListKind, steps: usize) {
        if steps == 0 {
            return;
        }
        let bar_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold} {spinner} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        // Two stages per step.
        let bar = self.multi.add(ProgressBar::new(steps as u64 * 2));
        bar.set_style(bar_style);
        bar.set_prefix(list.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        self.with_bar(|current| *current = Some(bar));
    }

    fn on_list_finished(&self, list: StepListKind, ok: bool) {
        let mut had_bar = false;
        self.with_bar(|current| {
            if let Some(bar) = current.take() {
                bar.finish_and_clear();
                had_bar = true;
            }
        });
        if !had_bar {
            return;
        }
        if ok {
            self.line(format!(
                "{}{} steps {}",
                CHECK,
                style(list).green().bold(),
                style("completed").green()
            ));
        } else {
            self.line(format!(
                "{}{} steps {}",
                CROSS,
                style(list).red().bold(),
                style("failed").red()
            ));
        }
    }

    /// Print the closing summary of a build.
    pub fn summary(&self, outcome: BuildOutcome, post_ok: bool) {
        match self.mode {
            UiMode::Json => {}
            UiMode::Minimal => self.line(format!("Build finished: {}", outcome)),
            UiMode::Full => {
                let icon = if post_ok { SPARKLE } else { WARN };
                self.line(format!("{}Build finished: {}", icon, styled_outcome(outcome)));
            }
        }
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: StepEvent) {
        match self.mode {
            UiMode::Json => self.render_json(&event),
            UiMode::Minimal => self.render_minimal(&event),
            UiMode::Full => self.render_full(&event),
        }
    }
}

fn styled_outcome(outcome: BuildOutcome) -> console::StyledObject<&'static str> {
    let text = outcome.as_str();
    match outcome {
        BuildOutcome::Success => style(text).green().bold(),
        BuildOutcome::Unstable => style(text).yellow().bold(),
        _ => style(text).red().bold(),
    }
}
