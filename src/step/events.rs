//! Events emitted while step lists run.

use super::{StepListKind, StepStage};
use crate::outcome::BuildOutcome;
use crate::policy::ResultThreshold;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Something that happened while running a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepEvent {
    ListStarted {
        list: StepListKind,
        steps: usize,
    },
    StageStarted {
        list: StepListKind,
        stage: StepStage,
        index: usize,
        step: String,
    },
    StageFinished {
        list: StepListKind,
        stage: StepStage,
        index: usize,
        step: String,
        ok: bool,
    },
    /// A line of output from a step or the main build.
    Output {
        source: String,
        line: String,
    },
    ListFinished {
        list: StepListKind,
        ok: bool,
    },
    MainBuildFinished {
        outcome: BuildOutcome,
    },
    PostStepsSkipped {
        threshold: ResultThreshold,
        outcome: Option<BuildOutcome>,
    },
    Message {
        text: String,
    },
}

impl StepEvent {
    pub fn message(text: impl Into<String>) -> Self {
        StepEvent::Message { text: text.into() }
    }

    pub fn output(source: impl Into<String>, line: impl Into<String>) -> Self {
        StepEvent::Output {
            source: source.into(),
            line: line.into(),
        }
    }
}

/// Receives build events. Implementations must tolerate calls from any task.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: StepEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: StepEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<StepEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StepEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Output lines, in order.
    pub fn output_lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StepEvent::Output { line, .. } => Some(line),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: StepEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
