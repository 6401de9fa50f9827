//! Build steps and the contexts they run in.
//!
//! A [`Step`] is an opaque unit of work with two stages:
//! - `prepare` — a pre-flight check, run for every step of a list first
//! - `execute` — the actual work, run for every step afterwards
//!
//! Either stage can return `Ok(false)` to stop the rest of the list, or `Err`
//! to raise a fault that propagates out of the runner untouched.
//!
//! # Built-in step types
//!
//! | Tag     | Type                | Purpose                                   |
//! |---------|---------------------|-------------------------------------------|
//! | `shell` | [`shell::ShellStep`] | Run a shell command in the workspace      |
//! | `env`   | [`env::EnvStep`]     | Attach environment entries to the build   |
//!
//! More types are added through [`registry::StepRegistry`].

pub mod context;
pub mod env;
pub mod events;
pub mod registry;
pub mod shell;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{BuildContext, LaunchContext};
pub use events::{EventSink, NullSink, RecordingSink, StepEvent};
pub use registry::StepRegistry;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A unit of work in a pre- or post-build list.
#[async_trait]
pub trait Step: Send + Sync {
    /// Name used in logs and events.
    fn name(&self) -> &str;

    /// Pre-flight check. Returning `false` stops the list before any step executes.
    async fn prepare(&self, _build: &mut BuildContext, _events: &dyn EventSink) -> Result<bool> {
        Ok(true)
    }

    /// Perform the step. Returning `false` stops the remaining steps.
    async fn execute(
        &self,
        build: &mut BuildContext,
        launch: &LaunchContext,
        events: &dyn EventSink,
    ) -> Result<bool>;
}

/// Which of the two lists a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepListKind {
    Pre,
    Post,
}

impl StepListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepListKind::Pre => "pre-build",
            StepListKind::Post => "post-build",
        }
    }
}

impl std::fmt::Display for StepListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The two stages every step goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStage {
    Prepare,
    Execute,
}

impl std::fmt::Display for StepStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStage::Prepare => write!(f, "prepare"),
            StepStage::Execute => write!(f, "execute"),
        }
    }
}

/// An ordered, immutable list of steps.
///
/// Cloning is cheap and shares the steps, so a running build can hold its own
/// snapshot while the configuration that produced it is replaced.
#[derive(Clone)]
pub struct StepList {
    kind: StepListKind,
    steps: Arc<[Arc<dyn Step>]>,
}

impl StepList {
    pub fn new(kind: StepListKind, steps: Vec<Arc<dyn Step>>) -> Self {
        Self {
            kind,
            steps: steps.into(),
        }
    }

    pub fn empty(kind: StepListKind) -> Self {
        Self::new(kind, Vec::new())
    }

    pub fn kind(&self) -> StepListKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Step>> {
        self.steps.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }
}

impl std::fmt::Debug for StepList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepList")
            .field("kind", &self.kind)
            .field("steps", &self.names())
            .finish()
    }
}
