//! Typed error hierarchy for extrasteps.
//!
//! Three enums cover the three layers:
//! - `HookError` — failures surfaced by the runner, the hook and the build session
//! - `StepError` — faults raised by the built-in steps while they run
//! - `ConfigError` — configuration that cannot be turned into a hook

use crate::step::{StepListKind, StepStage};
use thiserror::Error;

/// Errors from running step lists around a build.
#[derive(Debug, Error)]
pub enum HookError {
    /// The pre-build list returned `false`. The main build must not start.
    #[error("Pre-build steps failed")]
    PreStepFailure,

    /// The post-build list returned `false`. The main build's result is unaffected.
    #[error("Post-build steps failed")]
    PostStepFailure,

    /// A step raised a fault. Remaining steps in both stages were not invoked.
    #[error("Step '{step}' (#{index} of the {list} list) faulted during {stage}: {source:#}")]
    StepFault {
        list: StepListKind,
        stage: StepStage,
        index: usize,
        step: String,
        #[source]
        source: anyhow::Error,
    },

    /// The launch was cancelled by the host while a list was running.
    #[error("Build interrupted during the {list} list")]
    Interrupted { list: StepListKind },

    /// The launch was cancelled by the host while the main build was running.
    #[error("Build interrupted during the main build")]
    MainBuildInterrupted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HookError {
    /// True for faults, as opposed to soft (boolean) failures.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            HookError::StepFault { .. }
                | HookError::Interrupted { .. }
                | HookError::MainBuildInterrupted
                | HookError::Other(_)
        )
    }
}

/// Faults raised by built-in steps and the command build.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' timed out after {secs} seconds")]
    TimedOut { command: String, secs: u64 },

    #[error("'{command}' was interrupted")]
    Interrupted { command: String },

    #[error("'{command}' was terminated by a signal")]
    Terminated { command: String },
}

/// Errors turning configuration into a runnable hook.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown step type '{kind}'. Registered types: {known}")]
    UnknownStepType { kind: String, known: String },

    #[error("Invalid '{kind}' step: {source}")]
    InvalidStep {
        kind: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Extra build steps are not applicable to '{project_type}' projects")]
    NotApplicable { project_type: String },
}
