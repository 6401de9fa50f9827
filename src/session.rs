//! One build of a job: pre list, main build, post list.
//!
//! The session plays the host orchestrator. The hook decides what runs around
//! the main build; the session decides when the main build runs and records
//! its outcome on the build before the post phase is evaluated.

use crate::errors::HookError;
use crate::hook::{BuildHook, HookState, PostStatus};
use crate::outcome::BuildOutcome;
use crate::step::shell::{ShellInvocation, run_shell};
use crate::step::{BuildContext, EventSink, LaunchContext, StepEvent};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The main build a hook wraps.
#[async_trait]
pub trait MainBuild: Send + Sync {
    async fn run(
        &self,
        build: &mut BuildContext,
        launch: &LaunchContext,
        events: &dyn EventSink,
    ) -> Result<BuildOutcome>;
}

/// Main build that runs a shell command.
///
/// Exit code 0 is `Success`, a code listed in `unstable_exit_codes` is
/// `Unstable`, anything else is `Failure`.
#[derive(Debug, Clone)]
pub struct CommandBuild {
    command: String,
    unstable_exit_codes: Vec<i32>,
}

impl CommandBuild {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            unstable_exit_codes: Vec::new(),
        }
    }

    pub fn with_unstable_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.unstable_exit_codes = codes;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn outcome_for(&self, code: i32) -> BuildOutcome {
        if code == 0 {
            BuildOutcome::Success
        } else if self.unstable_exit_codes.contains(&code) {
            BuildOutcome::Unstable
        } else {
            BuildOutcome::Failure
        }
    }
}

#[async_trait]
impl MainBuild for CommandBuild {
    async fn run(
        &self,
        build: &mut BuildContext,
        launch: &LaunchContext,
        events: &dyn EventSink,
    ) -> Result<BuildOutcome> {
        let invocation = ShellInvocation {
            source: "build",
            command: &self.command,
            working_dir: launch.workspace().to_path_buf(),
            env: build.environment(),
            stdin: None,
            timeout: None,
        };
        let code = run_shell(invocation, launch, events).await?;
        Ok(self.outcome_for(code))
    }
}

/// What happened to a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub job: String,
    pub number: u64,
    pub started_at: DateTime<Utc>,
    /// Final outcome recorded on the build. Post steps never change it.
    pub outcome: BuildOutcome,
    pub post: PostStatus,
    /// Hook states in order. Empty when the build stopped with an error.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<HookState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildReport {
    /// Report for a build that stopped with `error` before its post phase.
    ///
    /// Interruptions are `Aborted`; any other error is at least `Failure`.
    pub fn stopped(build: &BuildContext, error: &HookError) -> Self {
        let stop = match error {
            HookError::Interrupted { .. } | HookError::MainBuildInterrupted => {
                BuildOutcome::Aborted
            }
            _ => BuildOutcome::Failure,
        };
        Self {
            job: build.job_name().to_string(),
            number: build.number(),
            started_at: build.started_at(),
            outcome: build.outcome().map_or(stop, |outcome| outcome.combine(stop)),
            post: PostStatus::NotReached,
            states: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    /// Convert a failed post list into [`HookError::PostStepFailure`].
    pub fn into_result(self) -> Result<Self, HookError> {
        if self.post.is_success() {
            Ok(self)
        } else {
            Err(HookError::PostStepFailure)
        }
    }
}

/// Runs builds of one job.
pub struct BuildSession<'a> {
    hook: &'a BuildHook,
    events: &'a dyn EventSink,
}

impl<'a> BuildSession<'a> {
    pub fn new(hook: &'a BuildHook, events: &'a dyn EventSink) -> Self {
        Self { hook, events }
    }

    /// Run one build.
    ///
    /// A failed pre list returns [`HookError::PreStepFailure`] without calling
    /// `main`. A main build error records `Failure` and the post phase is still
    /// evaluated, unless the launch was cancelled.
    pub async fn run(
        &self,
        build: &mut BuildContext,
        launch: &LaunchContext,
        main: &dyn MainBuild,
    ) -> Result<BuildReport, HookError> {
        let active = self.hook.before(build, launch, self.events).await?;

        tracing::info!(job = build.job_name(), build = build.number(), "starting main build");
        match main.run(build, launch, self.events).await {
            Ok(outcome) => build.set_outcome(outcome),
            Err(_) if launch.is_cancelled() => {
                build.set_outcome(BuildOutcome::Aborted);
                return Err(HookError::MainBuildInterrupted);
            }
            Err(e) => {
                tracing::warn!(error = %e, "main build raised an error");
                self.events
                    .emit(StepEvent::message(format!("Main build error: {e:#}")));
                build.set_outcome(BuildOutcome::Failure);
            }
        }

        let outcome = build.outcome().unwrap_or(BuildOutcome::Success);
        self.events.emit(StepEvent::MainBuildFinished { outcome });

        let teardown = active.after(build, self.events).await?;
        tracing::info!(%outcome, post = %teardown.status, "build finished");

        Ok(BuildReport {
            job: build.job_name().to_string(),
            number: build.number(),
            started_at: build.started_at(),
            outcome,
            post: teardown.status,
            states: teardown.states,
            error: None,
        })
    }
}
