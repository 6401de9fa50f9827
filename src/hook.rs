//! Pre/post build hook.
//!
//! A [`BuildHook`] is the per-job configuration: the pre-build list, the
//! post-build list and the [`ResultThreshold`] gating the post list. It is
//! shared by every build of the job and never mutated while builds run.
//!
//! For each build:
//!
//! ```text
//! Idle -> PreRunning -> PreFailed                        (before() errors)
//!                    -> MainRunning                      (before() returns ActiveHook)
//!                       -> PostEval -> Done              (threshold not met)
//!                                   -> PostRunning -> Done
//! ```
//!
//! [`BuildHook::before`] runs the pre list and returns an [`ActiveHook`]
//! holding everything the post phase needs. [`ActiveHook::after`] consumes it,
//! so the post phase can run at most once per build.

use crate::environment::{NodeEnvironmentContribution, NodeProperties, NodePropertySource};
use crate::errors::HookError;
use crate::policy::{ResultThreshold, should_run_post_steps};
use crate::runner::StepRunner;
use crate::step::{BuildContext, EventSink, LaunchContext, StepEvent, StepList, StepListKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where a build is in the hook's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookState {
    Idle,
    PreRunning,
    PreFailed,
    MainRunning,
    PostEval,
    PostRunning,
    Done,
}

/// What happened to the post-build list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// The threshold was not met; the list was not run.
    Skipped,
    /// The list ran and completed.
    Completed,
    /// The list ran and did not complete.
    Failed,
    /// The build stopped before the post phase was evaluated.
    NotReached,
}

impl PostStatus {
    /// Teardown success. A correctly skipped list counts as success.
    pub fn is_success(self) -> bool {
        !matches!(self, PostStatus::Failed)
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostStatus::Skipped => write!(f, "skipped"),
            PostStatus::Completed => write!(f, "completed"),
            PostStatus::Failed => write!(f, "failed"),
            PostStatus::NotReached => write!(f, "not_reached"),
        }
    }
}

/// Pre and post build steps for a job.
#[derive(Clone)]
pub struct BuildHook {
    pre_steps: StepList,
    post_steps: StepList,
    threshold: ResultThreshold,
    node_properties: Arc<dyn NodePropertySource>,
    runner: StepRunner,
}

impl BuildHook {
    pub fn new(pre_steps: StepList, post_steps: StepList, threshold: ResultThreshold) -> Self {
        Self {
            pre_steps,
            post_steps,
            threshold,
            node_properties: Arc::new(NodeProperties::default()),
            runner: StepRunner::new(),
        }
    }

    /// Source of the node environment published to builds once the pre list succeeds.
    pub fn with_node_properties(mut self, source: Arc<dyn NodePropertySource>) -> Self {
        self.node_properties = source;
        self
    }

    pub fn pre_steps(&self) -> &StepList {
        &self.pre_steps
    }

    pub fn post_steps(&self) -> &StepList {
        &self.post_steps
    }

    pub fn threshold(&self) -> &ResultThreshold {
        &self.threshold
    }

    /// Run the pre-build list.
    ///
    /// Returns [`HookError::PreStepFailure`] if the list does not complete; the
    /// caller must not start the main build. Faults propagate unchanged.
    pub async fn before(
        &self,
        build: &mut BuildContext,
        launch: &LaunchContext,
        events: &dyn EventSink,
    ) -> Result<ActiveHook, HookError> {
        let mut states = vec![HookState::Idle, HookState::PreRunning];

        let ok = self
            .runner
            .run(&self.pre_steps, build, launch, events)
            .await?;

        if !ok {
            states.push(HookState::PreFailed);
            tracing::warn!(
                job = build.job_name(),
                build = build.number(),
                states = ?states,
                "pre-build steps failed"
            );
            return Err(HookError::PreStepFailure);
        }

        build.add_environment_contributor(Arc::new(NodeEnvironmentContribution::new(
            self.node_properties.clone(),
        )));
        states.push(HookState::MainRunning);

        Ok(ActiveHook {
            post_steps: self.post_steps.clone(),
            threshold: self.threshold.clone(),
            launch: launch.clone(),
            runner: self.runner,
            states,
        })
    }
}

impl std::fmt::Debug for BuildHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildHook")
            .field("pre_steps", &self.pre_steps)
            .field("post_steps", &self.post_steps)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

/// A hook whose pre list has completed, waiting for the main build to finish.
#[derive(Debug)]
pub struct ActiveHook {
    post_steps: StepList,
    threshold: ResultThreshold,
    launch: LaunchContext,
    runner: StepRunner,
    states: Vec<HookState>,
}

/// Result of the post phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teardown {
    pub status: PostStatus,
    /// Every state the build passed through, in order.
    pub states: Vec<HookState>,
}

impl ActiveHook {
    pub fn state(&self) -> HookState {
        self.states.last().copied().unwrap_or(HookState::Idle)
    }

    pub fn launch(&self) -> &LaunchContext {
        &self.launch
    }

    /// Evaluate the threshold against the build's outcome and run the post
    /// list if it is met.
    pub async fn after(
        mut self,
        build: &mut BuildContext,
        events: &dyn EventSink,
    ) -> Result<Teardown, HookError> {
        self.states.push(HookState::PostEval);
        let outcome = build.outcome();

        if !should_run_post_steps(&self.threshold, outcome) {
            tracing::info!(
                threshold = %self.threshold,
                outcome = ?outcome,
                "post-build steps skipped"
            );
            events.emit(StepEvent::PostStepsSkipped {
                threshold: self.threshold.clone(),
                outcome,
            });
            self.states.push(HookState::Done);
            return Ok(Teardown {
                status: PostStatus::Skipped,
                states: self.states,
            });
        }

        self.states.push(HookState::PostRunning);
        let ok = self
            .runner
            .run(&self.post_steps, build, &self.launch, events)
            .await?;
        self.states.push(HookState::Done);

        Ok(Teardown {
            status: if ok {
                PostStatus::Completed
            } else {
                PostStatus::Failed
            },
            states: self.states,
        })
    }
}

/// Convenience for building a hook straight from steps.
pub fn hook_from_steps(
    pre: Vec<Arc<dyn crate::step::Step>>,
    post: Vec<Arc<dyn crate::step::Step>>,
    threshold: ResultThreshold,
) -> BuildHook {
    BuildHook::new(
        StepList::new(StepListKind::Pre, pre),
        StepList::new(StepListKind::Post, post),
        threshold,
    )
}
