//! Step list runner.
//!
//! A list runs in two full passes over the same steps:
//!
//! 1. `prepare` on each step in order, stopping at the first `false`;
//! 2. `execute` on each step in order, stopping at the first `false`.
//!
//! One `should_continue` flag is shared by both passes. If any `prepare`
//! returns `false` the execute pass begins with the flag already cleared, so
//! no step executes at all. The final flag is the list's result.
//!
//! Faults (`Err` from a step, or a cancelled launch) return immediately; no
//! later step is touched in either pass.

use crate::errors::HookError;
use crate::step::{
    BuildContext, EventSink, LaunchContext, Step, StepEvent, StepList, StepListKind, StepStage,
};
use std::sync::Arc;

/// Runs step lists. Holds no state; one runner can serve any number of builds.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepRunner;

impl StepRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run `list` against `build`. Returns `Ok(true)` if every stage of every
    /// step ran and returned `true`.
    pub async fn run(
        &self,
        list: &StepList,
        build: &mut BuildContext,
        launch: &LaunchContext,
        events: &dyn EventSink,
    ) -> Result<bool, HookError> {
        let kind = list.kind();
        tracing::info!(list = %kind, steps = list.len(), "running step list");
        events.emit(StepEvent::ListStarted {
            list: kind,
            steps: list.len(),
        });

        build.set_current_list(Some(kind));
        let result = self.run_passes(list, build, launch, events).await;
        build.set_current_list(None);

        let ok = result?;
        if !ok {
            tracing::warn!(list = %kind, "step list did not complete");
        }
        events.emit(StepEvent::ListFinished { list: kind, ok });
        Ok(ok)
    }

    async fn run_passes(
        &self,
        list: &StepList,
        build: &mut BuildContext,
        launch: &LaunchContext,
        events: &dyn EventSink,
    ) -> Result<bool, HookError> {
        let kind = list.kind();
        let mut should_continue = true;

        for (i, step) in list.iter().enumerate() {
            if !should_continue {
                break;
            }
            should_continue =
                invoke(kind, StepStage::Prepare, i + 1, step, build, launch, events).await?;
        }

        for (i, step) in list.iter().enumerate() {
            if !should_continue {
                break;
            }
            should_continue =
                invoke(kind, StepStage::Execute, i + 1, step, build, launch, events).await?;
        }

        Ok(should_continue)
    }
}

async fn invoke(
    list: StepListKind,
    stage: StepStage,
    index: usize,
    step: &Arc<dyn Step>,
    build: &mut BuildContext,
    launch: &LaunchContext,
    events: &dyn EventSink,
) -> Result<bool, HookError> {
    if launch.is_cancelled() {
        return Err(HookError::Interrupted { list });
    }

    let name = step.name().to_string();
    tracing::debug!(list = %list, %stage, index, step = %name, "invoking step");
    events.emit(StepEvent::StageStarted {
        list,
        stage,
        index,
        step: name.clone(),
    });

    let result = match stage {
        StepStage::Prepare => step.prepare(build, events).await,
        StepStage::Execute => step.execute(build, launch, events).await,
    };

    let ok = result.map_err(|source| HookError::StepFault {
        list,
        stage,
        index,
        step: name.clone(),
        source,
    })?;

    events.emit(StepEvent::StageFinished {
        list,
        stage,
        index,
        step: name,
        ok,
    });
    Ok(ok)
}
