//! Per-build and per-launch context handed to steps.

use super::StepListKind;
use crate::environment::{EnvVars, EnvironmentContributor};
use crate::outcome::BuildOutcome;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// State of a single build, shared by its pre steps, main build and post steps.
pub struct BuildContext {
    id: Uuid,
    job_name: String,
    number: u64,
    workspace: PathBuf,
    started_at: DateTime<Utc>,
    outcome: Option<BuildOutcome>,
    contributors: Vec<Arc<dyn EnvironmentContributor>>,
    current_list: Option<StepListKind>,
}

impl BuildContext {
    pub fn new(job_name: impl Into<String>, number: u64, workspace: impl AsRef<Path>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_name: job_name.into(),
            number,
            workspace: workspace.as_ref().to_path_buf(),
            started_at: Utc::now(),
            outcome: None,
            contributors: Vec::new(),
            current_list: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Resolve a path against the build workspace.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Current outcome; `None` while it is not yet known.
    pub fn outcome(&self) -> Option<BuildOutcome> {
        self.outcome
    }

    /// Record an outcome. The recorded outcome only ever gets worse.
    pub fn set_outcome(&mut self, outcome: BuildOutcome) {
        self.outcome = Some(match self.outcome {
            Some(current) => current.combine(outcome),
            None => outcome,
        });
    }

    /// The list currently running, if any.
    pub fn current_list(&self) -> Option<StepListKind> {
        self.current_list
    }

    pub(crate) fn set_current_list(&mut self, list: Option<StepListKind>) {
        self.current_list = list;
    }

    /// Register an environment contributor. Contributors apply in registration order.
    pub fn add_environment_contributor(&mut self, contributor: Arc<dyn EnvironmentContributor>) {
        self.contributors.push(contributor);
    }

    pub fn contributor_count(&self) -> usize {
        self.contributors.len()
    }

    /// Variables every build exposes.
    pub fn build_variables(&self) -> EnvVars {
        let mut vars = EnvVars::new();
        vars.insert("BUILD_ID", self.id.to_string());
        vars.insert("BUILD_NUMBER", self.number.to_string());
        vars.insert("JOB_NAME", self.job_name.clone());
        vars.insert("WORKSPACE", self.workspace.display().to_string());
        vars
    }

    /// The merged environment, recomputed from the contributors on every call.
    pub fn environment(&self) -> EnvVars {
        let mut env = self.build_variables();
        for contributor in &self.contributors {
            contributor.contribute(&mut env);
        }
        env
    }
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("id", &self.id)
            .field("job_name", &self.job_name)
            .field("number", &self.number)
            .field("workspace", &self.workspace)
            .field("started_at", &self.started_at)
            .field("outcome", &self.outcome)
            .field("contributors", &self.contributors.len())
            .finish()
    }
}

/// How processes are launched for this build.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    workspace: PathBuf,
    shell: String,
    cancel: CancellationToken,
}

impl LaunchContext {
    pub fn new(workspace: impl AsRef<Path>) -> Self {
        Self {
            workspace: workspace.as_ref().to_path_buf(),
            shell: "sh".to_string(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
