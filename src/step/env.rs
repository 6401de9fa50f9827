//! Step that attaches fixed environment entries to the build.

use super::{BuildContext, EventSink, LaunchContext, Step, StepEvent};
use crate::environment::{EnvVars, StaticEnvironment};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Settings of an `env` step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvStepConfig {
    #[serde(default)]
    pub vars: EnvVars,
}

/// Makes `vars` visible to every later step and to the main build.
#[derive(Debug, Clone)]
pub struct EnvStep {
    name: String,
    vars: EnvVars,
}

impl EnvStep {
    pub fn new(config: EnvStepConfig) -> Self {
        let keys: Vec<&str> = config.vars.iter().map(|(k, _)| k.as_str()).collect();
        let name = format!("env: {}", keys.join(", "));
        Self {
            name,
            vars: config.vars,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl Step for EnvStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        build: &mut BuildContext,
        _launch: &LaunchContext,
        events: &dyn EventSink,
    ) -> Result<bool> {
        build.add_environment_contributor(Arc::new(StaticEnvironment(self.vars.clone())));
        events.emit(StepEvent::message(format!(
            "{}: exported {} variable(s)",
            self.name,
            self.vars.len()
        )));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::NullSink;

    #[tokio::test]
    async fn test_env_step_exports_vars() {
        let step = EnvStep::new(EnvStepConfig {
            vars: [("DEPLOY_TARGET", "staging")].into_iter().collect(),
        });
        let mut build = BuildContext::new("job", 1, "/tmp");
        let launch = LaunchContext::new("/tmp");

        assert!(step.prepare(&mut build, &NullSink).await.unwrap());
        assert!(step.execute(&mut build, &launch, &NullSink).await.unwrap());

        assert_eq!(build.environment().get("DEPLOY_TARGET"), Some("staging"));
        assert_eq!(step.name(), "env: DEPLOY_TARGET");
    }
}
