//! Job configuration read from `.extrasteps/extrasteps.toml`.
//!
//! # Configuration File Format
//!
//! ```toml
//! [job]
//! name = "my-app"
//! project_type = "maven"
//!
//! [build]
//! command = "mvn -B verify"
//! unstable_exit_codes = [2]
//!
//! [hook]
//! run_if_result = "success"    # allCases | success | unstable
//!
//! [[hook.pre_steps]]
//! type = "shell"
//! command = "./scripts/fetch-fixtures.sh"
//!
//! [[hook.post_steps]]
//! type = "shell"
//! description = "publish site"
//! command = "mvn site-deploy"
//! timeout_secs = 600
//!
//! [[environment.global]]
//! type = "env_vars"
//! env = { MAVEN_OPTS = "-Xmx1g" }
//! ```
//!
//! Step definitions are kept as raw tables here; [`StepRegistry`] turns them
//! into steps when the hook is built.

use crate::environment::{NodeProperties, NodeProperty};
use crate::errors::ConfigError;
use crate::hook::BuildHook;
use crate::init::CONFIG_FILE;
use crate::policy::ResultThreshold;
use crate::session::CommandBuild;
use crate::step::{StepListKind, StepRegistry};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Kind of project a job builds. Extra steps only apply to the Maven family.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProjectType {
    #[default]
    Maven,
    MavenModule,
    Freestyle,
    Other(String),
}

impl ProjectType {
    pub fn is_applicable(&self) -> bool {
        matches!(self, ProjectType::Maven | ProjectType::MavenModule)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProjectType::Maven => "maven",
            ProjectType::MavenModule => "maven_module",
            ProjectType::Freestyle => "freestyle",
            ProjectType::Other(s) => s,
        }
    }
}

impl From<String> for ProjectType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "maven" => ProjectType::Maven,
            "maven_module" => ProjectType::MavenModule,
            "freestyle" => ProjectType::Freestyle,
            _ => ProjectType::Other(value),
        }
    }
}

impl From<ProjectType> for String {
    fn from(value: ProjectType) -> Self {
        value.as_str().to_string()
    }
}

impl std::str::FromStr for ProjectType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ProjectType::from(s.to_string()))
    }
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured step: a type tag plus type-specific settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    /// Display name; defaults to one derived from the settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub options: toml::Table,
}

impl StepDefinition {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: None,
            options: toml::Table::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Deserialize the type-specific settings.
    pub fn settings<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        toml::Value::Table(self.options.clone())
            .try_into()
            .map_err(|source| ConfigError::InvalidStep {
                kind: self.kind.clone(),
                source,
            })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSection {
    /// Job name (defaults to the project directory name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub project_type: ProjectType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSection {
    /// Main build command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Exit codes of the main build that mean "unstable" rather than "failed"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unstable_exit_codes: Vec<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookConfig {
    /// Post-step threshold. Absent means "always".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_if_result: Option<ResultThreshold>,
    #[serde(default)]
    pub pre_steps: Vec<StepDefinition>,
    #[serde(default)]
    pub post_steps: Vec<StepDefinition>,
}

impl HookConfig {
    pub fn threshold(&self) -> ResultThreshold {
        self.run_if_result.clone().unwrap_or_default()
    }
}

/// Node properties published to builds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentSection {
    #[serde(default)]
    pub global: Vec<NodeProperty>,
    /// Properties of the node the build runs on. Absent means no current node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<Vec<NodeProperty>>,
}

/// Contents of `extrasteps.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtraStepsToml {
    #[serde(default)]
    pub job: JobSection,
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub hook: HookConfig,
    #[serde(default)]
    pub environment: EnvironmentSection,
}

impl ExtraStepsToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse extrasteps.toml")
    }

    /// Load `extrasteps.toml` from `config_dir`, or the defaults if it does not exist.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize extrasteps.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Job name, falling back to the project directory name.
    pub fn job_name(&self, project_dir: &Path) -> String {
        self.job
            .name
            .clone()
            .or_else(|| {
                project_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "job".to_string())
    }

    /// The configured main build, if any.
    pub fn main_build(&self) -> Option<CommandBuild> {
        self.build.command.as_ref().map(|command| {
            CommandBuild::new(command.clone())
                .with_unstable_exit_codes(self.build.unstable_exit_codes.clone())
        })
    }

    /// Build the job's hook.
    ///
    /// Fails if the project type does not support extra steps or a step
    /// definition cannot be turned into a step.
    pub fn build_hook(&self, registry: &StepRegistry) -> Result<BuildHook, ConfigError> {
        if !self.job.project_type.is_applicable() {
            return Err(ConfigError::NotApplicable {
                project_type: self.job.project_type.to_string(),
            });
        }

        let pre = registry.create_list(StepListKind::Pre, &self.hook.pre_steps)?;
        let post = registry.create_list(StepListKind::Post, &self.hook.post_steps)?;
        let node_properties = NodeProperties::new(
            self.environment.global.clone(),
            self.environment.node.clone(),
        );

        Ok(BuildHook::new(pre, post, self.hook.threshold())
            .with_node_properties(Arc::new(node_properties)))
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self, registry: &StepRegistry) -> Vec<String> {
        let mut warnings = Vec::new();

        if !self.job.project_type.is_applicable() {
            warnings.push(format!(
                "Project type '{}' does not support extra build steps",
                self.job.project_type
            ));
        }

        if let Some(threshold) = &self.hook.run_if_result
            && !threshold.is_recognized()
        {
            warnings.push(format!(
                "Unrecognized run_if_result '{}': post-build steps will never run. \
                 Valid values: allCases, success, unstable",
                threshold
            ));
        }

        match &self.build.command {
            Some(command) if command.trim().is_empty() => {
                warnings.push("[build] command is empty".to_string());
            }
            None => warnings.push(
                "No [build] command configured; pass one after `--` to `extrasteps run`"
                    .to_string(),
            ),
            _ => {}
        }

        for (kind, steps) in [
            (StepListKind::Pre, &self.hook.pre_steps),
            (StepListKind::Post, &self.hook.post_steps),
        ] {
            for (i, def) in steps.iter().enumerate() {
                if let Err(e) = registry.create(def) {
                    warnings.push(format!("{} step #{}: {}", kind, i + 1, e));
                }
            }
        }

        warnings
    }
}
