//! Step registry: maps a step type tag to a factory.
//!
//! Configuration names steps by tag (`type = "shell"`); the registry turns each
//! [`StepDefinition`] into a runnable step. Unknown tags are configuration errors.

use super::env::{EnvStep, EnvStepConfig};
use super::shell::{ShellStep, ShellStepConfig};
use super::{Step, StepList, StepListKind};
use crate::config::StepDefinition;
use crate::errors::ConfigError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a step from its definition.
pub type StepFactory =
    Arc<dyn Fn(&StepDefinition) -> Result<Arc<dyn Step>, ConfigError> + Send + Sync>;

/// Known step types.
#[derive(Clone, Default)]
pub struct StepRegistry {
    factories: BTreeMap<String, StepFactory>,
}

impl StepRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the `shell` and `env` step types.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("shell", |def: &StepDefinition| {
            let config: ShellStepConfig = def.settings()?;
            let step = match &def.description {
                Some(desc) => ShellStep::new(config).with_name(desc.clone()),
                None => ShellStep::new(config),
            };
            Ok(Arc::new(step) as Arc<dyn Step>)
        });
        registry.register("env", |def: &StepDefinition| {
            let config: EnvStepConfig = def.settings()?;
            let step = match &def.description {
                Some(desc) => EnvStep::new(config).with_name(desc.clone()),
                None => EnvStep::new(config),
            };
            Ok(Arc::new(step) as Arc<dyn Step>)
        });
        registry
    }

    /// Register a factory. A later registration for the same tag replaces the earlier one.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&StepDefinition) -> Result<Arc<dyn Step>, ConfigError> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered tags, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build one step.
    pub fn create(&self, definition: &StepDefinition) -> Result<Arc<dyn Step>, ConfigError> {
        let factory =
            self.factories
                .get(&definition.kind)
                .ok_or_else(|| ConfigError::UnknownStepType {
                    kind: definition.kind.clone(),
                    known: self.kinds().join(", "),
                })?;
        factory(definition)
    }

    /// Build a list, preserving the configured order.
    pub fn create_list(
        &self,
        kind: StepListKind,
        definitions: &[StepDefinition],
    ) -> Result<StepList, ConfigError> {
        let steps = definitions
            .iter()
            .map(|def| self.create(def))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StepList::new(kind, steps))
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::testing::ScriptedStep;

    fn definition(toml_src: &str) -> StepDefinition {
        toml::from_str(toml_src).unwrap()
    }

    #[test]
    fn test_builtin_kinds() {
        let registry = StepRegistry::with_builtin();
        assert_eq!(registry.kinds(), vec!["env", "shell"]);
    }

    #[test]
    fn test_create_shell_step_uses_description_as_name() {
        let registry = StepRegistry::with_builtin();
        let def = definition(
            r#"
type = "shell"
command = "make"
description = "Compile"
"#,
        );
        let step = registry.create(&def).unwrap();
        assert_eq!(step.name(), "Compile");
    }

    #[test]
    fn test_unknown_kind_lists_known_kinds() {
        let registry = StepRegistry::with_builtin();
        let def = definition(r#"type = "ant""#);
        match registry.create(&def) {
            Err(ConfigError::UnknownStepType { kind, known }) => {
                assert_eq!(kind, "ant");
                assert_eq!(known, "env, shell");
            }
            other => panic!("Expected UnknownStepType, got {:?}", other.map(|s| s.name().to_string())),
        }
    }

    #[test]
    fn test_invalid_settings_are_reported() {
        let registry = StepRegistry::with_builtin();
        let def = definition(r#"type = "shell""#);
        assert!(matches!(
            registry.create(&def),
            Err(ConfigError::InvalidStep { .. })
        ));
    }

    #[test]
    fn test_custom_factory() {
        let mut registry = StepRegistry::new();
        registry.register("noop", |_def: &StepDefinition| {
            Ok(Arc::new(ScriptedStep::ok("noop")) as Arc<dyn Step>)
        });
        let list = registry
            .create_list(
                StepListKind::Post,
                &[definition(r#"type = "noop""#), definition(r#"type = "noop""#)],
            )
            .unwrap();
        assert_eq!(list.kind(), StepListKind::Post);
        assert_eq!(list.names(), vec!["noop", "noop"]);
    }
}
