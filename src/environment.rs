//! Environment contribution for builds.
//!
//! A build's environment is assembled from an ordered list of
//! [`EnvironmentContributor`]s, recomputed every time a consumer asks for it.
//! The hook registers a [`NodeEnvironmentContribution`] that overlays the
//! process-wide node properties with those of the node the build runs on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Environment variables with host override semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvVars(BTreeMap<String, String>);

impl EnvVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Apply a single override.
    ///
    /// - an empty value removes the key;
    /// - `NAME+SUFFIX` prepends the value to `NAME`, separated by the platform
    ///   path separator.
    pub fn override_entry(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            self.0.remove(key);
            return;
        }

        if let Some((name, _)) = key.split_once('+')
            && !name.is_empty()
        {
            let merged = match self.0.get(name) {
                Some(existing) if !existing.is_empty() => {
                    format!("{}{}{}", value, path_separator(), existing)
                }
                _ => value.to_string(),
            };
            self.0.insert(name.to_string(), merged);
            return;
        }

        self.0.insert(key.to_string(), value.to_string());
    }

    /// Apply every entry of `other`, last write wins.
    pub fn override_all(&mut self, other: &EnvVars) {
        for (key, value) in other.iter() {
            self.override_entry(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvVars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for EnvVars {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

fn path_separator() -> char {
    if cfg!(windows) { ';' } else { ':' }
}

/// A property attached to the host or to a build node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeProperty {
    /// Environment variables exported to every build on the node.
    EnvVars {
        #[serde(default)]
        env: EnvVars,
    },
    /// Location of a tool installation. Does not contribute to the environment.
    ToolLocation { tool: String, home: String },
}

/// Merge node-level environment overrides.
///
/// Every `EnvVars` property of `global` is applied in order, then those of
/// `node` when a current node exists. Node entries win on conflicts.
pub fn compute_environment_overrides(
    global: &[NodeProperty],
    node: Option<&[NodeProperty]>,
) -> EnvVars {
    let mut env = EnvVars::new();
    let node = node.unwrap_or_default();
    for property in global.iter().chain(node.iter()) {
        if let NodeProperty::EnvVars { env: vars } = property {
            env.override_all(vars);
        }
    }
    env
}

/// Something that adds entries to a build's environment.
pub trait EnvironmentContributor: Send + Sync {
    fn contribute(&self, env: &mut EnvVars);
}

/// Fixed set of entries.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment(pub EnvVars);

impl EnvironmentContributor for StaticEnvironment {
    fn contribute(&self, env: &mut EnvVars) {
        env.override_all(&self.0);
    }
}

/// Where node properties come from at the time they are needed.
pub trait NodePropertySource: Send + Sync {
    /// Properties configured for the whole host.
    fn global_properties(&self) -> Vec<NodeProperty>;

    /// Properties of the node the build runs on; `None` when there is no current node.
    fn node_properties(&self) -> Option<Vec<NodeProperty>>;
}

/// Node properties held in memory. Updates are visible to contributions that
/// were registered before the update.
#[derive(Debug, Default)]
pub struct NodeProperties {
    inner: RwLock<NodePropertiesInner>,
}

#[derive(Debug, Default, Clone)]
struct NodePropertiesInner {
    global: Vec<NodeProperty>,
    node: Option<Vec<NodeProperty>>,
}

impl NodeProperties {
    pub fn new(global: Vec<NodeProperty>, node: Option<Vec<NodeProperty>>) -> Self {
        Self {
            inner: RwLock::new(NodePropertiesInner { global, node }),
        }
    }

    pub fn set_global(&self, global: Vec<NodeProperty>) {
        if let Ok(mut inner) = self.inner.write() {
            inner.global = global;
        }
    }

    pub fn set_node(&self, node: Option<Vec<NodeProperty>>) {
        if let Ok(mut inner) = self.inner.write() {
            inner.node = node;
        }
    }

    fn snapshot(&self) -> NodePropertiesInner {
        self.inner
            .read()
            .map(|inner| inner.clone())
            .unwrap_or_default()
    }
}

impl NodePropertySource for NodeProperties {
    fn global_properties(&self) -> Vec<NodeProperty> {
        self.snapshot().global
    }

    fn node_properties(&self) -> Option<Vec<NodeProperty>> {
        self.snapshot().node
    }
}

/// Contributes the merged node environment, computed on every request.
#[derive(Clone)]
pub struct NodeEnvironmentContribution {
    source: Arc<dyn NodePropertySource>,
}

impl NodeEnvironmentContribution {
    pub fn new(source: Arc<dyn NodePropertySource>) -> Self {
        Self { source }
    }
}

impl std::fmt::Debug for NodeEnvironmentContribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeEnvironmentContribution").finish_non_exhaustive()
    }
}

impl EnvironmentContributor for NodeEnvironmentContribution {
    fn contribute(&self, env: &mut EnvVars) {
        let global = self.source.global_properties();
        let node = self.source.node_properties();
        env.override_all(&compute_environment_overrides(&global, node.as_deref()));
    }
}
