//! One-shot migration of legacy `m2-extra-steps` wrappers.
//!
//! Newer Maven plugins (2.0 and later) carry pre/post build step support
//! themselves. When such a plugin is installed, every Maven job that still
//! uses the legacy wrapper gets its step lists moved into the job's own
//! `prebuilders` / `postbuilders`, the wrapper is removed, and the legacy
//! plugin is uninstalled.
//!
//! Host layout:
//!
//! ```text
//! <home>/
//! ├── plugins.toml            # [[plugins]] name, version
//! ├── restart-required        # written when a migration happened
//! └── jobs/<job>/config.toml  # project_type, prebuilders, postbuilders, wrappers, ...
//! ```

use extrasteps::config::StepDefinition;
use extrasteps::outcome::BuildOutcome;
use extrasteps::policy::ResultThreshold;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MAVEN_PLUGIN: &str = "maven-plugin";
pub const LEGACY_PLUGIN: &str = "m2-extra-steps";
pub const RESTART_MARKER: &str = "restart-required";

/// First Maven plugin version with built-in extra step support.
pub const MIN_MAVEN_PLUGIN: Version = Version::new(2, 0, 0);

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },

    #[error("Invalid m2-extra-steps wrapper in job '{job}': {source}")]
    InvalidWrapper {
        job: String,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T, E = MigrateError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginsFile {
    #[serde(default)]
    pub plugins: Vec<Plugin>,
}

impl PluginsFile {
    pub fn get(&self, name: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.name == name)
    }

    /// Remove a plugin entry. Returns whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| p.name != name);
        self.plugins.len() != before
    }
}

/// A build wrapper attached to a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wrapper {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub options: toml::Table,
}

/// Settings of the legacy wrapper.
#[derive(Debug, Clone, Default, Deserialize)]
struct LegacyWrapper {
    #[serde(default)]
    run_if_result: Option<String>,
    #[serde(default)]
    pre_steps: Vec<StepDefinition>,
    #[serde(default)]
    post_steps: Vec<StepDefinition>,
}

/// A job's `config.toml`. Keys this tool does not know about are preserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub project_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_post_steps_if_result: Option<BuildOutcome>,
    #[serde(default)]
    pub prebuilders: Vec<StepDefinition>,
    #[serde(default)]
    pub postbuilders: Vec<StepDefinition>,
    #[serde(default)]
    pub wrappers: Vec<Wrapper>,
    #[serde(flatten)]
    pub other: toml::Table,
}

impl JobConfig {
    fn is_maven(&self) -> bool {
        self.project_type == "maven"
    }

    /// Move every legacy wrapper's steps into the job. Returns whether anything moved.
    fn absorb_legacy_wrappers(&mut self, job: &str) -> Result<bool> {
        let mut migrated = false;
        for wrapper in self.wrappers.iter().filter(|w| w.kind == LEGACY_PLUGIN) {
            let legacy: LegacyWrapper = toml::Value::Table(wrapper.options.clone())
                .try_into()
                .map_err(|source| MigrateError::InvalidWrapper {
                    job: job.to_string(),
                    source,
                })?;
            self.prebuilders.extend(legacy.pre_steps);
            self.postbuilders.extend(legacy.post_steps);
            self.run_post_steps_if_result = Some(to_result(legacy.run_if_result.as_deref()));
            migrated = true;
        }
        self.wrappers.retain(|w| w.kind != LEGACY_PLUGIN);
        Ok(migrated)
    }
}

/// Map a legacy `run_if_result` value to the minimum result the Maven plugin expects.
pub fn to_result(run_if_result: Option<&str>) -> BuildOutcome {
    match run_if_result.map(ResultThreshold::parse) {
        Some(ResultThreshold::OnSuccess) => BuildOutcome::Success,
        Some(ResultThreshold::OnUnstableOrBetter) => BuildOutcome::Unstable,
        _ => BuildOutcome::Failure,
    }
}

/// Parse plugin versions such as `2.0`, `1.480.3` or `2.1-beta-1`.
///
/// Missing components default to zero; anything after the first
/// non-numeric component is ignored.
pub fn parse_version(value: &str) -> Option<Version> {
    if let Ok(version) = Version::parse(value) {
        return Some(version);
    }
    let numbers: Vec<u64> = value
        .split(['.', '-'])
        .map_while(|part| part.parse().ok())
        .take(3)
        .collect();
    let (&major, rest) = numbers.split_first()?;
    Some(Version::new(
        major,
        rest.first().copied().unwrap_or(0),
        rest.get(1).copied().unwrap_or(0),
    ))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Installed Maven plugin version, if any.
    pub maven_plugin: Option<Version>,
    /// Jobs whose legacy wrappers were migrated, sorted.
    pub migrated_jobs: Vec<String>,
    pub plugin_removed: bool,
    pub restart_required: bool,
}

impl MigrationReport {
    /// Whether the Maven plugin is recent enough for migration to apply.
    pub fn applies(&self) -> bool {
        self.maven_plugin
            .as_ref()
            .is_some_and(|v| *v >= MIN_MAVEN_PLUGIN)
    }
}

fn read_toml<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| MigrateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| MigrateError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = toml::to_string_pretty(value).map_err(|source| MigrateError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, content).map_err(|source| MigrateError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn job_configs(home: &Path) -> Result<Vec<(String, PathBuf)>> {
    let jobs_dir = home.join("jobs");
    if !jobs_dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(&jobs_dir).map_err(|source| MigrateError::Read {
        path: jobs_dir.clone(),
        source,
    })?;
    let mut jobs: Vec<(String, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let config = entry.path().join("config.toml");
            config
                .is_file()
                .then(|| (entry.file_name().to_string_lossy().into_owned(), config))
        })
        .collect();
    jobs.sort();
    Ok(jobs)
}

/// Run the migration against the host at `home`.
///
/// With `dry_run` nothing is written; the report says what would change.
/// Running again after a migration is a no-op.
pub fn migrate(home: &Path, dry_run: bool) -> Result<MigrationReport> {
    let plugins_path = home.join("plugins.toml");
    let mut plugins: PluginsFile = read_toml(&plugins_path)?;

    let mut report = MigrationReport {
        maven_plugin: plugins
            .get(MAVEN_PLUGIN)
            .and_then(|p| parse_version(&p.version)),
        ..Default::default()
    };

    if !report.applies() {
        tracing::info!(
            maven_plugin = ?report.maven_plugin,
            "maven-plugin is missing or older than {MIN_MAVEN_PLUGIN}, nothing to migrate"
        );
        return Ok(report);
    }

    tracing::info!("migrating legacy {LEGACY_PLUGIN} wrappers into maven-plugin extra steps");
    for (job, path) in job_configs(home)? {
        let mut config: JobConfig = read_toml(&path)?;
        if !config.is_maven() {
            continue;
        }
        if config.absorb_legacy_wrappers(&job)? {
            tracing::info!(job = %job, "migrated");
            if !dry_run {
                write_toml(&path, &config)?;
            }
            report.migrated_jobs.push(job);
        }
    }

    if report.migrated_jobs.is_empty() {
        return Ok(report);
    }

    report.plugin_removed = plugins.remove(LEGACY_PLUGIN);
    report.restart_required = true;
    if !dry_run {
        if report.plugin_removed {
            write_toml(&plugins_path, &plugins)?;
        }
        let marker = home.join(RESTART_MARKER);
        std::fs::write(
            &marker,
            format!("{} job(s) migrated from {LEGACY_PLUGIN}\n", report.migrated_jobs.len()),
        )
        .map_err(|source| MigrateError::Write {
            path: marker.clone(),
            source,
        })?;
    }

    Ok(report)
}
