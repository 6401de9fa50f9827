//! `extrasteps init`: create the `.extrasteps/` directory in a project.
//!
//! ```text
//! .extrasteps/
//! ├── extrasteps.toml  # Job configuration
//! └── reports/         # One JSON report per build
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// The name of the configuration directory.
pub const EXTRASTEPS_DIR: &str = ".extrasteps";

/// The name of the configuration file inside [`EXTRASTEPS_DIR`].
pub const CONFIG_FILE: &str = "extrasteps.toml";

const REPORTS_DIR: &str = "reports";

const DEFAULT_CONFIG: &str = r#"# Pre and post build steps for this job.

[job]
# name = "my-app"
project_type = "maven"

[build]
command = "mvn -B verify"
# unstable_exit_codes = [2]

[hook]
# When the post-build steps run: "allCases", "success" or "unstable".
run_if_result = "allCases"

# [[hook.pre_steps]]
# type = "shell"
# command = "./scripts/prepare.sh"

# [[hook.post_steps]]
# type = "shell"
# description = "notify"
# command = "echo build finished"
# timeout_secs = 60

# [[environment.global]]
# type = "env_vars"
# env = { MAVEN_OPTS = "-Xmx1g" }
"#;

#[derive(Debug)]
pub struct InitResult {
    pub extrasteps_dir: PathBuf,
    pub config_file: PathBuf,
    /// False if the directory already existed.
    pub created: bool,
}

/// Initialize `project_dir`. Existing files are left untouched.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let extrasteps_dir = get_extrasteps_dir(project_dir);
    let created = !extrasteps_dir.exists();

    std::fs::create_dir_all(&extrasteps_dir).with_context(|| {
        format!(
            "Failed to create directory: {}",
            extrasteps_dir.display()
        )
    })?;

    let reports_dir = extrasteps_dir.join(REPORTS_DIR);
    std::fs::create_dir_all(&reports_dir).with_context(|| {
        format!(
            "Failed to create reports directory: {}",
            reports_dir.display()
        )
    })?;

    let config_file = extrasteps_dir.join(CONFIG_FILE);
    if !config_file.exists() {
        std::fs::write(&config_file, DEFAULT_CONFIG).with_context(|| {
            format!("Failed to create {}: {}", CONFIG_FILE, config_file.display())
        })?;
    }

    Ok(InitResult {
        extrasteps_dir,
        config_file,
        created,
    })
}

pub fn is_initialized(project_dir: &Path) -> bool {
    config_path(project_dir).exists()
}

pub fn get_extrasteps_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(EXTRASTEPS_DIR)
}

pub fn config_path(project_dir: &Path) -> PathBuf {
    get_extrasteps_dir(project_dir).join(CONFIG_FILE)
}

pub fn reports_dir(project_dir: &Path) -> PathBuf {
    get_extrasteps_dir(project_dir).join(REPORTS_DIR)
}

/// Next build number: one past the highest `build-<n>.json` report.
pub fn next_build_number(project_dir: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(reports_dir(project_dir)) else {
        return 1;
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()?
                .strip_prefix("build-")?
                .strip_suffix(".json")?
                .parse::<u64>()
                .ok()
        })
        .max()
        .map_or(1, |n| n + 1)
}

/// Path of the report for build `number`.
pub fn report_path(project_dir: &Path, number: u64) -> PathBuf {
    reports_dir(project_dir).join(format!("build-{number}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtraStepsToml;
    use crate::step::StepRegistry;
    use tempfile::tempdir;

    #[test]
    fn test_init_project_creates_directory_and_config() {
        let dir = tempdir().unwrap();
        let result = init_project(dir.path()).unwrap();

        assert!(result.created);
        assert_eq!(result.extrasteps_dir, dir.path().join(".extrasteps"));
        assert!(result.config_file.is_file());
        assert!(reports_dir(dir.path()).is_dir());
        assert!(is_initialized(dir.path()));
    }

    #[test]
    fn test_default_config_is_valid() {
        let dir = tempdir().unwrap();
        let result = init_project(dir.path()).unwrap();

        let toml = ExtraStepsToml::load(&result.config_file).unwrap();
        assert!(toml.validate(&StepRegistry::with_builtin()).is_empty());
        assert!(toml.build_hook(&StepRegistry::with_builtin()).is_ok());
    }

    #[test]
    fn test_init_project_is_idempotent() {
        let dir = tempdir().unwrap();
        init_project(dir.path()).unwrap();
        std::fs::write(config_path(dir.path()), "[job]\nname = \"custom\"\n").unwrap();

        let again = init_project(dir.path()).unwrap();
        assert!(!again.created);
        let content = std::fs::read_to_string(config_path(dir.path())).unwrap();
        assert_eq!(content, "[job]\nname = \"custom\"\n");
    }

    #[test]
    fn test_is_initialized_returns_false_for_new_project() {
        let dir = tempdir().unwrap();
        assert!(!is_initialized(dir.path()));
    }

    #[test]
    fn test_next_build_number() {
        let dir = tempdir().unwrap();
        assert_eq!(next_build_number(dir.path()), 1);

        init_project(dir.path()).unwrap();
        assert_eq!(next_build_number(dir.path()), 1);

        std::fs::write(report_path(dir.path(), 3), "{}").unwrap();
        std::fs::write(report_path(dir.path(), 7), "{}").unwrap();
        std::fs::write(reports_dir(dir.path()).join("notes.txt"), "").unwrap();
        assert_eq!(next_build_number(dir.path()), 8);
    }
}
