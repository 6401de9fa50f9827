//! Integration tests for the extrasteps CLI.
//!
//! Each test drives the binary against a temporary project and checks the
//! files the configured shell steps leave behind.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn extrasteps() -> Command {
    cargo_bin_cmd!("extrasteps")
}

fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Write `.extrasteps/extrasteps.toml` with the given content.
fn write_config(dir: &TempDir, content: &str) {
    let config_dir = dir.path().join(".extrasteps");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("extrasteps.toml"), content).unwrap();
}

fn run(dir: &TempDir) -> assert_cmd::assert::Assert {
    extrasteps()
        .current_dir(dir.path())
        .args(["--ui", "minimal", "run"])
        .assert()
}

const FULL_CYCLE: &str = r#"
[job]
name = "cycle"

[build]
command = "touch main.txt"

[[hook.pre_steps]]
type = "shell"
command = "touch pre.txt"

[[hook.post_steps]]
type = "shell"
command = "touch post.txt"
"#;

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        extrasteps()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("pre- and post-build steps"));
    }

    #[test]
    fn test_version() {
        extrasteps().arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_structure() {
        let dir = create_temp_project();

        extrasteps()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized extrasteps"));

        assert!(dir.path().join(".extrasteps/extrasteps.toml").is_file());
        assert!(dir.path().join(".extrasteps/reports").is_dir());
    }

    #[test]
    fn test_init_idempotent() {
        let dir = create_temp_project();
        extrasteps()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success();

        extrasteps()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already initialized"));
    }

    #[test]
    fn test_project_dir_flag() {
        let dir = create_temp_project();
        extrasteps()
            .arg("--project-dir")
            .arg(dir.path())
            .arg("init")
            .assert()
            .success();
        assert!(dir.path().join(".extrasteps/extrasteps.toml").exists());
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_validate_default_config() {
        let dir = create_temp_project();
        extrasteps()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success();

        extrasteps()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid"));
    }

    #[test]
    fn test_config_validate_reports_unknown_threshold() {
        let dir = create_temp_project();
        write_config(
            &dir,
            "[build]\ncommand = \"true\"\n[hook]\nrun_if_result = \"weekly\"\n",
        );

        extrasteps()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Unrecognized run_if_result 'weekly'"));
    }

    #[test]
    fn test_config_show_lists_steps() {
        let dir = create_temp_project();
        write_config(&dir, FULL_CYCLE);

        extrasteps()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("name = \"cycle\""))
            .stdout(predicate::str::contains("shell: touch pre.txt"))
            .stdout(predicate::str::contains("run_if_result = \"always\""));
    }

    #[test]
    fn test_config_show_prints_canonical_threshold() {
        let dir = create_temp_project();
        write_config(
            &dir,
            "[build]\ncommand = \"true\"\n[hook]\nrun_if_result = \"unstable\"\n",
        );

        extrasteps()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "run_if_result = \"on_unstable_or_better\"",
            ));
    }

    #[test]
    fn test_check_project_types() {
        let dir = create_temp_project();

        extrasteps()
            .current_dir(dir.path())
            .args(["check", "--project-type", "maven"])
            .assert()
            .success()
            .stdout(predicate::str::contains("apply to 'maven'"));

        extrasteps()
            .current_dir(dir.path())
            .args(["check", "--project-type", "freestyle"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not applicable to 'freestyle'"));
    }
}

// =============================================================================
// Builds
// =============================================================================

mod builds {
    use super::*;

    #[test]
    fn test_full_cycle_runs_pre_main_post() {
        let dir = create_temp_project();
        write_config(&dir, FULL_CYCLE);

        run(&dir)
            .success()
            .stdout(predicate::str::contains("Main build: SUCCESS"));

        assert!(dir.path().join("pre.txt").exists());
        assert!(dir.path().join("main.txt").exists());
        assert!(dir.path().join("post.txt").exists());

        let report = fs::read_to_string(dir.path().join(".extrasteps/reports/build-1.json")).unwrap();
        let report: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(report["outcome"], "SUCCESS");
        assert_eq!(report["post"], "completed");
        assert!(report["started_at"].is_string());
    }

    #[test]
    fn test_failed_pre_step_prevents_main_build() {
        let dir = create_temp_project();
        write_config(
            &dir,
            r#"
[build]
command = "touch main.txt"

[[hook.pre_steps]]
type = "shell"
command = "exit 1"

[[hook.post_steps]]
type = "shell"
command = "touch post.txt"
"#,
        );

        run(&dir)
            .failure()
            .stderr(predicate::str::contains("Pre-build steps failed"));

        assert!(!dir.path().join("main.txt").exists());
        assert!(!dir.path().join("post.txt").exists());

        let report = fs::read_to_string(dir.path().join(".extrasteps/reports/build-1.json")).unwrap();
        let report: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(report["outcome"], "FAILURE");
        assert_eq!(report["post"], "not_reached");
        assert_eq!(report["error"], "Pre-build steps failed");

        run(&dir).failure();
        assert!(dir.path().join(".extrasteps/reports/build-2.json").exists());
    }

    #[test]
    fn test_failed_prepare_skips_every_execute() {
        let dir = create_temp_project();
        write_config(
            &dir,
            r#"
[build]
command = "touch main.txt"

[[hook.pre_steps]]
type = "shell"
command = "touch first.txt"

[[hook.pre_steps]]
type = "shell"
command = "true"
working_dir = "does-not-exist"
"#,
        );

        run(&dir).failure();

        assert!(!dir.path().join("first.txt").exists());
        assert!(!dir.path().join("main.txt").exists());
    }

    #[test]
    fn test_on_success_threshold_skips_post_after_failure() {
        let dir = create_temp_project();
        write_config(
            &dir,
            r#"
[build]
command = "touch main.txt; exit 1"

[hook]
run_if_result = "success"

[[hook.post_steps]]
type = "shell"
command = "touch post.txt"
"#,
        );

        run(&dir)
            .failure()
            .stdout(predicate::str::contains("Post-build steps skipped"))
            .stderr(predicate::str::contains("FAILURE"));

        assert!(dir.path().join("main.txt").exists());
        assert!(!dir.path().join("post.txt").exists());
    }

    #[test]
    fn test_unstable_build_runs_post_on_unstable_threshold() {
        let dir = create_temp_project();
        write_config(
            &dir,
            r#"
[build]
command = "exit 2"
unstable_exit_codes = [2]

[hook]
run_if_result = "unstable"

[[hook.post_steps]]
type = "shell"
command = "touch post.txt"
"#,
        );

        run(&dir)
            .success()
            .stdout(predicate::str::contains("Main build: UNSTABLE"));
        assert!(dir.path().join("post.txt").exists());
    }

    #[test]
    fn test_failed_post_step_fails_the_run() {
        let dir = create_temp_project();
        write_config(
            &dir,
            r#"
[build]
command = "touch main.txt"

[[hook.post_steps]]
type = "shell"
command = "exit 3"
"#,
        );

        run(&dir)
            .failure()
            .stdout(predicate::str::contains("Main build: SUCCESS"))
            .stderr(predicate::str::contains("Post-build steps failed"));
        assert!(dir.path().join("main.txt").exists());
    }

    #[test]
    fn test_env_step_reaches_main_build() {
        let dir = create_temp_project();
        write_config(
            &dir,
            r#"
[build]
command = "echo \"$GREETING\" > env.txt"

[[hook.pre_steps]]
type = "env"
vars = { GREETING = "hello" }
"#,
        );

        run(&dir).success();
        let content = fs::read_to_string(dir.path().join("env.txt")).unwrap();
        assert_eq!(content.trim(), "hello");
    }

    #[test]
    fn test_node_environment_reaches_post_steps() {
        let dir = create_temp_project();
        write_config(
            &dir,
            r#"
[build]
command = "true"

[[hook.post_steps]]
type = "shell"
command = "echo \"$TOOL_HOME\" > node.txt"

[[environment.global]]
type = "env_vars"
env = { TOOL_HOME = "/global" }

[[environment.node]]
type = "env_vars"
env = { TOOL_HOME = "/node" }
"#,
        );

        run(&dir).success();
        let content = fs::read_to_string(dir.path().join("node.txt")).unwrap();
        assert_eq!(content.trim(), "/node");
    }

    #[test]
    fn test_trailing_command_overrides_config() {
        let dir = create_temp_project();
        write_config(&dir, FULL_CYCLE);

        extrasteps()
            .current_dir(dir.path())
            .args(["--ui", "minimal", "run", "--", "touch", "override.txt"])
            .assert()
            .success();

        assert!(dir.path().join("override.txt").exists());
        assert!(!dir.path().join("main.txt").exists());
    }

    #[test]
    fn test_build_numbers_increment() {
        let dir = create_temp_project();
        write_config(&dir, FULL_CYCLE);

        run(&dir).success();
        run(&dir).success();

        assert!(dir.path().join(".extrasteps/reports/build-2.json").exists());
    }

    #[test]
    fn test_missing_build_command() {
        let dir = create_temp_project();
        write_config(&dir, "[job]\nname = \"empty\"\n");

        run(&dir)
            .failure()
            .stderr(predicate::str::contains("No build command"));
    }

    #[test]
    fn test_non_maven_project_is_rejected() {
        let dir = create_temp_project();
        write_config(&dir, "[job]\nproject_type = \"freestyle\"\n[build]\ncommand = \"true\"\n");

        run(&dir)
            .failure()
            .stderr(predicate::str::contains("not applicable"));
    }

    #[test]
    fn test_json_ui_emits_events() {
        let dir = create_temp_project();
        write_config(&dir, FULL_CYCLE);

        extrasteps()
            .current_dir(dir.path())
            .args(["--ui", "json", "run"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""type":"list_started""#))
            .stdout(predicate::str::contains(r#""type":"main_build_finished""#));
    }
}
