//! One build of the job: `extrasteps run`.

use anyhow::{Context, Result};
use std::path::Path;

use super::super::Cli;

pub async fn cmd_run(
    cli: &Cli,
    project_dir: &Path,
    build_number: Option<u64>,
    command: &[String],
) -> Result<()> {
    use extrasteps::BuildSession;
    use extrasteps::config::ExtraStepsToml;
    use extrasteps::init::{get_extrasteps_dir, next_build_number};
    use extrasteps::outcome::BuildOutcome;
    use extrasteps::session::{BuildReport, CommandBuild};
    use extrasteps::step::{BuildContext, LaunchContext, StepRegistry};
    use extrasteps::ui::ConsoleSink;
    use tokio_util::sync::CancellationToken;

    let project_dir = project_dir
        .canonicalize()
        .context("Failed to resolve project directory")?;
    let toml = ExtraStepsToml::load_or_default(&get_extrasteps_dir(&project_dir))?;
    let hook = toml.build_hook(&StepRegistry::with_builtin())?;

    let main = if command.is_empty() {
        toml.main_build().context(
            "No build command. Set [build] command in extrasteps.toml or pass one after `--`",
        )?
    } else {
        CommandBuild::new(command.join(" "))
            .with_unstable_exit_codes(toml.build.unstable_exit_codes.clone())
    };

    let number = build_number.unwrap_or_else(|| next_build_number(&project_dir));
    let mut build = BuildContext::new(toml.job_name(&project_dir), number, &project_dir);

    let cancel = CancellationToken::new();
    let launch = LaunchContext::new(&project_dir).with_cancellation(cancel.clone());
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling build");
            cancel.cancel();
        }
    });

    let sink = ConsoleSink::new(cli.ui.parse().unwrap_or_default(), cli.verbose);
    tracing::info!(job = build.job_name(), build = number, command = main.command(), "build starting");
    let result = BuildSession::new(&hook, &sink)
        .run(&mut build, &launch, &main)
        .await;
    interrupt.abort();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            write_report(&project_dir, &BuildReport::stopped(&build, &e))?;
            return Err(e.into());
        }
    };
    write_report(&project_dir, &report)?;

    sink.summary(report.outcome, report.post.is_success());
    let outcome = report.outcome;
    report.into_result()?;

    if outcome.is_worse_than(BuildOutcome::Unstable) {
        anyhow::bail!("Build finished with result {}", outcome);
    }
    Ok(())
}

/// Record the build under `.extrasteps/reports/`. Every build, finished or
/// not, consumes its number.
fn write_report(project_dir: &Path, report: &extrasteps::session::BuildReport) -> Result<()> {
    use extrasteps::init::{report_path, reports_dir};

    let reports = reports_dir(project_dir);
    std::fs::create_dir_all(&reports)
        .with_context(|| format!("Failed to create reports directory: {}", reports.display()))?;
    let path = report_path(project_dir, report.number);
    let json = serde_json::to_string_pretty(report).context("Failed to serialize build report")?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write build report: {}", path.display()))
}
