//! Shell command step and the process machinery shared with the main build.
//!
//! Commands run through the launch's shell (`sh -c` by default) with:
//! - the build's merged environment plus `EXTRASTEPS_*` variables
//! - a JSON description of the invocation on stdin
//! - stdout and stderr streamed line by line as `Output` events
//!
//! Exit code 0 means success. Timeouts and host cancellation kill the child
//! and surface as faults, not as `false`.

use super::{BuildContext, EventSink, LaunchContext, Step, StepEvent, StepListKind};
use crate::environment::EnvVars;
use crate::errors::StepError;
use crate::outcome::BuildOutcome;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use uuid::Uuid;

/// Settings of a `shell` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellStepConfig {
    /// Command line passed to the shell.
    pub command: String,
    /// Working directory, relative to the workspace unless absolute.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Kill the command after this many seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Exit code that marks the build unstable instead of failing the step.
    #[serde(default)]
    pub unstable_return: Option<i32>,
}

impl ShellStepConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
            timeout_secs: None,
            unstable_return: None,
        }
    }
}

/// Runs a shell command.
#[derive(Debug, Clone)]
pub struct ShellStep {
    name: String,
    config: ShellStepConfig,
}

impl ShellStep {
    pub fn new(config: ShellStepConfig) -> Self {
        let name = format!("shell: {}", first_line(&config.command));
        Self { name, config }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &ShellStepConfig {
        &self.config
    }

    fn working_dir(&self, build: &BuildContext) -> PathBuf {
        match &self.config.working_dir {
            Some(dir) => build.resolve(dir),
            None => build.workspace().to_path_buf(),
        }
    }
}

/// What a shell step tells the command on stdin.
#[derive(Debug, Serialize)]
struct StepInvocation<'a> {
    job: &'a str,
    build_number: u64,
    build_id: Uuid,
    started_at: DateTime<Utc>,
    list: Option<StepListKind>,
    step: &'a str,
    outcome: Option<BuildOutcome>,
}

#[async_trait]
impl Step for ShellStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn prepare(&self, build: &mut BuildContext, events: &dyn EventSink) -> Result<bool> {
        let dir = self.working_dir(build);
        if !dir.is_dir() {
            events.emit(StepEvent::message(format!(
                "{}: working directory {} does not exist",
                self.name,
                dir.display()
            )));
            return Ok(false);
        }
        Ok(true)
    }

    async fn execute(
        &self,
        build: &mut BuildContext,
        launch: &LaunchContext,
        events: &dyn EventSink,
    ) -> Result<bool> {
        let mut env = build.environment();
        if let Some(list) = build.current_list() {
            env.insert("EXTRASTEPS_LIST", list.as_str());
        }
        env.insert("EXTRASTEPS_STEP", self.name.clone());
        if let Some(outcome) = build.outcome() {
            env.insert("EXTRASTEPS_OUTCOME", outcome.as_str());
        }

        let payload = serde_json::to_string(&StepInvocation {
            job: build.job_name(),
            build_number: build.number(),
            build_id: build.id(),
            started_at: build.started_at(),
            list: build.current_list(),
            step: &self.name,
            outcome: build.outcome(),
        })?;

        let invocation = ShellInvocation {
            source: &self.name,
            command: &self.config.command,
            working_dir: self.working_dir(build),
            env,
            stdin: Some(payload),
            timeout: self.config.timeout_secs.map(Duration::from_secs),
        };

        let code = run_shell(invocation, launch, events).await?;
        tracing::debug!(step = %self.name, exit_code = code, "shell step finished");

        if code == 0 {
            return Ok(true);
        }
        if self.config.unstable_return == Some(code) {
            events.emit(StepEvent::message(format!(
                "{}: exit code {} marks the build unstable",
                self.name, code
            )));
            build.set_outcome(BuildOutcome::Unstable);
            return Ok(true);
        }

        events.emit(StepEvent::message(format!(
            "{}: exited with code {}",
            self.name, code
        )));
        Ok(false)
    }
}

/// A single shell command to run.
pub(crate) struct ShellInvocation<'a> {
    /// Name used as the source of output events.
    pub source: &'a str,
    pub command: &'a str,
    pub working_dir: PathBuf,
    pub env: EnvVars,
    pub stdin: Option<String>,
    pub timeout: Option<Duration>,
}

/// How long to keep reading output after the command has exited.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

enum Ending {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    TimedOut,
}

/// Run a command through the launch's shell and return its exit code.
pub(crate) async fn run_shell(
    invocation: ShellInvocation<'_>,
    launch: &LaunchContext,
    events: &dyn EventSink,
) -> std::result::Result<i32, StepError> {
    let command = invocation.command.to_string();

    let mut child = Command::new(launch.shell())
        .arg("-c")
        .arg(invocation.command)
        .current_dir(&invocation.working_dir)
        .envs(invocation.env.iter())
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| StepError::SpawnFailed {
            command: command.clone(),
            source,
        })?;

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let source = invocation.source;

    let ending = {
        let run = async {
            if let (Some(mut pipe), Some(input)) = (stdin, invocation.stdin.as_deref()) {
                // The command may exit without reading stdin.
                if let Err(e) = pipe.write_all(input.as_bytes()).await
                    && e.kind() != std::io::ErrorKind::BrokenPipe
                {
                    tracing::debug!(error = %e, "failed to write step stdin");
                }
            }
            let output = async {
                let (out, err) = tokio::join!(
                    pump(stdout, source, events),
                    pump(stderr, source, events)
                );
                if let Err(e) = out.and(err) {
                    tracing::debug!(error = %e, "failed to read command output");
                }
            };
            tokio::pin!(output);

            // A background process may inherit the pipes and keep them open
            // after the command itself has exited.
            let mut output_done = false;
            let status = tokio::select! {
                status = child.wait() => status,
                () = &mut output => {
                    output_done = true;
                    child.wait().await
                }
            };
            if !output_done
                && tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut output)
                    .await
                    .is_err()
            {
                tracing::debug!(command = %command, "output still open after exit, detaching");
            }
            status
        };

        let deadline = async {
            match invocation.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            status = run => Ending::Exited(status),
            _ = launch.cancellation().cancelled() => Ending::Cancelled,
            _ = deadline => Ending::TimedOut,
        }
    };

    match ending {
        Ending::Exited(status) => {
            let status = status.map_err(|source| StepError::SpawnFailed {
                command: command.clone(),
                source,
            })?;
            status.code().ok_or(StepError::Terminated { command })
        }
        Ending::Cancelled => {
            let _ = child.kill().await;
            Err(StepError::Interrupted { command })
        }
        Ending::TimedOut => {
            let _ = child.kill().await;
            Err(StepError::TimedOut {
                command,
                secs: invocation.timeout.map(|t| t.as_secs()).unwrap_or_default(),
            })
        }
    }
}

async fn pump<R: AsyncRead + Unpin>(
    reader: Option<R>,
    source: &str,
    events: &dyn EventSink,
) -> std::io::Result<()> {
    let Some(reader) = reader else {
        return Ok(());
    };
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        events.emit(StepEvent::output(source, line));
    }
    Ok(())
}

fn first_line(command: &str) -> &str {
    command.lines().next().unwrap_or("").trim()
}
