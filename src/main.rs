use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "extrasteps")]
#[command(version, about = "Run pre- and post-build steps around a CI build")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Format of diagnostic logs written to stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Progress output: full, minimal or json
    #[arg(long, global = true, default_value = "full")]
    pub ui: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .extrasteps/extrasteps.toml with a default configuration
    Init,
    /// Run one build: pre-build steps, main build, post-build steps
    Run {
        /// Build number (defaults to one past the last recorded build)
        #[arg(long)]
        build_number: Option<u64>,

        /// Main build command, overriding [build] command
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Check whether extra steps apply to a project type
    Check {
        /// Project type to check (defaults to the configured one)
        #[arg(long)]
        project_type: Option<String>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    Show,
    Validate,
}

fn init_tracing(verbose: bool, format: LogFormat) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("EXTRASTEPS_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // A subscriber may already be installed when embedded; keep it.
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Run {
            build_number,
            command,
        } => cmd::cmd_run(&cli, &project_dir, *build_number, command).await?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
        Commands::Check { project_type } => {
            cmd::cmd_check(&project_dir, project_type.as_deref())?
        }
    }

    Ok(())
}
