use anyhow::{Context, Result};
use clap::Parser;
use extrasteps_migrate::{LEGACY_PLUGIN, MIN_MAVEN_PLUGIN, migrate};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "extrasteps-migrate")]
#[command(version, about = "Move legacy m2-extra-steps wrappers into Maven job builders")]
struct Cli {
    /// Host home directory containing plugins.toml and jobs/
    #[arg(long)]
    home: PathBuf,

    /// Report what would change without writing anything
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("EXTRASTEPS_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let report = migrate(&cli.home, cli.dry_run)
        .with_context(|| format!("Migration failed for {}", cli.home.display()))?;

    if !report.applies() {
        match &report.maven_plugin {
            Some(version) => println!(
                "maven-plugin {} is older than {}; nothing to migrate.",
                version, MIN_MAVEN_PLUGIN
            ),
            None => println!("maven-plugin is not installed; nothing to migrate."),
        }
        return Ok(());
    }

    if report.migrated_jobs.is_empty() {
        println!("No jobs use {}; nothing to migrate.", LEGACY_PLUGIN);
        return Ok(());
    }

    let verb = if cli.dry_run { "Would migrate" } else { "Migrated" };
    println!("{} {} job(s):", verb, report.migrated_jobs.len());
    for job in &report.migrated_jobs {
        println!("  - {}", job);
    }
    if report.plugin_removed {
        println!("{} plugin entry removed.", LEGACY_PLUGIN);
    }
    if report.restart_required && !cli.dry_run {
        println!("Restart required.");
    }

    Ok(())
}
