//! Configuration view and validation commands: `extrasteps config`.

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use extrasteps::config::ExtraStepsToml;
    use extrasteps::environment::compute_environment_overrides;
    use extrasteps::init::config_path;
    use extrasteps::step::StepRegistry;

    let config_path = config_path(project_dir);
    let registry = StepRegistry::with_builtin();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("extrasteps Configuration");
            println!("========================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                ExtraStepsToml::load(&config_path)?
            } else {
                println!("No extrasteps.toml found at {}", config_path.display());
                println!("Using default configuration. Run 'extrasteps init' to create one.");
                ExtraStepsToml::default()
            };
            println!();

            println!("[job]");
            println!("  name = \"{}\"", toml.job_name(project_dir));
            println!("  project_type = \"{}\"", toml.job.project_type);
            println!();

            println!("[build]");
            match &toml.build.command {
                Some(command) => println!("  command = \"{}\"", command),
                None => println!("  command = (none)"),
            }
            if !toml.build.unstable_exit_codes.is_empty() {
                println!(
                    "  unstable_exit_codes = {:?}",
                    toml.build.unstable_exit_codes
                );
            }
            println!();

            println!("[hook]");
            println!("  run_if_result = \"{}\"", toml.hook.threshold());
            for (label, steps) in [
                ("pre_steps", &toml.hook.pre_steps),
                ("post_steps", &toml.hook.post_steps),
            ] {
                println!("  {} ({}):", label, steps.len());
                for (i, def) in steps.iter().enumerate() {
                    match registry.create(def) {
                        Ok(step) => println!("    {}. {}", i + 1, step.name()),
                        Err(e) => println!("    {}. <invalid: {}>", i + 1, e),
                    }
                }
            }
            println!();

            let env = compute_environment_overrides(
                &toml.environment.global,
                toml.environment.node.as_deref(),
            );
            if !env.is_empty() {
                println!("Node environment:");
                for (key, value) in env.iter() {
                    println!("  {}={}", key, value);
                }
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No extrasteps.toml found. Run 'extrasteps init' first.");
                return Ok(());
            }

            let toml = ExtraStepsToml::load(&config_path)?;
            let warnings = toml.validate(&registry);

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
    }

    Ok(())
}
