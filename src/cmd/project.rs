//! Project initialization and applicability check.

use anyhow::Result;
use std::path::Path;

pub fn cmd_init(project_dir: &Path) -> Result<()> {
    use extrasteps::init::init_project;

    let result = init_project(project_dir)?;

    if result.created {
        println!(
            "Initialized extrasteps at {}",
            result.extrasteps_dir.display()
        );
        println!();
        println!("Created:");
        println!("  .extrasteps/");
        println!("  ├── extrasteps.toml   # Job, build command and step lists");
        println!("  └── reports/          # One JSON report per build");
        println!();
        println!("Next steps:");
        println!("  1. Add [[hook.pre_steps]] and [[hook.post_steps]] to extrasteps.toml");
        println!("  2. Run `extrasteps config validate`");
        println!("  3. Run `extrasteps run`");
    } else {
        println!(
            "extrasteps already initialized at {}",
            result.extrasteps_dir.display()
        );
        println!("Existing configuration left unchanged.");
    }

    Ok(())
}

pub fn cmd_check(project_dir: &Path, project_type: Option<&str>) -> Result<()> {
    use extrasteps::ConfigError;
    use extrasteps::config::{ExtraStepsToml, ProjectType};
    use extrasteps::init::get_extrasteps_dir;

    let project_type = match project_type {
        Some(value) => value.parse::<ProjectType>()?,
        None => {
            ExtraStepsToml::load_or_default(&get_extrasteps_dir(project_dir))?
                .job
                .project_type
        }
    };

    if project_type.is_applicable() {
        println!("Extra build steps apply to '{}' projects.", project_type);
        Ok(())
    } else {
        Err(ConfigError::NotApplicable {
            project_type: project_type.to_string(),
        }
        .into())
    }
}
