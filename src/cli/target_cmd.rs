//! Config and target CLI commands

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Subcommand;

use super::output::Output;
use crate::storage::{Config, PatchConfig, CONFIG_FILE_NAME};

#[derive(Subcommand)]
pub enum TargetCommands {
    /// Add a target or change its count
    ///
    /// Examples:
    ///   cast target set LCharRaiderFaceAndGender 60
    Set {
        /// Editor ID of the leveled list or form list
        key: String,

        /// Total count to grow it to
        count: usize,

        #[arg(long, short, env = "CAST_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Remove a target
    Remove {
        /// Editor ID of the leveled list or form list
        key: String,

        #[arg(long, short, env = "CAST_CONFIG")]
        config: Option<PathBuf>,
    },
}

pub fn run(cmd: TargetCommands, output: &Output) -> Result<()> {
    match cmd {
        TargetCommands::Set { key, count, config } => {
            set_target(output, &key, count, config.as_deref())
        }
        TargetCommands::Remove { key, config } => remove_target(output, &key, config.as_deref()),
    }
}

/// Writes a default config unless one is already there
pub fn init(output: &Output, dir: &Path) -> Result<()> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        output.success(&format!("Config already exists at {}", path.display()));
        return Ok(());
    }

    Config::write(&PatchConfig::default(), &path)?;
    output.success(&format!("Wrote default config to {}", path.display()));
    Ok(())
}

pub fn list(output: &Output, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "source": config.source.as_ref().map(|path| path.display().to_string()),
            "targets": config.patch.targets,
        }));
        return Ok(());
    }

    match &config.source {
        Some(path) => output.text(&format!("Targets in {}:", path.display())),
        None => output.text("Built-in targets:"),
    }
    for (key, count) in &config.patch.targets {
        let count = count.to_string();
        output.columns(&[key.as_str(), count.as_str()]);
    }
    Ok(())
}

fn set_target(output: &Output, key: &str, count: usize, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let previous = config.patch.set_target(key, count)?;
    let path = config.save()?;

    let message = match previous {
        Some(previous) => format!(
            "Changed {} from {} to {} in {}",
            key,
            previous,
            count,
            path.display()
        ),
        None => format!("Added {} = {} to {}", key, count, path.display()),
    };
    output.success(&message);
    Ok(())
}

fn remove_target(output: &Output, key: &str, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load(config_path)?;
    if config.patch.remove_target(key).is_none() {
        bail!("No target named {}", key);
    }
    let path = config.save()?;

    output.success(&format!("Removed {} from {}", key, path.display()));
    Ok(())
}
