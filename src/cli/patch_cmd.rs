//! `cast patch`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::output::Output;
use crate::domain::{run_patch, PatchReport};
use crate::storage::{Config, MemoryStore, PluginFile};

pub fn run(
    output: &Output,
    plugins: &[PathBuf],
    config_path: Option<&Path>,
    patch_path: Option<PathBuf>,
) -> Result<()> {
    let config = Config::load(config_path)?;
    match &config.source {
        Some(path) => info!("Using config {}", path.display()),
        None => info!("No config file found, using built-in targets"),
    }

    let patch_path = patch_path.unwrap_or_else(|| default_patch_path(plugins, &config));
    let patch = PluginFile::new(&patch_path);
    let mut store = MemoryStore::new(patch.name());

    for path in plugins {
        let plugin = PluginFile::new(path);
        if plugin.name() == patch.name() {
            warn!("Skipping {}: it is the patch being written", path.display());
            continue;
        }
        let records = plugin.read_records()?;
        info!("Loaded {} records from {}", records.len(), plugin.name());
        store.load_plugin(&plugin.name(), records);
    }

    let mut report = run_patch(&store, &config.patch.targets, &config.patch.patch_options())
        .context("Patch run failed, nothing was written")?;

    patch.write_records(&store.patch_records())?;
    report.patch_digest = Some(patch.digest()?);
    info!("Wrote {}", patch_path.display());

    print_report(output, &report, &patch_path);
    Ok(())
}

/// `patch_file_name` in the directory of the last plugin
fn default_patch_path(plugins: &[PathBuf], config: &Config) -> PathBuf {
    let dir = plugins
        .last()
        .and_then(|path| path.parent())
        .unwrap_or_else(|| Path::new(""));
    dir.join(&config.patch.patch_file_name)
}

fn print_report(output: &Output, report: &PatchReport, patch_path: &Path) {
    if output.is_json() {
        output.data(&serde_json::json!({
            "patch": patch_path.display().to_string(),
            "report": report,
        }));
        return;
    }

    for target in &report.targets {
        let kind = target.container.to_string();
        let leaves = format!("{} leaves", target.leaves);
        let clones = format!("+{} clones", target.clones_created);
        let count = format!("{}/{}", target.final_count, target.target_count);
        output.columns(&[
            target.key.as_str(),
            kind.as_str(),
            leaves.as_str(),
            clones.as_str(),
            count.as_str(),
        ]);
    }
    if !report.related_lists.is_empty() {
        output.text(&format!("Related lists: {}", report.related_lists.join(", ")));
    }
    if !report.related_sets.is_empty() {
        output.text(&format!("Related sets: {}", report.related_sets.join(", ")));
    }
    if output.is_verbose() {
        for clone in &report.clones {
            output.text(&format!("  {}", clone));
        }
    }
    for warning in &report.warnings {
        output.text(&format!("Warning: {}", warning));
    }

    output.success(&format!(
        "Created {} clones, added {} entries and {} memberships",
        report.clones_created(),
        report.entries_added,
        report.memberships_added
    ));
    output.text(&format!(
        "Wrote {} ({})",
        patch_path.display(),
        report.patch_digest.as_deref().unwrap_or("no digest")
    ));
}
