//! Configuration handling for cast
//!
//! Configuration is stored in `cast.toml`. The file used is, in order: the
//! path given on the command line, `./cast.toml`, then `cast.toml` in the
//! per-user config directory. With none of those present the built-in
//! defaults apply.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{PatchOptions, RecordSignatures, DEFAULT_CLONE_SUFFIX};

/// File name looked up in the working and user config directories
pub const CONFIG_FILE_NAME: &str = "cast.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Target counts shipped with the patcher
const DEFAULT_TARGETS: &[(&str, usize)] = &[
    ("DLC03LCharWorkshopNPC", 120),
    ("DLC03_LCharTrapperFace", 20),
    ("DLC04LCharWorkshopRaiderA", 20),
    ("DLC04LCharWorkshopRaiderASpokesperson", 20),
    ("DLC04LCharWorkshopRaiderB", 20),
    ("DLC04LCharWorkshopRaiderBSpokesperson", 20),
    ("DLC04LCharWorkshopRaiderC", 20),
    ("DLC04LCharWorkshopRaiderCSpokesperson", 20),
    ("DLC04_LCharRaiderDiscipleFace", 20),
    ("DLC04_LCharRaiderOperatorFace", 20),
    ("DLC04_LCharRaiderPackFace", 20),
    ("DLC06LCharWorkshopNPC", 20),
    ("LCharBoSTraitsSoldier", 20),
    ("LCharChildrenofAtomFaces", 20),
    ("LCharGunnerFaceAndGender", 20),
    ("LCharMinutemenFaces", 20),
    ("LCharRRAgentFace", 20),
    ("LCharRaiderFaceAndGender", 20),
    ("LCharScavenger", 20),
    ("LCharTriggermanHumanFaces", 20),
    ("LCharWorkshopGuard", 20),
    ("LCharWorkshopNPC", 1280),
    ("kgSIM_Civilians_Commonwealth", 140),
    ("kgSIM_Civilians_FarHarbor", 40),
    ("kgSIM_DefaultGenericVisitorForms", 140),
    ("kgSIM_LCharEnslavedSettler", 20),
    ("kgSIM_LChar_IndRev_IronMineWorkerNPC", 20),
    ("simvault_Minutefans", 20),
    ("tkz_LCharBOSFaceAndGender", 20),
];

/// Settings for a patch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// Name of the patch plugin written by `cast patch`
    pub patch_file_name: String,

    /// Inserted between a leaf's editor ID and the clone number
    pub clone_suffix: String,

    /// Milliseconds between progress log lines while cloning
    pub progress_interval_ms: u64,

    pub signatures: RecordSignatures,

    /// Container editor ID -> total count to grow it to
    pub targets: BTreeMap<String, usize>,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            patch_file_name: "zPatch.jsonl".to_string(),
            clone_suffix: DEFAULT_CLONE_SUFFIX.to_string(),
            progress_interval_ms: 2000,
            signatures: RecordSignatures::default(),
            targets: DEFAULT_TARGETS
                .iter()
                .map(|(key, count)| (key.to_string(), *count))
                .collect(),
        }
    }
}

impl PatchConfig {
    /// Checks values that serde alone can't reject
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.patch_file_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "patch_file_name must not be empty".to_string(),
            ));
        }
        if let Some((key, _)) = self.targets.iter().find(|(_, count)| **count == 0) {
            return Err(ConfigError::Invalid(format!(
                "target count for {} must be at least 1",
                key
            )));
        }
        Ok(())
    }

    /// Inserts or overwrites a target and returns the previous count
    pub fn set_target(&mut self, key: &str, count: usize) -> Result<Option<usize>, ConfigError> {
        if key.trim().is_empty() {
            return Err(ConfigError::Invalid("target key must not be empty".to_string()));
        }
        if count == 0 {
            return Err(ConfigError::Invalid(format!(
                "target count for {} must be at least 1",
                key
            )));
        }
        Ok(self.targets.insert(key.to_string(), count))
    }

    /// Removes a target and returns its count
    pub fn remove_target(&mut self, key: &str) -> Option<usize> {
        self.targets.remove(key)
    }

    pub fn patch_options(&self) -> PatchOptions {
        PatchOptions {
            clone_suffix: self.clone_suffix.clone(),
            progress_interval: Duration::from_millis(self.progress_interval_ms),
            signatures: self.signatures.clone(),
        }
    }
}

/// Loaded configuration and the file it came from
#[derive(Debug, Clone)]
pub struct Config {
    pub patch: PatchConfig,

    /// `None` when running on built-in defaults
    pub source: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from an explicit path or the default locations
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let working_dir = std::env::current_dir().context("Failed to read current directory")?;
        Self::load_from(explicit, &working_dir, Self::user_config_path())
    }

    fn load_from(
        explicit: Option<&Path>,
        working_dir: &Path,
        user_path: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            return Self::from_file(path);
        }

        let local = working_dir.join(CONFIG_FILE_NAME);
        if local.exists() {
            return Self::from_file(&local);
        }

        match user_path {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self {
                patch: PatchConfig::default(),
                source: None,
            }),
        }
    }

    /// Loads and validates one config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let patch: PatchConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        patch
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;

        Ok(Self {
            patch,
            source: Some(path.to_path_buf()),
        })
    }

    /// Returns the per-user config directory
    pub fn user_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "cast", "cast-of-thousands")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn user_config_path() -> Option<PathBuf> {
        Self::user_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    /// File that edits are written to: the loaded file, or `./cast.toml`
    pub fn save_path(&self) -> PathBuf {
        self.source
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Saves the configuration back to [`Config::save_path`]
    pub fn save(&self) -> Result<PathBuf> {
        let path = self.save_path();
        Self::write(&self.patch, &path)?;
        Ok(path)
    }

    /// Writes `patch` as TOML, creating parent directories as needed
    pub fn write(patch: &PatchConfig, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let content = toml::to_string_pretty(patch).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }
}
