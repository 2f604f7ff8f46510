//! JSONL plugin files
//!
//! A plugin is a file with one JSON record per line. Records are identified
//! by their form key; a record in a later plugin with the same form key
//! overrides the earlier one. Uses file locking for concurrent access safety.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::domain::{EntryTemplate, Ownership};

/// Record identity shared by all overrides of a record (e.g. `000ABC:Base.esm`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormKey(String);

impl FormKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for a record created in the given plugin
    pub fn in_plugin(id: u32, plugin: &str) -> Self {
        Self(format!("{:06X}:{}", id, plugin))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FormKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// One leveled list entry as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    pub level: i32,

    /// Linked record, `None` for a null link
    pub reference: Option<FormKey>,

    pub count: i32,

    #[serde(default)]
    pub chance_none: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership: Option<Ownership>,
}

impl ListEntry {
    pub fn new(level: i32, reference: impl Into<FormKey>, count: i32) -> Self {
        Self {
            level,
            reference: Some(reference.into()),
            count,
            chance_none: 0,
            ownership: None,
        }
    }

    /// Builds an entry from captured metadata
    pub fn from_template(template: &EntryTemplate, reference: FormKey) -> Self {
        Self {
            level: template.level,
            reference: Some(reference),
            count: template.count,
            chance_none: template.chance_none,
            ownership: template.ownership.clone(),
        }
    }

    pub fn template(&self) -> EntryTemplate {
        EntryTemplate {
            level: self.level,
            count: self.count,
            chance_none: self.chance_none,
            ownership: self.ownership.clone(),
        }
    }

    pub fn with_chance_none(mut self, chance_none: i32) -> Self {
        self.chance_none = chance_none;
        self
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = Some(ownership);
        self
    }
}

/// A record of any signature
///
/// Only the fields the patcher reads are modelled. Everything else is kept
/// in `fields` and copied verbatim when the record is cloned or overridden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub form_key: FormKey,
    pub signature: String,
    pub editor_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Leveled list entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<ListEntry>,

    /// Form list members; `None` for a null link
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Option<FormKey>>,

    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    pub fn new(form_key: impl Into<FormKey>, signature: &str, editor_id: &str) -> Self {
        Self {
            form_key: form_key.into(),
            signature: signature.to_string(),
            editor_id: editor_id.to_string(),
            name: None,
            entries: Vec::new(),
            members: Vec::new(),
            fields: serde_json::Map::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_entries(mut self, entries: Vec<ListEntry>) -> Self {
        self.entries = entries;
        self
    }

    pub fn with_members<K: Into<FormKey>>(mut self, members: impl IntoIterator<Item = K>) -> Self {
        self.members = members.into_iter().map(|key| Some(key.into())).collect();
        self
    }

    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }
}

/// A plugin file on disk
pub struct PluginFile {
    path: PathBuf,
}

impl PluginFile {
    /// Creates a handle to the plugin at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path to the plugin file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Plugin name used in form keys and load order (the file name)
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Reads all records in file order
    pub fn read_records(&self) -> Result<Vec<Record>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open plugin: {}", self.path.display()))?;

        // Acquire shared lock for reading
        file.lock_shared()
            .context("Failed to acquire read lock on plugin")?;

        let reader = BufReader::new(&file);
        let mut records = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;

            if line.trim().is_empty() {
                continue;
            }

            let record: Record = serde_json::from_str(&line).with_context(|| {
                format!(
                    "Failed to parse record at {}:{}",
                    self.path.display(),
                    line_num + 1
                )
            })?;

            records.push(record);
        }

        // Lock is released when file is dropped
        Ok(records)
    }

    /// Writes all records to the plugin (full rewrite), keeping their order
    pub fn write_records(&self, records: &[Record]) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        // Write to temp file first
        let temp_path = self.temp_path();

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            // Acquire exclusive lock
            file.lock_exclusive()
                .context("Failed to acquire write lock on plugin")?;

            let mut writer = BufWriter::new(&file);

            for record in records {
                let line = serde_json::to_string(record).context("Failed to serialize record")?;
                writeln!(writer, "{}", line).context("Failed to write record")?;
            }

            writer.flush().context("Failed to flush plugin")?;
        }

        // Atomic rename
        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }

    /// blake3 digest of the file contents, hex encoded
    pub fn digest(&self) -> Result<String> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("Failed to read plugin: {}", self.path.display()))?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}
