//! # Storage Layer
//!
//! Record access for the patcher and the files around it.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Plugins | JSONL (one record per line) | paths given to `cast patch` |
//! | Patch | JSONL, same record shape | `patch_file_name` next to the last plugin, or `--output` |
//! | Config | TOML | `./cast.toml` or the user config directory |
//!
//! ## Concurrency Safety
//!
//! - [`PluginFile`] takes a shared `fs2` lock to read and an exclusive one to write
//! - Writes are atomic (temp file + rename)
//!
//! ## Key Types
//!
//! - [`RecordStore`] - Handle-based record access used by the patcher
//! - [`Session`] / [`Held`] - Scoped handles released on drop
//! - [`MemoryStore`] - Loaded plugins in load order, with a patch plugin for writes
//! - [`PluginFile`] - Read/write plugin records as JSONL
//! - [`Config`] - Patch settings and targets

mod config;
mod memory;
mod plugin;
mod store;

pub use config::{Config, ConfigError, PatchConfig, CONFIG_FILE_NAME};
pub use memory::MemoryStore;
pub use plugin::{FormKey, ListEntry, PluginFile, Record};
pub use store::{Held, RawHandle, RecordStore, Session, StoreError};
