//! cast-of-thousands - grows leveled lists by cloning the NPCs they reference
//!
//! Given a set of target containers (leveled lists or form lists) and the
//! total count each should reach, the patcher clones the leaves they
//! reference in an even round-robin and writes every clone into each
//! container that referenced the original, keeping per-entry metadata.

pub mod cli;
pub mod domain;
pub mod storage;

pub use domain::{run_patch, PatchOptions, PatchReport};
pub use storage::{Config, MemoryStore, PluginFile};
