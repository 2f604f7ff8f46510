//! Run report and non-fatal warnings

use std::fmt;

use serde::Serialize;

use super::graph::ContainerKind;

/// A recoverable problem; the affected target or entry is skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatchWarning {
    /// Target key matches neither a leveled list nor a form list
    TargetNotFound { key: String },

    /// Target container references no leaves
    NothingToDuplicate { key: String, container: ContainerKind },

    /// Target container entry links to a missing record
    DanglingReference { key: String, position: usize },

    /// The store refused a clone; the target is left short
    CloneFailed {
        key: String,
        editor_id: String,
        reason: String,
    },
}

impl PatchWarning {
    /// Key of the target or container the warning is about
    pub fn key(&self) -> &str {
        match self {
            PatchWarning::TargetNotFound { key }
            | PatchWarning::NothingToDuplicate { key, .. }
            | PatchWarning::DanglingReference { key, .. }
            | PatchWarning::CloneFailed { key, .. } => key,
        }
    }
}

impl fmt::Display for PatchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchWarning::TargetNotFound { key } => {
                write!(f, "Couldn't find a leveled list or a form list named {}", key)
            }
            PatchWarning::NothingToDuplicate { key, container } => {
                write!(f, "No leaves found to duplicate in {} {}, skipping it", container, key)
            }
            PatchWarning::DanglingReference { key, position } => {
                write!(f, "Entry {} of {} links to a missing record, ignoring it", position, key)
            }
            PatchWarning::CloneFailed {
                key,
                editor_id,
                reason,
            } => write!(
                f,
                "Couldn't create {} ({}), stopped growing {}",
                editor_id, reason, key
            ),
        }
    }
}

/// Outcome for one targeted container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    pub key: String,
    pub container: ContainerKind,
    /// Distinct leaves found at build time
    pub leaves: usize,
    pub target_count: usize,
    pub clones_created: usize,
    /// Leaves plus attached clones after cloning
    pub final_count: usize,
}

/// Summary of a patch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    pub targets: Vec<TargetReport>,
    pub related_lists: Vec<String>,
    pub related_sets: Vec<String>,
    /// Editor IDs of created clones, in creation order
    pub clones: Vec<String>,
    pub entries_added: usize,
    pub memberships_added: usize,
    pub warnings: Vec<PatchWarning>,

    /// blake3 digest of the saved patch file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_digest: Option<String>,
}

impl PatchReport {
    pub fn clones_created(&self) -> usize {
        self.clones.len()
    }
}
