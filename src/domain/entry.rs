//! Per-reference metadata carried by leveled list entries
//!
//! A leveled list references a leaf once per entry, and each entry has its
//! own level, count, chance-none and optional ownership block. When a leaf
//! is cloned, every entry that referenced it is reproduced for the clone
//! with exactly this metadata.

use serde::{Deserialize, Serialize};

/// Ownership and condition block (`COED`) attached to a list entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ownership {
    /// Owning faction or NPC
    pub owner: String,

    /// Item condition value, kept as written by the store
    pub condition: String,

    /// Global variable gating the entry, present only in some plugins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_variable: Option<String>,

    /// Faction rank required for ownership
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_rank: Option<String>,
}

impl Ownership {
    pub fn new(owner: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            condition: condition.into(),
            global_variable: None,
            required_rank: None,
        }
    }

    pub fn with_global_variable(mut self, global: impl Into<String>) -> Self {
        self.global_variable = Some(global.into());
        self
    }

    pub fn with_required_rank(mut self, rank: impl Into<String>) -> Self {
        self.required_rank = Some(rank.into());
        self
    }
}

/// Metadata captured from one list entry
///
/// The referenced leaf is not part of the template: the same template is
/// written once for the original and once per clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryTemplate {
    pub level: i32,
    pub count: i32,
    pub chance_none: i32,

    /// Absent means unrestricted access
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership: Option<Ownership>,
}

impl EntryTemplate {
    pub fn new(level: i32, count: i32, chance_none: i32) -> Self {
        Self {
            level,
            count,
            chance_none,
            ownership: None,
        }
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = Some(ownership);
        self
    }
}

impl Default for EntryTemplate {
    fn default() -> Self {
        Self::new(1, 1, 0)
    }
}
