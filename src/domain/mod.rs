//! Core patching logic
//!
//! Works against the [`RecordStore`](crate::storage::RecordStore) interface
//! only; loading and saving plugin files is the storage layer's job.

mod builder;
mod entry;
mod graph;
mod multiply;
mod patch;
mod propagate;
mod report;

#[cfg(test)]
mod testing;

pub use builder::{GraphBuilder, RecordSignatures};
pub use entry::{EntryTemplate, Ownership};
pub use graph::{
    CloneId, ContainerId, ContainerKind, ContainerRole, EntrySet, Leaf, LeafClone, LeafId,
    ListContainer, ListId, PatchGraph, SetContainer, SetId,
};
pub use multiply::{Multiplier, DEFAULT_CLONE_SUFFIX, DEFAULT_PROGRESS_INTERVAL};
pub use patch::{run_patch, PatchError, PatchOptions};
pub use propagate::{propagate, Propagated};
pub use report::{PatchReport, PatchWarning, TargetReport};
