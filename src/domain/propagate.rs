//! Writes pending clones back into the containers
//!
//! Every list gets one new entry per (template, clone) pair of each leaf it
//! references, copying the template's metadata. Every set gets one
//! membership per clone. Leaves are visited in discovery order and clones
//! in creation order, so the output order is fully determined by the graph.

use tracing::info;

use crate::storage::{Session, StoreError};

use super::graph::PatchGraph;

/// Number of writes made by [`propagate`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Propagated {
    pub entries: usize,
    pub memberships: usize,
}

/// Appends every pending clone to every list and set referencing its leaf
pub fn propagate<'s>(
    graph: &PatchGraph<'s>,
    session: Session<'s>,
) -> Result<Propagated, StoreError> {
    let mut written = Propagated::default();

    for (_, list) in graph.lists() {
        if list.entries().values().all(|set| set.pending.is_empty()) {
            continue;
        }
        info!("Adding new leaves to {}", list.long_name());
        for entry_set in list.entries().values() {
            for template in &entry_set.templates {
                for &clone in &entry_set.pending {
                    let clone = graph.clone_of(clone);
                    session.create_entry(&list.handle, template, &clone.handle)?;
                    written.entries += 1;
                }
            }
        }
    }

    for (_, set) in graph.sets() {
        if set.pending().next().is_none() {
            continue;
        }
        info!("Adding new leaves to {}", set.long_name());
        for clone in set.pending() {
            let clone = graph.clone_of(clone);
            session.create_membership(&set.handle, &clone.handle)?;
            written.memberships += 1;
        }
    }

    Ok(written)
}
