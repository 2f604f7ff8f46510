//! In-memory graph of containers and the leaves they reference
//!
//! Leaves, clones and containers live in arenas owned by [`PatchGraph`] and
//! refer to each other by index. Every container keeps its leaves in the
//! order they were first discovered for that container; that order drives
//! both clone distribution and the order entries are written back.
//!
//! The graph owns the store handles of everything it holds. Dropping it, or
//! calling [`PatchGraph::finalize`], releases them.

use std::collections::HashMap;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::storage::{Held, Session, StoreError};

use super::entry::EntryTemplate;

/// Index of a leaf in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafId(usize);

/// Index of a clone in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CloneId(usize);

/// Index of a leveled list in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListId(usize);

/// Index of a form list in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetId(usize);

/// Either kind of container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerId {
    List(ListId),
    Set(SetId),
}

/// Container kind, as shown in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    List,
    Set,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::List => write!(f, "list"),
            ContainerKind::Set => write!(f, "set"),
        }
    }
}

/// Why a container is part of the patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRole {
    /// Named in the target configuration; grown to `target_count`
    Targeted { target_count: usize },

    /// References a leaf that is cloned for some other container
    Related,
}

/// An entity being duplicated
#[derive(Debug)]
pub struct Leaf<'s> {
    pub(crate) editor_id: String,
    pub(crate) handle: Held<'s>,
    pub(crate) clones: Vec<CloneId>,
    pub(crate) lists: IndexSet<ListId>,
    pub(crate) sets: IndexSet<SetId>,
}

impl<'s> Leaf<'s> {
    pub fn editor_id(&self) -> &str {
        &self.editor_id
    }

    /// Clones made from this leaf, in creation order
    pub fn clones(&self) -> &[CloneId] {
        &self.clones
    }

    pub fn clone_count(&self) -> usize {
        self.clones.len()
    }

    pub fn lists(&self) -> impl Iterator<Item = ListId> + '_ {
        self.lists.iter().copied()
    }
}

/// A copy of a leaf created by the patch
#[derive(Debug)]
pub struct LeafClone<'s> {
    pub(crate) editor_id: String,
    pub(crate) handle: Held<'s>,
}

impl<'s> LeafClone<'s> {
    pub fn editor_id(&self) -> &str {
        &self.editor_id
    }
}

/// How one list references one leaf
#[derive(Debug, Default)]
pub struct EntrySet {
    /// One template per entry referencing the leaf, in list order
    pub templates: Vec<EntryTemplate>,

    /// Clones of the leaf waiting to be written into the list
    pub pending: Vec<CloneId>,
}

/// Ordered container whose entries carry metadata (leveled list)
#[derive(Debug)]
pub struct ListContainer<'s> {
    pub(crate) editor_id: String,
    pub(crate) long_name: String,
    pub(crate) handle: Held<'s>,
    pub(crate) entries: IndexMap<LeafId, EntrySet>,
    pub(crate) role: ContainerRole,
}

impl<'s> ListContainer<'s> {
    pub fn editor_id(&self) -> &str {
        &self.editor_id
    }

    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    pub fn role(&self) -> ContainerRole {
        self.role
    }

    /// Entry sets keyed by leaf, in discovery order
    pub fn entries(&self) -> &IndexMap<LeafId, EntrySet> {
        &self.entries
    }

    /// Distinct leaves referenced at build time
    pub fn leaf_count(&self) -> usize {
        self.entries.len()
    }

    /// Distinct leaves plus clones attached so far
    pub fn population(&self) -> usize {
        self.entries.values().map(|set| 1 + set.pending.len()).sum()
    }
}

/// Unordered membership container (form list)
#[derive(Debug)]
pub struct SetContainer<'s> {
    pub(crate) editor_id: String,
    pub(crate) long_name: String,
    pub(crate) handle: Held<'s>,
    /// Member leaves in discovery order, with their pending clones
    pub(crate) members: IndexMap<LeafId, Vec<CloneId>>,
    pub(crate) role: ContainerRole,
}

impl<'s> SetContainer<'s> {
    pub fn editor_id(&self) -> &str {
        &self.editor_id
    }

    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    pub fn role(&self) -> ContainerRole {
        self.role
    }

    pub fn members(&self) -> impl Iterator<Item = LeafId> + '_ {
        self.members.keys().copied()
    }

    /// Clones waiting to be added, grouped by leaf in discovery order
    pub fn pending(&self) -> impl Iterator<Item = CloneId> + '_ {
        self.members.values().flatten().copied()
    }

    pub fn leaf_count(&self) -> usize {
        self.members.len()
    }

    pub fn population(&self) -> usize {
        self.members.values().map(|clones| 1 + clones.len()).sum()
    }
}

/// The graph for one patch run
#[derive(Debug)]
pub struct PatchGraph<'s> {
    pub(crate) leaves: Vec<Leaf<'s>>,
    pub(crate) leaf_index: HashMap<String, LeafId>,
    pub(crate) clones: Vec<LeafClone<'s>>,
    pub(crate) lists: Vec<ListContainer<'s>>,
    pub(crate) sets: Vec<SetContainer<'s>>,
}

impl<'s> PatchGraph<'s> {
    pub fn new() -> Self {
        Self {
            leaves: Vec::new(),
            leaf_index: HashMap::new(),
            clones: Vec::new(),
            lists: Vec::new(),
            sets: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty() && self.sets.is_empty()
    }

    pub fn leaf(&self, id: LeafId) -> &Leaf<'s> {
        &self.leaves[id.0]
    }

    pub fn leaf_by_editor_id(&self, editor_id: &str) -> Option<LeafId> {
        self.leaf_index.get(editor_id).copied()
    }

    pub fn leaves(&self) -> impl Iterator<Item = (LeafId, &Leaf<'s>)> {
        self.leaves.iter().enumerate().map(|(i, leaf)| (LeafId(i), leaf))
    }

    pub fn clone_of(&self, id: CloneId) -> &LeafClone<'s> {
        &self.clones[id.0]
    }

    /// All clones in creation order
    pub fn clones(&self) -> impl Iterator<Item = &LeafClone<'s>> {
        self.clones.iter()
    }

    pub fn list(&self, id: ListId) -> &ListContainer<'s> {
        &self.lists[id.0]
    }

    pub fn set(&self, id: SetId) -> &SetContainer<'s> {
        &self.sets[id.0]
    }

    pub fn lists(&self) -> impl Iterator<Item = (ListId, &ListContainer<'s>)> {
        self.lists.iter().enumerate().map(|(i, list)| (ListId(i), list))
    }

    pub fn sets(&self) -> impl Iterator<Item = (SetId, &SetContainer<'s>)> {
        self.sets.iter().enumerate().map(|(i, set)| (SetId(i), set))
    }

    pub fn list_by_editor_id(&self, editor_id: &str) -> Option<ListId> {
        self.lists()
            .find(|(_, list)| list.editor_id == editor_id)
            .map(|(id, _)| id)
    }

    pub fn set_by_editor_id(&self, editor_id: &str) -> Option<SetId> {
        self.sets()
            .find(|(_, set)| set.editor_id == editor_id)
            .map(|(id, _)| id)
    }

    /// Targeted containers in processing order: lists first, then sets
    pub fn targeted(&self) -> Vec<ContainerId> {
        let lists = self
            .lists()
            .filter(|(_, list)| matches!(list.role, ContainerRole::Targeted { .. }))
            .map(|(id, _)| ContainerId::List(id));
        let sets = self
            .sets()
            .filter(|(_, set)| matches!(set.role, ContainerRole::Targeted { .. }))
            .map(|(id, _)| ContainerId::Set(id));
        lists.chain(sets).collect()
    }

    pub fn kind(&self, container: ContainerId) -> ContainerKind {
        match container {
            ContainerId::List(_) => ContainerKind::List,
            ContainerId::Set(_) => ContainerKind::Set,
        }
    }

    pub fn editor_id(&self, container: ContainerId) -> &str {
        match container {
            ContainerId::List(id) => &self.lists[id.0].editor_id,
            ContainerId::Set(id) => &self.sets[id.0].editor_id,
        }
    }

    pub fn long_name(&self, container: ContainerId) -> &str {
        match container {
            ContainerId::List(id) => &self.lists[id.0].long_name,
            ContainerId::Set(id) => &self.sets[id.0].long_name,
        }
    }

    pub fn role(&self, container: ContainerId) -> ContainerRole {
        match container {
            ContainerId::List(id) => self.lists[id.0].role,
            ContainerId::Set(id) => self.sets[id.0].role,
        }
    }

    pub fn target_count(&self, container: ContainerId) -> Option<usize> {
        match self.role(container) {
            ContainerRole::Targeted { target_count } => Some(target_count),
            ContainerRole::Related => None,
        }
    }

    /// Leaves of a container in discovery order
    pub fn leaves_of(&self, container: ContainerId) -> Vec<LeafId> {
        match container {
            ContainerId::List(id) => self.lists[id.0].entries.keys().copied().collect(),
            ContainerId::Set(id) => self.sets[id.0].members.keys().copied().collect(),
        }
    }

    pub fn leaf_count(&self, container: ContainerId) -> usize {
        match container {
            ContainerId::List(id) => self.lists[id.0].leaf_count(),
            ContainerId::Set(id) => self.sets[id.0].leaf_count(),
        }
    }

    pub fn population(&self, container: ContainerId) -> usize {
        match container {
            ContainerId::List(id) => self.lists[id.0].population(),
            ContainerId::Set(id) => self.sets[id.0].population(),
        }
    }

    /// Returns the existing leaf for the handle's editor ID or records a new one
    ///
    /// A repeated editor ID releases the new handle. A new leaf is stored
    /// under its winning override.
    pub(crate) fn record_leaf(
        &mut self,
        session: Session<'s>,
        handle: Held<'s>,
    ) -> Result<LeafId, StoreError> {
        let editor_id = session.editor_id(&handle)?;
        if let Some(&id) = self.leaf_index.get(&editor_id) {
            return Ok(id);
        }

        let handle = session.winning_override(handle)?;
        let id = LeafId(self.leaves.len());
        self.leaves.push(Leaf {
            editor_id: editor_id.clone(),
            handle,
            clones: Vec::new(),
            lists: IndexSet::new(),
            sets: IndexSet::new(),
        });
        self.leaf_index.insert(editor_id, id);
        Ok(id)
    }

    pub(crate) fn push_list(&mut self, list: ListContainer<'s>) -> ListId {
        let id = ListId(self.lists.len());
        for leaf in list.entries.keys() {
            self.leaves[leaf.0].lists.insert(id);
        }
        self.lists.push(list);
        id
    }

    pub(crate) fn push_set(&mut self, set: SetContainer<'s>) -> SetId {
        let id = SetId(self.sets.len());
        for leaf in set.members.keys() {
            self.leaves[leaf.0].sets.insert(id);
        }
        self.sets.push(set);
        id
    }

    /// Creates one clone of `leaf` and queues it for every container referencing the leaf
    pub(crate) fn spawn_clone(
        &mut self,
        session: Session<'s>,
        leaf: LeafId,
        suffix: &str,
    ) -> Result<CloneId, StoreError> {
        let Self {
            leaves,
            clones,
            lists,
            sets,
            ..
        } = self;

        let source = &mut leaves[leaf.0];
        let editor_id = format!("{}{}{}", source.editor_id, suffix, source.clones.len());
        let handle = session.clone_leaf(&source.handle, &editor_id)?;

        let id = CloneId(clones.len());
        clones.push(LeafClone { editor_id, handle });
        source.clones.push(id);

        for list in &source.lists {
            if let Some(entry_set) = lists[list.0].entries.get_mut(&leaf) {
                entry_set.pending.push(id);
            }
        }
        for set in &source.sets {
            if let Some(pending) = sets[set.0].members.get_mut(&leaf) {
                pending.push(id);
            }
        }

        Ok(id)
    }

    /// Releases every handle the graph holds
    ///
    /// Clones go first, then form lists, leveled lists and finally the
    /// original leaves.
    pub fn finalize(self) {
        let Self {
            leaves,
            clones,
            lists,
            sets,
            ..
        } = self;
        drop(clones);
        drop(sets);
        drop(lists);
        drop(leaves);
    }
}

impl Default for PatchGraph<'_> {
    fn default() -> Self {
        Self::new()
    }
}
