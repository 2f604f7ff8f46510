//! Graph construction
//!
//! Building happens in three steps:
//!
//! 1. **Census** - every leveled list with entries and every form list with
//!    members is loaded (winning override) and indexed by editor ID.
//! 2. **Targets** - each configured key is taken out of the census and its
//!    leaves are collected. Leaves are deduplicated by editor ID.
//! 3. **Related discovery** - the remaining census is scanned for containers
//!    that reference any collected leaf. They are kept so they can receive
//!    the clones as well; everything else is released.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::storage::{Held, Session, StoreError};

use super::graph::{
    ContainerId, ContainerKind, ContainerRole, EntrySet, LeafId, ListContainer, ListId,
    PatchGraph, SetContainer, SetId,
};
use super::report::PatchWarning;

/// Record signatures of the three record kinds the patcher handles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSignatures {
    /// Ordered containers with per-entry metadata
    pub list: String,

    /// Unordered membership containers
    pub set: String,

    /// Records that get duplicated
    pub leaf: String,
}

impl Default for RecordSignatures {
    fn default() -> Self {
        Self {
            list: "LVLN".to_string(),
            set: "FLST".to_string(),
            leaf: "NPC_".to_string(),
        }
    }
}

/// Builds a [`PatchGraph`] from a record store
pub struct GraphBuilder<'s> {
    session: Session<'s>,
    signatures: RecordSignatures,
    lists: IndexMap<String, Held<'s>>,
    sets: IndexMap<String, Held<'s>>,
    graph: PatchGraph<'s>,
    warnings: Vec<PatchWarning>,
}

impl<'s> GraphBuilder<'s> {
    /// Loads every non-empty list and set from the store
    pub fn census(session: Session<'s>, signatures: RecordSignatures) -> Result<Self, StoreError> {
        let lists = load_census(session, &signatures.list, ContainerKind::List)?;
        let sets = load_census(session, &signatures.set, ContainerKind::Set)?;
        debug!(lists = lists.len(), sets = sets.len(), "Census loaded");

        Ok(Self {
            session,
            signatures,
            lists,
            sets,
            graph: PatchGraph::new(),
            warnings: Vec::new(),
        })
    }

    /// Runs all three steps for the given targets, in key order
    pub fn build(
        session: Session<'s>,
        signatures: RecordSignatures,
        targets: &BTreeMap<String, usize>,
    ) -> Result<(PatchGraph<'s>, Vec<PatchWarning>), StoreError> {
        let mut builder = Self::census(session, signatures)?;
        for (key, &target_count) in targets {
            builder.add_target(key, target_count)?;
        }
        builder.discover_related()?;
        Ok(builder.finish())
    }

    /// Lists and sets still in the census
    pub fn census_len(&self) -> (usize, usize) {
        (self.lists.len(), self.sets.len())
    }

    /// Collects the leaves of the container named `key`
    ///
    /// Leveled lists take precedence over form lists with the same key.
    /// Returns `None` and records a warning when the key is unknown or the
    /// container references no leaves.
    pub fn add_target(
        &mut self,
        key: &str,
        target_count: usize,
    ) -> Result<Option<ContainerId>, StoreError> {
        if let Some(handle) = self.lists.shift_remove(key) {
            return Ok(self
                .target_list(key, handle, target_count)?
                .map(ContainerId::List));
        }
        if let Some(handle) = self.sets.shift_remove(key) {
            return Ok(self
                .target_set(key, handle, target_count)?
                .map(ContainerId::Set));
        }

        self.warn(PatchWarning::TargetNotFound {
            key: key.to_string(),
        });
        Ok(None)
    }

    fn target_list(
        &mut self,
        key: &str,
        handle: Held<'s>,
        target_count: usize,
    ) -> Result<Option<ListId>, StoreError> {
        let session = self.session;
        let long_name = session.long_name(&handle)?;
        info!("Collecting the leaves in {}", long_name);

        let mut entries: IndexMap<LeafId, EntrySet> = IndexMap::new();
        for (position, entry) in session.entries(&handle)?.into_iter().enumerate() {
            let Some(reference) = session.resolve_reference(&entry)? else {
                self.warn(PatchWarning::DanglingReference {
                    key: key.to_string(),
                    position,
                });
                continue;
            };
            let leaf = self.graph.record_leaf(session, reference)?;
            let template = session.read_entry(&entry)?;
            entries.entry(leaf).or_default().templates.push(template);
        }

        if entries.is_empty() {
            self.warn(PatchWarning::NothingToDuplicate {
                key: key.to_string(),
                container: ContainerKind::List,
            });
            return Ok(None);
        }

        Ok(Some(self.graph.push_list(ListContainer {
            editor_id: key.to_string(),
            long_name,
            handle,
            entries,
            role: ContainerRole::Targeted { target_count },
        })))
    }

    fn target_set(
        &mut self,
        key: &str,
        handle: Held<'s>,
        target_count: usize,
    ) -> Result<Option<SetId>, StoreError> {
        let session = self.session;
        let long_name = session.long_name(&handle)?;
        info!("Collecting the leaves in {}", long_name);

        let mut members = IndexMap::new();
        for (position, member) in session.members(&handle)?.into_iter().enumerate() {
            let Some(reference) = session.resolve_reference(&member)? else {
                self.warn(PatchWarning::DanglingReference {
                    key: key.to_string(),
                    position,
                });
                continue;
            };
            let leaf = self.graph.record_leaf(session, reference)?;
            members.entry(leaf).or_insert_with(Vec::new);
        }

        if members.is_empty() {
            self.warn(PatchWarning::NothingToDuplicate {
                key: key.to_string(),
                container: ContainerKind::Set,
            });
            return Ok(None);
        }

        Ok(Some(self.graph.push_set(SetContainer {
            editor_id: key.to_string(),
            long_name,
            handle,
            members,
            role: ContainerRole::Targeted { target_count },
        })))
    }

    /// Keeps every remaining container that references a collected leaf
    pub fn discover_related(&mut self) -> Result<(), StoreError> {
        info!("Finding other leveled lists that include the leaves being duplicated");
        for (editor_id, handle) in std::mem::take(&mut self.lists) {
            self.relate_list(editor_id, handle)?;
        }

        info!("Finding other form lists that include the leaves being duplicated");
        for (editor_id, handle) in std::mem::take(&mut self.sets) {
            self.relate_set(editor_id, handle)?;
        }
        Ok(())
    }

    fn relate_list(&mut self, editor_id: String, handle: Held<'s>) -> Result<(), StoreError> {
        let session = self.session;
        let mut entries: IndexMap<LeafId, EntrySet> = IndexMap::new();
        for entry in session.entries(&handle)? {
            let Some(linked) = session.linked_editor_id(&entry)? else {
                continue;
            };
            let Some(leaf) = self.graph.leaf_by_editor_id(&linked) else {
                continue;
            };
            let template = session.read_entry(&entry)?;
            entries.entry(leaf).or_default().templates.push(template);
        }

        if entries.is_empty() {
            return Ok(());
        }

        let long_name = session.long_name(&handle)?;
        info!("Found {} which includes leaves being duplicated", long_name);
        self.graph.push_list(ListContainer {
            editor_id,
            long_name,
            handle,
            entries,
            role: ContainerRole::Related,
        });
        Ok(())
    }

    /// Form lists are only kept when every member is a leaf record
    fn relate_set(&mut self, editor_id: String, handle: Held<'s>) -> Result<(), StoreError> {
        let session = self.session;
        let mut members = IndexMap::new();
        for member in session.members(&handle)? {
            let Some(target) = session.resolve_reference(&member)? else {
                debug!("Skipping {}: it has a null member", editor_id);
                return Ok(());
            };
            if session.signature(&target)? != self.signatures.leaf {
                debug!(
                    "Skipping {}: it includes records other than {}",
                    editor_id, self.signatures.leaf
                );
                return Ok(());
            }
            let linked = session.editor_id(&target)?;
            if let Some(leaf) = self.graph.leaf_by_editor_id(&linked) {
                members.entry(leaf).or_insert_with(Vec::new);
            }
        }

        if members.is_empty() {
            return Ok(());
        }

        let long_name = session.long_name(&handle)?;
        info!("Found {} which includes leaves being duplicated", long_name);
        self.graph.push_set(SetContainer {
            editor_id,
            long_name,
            handle,
            members,
            role: ContainerRole::Related,
        });
        Ok(())
    }

    /// Returns the graph and warnings, releasing whatever is left in the census
    pub fn finish(self) -> (PatchGraph<'s>, Vec<PatchWarning>) {
        let Self {
            graph, warnings, ..
        } = self;
        (graph, warnings)
    }

    fn warn(&mut self, warning: PatchWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Winning overrides of all non-empty containers of one kind, by editor ID
///
/// A later record with an editor ID already seen replaces the earlier one
/// in place.
fn load_census<'s>(
    session: Session<'s>,
    signature: &str,
    kind: ContainerKind,
) -> Result<IndexMap<String, Held<'s>>, StoreError> {
    let mut census = IndexMap::new();
    for handle in session.enumerate(signature)? {
        let handle = session.winning_override(handle)?;
        let populated = match kind {
            ContainerKind::List => session.has_entries(&handle)?,
            ContainerKind::Set => session.has_members(&handle)?,
        };
        if !populated {
            continue;
        }
        let editor_id = session.editor_id(&handle)?;
        census.insert(editor_id, handle);
    }
    Ok(census)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::testing::{flst, key, lvln, lvln_with, npc, other, store};
    use crate::domain::{EntryTemplate, Ownership};
    use crate::storage::{ListEntry, MemoryStore, Record};

    fn build<'s>(
        store: &'s MemoryStore,
        targets: &[(&str, usize)],
    ) -> (PatchGraph<'s>, Vec<PatchWarning>) {
        let targets: BTreeMap<String, usize> = targets
            .iter()
            .map(|(key, count)| (key.to_string(), *count))
            .collect();
        GraphBuilder::build(Session::new(store), RecordSignatures::default(), &targets).unwrap()
    }

    fn base_records() -> Vec<Record> {
        vec![
            npc("RaiderA"),
            npc("RaiderB"),
            npc("Trader"),
            lvln("LCharRaider", &["RaiderA", "RaiderB", "RaiderA"]),
            lvln("LCharBoss", &["RaiderB", "Trader"]),
            lvln("LCharTrader", &["Trader"]),
            lvln_with("LCharEmpty", Vec::new()),
            flst("RaiderFaces", &["RaiderA", "Trader"]),
            flst("TraderFaces", &["Trader"]),
        ]
    }

    #[test]
    fn targeted_list_collects_distinct_leaves() {
        let store = store(base_records());
        let (graph, warnings) = build(&store, &[("LCharRaider", 10)]);

        assert!(warnings.is_empty());
        let list = graph.list(graph.list_by_editor_id("LCharRaider").unwrap());
        assert_eq!(list.role(), ContainerRole::Targeted { target_count: 10 });
        assert_eq!(list.leaf_count(), 2);

        let raider_a = graph.leaf_by_editor_id("RaiderA").unwrap();
        assert_eq!(list.entries()[&raider_a].templates.len(), 2);
        // Discovery order follows the list
        let names: Vec<_> = list
            .entries()
            .keys()
            .map(|&leaf| graph.leaf(leaf).editor_id())
            .collect();
        assert_eq!(names, vec!["RaiderA", "RaiderB"]);
    }

    #[test]
    fn related_containers_are_discovered() {
        let store = store(base_records());
        let (graph, _) = build(&store, &[("LCharRaider", 10)]);

        // LCharBoss references RaiderB; LCharTrader references nothing we clone
        let boss = graph.list(graph.list_by_editor_id("LCharBoss").unwrap());
        assert_eq!(boss.role(), ContainerRole::Related);
        assert_eq!(boss.leaf_count(), 1);
        assert!(graph.list_by_editor_id("LCharTrader").is_none());

        // RaiderFaces is all NPCs and includes RaiderA
        let faces = graph.set(graph.set_by_editor_id("RaiderFaces").unwrap());
        assert_eq!(faces.role(), ContainerRole::Related);
        assert_eq!(faces.leaf_count(), 1);
        assert!(graph.set_by_editor_id("TraderFaces").is_none());

        let raider_b = graph.leaf(graph.leaf_by_editor_id("RaiderB").unwrap());
        assert_eq!(raider_b.lists().count(), 2);
        assert_eq!(graph.targeted().len(), 1);
    }

    #[test]
    fn related_list_keeps_entry_metadata() {
        let ownership = Ownership::new("WorkshopFaction", "0.5").with_required_rank("2");
        let store = store(vec![
            npc("Settler"),
            lvln("LCharSettler", &["Settler"]),
            lvln_with(
                "LCharGuard",
                vec![ListEntry::new(12, key("Settler"), 2)
                    .with_chance_none(25)
                    .with_ownership(ownership.clone())],
            ),
        ]);
        let (graph, _) = build(&store, &[("LCharSettler", 4)]);

        let guard = graph.list(graph.list_by_editor_id("LCharGuard").unwrap());
        let settler = graph.leaf_by_editor_id("Settler").unwrap();
        assert_eq!(
            guard.entries()[&settler].templates,
            vec![EntryTemplate::new(12, 2, 25).with_ownership(ownership)]
        );
    }

    #[test]
    fn unknown_target_warns_once_without_mutation() {
        let store = store(base_records());
        let (graph, warnings) = build(&store, &[("LCharMissing", 10)]);

        assert_eq!(
            warnings,
            vec![PatchWarning::TargetNotFound {
                key: "LCharMissing".to_string()
            }]
        );
        assert!(graph.is_empty());
        assert_eq!(graph.leaves().count(), 0);
    }

    #[test]
    fn empty_target_is_skipped_and_released() {
        let store = store(vec![
            npc("Ghost"),
            lvln("LCharDangling", &["Nobody"]),
            lvln("LCharGhost", &["Ghost"]),
        ]);
        let (graph, warnings) = build(&store, &[("LCharDangling", 5)]);

        assert_eq!(
            warnings,
            vec![
                PatchWarning::DanglingReference {
                    key: "LCharDangling".to_string(),
                    position: 0
                },
                PatchWarning::NothingToDuplicate {
                    key: "LCharDangling".to_string(),
                    container: ContainerKind::List
                },
            ]
        );
        assert!(graph.is_empty());
        // Census leftovers were released by finish()
        assert_eq!(store.outstanding_handles(), 0);
    }

    #[test]
    fn heterogeneous_set_is_abandoned() {
        let store = store(vec![
            npc("Settler"),
            other("WEAP", "PipeGun"),
            lvln("LCharSettler", &["Settler"]),
            flst("MixedBag", &["Settler", "PipeGun"]),
            flst("SettlerFaces", &["Settler"]),
        ]);
        let (graph, _) = build(&store, &[("LCharSettler", 4)]);

        assert!(graph.set_by_editor_id("MixedBag").is_none());
        assert!(graph.set_by_editor_id("SettlerFaces").is_some());
    }

    #[test]
    fn set_with_null_or_dangling_member_is_abandoned() {
        let mut with_null = flst("SettlerAndNull", &["Settler"]);
        with_null.members.push(None);
        let store = store(vec![
            npc("Settler"),
            lvln("LCharSettler", &["Settler"]),
            with_null,
            flst("SettlerAndNobody", &["Settler", "Nobody"]),
            flst("SettlerFaces", &["Settler"]),
        ]);
        let (graph, _) = build(&store, &[("LCharSettler", 4)]);

        assert!(graph.set_by_editor_id("SettlerAndNull").is_none());
        assert!(graph.set_by_editor_id("SettlerAndNobody").is_none());
        assert!(graph.set_by_editor_id("SettlerFaces").is_some());

        graph.finalize();
        assert_eq!(store.outstanding_handles(), 0);
    }

    #[test]
    fn census_duplicate_key_keeps_later_record() {
        let store = store(vec![
            npc("Settler"),
            lvln("LCharSettler", &["Settler"]),
            Record::new("Guard1:Base.esm", "LVLN", "LCharGuard")
                .with_entries(vec![ListEntry::new(1, key("Settler"), 1)]),
            Record::new("Guard7:Base.esm", "LVLN", "LCharGuard")
                .with_entries(vec![ListEntry::new(7, key("Settler"), 1)]),
        ]);
        let (graph, _) = build(&store, &[("LCharSettler", 4)]);

        let guard = graph.list(graph.list_by_editor_id("LCharGuard").unwrap());
        assert_eq!(guard.role(), ContainerRole::Related);
        let settler = graph.leaf_by_editor_id("Settler").unwrap();
        assert_eq!(
            guard.entries()[&settler].templates,
            vec![EntryTemplate::new(7, 1, 0)]
        );

        graph.finalize();
        assert_eq!(store.outstanding_handles(), 0);
        assert_eq!(store.bad_releases(), 0);
    }

    #[test]
    fn targeted_set_collects_members() {
        let store = store(base_records());
        let (graph, warnings) = build(&store, &[("RaiderFaces", 5)]);

        assert!(warnings.is_empty());
        let faces = graph.set(graph.set_by_editor_id("RaiderFaces").unwrap());
        assert_eq!(faces.role(), ContainerRole::Targeted { target_count: 5 });
        let names: Vec<_> = faces.members().map(|leaf| graph.leaf(leaf).editor_id()).collect();
        assert_eq!(names, vec!["RaiderA", "Trader"]);

        // Lists referencing those NPCs are related, TraderFaces too
        assert!(graph.list_by_editor_id("LCharRaider").is_some());
        assert!(graph.list_by_editor_id("LCharTrader").is_some());
        assert!(graph.set_by_editor_id("TraderFaces").is_some());
    }

    #[test]
    fn list_wins_over_set_with_same_key() {
        let mut records = base_records();
        records.push(
            Record::new("Dup:Other.esm", "FLST", "LCharRaider").with_members([key("Trader")]),
        );
        let store = store(records);
        let (graph, _) = build(&store, &[("LCharRaider", 3)]);

        let list = graph.list_by_editor_id("LCharRaider").unwrap();
        assert_eq!(graph.targeted(), vec![ContainerId::List(list)]);
    }

    #[test]
    fn empty_containers_stay_out_of_census() {
        let store = store(base_records());
        let builder =
            GraphBuilder::census(Session::new(&store), RecordSignatures::default()).unwrap();

        // LCharEmpty has no entries
        assert_eq!(builder.census_len(), (3, 2));
    }

    #[test]
    fn shared_leaf_is_one_instance_across_targets() {
        let store = store(base_records());
        let (graph, _) = build(&store, &[("LCharBoss", 6), ("LCharRaider", 10)]);

        let raider_b = graph.leaf_by_editor_id("RaiderB").unwrap();
        let lists: Vec<_> = graph
            .leaf(raider_b)
            .lists()
            .map(|list| graph.list(list).editor_id())
            .collect();
        assert_eq!(lists, vec!["LCharBoss", "LCharRaider"]);
        assert_eq!(graph.leaves().count(), 3);
    }

    #[test]
    fn every_handle_is_released_once() {
        let store = store(base_records());
        let (graph, _) = build(&store, &[("LCharRaider", 10), ("RaiderFaces", 4)]);

        assert!(store.outstanding_handles() > 0);
        graph.finalize();
        assert_eq!(store.outstanding_handles(), 0);
        assert_eq!(store.bad_releases(), 0);
    }
}
