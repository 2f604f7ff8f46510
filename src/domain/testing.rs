//! Record fixtures shared by the domain tests
//!
//! Form keys are derived from editor IDs (`Raider` lives at
//! `Raider:Base.esm`) so fixtures can reference records by name.

use crate::storage::{FormKey, ListEntry, MemoryStore, Record};

pub const PATCH: &str = "zPatch.jsonl";

pub fn key(editor_id: &str) -> FormKey {
    FormKey::new(format!("{}:Base.esm", editor_id))
}

pub fn npc(editor_id: &str) -> Record {
    Record::new(key(editor_id), "NPC_", editor_id)
}

pub fn other(signature: &str, editor_id: &str) -> Record {
    Record::new(key(editor_id), signature, editor_id)
}

/// Leveled list with one default entry per reference
pub fn lvln(editor_id: &str, references: &[&str]) -> Record {
    let entries = references
        .iter()
        .map(|reference| ListEntry::new(1, key(reference), 1))
        .collect();
    lvln_with(editor_id, entries)
}

pub fn lvln_with(editor_id: &str, entries: Vec<ListEntry>) -> Record {
    Record::new(key(editor_id), "LVLN", editor_id).with_entries(entries)
}

pub fn flst(editor_id: &str, references: &[&str]) -> Record {
    Record::new(key(editor_id), "FLST", editor_id)
        .with_members(references.iter().map(|reference| key(reference)))
}

pub fn store(records: Vec<Record>) -> MemoryStore {
    let mut store = MemoryStore::new(PATCH);
    store.load_plugin("Base.esm", records);
    store
}
