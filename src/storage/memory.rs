//! In-memory record store
//!
//! Holds every loaded plugin in memory in load order and implements
//! [`RecordStore`] on top of it. Writes go to a patch plugin: a container is
//! copied into the patch the first time it is written, and clones are
//! created directly in the patch.
//!
//! Each acquisition gets its own handle id, so the store can report handles
//! that were never released or released twice.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::domain::EntryTemplate;

use super::plugin::{FormKey, ListEntry, Record};
use super::store::{RawHandle, RecordStore, StoreError};

/// First object id allocated for records created in the patch
const FIRST_PATCH_FORM_ID: u32 = 0x000800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Record(usize),
    Entry(usize, usize),
    Member(usize, usize),
}

#[derive(Debug)]
struct Version {
    plugin: String,
    record: Record,
}

#[derive(Debug)]
struct Inner {
    patch_name: String,
    versions: Vec<Version>,
    /// Version indices per record, in load order
    overrides: HashMap<FormKey, Vec<usize>>,
    /// Records in first-seen order
    load_order: Vec<FormKey>,
    editor_ids: HashSet<String>,
    patch_versions: Vec<usize>,
    handles: HashMap<u64, Target>,
    next_handle: u64,
    next_form_id: u32,
    bad_releases: usize,
}

/// Record store backed by plugins held in memory
#[derive(Debug)]
pub struct MemoryStore {
    inner: RefCell<Inner>,
}

impl MemoryStore {
    /// Creates an empty store whose writes go to the named patch plugin
    pub fn new(patch_name: impl Into<String>) -> Self {
        Self {
            inner: RefCell::new(Inner {
                patch_name: patch_name.into(),
                versions: Vec::new(),
                overrides: HashMap::new(),
                load_order: Vec::new(),
                editor_ids: HashSet::new(),
                patch_versions: Vec::new(),
                handles: HashMap::new(),
                next_handle: 1,
                next_form_id: FIRST_PATCH_FORM_ID,
                bad_releases: 0,
            }),
        }
    }

    /// Loads a plugin after all previously loaded ones
    pub fn load_plugin(&mut self, name: &str, records: Vec<Record>) {
        let inner = self.inner.get_mut();
        for record in records {
            inner.push_version(name.to_string(), record);
        }
    }

    /// Records written to the patch, in creation order
    pub fn patch_records(&self) -> Vec<Record> {
        let inner = self.inner.borrow();
        inner
            .patch_versions
            .iter()
            .map(|&v| inner.versions[v].record.clone())
            .collect()
    }

    /// Winning version of a record by editor ID
    pub fn winning_by_editor_id(&self, editor_id: &str) -> Option<Record> {
        let inner = self.inner.borrow();
        inner.load_order.iter().find_map(|key| {
            let winner = inner.winning(key)?;
            let record = &inner.versions[winner].record;
            (record.editor_id == editor_id).then(|| record.clone())
        })
    }

    /// Handles acquired but not yet released
    pub fn outstanding_handles(&self) -> usize {
        self.inner.borrow().handles.len()
    }

    /// Releases of handles that were unknown or already released
    pub fn bad_releases(&self) -> usize {
        self.inner.borrow().bad_releases
    }
}

impl Inner {
    fn push_version(&mut self, plugin: String, record: Record) -> usize {
        let index = self.versions.len();
        let key = record.form_key.clone();
        self.editor_ids.insert(record.editor_id.clone());
        if plugin == self.patch_name {
            self.patch_versions.push(index);
        }
        self.versions.push(Version { plugin, record });

        let versions = self.overrides.entry(key.clone()).or_default();
        if versions.is_empty() {
            self.load_order.push(key);
        }
        versions.push(index);
        index
    }

    fn winning(&self, key: &FormKey) -> Option<usize> {
        self.overrides.get(key).and_then(|versions| versions.last().copied())
    }

    fn master(&self, key: &FormKey) -> Option<usize> {
        self.overrides.get(key).and_then(|versions| versions.first().copied())
    }

    fn acquire(&mut self, target: Target) -> RawHandle {
        let id = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(id, target);
        RawHandle::new(id)
    }

    fn target(&self, handle: RawHandle) -> Result<Target, StoreError> {
        self.handles
            .get(&handle.get())
            .copied()
            .ok_or(StoreError::UnknownHandle(handle))
    }

    fn record_version(&self, handle: RawHandle) -> Result<usize, StoreError> {
        match self.target(handle)? {
            Target::Record(v) => Ok(v),
            _ => Err(StoreError::NotARecord(handle)),
        }
    }

    fn record(&self, handle: RawHandle) -> Result<&Record, StoreError> {
        let v = self.record_version(handle)?;
        Ok(&self.versions[v].record)
    }

    /// Version of the handle's record that lives in the patch, copying it in if needed
    ///
    /// The handle is re-pointed at the patch version.
    fn patch_version(&mut self, handle: RawHandle) -> Result<usize, StoreError> {
        let v = self.record_version(handle)?;
        let key = self.versions[v].record.form_key.clone();
        let winner = self.winning(&key).unwrap_or(v);

        let patched = if self.versions[winner].plugin == self.patch_name {
            winner
        } else {
            let record = self.versions[winner].record.clone();
            let plugin = self.patch_name.clone();
            self.push_version(plugin, record)
        };

        self.handles.insert(handle.get(), Target::Record(patched));
        Ok(patched)
    }

    fn link_target(&self, handle: RawHandle) -> Result<Option<&FormKey>, StoreError> {
        match self.target(handle)? {
            Target::Entry(v, i) => Ok(self.versions[v].record.entries[i].reference.as_ref()),
            Target::Member(v, i) => Ok(self.versions[v].record.members[i].as_ref()),
            Target::Record(_) => Err(StoreError::NotAnEntry(handle)),
        }
    }
}

impl RecordStore for MemoryStore {
    fn enumerate(&self, signature: &str) -> Result<Vec<RawHandle>, StoreError> {
        let mut inner = self.inner.borrow_mut();
        let masters: Vec<usize> = inner
            .load_order
            .iter()
            .filter_map(|key| inner.master(key))
            .filter(|&v| inner.versions[v].record.signature == signature)
            .collect();

        Ok(masters
            .into_iter()
            .map(|v| inner.acquire(Target::Record(v)))
            .collect())
    }

    fn winning_override(&self, handle: RawHandle) -> Result<RawHandle, StoreError> {
        let mut inner = self.inner.borrow_mut();
        let v = inner.record_version(handle)?;
        let key = inner.versions[v].record.form_key.clone();
        match inner.winning(&key) {
            Some(winner) if winner != v => Ok(inner.acquire(Target::Record(winner))),
            _ => Ok(handle),
        }
    }

    fn editor_id(&self, handle: RawHandle) -> Result<String, StoreError> {
        Ok(self.inner.borrow().record(handle)?.editor_id.clone())
    }

    fn long_name(&self, handle: RawHandle) -> Result<String, StoreError> {
        let inner = self.inner.borrow();
        let record = inner.record(handle)?;
        Ok(match &record.name {
            Some(name) => format!(
                "{} \"{}\" [{}:{}]",
                record.editor_id, name, record.signature, record.form_key
            ),
            None => format!(
                "{} [{}:{}]",
                record.editor_id, record.signature, record.form_key
            ),
        })
    }

    fn signature(&self, handle: RawHandle) -> Result<String, StoreError> {
        Ok(self.inner.borrow().record(handle)?.signature.clone())
    }

    fn has_entries(&self, list: RawHandle) -> Result<bool, StoreError> {
        Ok(!self.inner.borrow().record(list)?.entries.is_empty())
    }

    fn has_members(&self, set: RawHandle) -> Result<bool, StoreError> {
        Ok(!self.inner.borrow().record(set)?.members.is_empty())
    }

    fn entries(&self, list: RawHandle) -> Result<Vec<RawHandle>, StoreError> {
        let mut inner = self.inner.borrow_mut();
        let v = inner.record_version(list)?;
        let len = inner.versions[v].record.entries.len();
        Ok((0..len).map(|i| inner.acquire(Target::Entry(v, i))).collect())
    }

    fn members(&self, set: RawHandle) -> Result<Vec<RawHandle>, StoreError> {
        let mut inner = self.inner.borrow_mut();
        let v = inner.record_version(set)?;
        let len = inner.versions[v].record.members.len();
        Ok((0..len).map(|i| inner.acquire(Target::Member(v, i))).collect())
    }

    fn resolve_reference(&self, link: RawHandle) -> Result<Option<RawHandle>, StoreError> {
        let mut inner = self.inner.borrow_mut();
        let master = match inner.link_target(link)? {
            Some(key) => inner.master(key),
            None => None,
        };
        Ok(master.map(|v| inner.acquire(Target::Record(v))))
    }

    fn read_entry(&self, entry: RawHandle) -> Result<EntryTemplate, StoreError> {
        let inner = self.inner.borrow();
        match inner.target(entry)? {
            Target::Entry(v, i) => Ok(inner.versions[v].record.entries[i].template()),
            _ => Err(StoreError::NotAnEntry(entry)),
        }
    }

    fn create_entry(
        &self,
        list: RawHandle,
        template: &EntryTemplate,
        leaf: RawHandle,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        let reference = inner.record(leaf)?.form_key.clone();
        let v = inner.patch_version(list)?;
        inner.versions[v]
            .record
            .entries
            .push(ListEntry::from_template(template, reference));
        Ok(())
    }

    fn create_membership(&self, set: RawHandle, leaf: RawHandle) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        let reference = inner.record(leaf)?.form_key.clone();
        let v = inner.patch_version(set)?;
        inner.versions[v].record.members.push(Some(reference));
        Ok(())
    }

    fn clone_leaf(&self, original: RawHandle, editor_id: &str) -> Result<RawHandle, StoreError> {
        let mut inner = self.inner.borrow_mut();
        if inner.editor_ids.contains(editor_id) {
            return Err(StoreError::CreateFailed(
                editor_id.to_string(),
                "editor ID already in use".to_string(),
            ));
        }

        let mut record = inner.record(original)?.clone();
        record.form_key = FormKey::in_plugin(inner.next_form_id, &inner.patch_name);
        record.editor_id = editor_id.to_string();
        inner.next_form_id += 1;

        let plugin = inner.patch_name.clone();
        let v = inner.push_version(plugin, record);
        Ok(inner.acquire(Target::Record(v)))
    }

    fn release(&self, handle: RawHandle) {
        let mut inner = self.inner.borrow_mut();
        if inner.handles.remove(&handle.get()).is_none() {
            inner.bad_releases += 1;
        }
    }
}
