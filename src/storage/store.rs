//! Record store interface and scoped handles
//!
//! The patching pipeline never talks to a record store directly. It goes
//! through a [`Session`], which wraps every handle the store hands out in a
//! [`Held`] guard. Dropping the guard releases the handle, so each
//! acquisition is released exactly once on every exit path.

use std::fmt;

use thiserror::Error;

use crate::domain::EntryTemplate;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown handle: {0}")]
    UnknownHandle(RawHandle),

    #[error("Handle {0} does not point at a record")]
    NotARecord(RawHandle),

    #[error("Handle {0} does not point at a list entry")]
    NotAnEntry(RawHandle),

    #[error("Failed to create record {0}: {1}")]
    CreateFailed(String, String),
}

/// Opaque handle issued by a [`RecordStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(u64);

impl RawHandle {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Capabilities the patcher needs from the record store
///
/// Every method that returns a [`RawHandle`] hands over one acquisition
/// which must be passed to [`RecordStore::release`] exactly once.
pub trait RecordStore {
    /// All records with the given signature, in load order
    fn enumerate(&self, signature: &str) -> Result<Vec<RawHandle>, StoreError>;

    /// Canonical (winning) version of a record
    ///
    /// May return the input handle. When it returns a different one, the
    /// caller still owns the input and must release it.
    fn winning_override(&self, handle: RawHandle) -> Result<RawHandle, StoreError>;

    fn editor_id(&self, handle: RawHandle) -> Result<String, StoreError>;

    /// Human-readable name used in log messages
    fn long_name(&self, handle: RawHandle) -> Result<String, StoreError>;

    fn signature(&self, handle: RawHandle) -> Result<String, StoreError>;

    fn has_entries(&self, list: RawHandle) -> Result<bool, StoreError>;

    fn has_members(&self, set: RawHandle) -> Result<bool, StoreError>;

    fn entries(&self, list: RawHandle) -> Result<Vec<RawHandle>, StoreError>;

    fn members(&self, set: RawHandle) -> Result<Vec<RawHandle>, StoreError>;

    /// Record an entry or member links to, `None` for null or dangling links
    fn resolve_reference(&self, link: RawHandle) -> Result<Option<RawHandle>, StoreError>;

    fn read_entry(&self, entry: RawHandle) -> Result<EntryTemplate, StoreError>;

    fn create_entry(
        &self,
        list: RawHandle,
        template: &EntryTemplate,
        leaf: RawHandle,
    ) -> Result<(), StoreError>;

    fn create_membership(&self, set: RawHandle, leaf: RawHandle) -> Result<(), StoreError>;

    /// Copies `original` into the patch as a new record named `editor_id`
    fn clone_leaf(&self, original: RawHandle, editor_id: &str) -> Result<RawHandle, StoreError>;

    fn release(&self, handle: RawHandle);
}

/// A handle owned by the current run, released on drop
pub struct Held<'s> {
    store: &'s dyn RecordStore,
    raw: RawHandle,
}

impl<'s> Held<'s> {
    pub fn raw(&self) -> RawHandle {
        self.raw
    }
}

impl fmt::Debug for Held<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Held").field(&self.raw).finish()
    }
}

impl Drop for Held<'_> {
    fn drop(&mut self) {
        self.store.release(self.raw);
    }
}

/// Scoped view of a record store for one patch run
#[derive(Clone, Copy)]
pub struct Session<'s> {
    store: &'s dyn RecordStore,
}

impl<'s> Session<'s> {
    pub fn new(store: &'s dyn RecordStore) -> Self {
        Self { store }
    }

    fn adopt(&self, raw: RawHandle) -> Held<'s> {
        Held {
            store: self.store,
            raw,
        }
    }

    fn adopt_all(&self, raws: Vec<RawHandle>) -> Vec<Held<'s>> {
        raws.into_iter().map(|raw| self.adopt(raw)).collect()
    }

    pub fn enumerate(&self, signature: &str) -> Result<Vec<Held<'s>>, StoreError> {
        Ok(self.adopt_all(self.store.enumerate(signature)?))
    }

    /// Swaps a handle for its winning override, releasing the original if replaced
    pub fn winning_override(&self, handle: Held<'s>) -> Result<Held<'s>, StoreError> {
        let winner = self.store.winning_override(handle.raw)?;
        if winner == handle.raw {
            Ok(handle)
        } else {
            let winner = self.adopt(winner);
            drop(handle);
            Ok(winner)
        }
    }

    pub fn editor_id(&self, handle: &Held<'s>) -> Result<String, StoreError> {
        self.store.editor_id(handle.raw)
    }

    pub fn long_name(&self, handle: &Held<'s>) -> Result<String, StoreError> {
        self.store.long_name(handle.raw)
    }

    pub fn signature(&self, handle: &Held<'s>) -> Result<String, StoreError> {
        self.store.signature(handle.raw)
    }

    pub fn has_entries(&self, list: &Held<'s>) -> Result<bool, StoreError> {
        self.store.has_entries(list.raw)
    }

    pub fn has_members(&self, set: &Held<'s>) -> Result<bool, StoreError> {
        self.store.has_members(set.raw)
    }

    pub fn entries(&self, list: &Held<'s>) -> Result<Vec<Held<'s>>, StoreError> {
        Ok(self.adopt_all(self.store.entries(list.raw)?))
    }

    pub fn members(&self, set: &Held<'s>) -> Result<Vec<Held<'s>>, StoreError> {
        Ok(self.adopt_all(self.store.members(set.raw)?))
    }

    pub fn resolve_reference(&self, link: &Held<'s>) -> Result<Option<Held<'s>>, StoreError> {
        Ok(self.store.resolve_reference(link.raw)?.map(|raw| self.adopt(raw)))
    }

    /// Editor ID of the record a link points at, releasing the target right away
    pub fn linked_editor_id(&self, link: &Held<'s>) -> Result<Option<String>, StoreError> {
        match self.resolve_reference(link)? {
            Some(target) => Ok(Some(self.editor_id(&target)?)),
            None => Ok(None),
        }
    }

    pub fn read_entry(&self, entry: &Held<'s>) -> Result<EntryTemplate, StoreError> {
        self.store.read_entry(entry.raw)
    }

    pub fn create_entry(
        &self,
        list: &Held<'s>,
        template: &EntryTemplate,
        leaf: &Held<'s>,
    ) -> Result<(), StoreError> {
        self.store.create_entry(list.raw, template, leaf.raw)
    }

    pub fn create_membership(&self, set: &Held<'s>, leaf: &Held<'s>) -> Result<(), StoreError> {
        self.store.create_membership(set.raw, leaf.raw)
    }

    pub fn clone_leaf(&self, original: &Held<'s>, editor_id: &str) -> Result<Held<'s>, StoreError> {
        Ok(self.adopt(self.store.clone_leaf(original.raw, editor_id)?))
    }
}
