// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Change sets: ordered create, update and delete operations keyed by
//! record identity.
//!
//! Touching the same key twice merges into one entry:
//!
//! | existing | incoming | result |
//! |---|---|---|
//! | create | update | create with merged new values |
//! | create | delete | entry removed |
//! | update | update | update, new values merged, first old values kept |
//! | update | delete | delete carrying the oldest known values |
//! | delete | create | update from the deleted values to the new ones |
//!
//! Any other combination is rejected.

use std::collections::HashMap;

use crate::core::{CodecError, Result};
use crate::model::record::{FieldValues, Key};

/// State of a change-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeState {
    Create,
    Update,
    Delete,
}

impl ChangeState {
    /// Parse the wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(ChangeState::Create),
            "update" => Some(ChangeState::Update),
            "delete" => Some(ChangeState::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeState::Create => "create",
            ChangeState::Update => "update",
            ChangeState::Delete => "delete",
        }
    }
}

/// One operation of a change set.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEntry {
    Create {
        key: Key,
        new: FieldValues,
    },
    Update {
        key: Key,
        new: FieldValues,
        old: FieldValues,
    },
    Delete {
        key: Key,
        old: FieldValues,
    },
}

impl ChangeEntry {
    pub fn key(&self) -> &Key {
        match self {
            ChangeEntry::Create { key, .. }
            | ChangeEntry::Update { key, .. }
            | ChangeEntry::Delete { key, .. } => key,
        }
    }

    pub fn state(&self) -> ChangeState {
        match self {
            ChangeEntry::Create { .. } => ChangeState::Create,
            ChangeEntry::Update { .. } => ChangeState::Update,
            ChangeEntry::Delete { .. } => ChangeState::Delete,
        }
    }

    /// New values of a create or update.
    pub fn new_values(&self) -> Option<&FieldValues> {
        match self {
            ChangeEntry::Create { new, .. } | ChangeEntry::Update { new, .. } => Some(new),
            ChangeEntry::Delete { .. } => None,
        }
    }

    /// Previous values of an update or delete.
    pub fn old_values(&self) -> Option<&FieldValues> {
        match self {
            ChangeEntry::Update { old, .. } | ChangeEntry::Delete { old, .. } => Some(old),
            ChangeEntry::Create { .. } => None,
        }
    }

    fn new_values_mut(&mut self) -> Option<&mut FieldValues> {
        match self {
            ChangeEntry::Create { new, .. } | ChangeEntry::Update { new, .. } => Some(new),
            ChangeEntry::Delete { .. } => None,
        }
    }

    fn old_values_mut(&mut self) -> Option<&mut FieldValues> {
        match self {
            ChangeEntry::Update { old, .. } | ChangeEntry::Delete { old, .. } => Some(old),
            ChangeEntry::Create { .. } => None,
        }
    }
}

/// Receives the entries of a change source in emission order.
pub trait ChangeSetVisitor {
    fn visit_create(&mut self, key: &Key, new: &FieldValues) -> Result<()>;

    fn visit_update(&mut self, key: &Key, new: &FieldValues, old: &FieldValues) -> Result<()>;

    fn visit_delete(&mut self, key: &Key, old: &FieldValues) -> Result<()>;
}

/// Anything that can replay change entries to a visitor.
pub trait ChangeSource {
    fn visit(&self, visitor: &mut dyn ChangeSetVisitor) -> Result<()>;
}

/// Which side of an entry a value set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    New,
    Old,
}

/// Ordered collection of change entries, at most one per key.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    // Removed entries leave a `None` slot so stored positions stay valid.
    entries: Vec<Option<ChangeEntry>>,
    index: HashMap<Key, usize>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the creation of `key`.
    pub fn create(&mut self, key: Key, new: FieldValues) -> Result<()> {
        match self.take(&key) {
            None => self.push(ChangeEntry::Create { key, new }),
            Some((slot, ChangeEntry::Delete { old, .. })) => {
                self.put(slot, ChangeEntry::Update { key, new, old })
            }
            Some((slot, existing)) => {
                let state = existing.state();
                self.put(slot, existing);
                return Err(conflict(&key, ChangeState::Create, state));
            }
        }
        Ok(())
    }

    /// Record an update of `key`.
    pub fn update(&mut self, key: Key, new: FieldValues, old: FieldValues) -> Result<()> {
        match self.take(&key) {
            None => self.push(ChangeEntry::Update { key, new, old }),
            Some((slot, ChangeEntry::Create { key, new: mut created })) => {
                created.merge(new);
                self.put(slot, ChangeEntry::Create { key, new: created });
            }
            Some((
                slot,
                ChangeEntry::Update {
                    key,
                    new: mut current,
                    old: mut previous,
                },
            )) => {
                current.merge(new);
                previous.merge_missing(old);
                self.put(
                    slot,
                    ChangeEntry::Update {
                        key,
                        new: current,
                        old: previous,
                    },
                );
            }
            Some((slot, existing)) => {
                self.put(slot, existing);
                return Err(conflict(&key, ChangeState::Update, ChangeState::Delete));
            }
        }
        Ok(())
    }

    /// Record the deletion of `key`.
    pub fn delete(&mut self, key: Key, old: FieldValues) -> Result<()> {
        match self.take(&key) {
            None => self.push(ChangeEntry::Delete { key, old }),
            Some((_, ChangeEntry::Create { .. })) => {}
            Some((slot, ChangeEntry::Update { key, old: mut previous, .. })) => {
                previous.merge_missing(old);
                self.put(slot, ChangeEntry::Delete { key, old: previous });
            }
            Some((slot, existing)) => {
                self.put(slot, existing);
                return Err(conflict(&key, ChangeState::Delete, ChangeState::Delete));
            }
        }
        Ok(())
    }

    /// Entries in emission order.
    pub fn entries(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.entries.iter().flatten()
    }

    pub fn get(&self, key: &Key) -> Option<&ChangeEntry> {
        self.index
            .get(key)
            .and_then(|&slot| self.entries[slot].as_ref())
    }

    pub fn is_created(&self, key: &Key) -> bool {
        matches!(self.get(key), Some(ChangeEntry::Create { .. }))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub(crate) fn values_mut(&mut self, key: &Key, side: Side) -> Option<&mut FieldValues> {
        let slot = *self.index.get(key)?;
        let entry = self.entries[slot].as_mut()?;
        match side {
            Side::New => entry.new_values_mut(),
            Side::Old => entry.old_values_mut(),
        }
    }

    fn take(&mut self, key: &Key) -> Option<(usize, ChangeEntry)> {
        let slot = self.index.remove(key)?;
        self.entries[slot].take().map(|entry| (slot, entry))
    }

    fn put(&mut self, slot: usize, entry: ChangeEntry) {
        self.index.insert(entry.key().clone(), slot);
        self.entries[slot] = Some(entry);
    }

    fn push(&mut self, entry: ChangeEntry) {
        self.index.insert(entry.key().clone(), self.entries.len());
        self.entries.push(Some(entry));
    }
}

impl ChangeSource for ChangeSet {
    fn visit(&self, visitor: &mut dyn ChangeSetVisitor) -> Result<()> {
        for entry in self.entries() {
            match entry {
                ChangeEntry::Create { key, new } => visitor.visit_create(key, new)?,
                ChangeEntry::Update { key, new, old } => visitor.visit_update(key, new, old)?,
                ChangeEntry::Delete { key, old } => visitor.visit_delete(key, old)?,
            }
        }
        Ok(())
    }
}

fn conflict(key: &Key, operation: ChangeState, existing: ChangeState) -> CodecError {
    CodecError::format(
        "change set",
        format!(
            "cannot {} {key}: it already has a {} entry",
            operation.as_str(),
            existing.as_str()
        ),
    )
}
