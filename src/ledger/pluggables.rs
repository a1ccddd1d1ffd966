/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for pluggable ledger persistence.
//!
//! The ledger only needs a key-value store with atomic, batched writes. There is no delete operation:
//! nothing the ledger writes is ever removed.

use std::fmt::Display;

use borsh::BorshDeserialize;

use crate::types::{
    basic::{Decree, EntryID},
    progress::ProgressRecord,
};

use super::variables::{self, concat};

pub trait KVStore: KVGet + Clone + Send + 'static {
    type WriteBatch: WriteBatch;

    fn write(&mut self, wb: Self::WriteBatch);
}

pub trait KVGet {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /* ↓↓↓ Entries ↓↓↓ */

    fn entry(&self, entry_id: EntryID) -> Result<Option<Decree>, KVGetError> {
        self.get(&concat(&variables::ENTRIES, &entry_id.to_le_bytes()))
            .map(|bytes| {
                Decree::deserialize(&mut &*bytes).map_err(|err| KVGetError::DeserializeValueError {
                    key: Key::Entry { entry_id },
                    source: err,
                })
            })
            .transpose()
    }

    /* ↓↓↓ Highest Entry ID ↓↓↓ */

    fn highest_entry_id(&self) -> Result<Option<EntryID>, KVGetError> {
        self.get(&variables::HIGHEST_ENTRY_ID)
            .map(|bytes| {
                EntryID::deserialize(&mut &*bytes).map_err(|err| {
                    KVGetError::DeserializeValueError {
                        key: Key::HighestEntryID,
                        source: err,
                    }
                })
            })
            .transpose()
    }

    /* ↓↓↓ Progress ↓↓↓ */

    fn progress(&self) -> Result<ProgressRecord, KVGetError> {
        ProgressRecord::deserialize(
            &mut &*self
                .get(&variables::PROGRESS)
                .ok_or(KVGetError::ValueExpectedButNotFound {
                    key: Key::Progress,
                })?,
        )
        .map_err(|err| KVGetError::DeserializeValueError {
            key: Key::Progress,
            source: err,
        })
    }
}

/// Error when trying to read a value corresponding to a given key from the [key value store][KVStore].
/// The error may arise in the following circumstances:
/// 1. The value corresponding to a given key cannot be deserialized into its expected type,
/// 2. The value corresponding to a given key cannot be found.
#[derive(Debug)]
pub enum KVGetError {
    DeserializeValueError { key: Key, source: std::io::Error },
    ValueExpectedButNotFound { key: Key },
}

#[derive(Debug)]
pub enum Key {
    Entry { entry_id: EntryID },
    HighestEntryID,
    Progress,
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            &Key::Entry { entry_id } => write!(f, "Entry {}", entry_id),
            &Key::HighestEntryID => write!(f, "Highest Entry ID"),
            &Key::Progress => write!(f, "Progress Record"),
        }
    }
}

pub trait WriteBatch {
    fn new() -> Self;
    fn set(&mut self, key: &[u8], value: &[u8]);
}
