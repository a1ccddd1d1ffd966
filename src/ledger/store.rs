/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Typed, immutability-enforcing access to the ledger and the progress record.
//!
//! [`LedgerStore`] is the only way the protocol writes to the user's [`KVStore`]. Its write methods are
//! where the append-only contract is enforced:
//! - An entry holding a real decree is never overwritten. Attempts fail with
//!   [`LedgerError::ImmutabilityViolation`].
//! - An entry holding the [filler decree](crate::types::basic::Decree::filler) may be overwritten.
//! - Entries are never deleted.
//!
//! Handles are cheap to clone. All clones share one write lock, so read-check-write sequences on the
//! same record never interleave, even when the proposer and acceptor threads update the progress record
//! at the same time.

use std::sync::{Arc, Mutex, MutexGuard};

use borsh::BorshSerialize;

use crate::types::{
    ballot::BallotNumber,
    basic::{Decree, EntryID},
    entries::{EntryIDList, LedgerEntry},
    progress::ProgressRecord,
};

use super::{
    pluggables::{KVGet, KVGetError, KVStore, Key, WriteBatch},
    variables::{concat, ENTRIES, HIGHEST_ENTRY_ID, PROGRESS},
};

#[derive(Clone)]
pub struct LedgerStore<K: KVStore> {
    kv_store: K,
    write_lock: Arc<Mutex<()>>,
}

impl<K: KVStore> LedgerStore<K> {
    pub fn new(kv_store: K) -> Self {
        Self {
            kv_store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /* ↓↓↓ Initialization ↓↓↓ */

    /// Seed the progress record with sentinel values. Does nothing if a progress record already exists.
    pub fn initialize(&mut self) -> Result<(), LedgerError> {
        let lock = Arc::clone(&self.write_lock);
        let _guard = acquire(&lock);

        if self.kv_store.get(&PROGRESS).is_none() {
            self.write_progress(&ProgressRecord::initial())?;
        }
        Ok(())
    }

    /* ↓↓↓ Entries (writes) ↓↓↓ */

    /// Write `decree` at `entry_id` unless the entry already holds a real decree.
    pub fn append(
        &mut self,
        entry_id: EntryID,
        decree: Decree,
    ) -> Result<AppendOutcome, LedgerError> {
        let lock = Arc::clone(&self.write_lock);
        let _guard = acquire(&lock);

        self.append_unlocked(entry_id, &decree)
    }

    /// Always fails: ledger entries are never removed.
    pub fn delete(&mut self, entry_id: EntryID) -> Result<(), LedgerError> {
        Err(LedgerError::ImmutabilityViolation { entry_id })
    }

    /// Record the outcome of a ballot. If the entry already holds a real decree, nothing is written and
    /// the existing decree is returned instead.
    pub fn write_if_outcome_unknown(
        &mut self,
        entry_id: EntryID,
        decree: Decree,
    ) -> Result<WriteOutcome, LedgerError> {
        let lock = Arc::clone(&self.write_lock);
        let _guard = acquire(&lock);

        match self.kv_store.entry(entry_id)? {
            Some(existing) if !existing.is_filler() => Ok(WriteOutcome::AlreadyKnown { existing }),
            _ => self
                .append_unlocked(entry_id, &decree)
                .map(WriteOutcome::Written),
        }
    }

    fn append_unlocked(
        &mut self,
        entry_id: EntryID,
        decree: &Decree,
    ) -> Result<AppendOutcome, LedgerError> {
        if entry_id.int() == 0 {
            return Err(LedgerError::InvalidEntryID);
        }

        let outcome = match self.kv_store.entry(entry_id)? {
            Some(existing) if !existing.is_filler() => {
                return Err(LedgerError::ImmutabilityViolation { entry_id })
            }
            Some(_) => AppendOutcome::ReplacedFiller,
            None => AppendOutcome::Inserted,
        };

        let mut wb = K::WriteBatch::new();
        wb.set(
            &concat(&ENTRIES, &entry_id.to_le_bytes()),
            &decree
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::Entry { entry_id },
                    source: err,
                })?,
        );
        let highest = self.kv_store.highest_entry_id()?;
        if highest.map_or(true, |highest| entry_id > highest) {
            wb.set(
                &HIGHEST_ENTRY_ID,
                &entry_id
                    .try_to_vec()
                    .map_err(|err| KVSetError::SerializeValueError {
                        key: Key::HighestEntryID,
                        source: err,
                    })?,
            );
        }
        self.kv_store.write(wb);

        Ok(outcome)
    }

    /* ↓↓↓ Entries (reads) ↓↓↓ */

    pub fn get(&self, entry_id: EntryID) -> Result<Option<Decree>, LedgerError> {
        if entry_id.int() == 0 {
            return Ok(None);
        }
        Ok(self.kv_store.entry(entry_id)?)
    }

    /// All entries, ordered by entry id.
    pub fn list_all(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.entries_in(1, self.highest()?)
    }

    pub fn last_entry_id(&self) -> Result<Option<EntryID>, LedgerError> {
        Ok(self.kv_store.highest_entry_id()?)
    }

    /// The largest `n` such that entries `1..=n` are all present, or 0 if entry 1 is absent.
    pub fn last_contiguous_entry_id(&self) -> Result<EntryID, LedgerError> {
        let highest = self.highest()?;
        let mut last = 0;
        while last < highest && self.kv_store.entry(EntryID::new(last + 1))?.is_some() {
            last += 1;
        }
        Ok(EntryID::new(last))
    }

    /// Ids below the highest entry id that hold no decree at all.
    pub fn missing_entry_ids(&self) -> Result<Vec<EntryID>, LedgerError> {
        let mut missing = Vec::new();
        for id in 1..self.highest()? {
            let entry_id = EntryID::new(id);
            if self.kv_store.entry(entry_id)?.is_none() {
                missing.push(entry_id);
            }
        }
        Ok(missing)
    }

    /// Real (non-filler) entries with id greater than `hint`.
    pub fn entries_after(&self, hint: EntryID) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self
            .entries_in(hint.int() + 1, self.highest()?)?
            .into_iter()
            .filter(|entry| !entry.decree.is_filler())
            .collect())
    }

    /// Entries with id at most `up_to` whose ids are not in `owned`.
    pub fn entries_not_in(
        &self,
        owned: &EntryIDList,
        up_to: EntryID,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let up_to = up_to.int().min(self.highest()?);
        Ok(self
            .entries_in(1, up_to)?
            .into_iter()
            .filter(|entry| !owned.contains(&entry.entry_id))
            .collect())
    }

    fn entries_in(&self, from: u64, to: u64) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut entries = Vec::new();
        for id in from..=to {
            let entry_id = EntryID::new(id);
            if let Some(decree) = self.kv_store.entry(entry_id)? {
                entries.push(LedgerEntry::new(entry_id, decree));
            }
        }
        Ok(entries)
    }

    fn highest(&self) -> Result<u64, LedgerError> {
        Ok(self.kv_store.highest_entry_id()?.map_or(0, |id| id.int()))
    }

    /* ↓↓↓ Progress ↓↓↓ */

    pub fn load_progress(&self) -> Result<ProgressRecord, LedgerError> {
        Ok(self.kv_store.progress()?)
    }

    pub fn save_progress(&mut self, record: &ProgressRecord) -> Result<(), LedgerError> {
        let lock = Arc::clone(&self.write_lock);
        let _guard = acquire(&lock);

        self.write_progress(record)
    }

    /// Read-modify-write the progress record under the write lock.
    ///
    /// `f` returns whether the modified record should be persisted. Returns the persisted record, or
    /// `None` if `f` declined.
    pub fn update_progress<F>(&mut self, f: F) -> Result<Option<ProgressRecord>, LedgerError>
    where
        F: FnOnce(&mut ProgressRecord) -> bool,
    {
        let lock = Arc::clone(&self.write_lock);
        let _guard = acquire(&lock);

        let mut record = self.kv_store.progress()?;
        if !f(&mut record) {
            return Ok(None);
        }
        self.write_progress(&record)?;
        Ok(Some(record))
    }

    fn write_progress(&mut self, record: &ProgressRecord) -> Result<(), LedgerError> {
        if !record.is_consistent() {
            return Err(LedgerError::InconsistentProgress {
                next_bal: record.next_bal,
                prev_bal: record.prev_bal(),
            });
        }

        let mut wb = K::WriteBatch::new();
        wb.set(
            &PROGRESS,
            &record
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::Progress,
                    source: err,
                })?,
        );
        self.kv_store.write(wb);
        Ok(())
    }
}

fn acquire(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    // The guarded value is `()`, so a panic in another holder cannot leave it inconsistent.
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A read-only view of the ledger, handed to library users through
/// [`Replica::ledger`](crate::replica::Replica::ledger).
#[derive(Clone)]
pub struct LedgerCamera<K: KVStore>(LedgerStore<K>);

impl<K: KVStore> LedgerCamera<K> {
    pub fn new(kv_store: K) -> Self {
        Self(LedgerStore::new(kv_store))
    }

    pub fn get(&self, entry_id: EntryID) -> Result<Option<Decree>, LedgerError> {
        self.0.get(entry_id)
    }

    pub fn list_all(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.0.list_all()
    }

    pub fn last_entry_id(&self) -> Result<Option<EntryID>, LedgerError> {
        self.0.last_entry_id()
    }

    pub fn last_contiguous_entry_id(&self) -> Result<EntryID, LedgerError> {
        self.0.last_contiguous_entry_id()
    }

    pub fn missing_entry_ids(&self) -> Result<Vec<EntryID>, LedgerError> {
        self.0.missing_entry_ids()
    }

    pub fn progress(&self) -> Result<ProgressRecord, LedgerError> {
        self.0.load_progress()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    ReplacedFiller,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(AppendOutcome),
    AlreadyKnown { existing: Decree },
}

/// Error when trying to serialize a value before writing it to the [key value store][KVStore].
#[derive(Debug)]
pub enum KVSetError {
    SerializeValueError { key: Key, source: std::io::Error },
}

#[derive(Debug)]
pub enum LedgerError {
    ImmutabilityViolation {
        entry_id: EntryID,
    },
    InvalidEntryID,
    InconsistentProgress {
        next_bal: BallotNumber,
        prev_bal: BallotNumber,
    },
    KVGetError(KVGetError),
    KVSetError(KVSetError),
}

impl From<KVGetError> for LedgerError {
    fn from(value: KVGetError) -> Self {
        LedgerError::KVGetError(value)
    }
}

impl From<KVSetError> for LedgerError {
    fn from(value: KVSetError) -> Self {
        LedgerError::KVSetError(value)
    }
}
