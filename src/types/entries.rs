/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Ledger entries, lists of them, and their textual wire encoding.
//!
//! Catch-up messages carry several entries in one field. On the wire these are `|`-delimited lists:
//! - [`EncodedEntries`]: `entry_id:decree` pairs, with each decree rendered as URL-safe, unpadded
//!   Base64 so that decrees may contain the delimiters themselves.
//! - [`EncodedEntryIDs`]: bare entry ids.
//!
//! The rest of the crate only ever handles the structured forms, [`EntryList`] and [`EntryIDList`].

use std::{collections::BTreeSet, num::ParseIntError};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use borsh::{BorshDeserialize, BorshSerialize};

use super::basic::{Decree, EntryID};

const LIST_DELIMITER: char = '|';
const PAIR_DELIMITER: char = ':';

/// A decree together with its position in the ledger.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryID,
    pub decree: Decree,
}

impl LedgerEntry {
    pub fn new(entry_id: EntryID, decree: Decree) -> Self {
        Self { entry_id, decree }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryList(Vec<LedgerEntry>);

impl EntryList {
    pub fn new(entries: Vec<LedgerEntry>) -> Self {
        Self(entries)
    }

    pub fn vec(&self) -> &Vec<LedgerEntry> {
        &self.0
    }

    pub fn into_vec(self) -> Vec<LedgerEntry> {
        self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LedgerEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entry_ids(&self) -> Vec<EntryID> {
        self.0.iter().map(|entry| entry.entry_id).collect()
    }

    pub fn encode(&self) -> EncodedEntries {
        let pairs: Vec<String> = self
            .0
            .iter()
            .map(|entry| {
                format!(
                    "{}{}{}",
                    entry.entry_id,
                    PAIR_DELIMITER,
                    URL_SAFE_NO_PAD.encode(entry.decree.bytes())
                )
            })
            .collect();
        EncodedEntries(pairs.join(&LIST_DELIMITER.to_string()))
    }
}

impl From<Vec<LedgerEntry>> for EntryList {
    fn from(entries: Vec<LedgerEntry>) -> Self {
        EntryList(entries)
    }
}

/// Wire form of an [`EntryList`].
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct EncodedEntries(String);

impl EncodedEntries {
    pub fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn decode(&self) -> Result<EntryList, EncodingError> {
        if self.0.is_empty() {
            return Ok(EntryList::default());
        }

        let mut entries = Vec::new();
        for pair in self.0.split(LIST_DELIMITER) {
            let (entry_id, decree) =
                pair.split_once(PAIR_DELIMITER)
                    .ok_or_else(|| EncodingError::MalformedPair {
                        pair: pair.to_string(),
                    })?;
            let entry_id = parse_entry_id(entry_id)?;
            let decree = URL_SAFE_NO_PAD
                .decode(decree)
                .map_err(|err| EncodingError::InvalidDecree {
                    entry_id,
                    source: err,
                })?;
            entries.push(LedgerEntry::new(entry_id, Decree::new(decree)));
        }

        Ok(EntryList(entries))
    }
}

/// A set of entry ids, e.g., the entries a lagging node already owns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryIDList(BTreeSet<EntryID>);

impl EntryIDList {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn contains(&self, entry_id: &EntryID) -> bool {
        self.0.contains(entry_id)
    }

    pub fn insert(&mut self, entry_id: EntryID) -> bool {
        self.0.insert(entry_id)
    }

    pub fn iter(&self) -> std::collections::btree_set::Iter<'_, EntryID> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn encode(&self) -> EncodedEntryIDs {
        let ids: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        EncodedEntryIDs(ids.join(&LIST_DELIMITER.to_string()))
    }
}

impl FromIterator<EntryID> for EntryIDList {
    fn from_iter<T: IntoIterator<Item = EntryID>>(iter: T) -> Self {
        EntryIDList(iter.into_iter().collect())
    }
}

/// Wire form of an [`EntryIDList`].
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct EncodedEntryIDs(String);

impl EncodedEntryIDs {
    pub fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn decode(&self) -> Result<EntryIDList, EncodingError> {
        if self.0.is_empty() {
            return Ok(EntryIDList::new());
        }

        self.0
            .split(LIST_DELIMITER)
            .map(parse_entry_id)
            .collect()
    }
}

fn parse_entry_id(text: &str) -> Result<EntryID, EncodingError> {
    text.trim()
        .parse::<u64>()
        .map(EntryID::new)
        .map_err(|err| EncodingError::InvalidEntryID {
            text: text.to_string(),
            source: err,
        })
}

/// Error when decoding an [`EncodedEntries`] or [`EncodedEntryIDs`] received from a peer.
#[derive(Debug)]
pub enum EncodingError {
    MalformedPair {
        pair: String,
    },
    InvalidEntryID {
        text: String,
        source: ParseIntError,
    },
    InvalidDecree {
        entry_id: EntryID,
        source: base64::DecodeError,
    },
}
