/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Identifiers and the [`Decree`] payload.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::Add,
};

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};

/// Text of the filler decree, used to plug holes in the ledger that no ballot ever decided.
pub const FILLER_DECREE: &[u8] = b"The ides of February is national olive day";

/// Identifies a node in the cluster. Unique per process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize)]
pub struct NodeID(u64);

impl NodeID {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for NodeID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Position of a decree in the ledger. Valid entry ids start at 1; 0 means "no entry".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize)]
pub struct EntryID(u64);

impl EntryID {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }

    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl Display for EntryID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<u64> for EntryID {
    type Output = EntryID;
    fn add(self, rhs: u64) -> Self::Output {
        EntryID::new(self.0 + rhs)
    }
}

/// An opaque command agreed upon by the cluster and recorded in the ledger.
#[derive(Clone, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct Decree(Vec<u8>);

impl Decree {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The decree used to fill ledger holes. It may later be superseded by a real decree.
    pub fn filler() -> Self {
        Self(FILLER_DECREE.to_vec())
    }

    pub fn is_filler(&self) -> bool {
        self.0 == FILLER_DECREE
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// SHA-256 digest of the decree's bytes. Used to refer to a decree compactly in logs.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.0);
        hasher.finalize().into()
    }
}

impl From<&str> for Decree {
    fn from(text: &str) -> Self {
        Decree::new(text.as_bytes().to_vec())
    }
}

impl From<String> for Decree {
    fn from(text: String) -> Self {
        Decree::new(text.into_bytes())
    }
}

impl Debug for Decree {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) => write!(f, "Decree({:?})", text),
            Err(_) => write!(f, "Decree({:?})", self.0),
        }
    }
}
