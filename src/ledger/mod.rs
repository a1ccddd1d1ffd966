/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The persistent state of a replica.
//!
//! # The Ledger
//!
//! The ledger is a dense, append-only sequence of [decrees](crate::types::basic::Decree) indexed by
//! [entry id](crate::types::basic::EntryID), starting at 1. Once a slot holds a real decree, it holds
//! that decree forever. The only exception is the filler decree, which the president writes into slots
//! that no ballot has decided so that the ledger has no holes; a filler may later be superseded by a
//! real decree through the normal ballot process.
//!
//! # Beyond the Ledger
//!
//! Each replica also persists a single [progress record](crate::types::progress::ProgressRecord). It
//! holds the bookkeeping of the Synod protocol: the last ballot the replica began as a proposer, the
//! highest ballot it promised as an acceptor, and its previous vote. The record must be persisted
//! before any message that depends on it is sent.
//!
//! The documentation for the [`variables`] submodule lists everything stored by the `ledger` module.
//!
//! # Pluggable persistence
//!
//! - The ledger is kept in persistent storage, most probably in the host's filesystem.
//! - Library users get to choose how exactly this is done, by implementing the traits in
//!   [`pluggables`] for their key-value store of choice.
//! - The ledger merely requires a key-value store with atomic, batched writes.
//!
//! # Accessing the Ledger
//!
//! The user's key-value store gets wrapped in a [`LedgerStore`](store::LedgerStore), which puts every
//! variable in the right place and enforces immutability. Library users get a read-only
//! [`LedgerCamera`](store::LedgerCamera).

pub mod pluggables;

pub mod store;

pub mod variables;
