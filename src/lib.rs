/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A Rust implementation of the Synod protocol from Leslie Lamport's "The Part-Time Parliament",
//! replicating an append-only ledger of decrees across a fixed cluster of replicas.
//!
//! A cluster keeps one ledger, and every entry of it is decided by a ballot conducted by the
//! president. A ballot succeeds only with the participation of a majority of the cluster, and once an
//! entry holds a decree it never changes, even if the president crashes halfway through a ballot and
//! another takes over.
//!
//! ## Getting started
//!
//! The library user supplies:
//! 1. A [key-value store](ledger::pluggables::KVStore) that persists the ledger and the progress
//!    record.
//! 2. A [network](networking::network::Network) that delivers messages between replicas.
//! 3. A [configuration](replica::Configuration), and optionally [event](events) handlers.
//!
//! and starts a [replica](replica) with them. Which replica is the president is decided outside the
//! library and told to each replica through
//! [`Replica::appoint_president`](replica::Replica::appoint_president).

pub mod events;

pub(crate) mod event_bus;

pub mod ledger;

pub mod logging;

pub mod networking;

pub(crate) mod presidency;

pub mod replica;

pub mod synod;

pub mod types;
