/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types shared by every component of the Synod protocol.
//!
//! The types defined here are "inert": they are sent around, persisted, and inspected, but have no
//! active behavior of their own. Most follow the newtype pattern. Behavior that acts on them lives in
//! [`crate::ledger`] and [`crate::synod`].

pub mod basic;

pub mod ballot;

pub mod cluster;

pub mod entries;

pub mod progress;
