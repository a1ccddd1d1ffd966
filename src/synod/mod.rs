/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The three roles of the Synod protocol.
//!
//! Every replica plays all three roles, each on its own thread:
//! - The [acceptor](acceptor) promises and votes in other replicas' ballots.
//! - The [learner](learner) writes decided decrees into the ledger and helps lagging replicas catch up.
//! - The [proposer](proposer) conducts ballots, but only while the replica is the president.
//!
//! [`ballot`] holds the vocabulary they share, including the decree-selection rule
//! ([`select_decree`](ballot::select_decree)) that keeps a new president from contradicting a decree
//! an earlier president may already have had decided.

pub(crate) mod acceptor;

pub mod ballot;

pub(crate) mod learner;

pub(crate) mod proposer;
