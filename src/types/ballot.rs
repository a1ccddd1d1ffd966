/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Globally ordered, per-node unique ballot numbers.
//!
//! A [`BallotNumber`] pairs a round counter with the id of the node that began the ballot. Ballots are
//! ordered by round first and node id second, which is the same order as the digit interleaving
//! `round * base + node_id` for any base larger than every node id. Two nodes can therefore never
//! produce equal ballot numbers, and a node that keeps calling [`next_ballot`] obtains strictly
//! increasing numbers.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use super::basic::NodeID;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize)]
pub struct BallotNumber {
    // Field order matters: the derived `Ord` compares `round` before `node`.
    pub round: u64,
    pub node: NodeID,
}

impl BallotNumber {
    /// The sentinel ballot, smaller than every ballot a node can begin.
    pub const NEVER: BallotNumber = BallotNumber {
        round: 0,
        node: NodeID::new(0),
    };

    pub const fn new(round: u64, node: NodeID) -> Self {
        Self { round, node }
    }

    pub fn is_never(&self) -> bool {
        *self == Self::NEVER
    }
}

impl Display for BallotNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.round, self.node)
    }
}

/// Returns a ballot number owned by `node` that is strictly greater than `previous`.
pub fn next_ballot(previous: BallotNumber, node: NodeID) -> BallotNumber {
    BallotNumber::new(previous.round + 1, node)
}
