/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The per-node progress record, the only mutable state the protocol persists besides the ledger.

use borsh::{BorshDeserialize, BorshSerialize};

use super::{
    ballot::BallotNumber,
    basic::{Decree, EntryID},
};

/// The highest-numbered ballot a node has voted in, together with what it voted for.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PrevVote {
    pub ballot: BallotNumber,
    /// The ledger slot the vote was cast for. A single vote register is shared by every slot, so the
    /// slot has to be remembered alongside the decree.
    pub entry_id: EntryID,
    pub decree: Decree,
}

/// Durable singleton holding a node's proposer and acceptor state.
///
/// Invariant: `next_bal >= prev_bal()`. [`LedgerStore::save_progress`](crate::ledger::store::LedgerStore::save_progress)
/// refuses to persist a record that violates it.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProgressRecord {
    /// Highest ballot this node has begun as a proposer.
    pub last_tried: BallotNumber,
    /// Highest ballot this node has promised as an acceptor.
    pub next_bal: BallotNumber,
    pub prev_vote: Option<PrevVote>,
}

impl ProgressRecord {
    /// The record a node starts its life with.
    pub fn initial() -> Self {
        Self {
            last_tried: BallotNumber::NEVER,
            next_bal: BallotNumber::NEVER,
            prev_vote: None,
        }
    }

    /// Ballot of the previous vote, or [`BallotNumber::NEVER`] if this node never voted.
    pub fn prev_bal(&self) -> BallotNumber {
        self.prev_vote
            .as_ref()
            .map_or(BallotNumber::NEVER, |vote| vote.ballot)
    }

    pub fn is_consistent(&self) -> bool {
        self.next_bal >= self.prev_bal()
    }
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self::initial()
    }
}
