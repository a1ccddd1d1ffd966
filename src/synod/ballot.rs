/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that describe a single ballot, and the decree-selection rule applied after Phase 1.

use crate::{
    networking::messages::LastVote,
    types::{
        ballot::BallotNumber,
        basic::{Decree, EntryID},
        cluster::ClusterView,
        progress::PrevVote,
    },
};

/// How a ballot ended, from the point of view of the proposer conducting it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BallotSignal {
    /// The candidate needs no further ballots: its decree was decided, or its fixed entry turned out
    /// to be decided already.
    Succeeded = 0,
    /// The ballot failed for a transient reason. The candidate is retried with a new ballot number.
    Retry = 1,
    /// Leadership was lost, shutdown was requested, or the ledger failed.
    Abort = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProposerStatus {
    Idle,
    /// Soliciting promises (Phase 1).
    Trying,
    /// Soliciting votes (Phase 2).
    Polling,
}

/// Why a ballot is being retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryReason {
    /// Fewer than a majority of the cluster is online.
    QuorumUnavailable,
    /// Not every member of the quorum replied before the round trip timeout.
    InsufficientResponses,
    /// The online nodes are no longer exactly the nodes that promised in Phase 1.
    QuorumChanged,
    /// The local acceptor promised a higher ballot begun by another node.
    Preempted { by: BallotNumber },
}

/// The promises won by a successful Phase 1.
///
/// Once won, a term is reused by every subsequent ballot until it becomes invalid, so a stable
/// president bumps its ballot number once per presidency rather than once per decree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Term {
    pub(crate) ballot: BallotNumber,
    /// The nodes that promised. Phase 2 is only begun while exactly these nodes are online.
    pub(crate) quorum: ClusterView,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    /// The entry after the last entry in the local ledger, determined when Phase 2 begins.
    Next,
    Fixed(EntryID),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CandidateKind {
    /// A decree submitted by a client.
    Client,
    /// A previous vote that decree selection forced this proposer to re-propose.
    PrevVote,
    /// A decree some acceptor holds but this proposer's ledger lacks.
    Recovery,
    /// The filler decree, proposed for a hole in the ledger.
    GapFill,
}

/// A decree waiting to be put to a ballot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub(crate) decree: Decree,
    pub(crate) slot: Slot,
    pub(crate) kind: CandidateKind,
    /// The last entry this proposer voted for the decree at, in a ballot that then failed. If that
    /// entry is later decided with the same decree, the candidate needs no further ballots.
    pub(crate) voted_at: Option<EntryID>,
}

impl Candidate {
    pub(crate) fn client(decree: Decree) -> Self {
        Self {
            decree,
            slot: Slot::Next,
            kind: CandidateKind::Client,
            voted_at: None,
        }
    }

    pub(crate) fn fixed(entry_id: EntryID, decree: Decree, kind: CandidateKind) -> Self {
        Self {
            decree,
            slot: Slot::Fixed(entry_id),
            kind,
            voted_at: None,
        }
    }

    pub(crate) fn gap_fill(entry_id: EntryID) -> Self {
        Self::fixed(entry_id, Decree::filler(), CandidateKind::GapFill)
    }
}

/// Result of [`select_decree`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecreeChoice {
    /// The proposer may propose whatever it likes.
    Free,
    /// The proposer must re-propose this vote's decree at this vote's entry.
    Forced(PrevVote),
}

/// Choose what a proposer may propose after collecting `last_votes` from a quorum.
///
/// Among the previous votes reported, the one with the highest ballot is picked (ties, which arise
/// when one ballot number is reused across entries, go to the highest entry id). If no member of the
/// quorum ever voted, or the picked vote's entry is already decided according to `is_decided`, the
/// choice is free. Otherwise some earlier ballot may have succeeded with that decree, and proposing
/// anything else at that entry could contradict it.
pub fn select_decree<'a, I, F>(last_votes: I, is_decided: F) -> DecreeChoice
where
    I: IntoIterator<Item = &'a LastVote>,
    F: Fn(EntryID) -> bool,
{
    let highest = last_votes
        .into_iter()
        .filter_map(|last_vote| last_vote.prev_vote.as_ref())
        .max_by_key(|vote| (vote.ballot, vote.entry_id));

    match highest {
        None => DecreeChoice::Free,
        Some(vote) if vote.ballot.is_never() || is_decided(vote.entry_id) => DecreeChoice::Free,
        Some(vote) => DecreeChoice::Forced(vote.clone()),
    }
}
