/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Exhaustive enumerations around every message variant exchanged by replicas.
//!
//! Messages do not name their sender: the [`Network`](super::network::Network) reports the origin of
//! every message it delivers.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    ballot::BallotNumber,
    basic::{Decree, EntryID},
    entries::{EncodedEntries, EncodedEntryIDs},
    progress::PrevVote,
};

/// All message variants used in the Synod protocol.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub enum Message {
    /// See: [`BallotMessage`].
    BallotMessage(BallotMessage),

    /// See: [`ReplyMessage`].
    ReplyMessage(ReplyMessage),

    /// See: [`LearnerMessage`].
    LearnerMessage(LearnerMessage),

    /// See: [`DecreeProposal`].
    DecreeProposal(DecreeProposal),
}

/// Messages a proposer sends to acceptors. Processed by the acceptor thread.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub enum BallotMessage {
    NextBallot(NextBallot),
    BeginBallot(BeginBallot),
}

/// Acceptors' answers to [`BallotMessage`]s. Processed by the proposer thread.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub enum ReplyMessage {
    LastVote(LastVote),
    Voted(Voted),
}

impl ReplyMessage {
    /// The ballot this reply answers.
    pub fn ballot(&self) -> BallotNumber {
        match self {
            ReplyMessage::LastVote(last_vote) => last_vote.next_bal,
            ReplyMessage::Voted(voted) => voted.ballot,
        }
    }
}

/// Outcomes and catch-up traffic. Processed by the learner thread.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub enum LearnerMessage {
    Success(Success),
    RequestMissingEntries(RequestMissingEntries),
    InformMissingEntries(InformMissingEntries),
}

/// Phase 1a: asks the receiver to promise not to take part in ballots lower than `ballot`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NextBallot {
    pub ballot: BallotNumber,
    /// The proposer's highest contiguous entry id. The receiver reports the real decrees it holds beyond
    /// it.
    pub last_contiguous_entry_id: EntryID,
}

/// Phase 1b: a promise for ballot `next_bal`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct LastVote {
    pub next_bal: BallotNumber,
    pub prev_vote: Option<PrevVote>,
    pub missing_decrees: EncodedEntries,
}

/// Phase 2a: asks the receiver to vote for `decree` at `entry_id` in `ballot`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BeginBallot {
    pub ballot: BallotNumber,
    pub entry_id: EntryID,
    pub decree: Decree,
}

/// Phase 2b. A president reuses one ballot number for many entries, so the entry is named too.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Voted {
    pub ballot: BallotNumber,
    pub entry_id: EntryID,
}

/// A decided decree.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Success {
    pub entry_id: EntryID,
    pub decree: Decree,
}

/// A decree submitted to a replica that is not the president, forwarded to the president.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DecreeProposal {
    pub decree: Decree,
}

/// Sent by a replica that noticed holes in its ledger, listing the entries it already has.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RequestMissingEntries {
    pub owned_entry_ids: EncodedEntryIDs,
}

/// The president's answer to [`RequestMissingEntries`].
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct InformMissingEntries {
    pub entries: EncodedEntries,
}

impl From<NextBallot> for Message {
    fn from(value: NextBallot) -> Self {
        Message::BallotMessage(BallotMessage::NextBallot(value))
    }
}

impl From<BeginBallot> for Message {
    fn from(value: BeginBallot) -> Self {
        Message::BallotMessage(BallotMessage::BeginBallot(value))
    }
}

impl From<LastVote> for Message {
    fn from(value: LastVote) -> Self {
        Message::ReplyMessage(ReplyMessage::LastVote(value))
    }
}

impl From<Voted> for Message {
    fn from(value: Voted) -> Self {
        Message::ReplyMessage(ReplyMessage::Voted(value))
    }
}

impl From<Success> for Message {
    fn from(value: Success) -> Self {
        Message::LearnerMessage(LearnerMessage::Success(value))
    }
}

impl From<RequestMissingEntries> for Message {
    fn from(value: RequestMissingEntries) -> Self {
        Message::LearnerMessage(LearnerMessage::RequestMissingEntries(value))
    }
}

impl From<InformMissingEntries> for Message {
    fn from(value: InformMissingEntries) -> Self {
        Message::LearnerMessage(LearnerMessage::InformMissingEntries(value))
    }
}

impl From<DecreeProposal> for Message {
    fn from(value: DecreeProposal) -> Self {
        Message::DecreeProposal(value)
    }
}
