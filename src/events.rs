/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events a replica emits, for event handling and logging.
//!
//! An event for a given action indicates that the action has been completed. Library users can
//! register handlers for each kind of event through the optional setters of
//! [`ReplicaSpec`](crate::replica::ReplicaSpec), and the default handlers defined in
//! [`logging`](crate::logging) print them if
//! [`Configuration::log_events`](crate::replica::Configuration) is set.

use std::{sync::mpsc::Sender, time::SystemTime};

use crate::{
    networking::messages::{BeginBallot, NextBallot},
    synod::ballot::RetryReason,
    types::{
        ballot::BallotNumber,
        basic::{Decree, EntryID, NodeID},
        cluster::ClusterView,
    },
};

pub enum Event {
    // Events that change the ledger.
    CommitDecree(CommitDecreeEvent),
    // Events emitted by the proposer.
    AcquirePresidency(AcquirePresidencyEvent),
    NextBallot(NextBallotEvent),
    BeginBallot(BeginBallotEvent),
    RetryBallot(RetryBallotEvent),
    AbandonBallot(AbandonBallotEvent),
    ForwardDecree(ForwardDecreeEvent),
    // Events emitted by the acceptor.
    Promise(PromiseEvent),
    Vote(VoteEvent),
    // Catch-up events.
    ServeMissingEntries(ServeMissingEntriesEvent),
    ReceiveMissingEntries(ReceiveMissingEntriesEvent),
}

impl Event {
    /// Send the event to the event bus, if there is one.
    pub(crate) fn publish(self, event_publisher: &Option<Sender<Event>>) {
        if let Some(event_publisher) = event_publisher {
            // The event bus is the first thread to shut down; later events have nowhere to go.
            let _ = event_publisher.send(self);
        }
    }
}

/// A decree was written into the ledger, either because this replica's ballot succeeded or because a
/// peer informed it of the outcome.
pub struct CommitDecreeEvent {
    pub timestamp: SystemTime,
    pub entry_id: EntryID,
    pub decree: Decree,
}

/// This replica won a Phase 1 as president and is now ready to conduct ballots.
pub struct AcquirePresidencyEvent {
    pub timestamp: SystemTime,
    pub ballot: BallotNumber,
}

pub struct NextBallotEvent {
    pub timestamp: SystemTime,
    pub next_ballot: NextBallot,
    pub quorum: ClusterView,
}

pub struct BeginBallotEvent {
    pub timestamp: SystemTime,
    pub begin_ballot: BeginBallot,
}

/// A ballot failed for a transient reason and will be retried with a higher ballot number.
pub struct RetryBallotEvent {
    pub timestamp: SystemTime,
    pub ballot: BallotNumber,
    pub reason: RetryReason,
}

/// A ballot was abandoned because its entry was already decided with a different decree.
pub struct AbandonBallotEvent {
    pub timestamp: SystemTime,
    pub ballot: BallotNumber,
    pub entry_id: EntryID,
    pub existing: Decree,
}

pub struct ForwardDecreeEvent {
    pub timestamp: SystemTime,
    pub president: NodeID,
    pub decree: Decree,
}

pub struct PromiseEvent {
    pub timestamp: SystemTime,
    pub origin: NodeID,
    pub ballot: BallotNumber,
}

pub struct VoteEvent {
    pub timestamp: SystemTime,
    pub origin: NodeID,
    pub begin_ballot: BeginBallot,
}

pub struct ServeMissingEntriesEvent {
    pub timestamp: SystemTime,
    pub requester: NodeID,
    pub entry_ids: Vec<EntryID>,
}

pub struct ReceiveMissingEntriesEvent {
    pub timestamp: SystemTime,
    pub origin: NodeID,
    pub entry_ids: Vec<EntryID>,
}
