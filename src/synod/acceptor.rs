/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The acceptor: the promise and vote state machine every replica runs.
//!
//! An acceptor answers [`NextBallot`] with a promise ([`LastVote`]) if the ballot is higher than any
//! it promised before, and answers [`BeginBallot`] with a [`Voted`] if it has not promised a higher
//! ballot since. A ballot it refuses gets no answer at all: the proposer learns of the refusal by
//! timing out.
//!
//! The progress record is persisted before any reply leaves, so an acceptor that restarts never
//! contradicts a promise or vote it already sent.

use std::{
    cmp::max,
    sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError},
    thread::{self, JoinHandle},
    time::{Duration, SystemTime},
};

use crate::{
    events::{Event, PromiseEvent, VoteEvent},
    ledger::{
        pluggables::KVStore,
        store::{LedgerError, LedgerStore},
    },
    networking::{
        messages::{BallotMessage, BeginBallot, LastVote, NextBallot, Voted},
        network::Network,
        sending::SenderHandle,
    },
    types::{basic::NodeID, entries::EntryList, progress::PrevVote},
};

/// How long the acceptor thread waits for a message before checking for a shutdown signal again.
const MESSAGE_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone)]
pub(crate) struct Acceptor<K: KVStore> {
    ledger: LedgerStore<K>,
    event_publisher: Option<Sender<Event>>,
}

impl<K: KVStore> Acceptor<K> {
    pub(crate) fn new(ledger: LedgerStore<K>, event_publisher: Option<Sender<Event>>) -> Self {
        Self {
            ledger,
            event_publisher,
        }
    }

    /// Promise not to vote in ballots lower than `next_ballot.ballot`, if that ballot is higher than
    /// every ballot promised so far. The promise carries this acceptor's previous vote and the real
    /// decrees it holds beyond the proposer's highest contiguous entry.
    pub(crate) fn on_next_ballot(
        &mut self,
        origin: NodeID,
        next_ballot: &NextBallot,
    ) -> Result<Option<LastVote>, LedgerError> {
        let promised = self.ledger.update_progress(|progress| {
            if next_ballot.ballot > progress.next_bal {
                progress.next_bal = next_ballot.ballot;
                true
            } else {
                false
            }
        })?;

        let progress = match promised {
            Some(progress) => progress,
            None => {
                log::debug!(
                    "Ignoring NextBallot {} from {}: already promised a ballot at least as high",
                    next_ballot.ballot,
                    origin
                );
                return Ok(None);
            }
        };

        let missing_decrees =
            EntryList::new(self.ledger.entries_after(next_ballot.last_contiguous_entry_id)?);

        Event::Promise(PromiseEvent {
            timestamp: SystemTime::now(),
            origin,
            ballot: next_ballot.ballot,
        })
        .publish(&self.event_publisher);

        Ok(Some(LastVote {
            next_bal: progress.next_bal,
            prev_vote: progress.prev_vote,
            missing_decrees: missing_decrees.encode(),
        }))
    }

    /// Vote for `begin_ballot.decree` at `begin_ballot.entry_id`, unless a higher ballot was promised.
    pub(crate) fn on_begin_ballot(
        &mut self,
        origin: NodeID,
        begin_ballot: &BeginBallot,
    ) -> Result<Option<Voted>, LedgerError> {
        let voted = self.ledger.update_progress(|progress| {
            if begin_ballot.ballot >= progress.next_bal {
                progress.prev_vote = Some(PrevVote {
                    ballot: begin_ballot.ballot,
                    entry_id: begin_ballot.entry_id,
                    decree: begin_ballot.decree.clone(),
                });
                progress.next_bal = max(progress.next_bal, begin_ballot.ballot);
                true
            } else {
                false
            }
        })?;

        if voted.is_none() {
            log::debug!(
                "Ignoring BeginBallot {} from {}: promised a higher ballot",
                begin_ballot.ballot,
                origin
            );
            return Ok(None);
        }

        Event::Vote(VoteEvent {
            timestamp: SystemTime::now(),
            origin,
            begin_ballot: begin_ballot.clone(),
        })
        .publish(&self.event_publisher);

        Ok(Some(Voted {
            ballot: begin_ballot.ballot,
            entry_id: begin_ballot.entry_id,
        }))
    }
}

/// Spawn the acceptor thread, which answers the [`BallotMessage`]s of other replicas' proposers.
pub(crate) fn start_acceptor<K: KVStore, N: Network + 'static>(
    mut acceptor: Acceptor<K>,
    mut sender: SenderHandle<N>,
    ballot_msgs: Receiver<(NodeID, BallotMessage)>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("Acceptor thread disconnected from main thread")
            }
        }

        let (origin, msg) = match ballot_msgs.recv_timeout(MESSAGE_POLL_INTERVAL) {
            Ok(o_m) => o_m,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                thread::yield_now();
                continue;
            }
        };

        let result = match msg {
            BallotMessage::NextBallot(next_ballot) => acceptor
                .on_next_ballot(origin, &next_ballot)
                .map(|reply| reply.map(|last_vote| sender.send(origin, last_vote))),
            BallotMessage::BeginBallot(begin_ballot) => acceptor
                .on_begin_ballot(origin, &begin_ballot)
                .map(|reply| reply.map(|voted| sender.send(origin, voted))),
        };

        if let Err(err) = result {
            log::warn!("Acceptor failed to handle a message from {}: {:?}", origin, err);
        }
    })
}
