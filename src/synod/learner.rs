/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The learner: writes decided decrees into the ledger and keeps lagging replicas caught up.
//!
//! ## Committing and learning
//!
//! When the president's ballot succeeds, its learner [commits](Learner::commit) the decree: it writes
//! it into the local ledger and broadcasts a [`Success`] to every peer. Peers' learners
//! [learn](Learner::learn) the decree by writing it into their own ledgers. Neither ever overwrites a
//! real decree that is already in the ledger.
//!
//! ## Catching up
//!
//! A replica that was offline while some decrees were decided notices the hole when it learns a decree
//! beyond it. It then sends the president a [`RequestMissingEntries`] listing the entries it owns, and
//! the president answers with an [`InformMissingEntries`] carrying the entries it lacks, up to the
//! president's own highest contiguous entry.

use std::{
    sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError},
    thread::{self, JoinHandle},
    time::{Duration, SystemTime},
};

use crate::{
    events::{CommitDecreeEvent, Event, ReceiveMissingEntriesEvent, ServeMissingEntriesEvent},
    ledger::{
        pluggables::KVStore,
        store::{LedgerError, LedgerStore, WriteOutcome},
    },
    networking::{
        messages::{InformMissingEntries, LearnerMessage, RequestMissingEntries, Success},
        network::Network,
        sending::SenderHandle,
    },
    presidency::Presidency,
    types::{
        basic::{Decree, EntryID, NodeID},
        entries::{EntryIDList, EntryList},
    },
};

/// How long the learner thread waits for a message before checking for a shutdown signal again.
const MESSAGE_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone)]
pub(crate) struct Learner<K: KVStore, N: Network> {
    me: NodeID,
    ledger: LedgerStore<K>,
    sender: SenderHandle<N>,
    presidency: Presidency,
    event_publisher: Option<Sender<Event>>,
}

impl<K: KVStore, N: Network> Learner<K, N> {
    pub(crate) fn new(
        me: NodeID,
        ledger: LedgerStore<K>,
        sender: SenderHandle<N>,
        presidency: Presidency,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            me,
            ledger,
            sender,
            presidency,
            event_publisher,
        }
    }

    /// Write the outcome of a successful ballot and broadcast it to every peer.
    pub(crate) fn commit(&mut self, success: Success) -> Result<WriteOutcome, LedgerError> {
        let outcome = self.record(success.entry_id, success.decree.clone())?;
        match &outcome {
            WriteOutcome::AlreadyKnown { existing } if *existing != success.decree => (),
            _ => self.sender.broadcast(success),
        }
        Ok(outcome)
    }

    /// Write a decree another replica reports decided. Asks `origin` for the entries below it if the
    /// ledger has holes.
    pub(crate) fn learn(&mut self, origin: NodeID, success: Success) -> Result<(), LedgerError> {
        self.record(success.entry_id, success.decree)?;

        if self.ledger.last_contiguous_entry_id()? < success.entry_id {
            let owned: EntryIDList = self
                .ledger
                .list_all()?
                .into_iter()
                .filter(|entry| !entry.decree.is_filler())
                .map(|entry| entry.entry_id)
                .collect();
            self.sender.send(
                origin,
                RequestMissingEntries {
                    owned_entry_ids: owned.encode(),
                },
            );
        }

        Ok(())
    }

    /// Record every entry the president sent in answer to a [`RequestMissingEntries`].
    pub(crate) fn on_inform_missing_entries(
        &mut self,
        origin: NodeID,
        inform: InformMissingEntries,
    ) -> Result<(), LedgerError> {
        let entries = match inform.entries.decode() {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("Malformed InformMissingEntries from {}: {:?}", origin, err);
                return Ok(());
            }
        };

        Event::ReceiveMissingEntries(ReceiveMissingEntriesEvent {
            timestamp: SystemTime::now(),
            origin,
            entry_ids: entries.entry_ids(),
        })
        .publish(&self.event_publisher);

        for entry in entries.into_vec() {
            self.record(entry.entry_id, entry.decree)?;
        }
        Ok(())
    }

    /// Answer a [`RequestMissingEntries`]. Only the president serves catch-up requests.
    pub(crate) fn serve_missing_entries(
        &mut self,
        origin: NodeID,
        request: RequestMissingEntries,
    ) -> Result<(), LedgerError> {
        if !self.presidency.is(self.me) {
            log::debug!("Not the president, ignoring RequestMissingEntries from {}", origin);
            return Ok(());
        }

        let owned = match request.owned_entry_ids.decode() {
            Ok(owned) => owned,
            Err(err) => {
                log::warn!("Malformed RequestMissingEntries from {}: {:?}", origin, err);
                return Ok(());
            }
        };

        let up_to = self.ledger.last_contiguous_entry_id()?;
        let entries = EntryList::new(self.ledger.entries_not_in(&owned, up_to)?);
        if entries.is_empty() {
            return Ok(());
        }

        self.sender.send(
            origin,
            InformMissingEntries {
                entries: entries.encode(),
            },
        );

        Event::ServeMissingEntries(ServeMissingEntriesEvent {
            timestamp: SystemTime::now(),
            requester: origin,
            entry_ids: entries.entry_ids(),
        })
        .publish(&self.event_publisher);

        Ok(())
    }

    fn record(&mut self, entry_id: EntryID, decree: Decree) -> Result<WriteOutcome, LedgerError> {
        let outcome = self
            .ledger
            .write_if_outcome_unknown(entry_id, decree.clone())?;

        match &outcome {
            WriteOutcome::Written(_) => Event::CommitDecree(CommitDecreeEvent {
                timestamp: SystemTime::now(),
                entry_id,
                decree,
            })
            .publish(&self.event_publisher),
            WriteOutcome::AlreadyKnown { existing } if *existing != decree => log::error!(
                "Entry {} already holds {:?}, refusing to record {:?}",
                entry_id,
                existing,
                decree
            ),
            WriteOutcome::AlreadyKnown { .. } => (),
        }

        Ok(outcome)
    }
}

/// Spawn the learner thread, which processes [`LearnerMessage`]s from peers.
pub(crate) fn start_learner<K: KVStore, N: Network + 'static>(
    mut learner: Learner<K, N>,
    learner_msgs: Receiver<(NodeID, LearnerMessage)>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("Learner thread disconnected from main thread")
            }
        }

        let (origin, msg) = match learner_msgs.recv_timeout(MESSAGE_POLL_INTERVAL) {
            Ok(o_m) => o_m,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                thread::yield_now();
                continue;
            }
        };

        let result = match msg {
            LearnerMessage::Success(success) => learner.learn(origin, success),
            LearnerMessage::RequestMissingEntries(request) => {
                learner.serve_missing_entries(origin, request)
            }
            LearnerMessage::InformMissingEntries(inform) => {
                learner.on_inform_missing_entries(origin, inform)
            }
        };

        if let Err(err) = result {
            log::warn!("Learner failed to handle a message from {}: {:?}", origin, err);
        }
    })
}
