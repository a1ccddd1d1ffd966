/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The proposer: the leadership state machine, active only on the president.
//!
//! ## Ballots
//!
//! A ballot has two phases:
//! 1. **Phase 1** ("Trying"): bump the ballot number past every ballot seen, send [`NextBallot`] to
//!    every online node, and wait until all of them promise. The online nodes must be a majority of
//!    the cluster.
//! 2. **Phase 2** ("Polling"): send [`BeginBallot`] to the nodes that promised, and wait until all of
//!    them vote. The ballot then succeeds and the decree is committed through the
//!    [learner](super::learner::Learner).
//!
//! Replies that do not arrive within the round trip timeout fail the phase, and the ballot is retried
//! after the retry interval with a higher ballot number.
//!
//! ## Terms
//!
//! The promises won in Phase 1 are not specific to a ledger entry, so they are kept as a [`Term`] and
//! reused for every following Phase 2 until either:
//! - the online nodes differ from the nodes that promised,
//! - the local acceptor promised a higher ballot begun by another node, or
//! - a phase fails.
//!
//! A phase in flight is never interrupted; these conditions are checked when the next phase begins.
//!
//! ## Obligations of a new term
//!
//! Winning Phase 1 obliges the proposer to do some work before it may serve client decrees, in this
//! order:
//! 1. Re-propose the previous vote picked by [`select_decree`], if the choice is not free.
//! 2. Propose every decree acceptors reported holding that the local ledger lacks.
//! 3. Fill every hole in the local ledger with the filler decree.
//!
//! ## Non-presidents
//!
//! A replica that is not the president forwards the decrees submitted to it to the president as
//! [`DecreeProposal`]s, and holds them in order while no president is known.

use std::{
    cmp::max,
    collections::{BTreeMap, VecDeque},
    sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError},
    thread::{self, JoinHandle},
    time::{Duration, Instant, SystemTime},
};

use rand::{thread_rng, Rng};

use crate::{
    events::{
        AbandonBallotEvent, AcquirePresidencyEvent, BeginBallotEvent, Event, ForwardDecreeEvent,
        NextBallotEvent, RetryBallotEvent,
    },
    ledger::{
        pluggables::KVStore,
        store::{LedgerError, LedgerStore},
    },
    networking::{
        messages::{BeginBallot, DecreeProposal, LastVote, NextBallot, ReplyMessage, Success},
        network::Network,
        receiving::{ReplyReceiveError, ReplyStub},
        sending::SenderHandle,
    },
    presidency::Presidency,
    types::{
        ballot::{next_ballot, BallotNumber},
        basic::{Decree, EntryID, NodeID},
        cluster::ClusterView,
    },
};

use super::{
    acceptor::Acceptor,
    ballot::{
        select_decree, BallotSignal, Candidate, CandidateKind, DecreeChoice, ProposerStatus,
        RetryReason, Slot, Term,
    },
    learner::Learner,
};

/// How long an idle proposer waits for a decree before re-checking the presidency and shutdown signal.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Immutable parameters that define the behaviour of the [`Proposer`].
pub(crate) struct ProposerConfiguration {
    pub(crate) me: NodeID,
    pub(crate) cluster: ClusterView,
    pub(crate) round_trip_timeout: Duration,
    pub(crate) retry_interval: Duration,
}

pub(crate) struct Proposer<K: KVStore, N: Network> {
    config: ProposerConfiguration,
    ledger: LedgerStore<K>,
    acceptor: Acceptor<K>,
    learner: Learner<K, N>,
    sender: SenderHandle<N>,
    replies: ReplyStub,
    presidency: Presidency,
    proposals: Receiver<Decree>,
    held: VecDeque<Candidate>,
    agenda: VecDeque<Candidate>,
    gap_fill_pending: bool,
    status: ProposerStatus,
    term: Option<Term>,
    shutdown_signal: Receiver<()>,
    shutdown_requested: bool,
    event_publisher: Option<Sender<Event>>,
}

impl<K: KVStore, N: Network + 'static> Proposer<K, N> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: ProposerConfiguration,
        ledger: LedgerStore<K>,
        acceptor: Acceptor<K>,
        learner: Learner<K, N>,
        sender: SenderHandle<N>,
        replies: ReplyStub,
        presidency: Presidency,
        proposals: Receiver<Decree>,
        shutdown_signal: Receiver<()>,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            config,
            ledger,
            acceptor,
            learner,
            sender,
            replies,
            presidency,
            proposals,
            held: VecDeque::new(),
            agenda: VecDeque::new(),
            gap_fill_pending: false,
            status: ProposerStatus::Idle,
            term: None,
            shutdown_signal,
            shutdown_requested: false,
            event_publisher,
        }
    }

    pub(crate) fn start(mut self) -> JoinHandle<()> {
        thread::spawn(move || loop {
            if self.check_shutdown() {
                return;
            }

            match self.presidency.current() {
                Some(president) if president == self.config.me => self.preside(),
                Some(president) => {
                    self.depose();
                    self.forward(president)
                }
                None => {
                    self.depose();
                    self.hold()
                }
            }
        })
    }

    /* ↓↓↓ President ↓↓↓ */

    /// Do the next unit of work as president: acquire a term, honour its obligations, then serve one
    /// client decree.
    fn preside(&mut self) {
        if self.term.is_none() {
            self.establish_term();
            return;
        }

        if let Some(candidate) = self.agenda.pop_front() {
            self.drive(candidate);
            return;
        }

        if self.gap_fill_pending {
            self.gap_fill_pending = false;
            match self.ledger.missing_entry_ids() {
                Ok(missing) => self
                    .agenda
                    .extend(missing.into_iter().map(Candidate::gap_fill)),
                Err(err) => log::error!("Cannot find holes in the ledger: {:?}", err),
            }
            return;
        }

        let candidate = match self.held.pop_front() {
            Some(candidate) => candidate,
            None => match self.proposals.recv_timeout(IDLE_POLL_INTERVAL) {
                Ok(decree) => Candidate::client(decree),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return,
            },
        };
        self.drive(candidate);
    }

    /// Run Phase 1 until it succeeds, leadership is lost, or shutdown is requested.
    fn establish_term(&mut self) {
        loop {
            if self.check_shutdown() || !self.is_president() {
                return;
            }

            match self.phase_one() {
                Ok(Ok((term, last_votes))) => {
                    self.adopt_term(term, last_votes);
                    return;
                }
                Ok(Err((ballot, reason))) => self.retry(ballot, reason),
                Err(err) => {
                    log::error!("Phase 1 aborted: {:?}", err);
                    self.status = ProposerStatus::Idle;
                }
            }
            self.wait_retry_interval();
        }
    }

    /// Phase 1. On success returns the new term and the promises that won it.
    fn phase_one(
        &mut self,
    ) -> Result<Result<(Term, Vec<LastVote>), (BallotNumber, RetryReason)>, ProposerError> {
        self.status = ProposerStatus::Trying;
        let me = self.config.me;

        let quorum = self.sender.online(&self.config.cluster, me);
        if !quorum.has_majority_of(&self.config.cluster) {
            let last_tried = self.ledger.load_progress()?.last_tried;
            return Ok(Err((last_tried, RetryReason::QuorumUnavailable)));
        }

        // The bump is persisted before NextBallot leaves.
        let ballot = self
            .ledger
            .update_progress(|progress| {
                progress.last_tried = next_ballot(max(progress.last_tried, progress.next_bal), me);
                true
            })?
            .map_or(BallotNumber::NEVER, |progress| progress.last_tried);

        let next_ballot_msg = NextBallot {
            ballot,
            last_contiguous_entry_id: self.ledger.last_contiguous_entry_id()?,
        };

        Event::NextBallot(NextBallotEvent {
            timestamp: SystemTime::now(),
            next_ballot: next_ballot_msg.clone(),
            quorum: quorum.clone(),
        })
        .publish(&self.event_publisher);

        let mut last_votes = BTreeMap::new();
        match self.acceptor.on_next_ballot(me, &next_ballot_msg)? {
            Some(last_vote) => {
                last_votes.insert(me, last_vote);
            }
            None => {
                let by = self.ledger.load_progress()?.next_bal;
                return Ok(Err((ballot, RetryReason::Preempted { by })));
            }
        }

        self.sender
            .multicast(&quorum.excluding(me), next_ballot_msg);

        let deadline = Instant::now() + self.config.round_trip_timeout;
        while last_votes.len() < quorum.len() {
            match self.replies.recv(ballot, deadline) {
                Ok((origin, ReplyMessage::LastVote(last_vote))) if quorum.contains(&origin) => {
                    last_votes.insert(origin, last_vote);
                }
                Ok((origin, _)) => {
                    log::debug!("Ignoring unexpected reply from {} in Phase 1", origin)
                }
                Err(ReplyReceiveError::Timeout) => {
                    return Ok(Err((ballot, RetryReason::InsufficientResponses)))
                }
                Err(ReplyReceiveError::Disconnected) => {
                    return Err(ProposerError::RepliesDisconnected)
                }
            }
        }

        Ok(Ok((
            Term { ballot, quorum },
            last_votes.into_values().collect(),
        )))
    }

    /// Take up a freshly won term and schedule its obligations ahead of any client decree.
    fn adopt_term(&mut self, term: Term, last_votes: Vec<LastVote>) {
        // Obligations of an earlier term are recomputed from the new promises.
        self.agenda.clear();

        let mut recovered: BTreeMap<EntryID, Decree> = BTreeMap::new();
        for last_vote in &last_votes {
            match last_vote.missing_decrees.decode() {
                Ok(entries) => {
                    for entry in entries.into_vec() {
                        if entry.decree.is_filler() || self.is_decided_locally(entry.entry_id) {
                            continue;
                        }
                        recovered.entry(entry.entry_id).or_insert(entry.decree);
                    }
                }
                Err(err) => log::warn!("Malformed missing decrees in a LastVote: {:?}", err),
            }
        }

        let choice = select_decree(&last_votes, |entry_id| {
            recovered.contains_key(&entry_id) || self.is_decided_locally(entry_id)
        });
        if let DecreeChoice::Forced(vote) = choice {
            log::info!(
                "Re-proposing the decree voted at entry {} in ballot {}",
                vote.entry_id,
                vote.ballot
            );
            self.agenda.push_back(Candidate::fixed(
                vote.entry_id,
                vote.decree,
                CandidateKind::PrevVote,
            ));
        }

        self.agenda.extend(
            recovered
                .into_iter()
                .map(|(entry_id, decree)| Candidate::fixed(entry_id, decree, CandidateKind::Recovery)),
        );
        self.gap_fill_pending = true;

        Event::AcquirePresidency(AcquirePresidencyEvent {
            timestamp: SystemTime::now(),
            ballot: term.ballot,
        })
        .publish(&self.event_publisher);

        self.term = Some(term);
        self.status = ProposerStatus::Idle;
    }

    /// Put `candidate` to ballots until it no longer needs one, or the attempt must be given up.
    fn drive(&mut self, mut candidate: Candidate) {
        let signal = match self.conduct_ballot(&mut candidate) {
            Ok(signal) => signal,
            Err(err) => {
                log::error!("Ballot aborted: {:?}", err);
                self.term = None;
                self.status = ProposerStatus::Idle;
                BallotSignal::Abort
            }
        };

        match signal {
            BallotSignal::Succeeded => (),
            BallotSignal::Retry => {
                self.requeue(candidate);
                self.wait_retry_interval();
            }
            BallotSignal::Abort => self.requeue(candidate),
        }
    }

    /// Phase 2 of a ballot for `candidate`, under the current term.
    fn conduct_ballot(&mut self, candidate: &mut Candidate) -> Result<BallotSignal, ProposerError> {
        let me = self.config.me;
        let term = match &self.term {
            Some(term) => term.clone(),
            None => return Ok(BallotSignal::Retry),
        };

        loop {
            if !self.is_president() {
                return Ok(BallotSignal::Abort);
            }
            if let Some(reason) = self.check_term(&term)? {
                self.retry(term.ballot, reason);
                return Ok(BallotSignal::Retry);
            }

            // A failed ballot's vote may since have been re-proposed and decided.
            if let Some(voted_at) = candidate.voted_at {
                if self.ledger.get(voted_at)?.as_ref() == Some(&candidate.decree) {
                    log::debug!("Decree voted at entry {} was decided there", voted_at);
                    return Ok(BallotSignal::Succeeded);
                }
            }

            let entry_id = match candidate.slot {
                Slot::Next => self
                    .ledger
                    .last_entry_id()?
                    .map_or(EntryID::new(1), |last| last + 1),
                Slot::Fixed(entry_id) => match self.ledger.get(entry_id)? {
                    Some(existing) if existing == candidate.decree => {
                        return Ok(BallotSignal::Succeeded)
                    }
                    Some(existing) if !existing.is_filler() => {
                        self.abandon(term.ballot, entry_id, existing);
                        return Ok(BallotSignal::Succeeded);
                    }
                    _ => entry_id,
                },
            };

            self.status = ProposerStatus::Polling;
            let begin_ballot = BeginBallot {
                ballot: term.ballot,
                entry_id,
                decree: candidate.decree.clone(),
            };

            Event::BeginBallot(BeginBallotEvent {
                timestamp: SystemTime::now(),
                begin_ballot: begin_ballot.clone(),
            })
            .publish(&self.event_publisher);

            let mut voters = ClusterView::new();
            if self.acceptor.on_begin_ballot(me, &begin_ballot)?.is_none() {
                let by = self.ledger.load_progress()?.next_bal;
                self.retry(term.ballot, RetryReason::Preempted { by });
                return Ok(BallotSignal::Retry);
            }
            voters.insert(me);
            candidate.voted_at = Some(entry_id);

            self.sender
                .multicast(&term.quorum.excluding(me), begin_ballot.clone());

            let deadline = Instant::now() + self.config.round_trip_timeout;
            while voters.len() < term.quorum.len() {
                match self.replies.recv(term.ballot, deadline) {
                    Ok((origin, ReplyMessage::Voted(voted)))
                        if voted.entry_id == entry_id && term.quorum.contains(&origin) =>
                    {
                        voters.insert(origin);
                    }
                    Ok((origin, _)) => {
                        log::debug!("Ignoring stale reply from {} in Phase 2", origin)
                    }
                    Err(ReplyReceiveError::Timeout) => {
                        self.retry(term.ballot, RetryReason::InsufficientResponses);
                        return Ok(BallotSignal::Retry);
                    }
                    Err(ReplyReceiveError::Disconnected) => {
                        return Err(ProposerError::RepliesDisconnected)
                    }
                }
            }

            // Every member of the quorum voted: the ballot succeeded, unless the entry was decided
            // with another decree in the meantime.
            self.status = ProposerStatus::Idle;
            match self.ledger.get(entry_id)? {
                Some(existing) if !existing.is_filler() && existing != begin_ballot.decree => {
                    self.abandon(term.ballot, entry_id, existing);
                    match candidate.slot {
                        Slot::Next => continue,
                        Slot::Fixed(_) => return Ok(BallotSignal::Succeeded),
                    }
                }
                _ => {
                    self.learner.commit(Success {
                        entry_id,
                        decree: begin_ballot.decree,
                    })?;
                    return Ok(BallotSignal::Succeeded);
                }
            }
        }
    }

    /// Returns why `term` can no longer be used, if it can't.
    fn check_term(&self, term: &Term) -> Result<Option<RetryReason>, ProposerError> {
        let online = self.sender.online(&self.config.cluster, self.config.me);
        if !online.has_majority_of(&self.config.cluster) {
            return Ok(Some(RetryReason::QuorumUnavailable));
        }
        if online != term.quorum {
            return Ok(Some(RetryReason::QuorumChanged));
        }

        let next_bal = self.ledger.load_progress()?.next_bal;
        if next_bal > term.ballot {
            return Ok(Some(RetryReason::Preempted { by: next_bal }));
        }

        Ok(None)
    }

    fn is_decided_locally(&self, entry_id: EntryID) -> bool {
        matches!(self.ledger.get(entry_id), Ok(Some(decree)) if !decree.is_filler())
    }

    fn retry(&mut self, ballot: BallotNumber, reason: RetryReason) {
        log::debug!("Ballot {} failed while {:?}: {:?}", ballot, self.status, reason);
        self.term = None;
        self.status = ProposerStatus::Idle;

        Event::RetryBallot(RetryBallotEvent {
            timestamp: SystemTime::now(),
            ballot,
            reason,
        })
        .publish(&self.event_publisher);
    }

    fn abandon(&mut self, ballot: BallotNumber, entry_id: EntryID, existing: Decree) {
        log::info!("Entry {} is already decided, abandoning ballot {}", entry_id, ballot);
        self.status = ProposerStatus::Idle;

        Event::AbandonBallot(AbandonBallotEvent {
            timestamp: SystemTime::now(),
            ballot,
            entry_id,
            existing,
        })
        .publish(&self.event_publisher);
    }

    /// Give a candidate whose ballot failed back to its queue. Obligations of a term are dropped, since
    /// the next term recomputes them.
    fn requeue(&mut self, candidate: Candidate) {
        if candidate.kind == CandidateKind::Client {
            self.held.push_front(candidate);
        }
    }

    /* ↓↓↓ Non-president ↓↓↓ */

    fn depose(&mut self) {
        if self.term.is_some() || !self.agenda.is_empty() {
            log::info!("No longer the president, dropping the current term");
        }
        self.term = None;
        self.agenda.clear();
        self.gap_fill_pending = false;
        self.status = ProposerStatus::Idle;
    }

    /// Forward every held and newly submitted decree to `president`.
    fn forward(&mut self, president: NodeID) {
        self.take_submitted();
        while let Some(Candidate { decree, .. }) = self.held.pop_front() {
            self.sender.send(
                president,
                DecreeProposal {
                    decree: decree.clone(),
                },
            );

            Event::ForwardDecree(ForwardDecreeEvent {
                timestamp: SystemTime::now(),
                president,
                decree,
            })
            .publish(&self.event_publisher);
        }
    }

    /// Hold decrees, in order, while no president is known.
    fn hold(&mut self) {
        self.take_submitted();
    }

    fn take_submitted(&mut self) {
        match self.proposals.recv_timeout(IDLE_POLL_INTERVAL) {
            Ok(decree) => self.held.push_back(Candidate::client(decree)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return,
        }
        while let Ok(decree) = self.proposals.try_recv() {
            self.held.push_back(Candidate::client(decree));
        }
    }

    /* ↓↓↓ Helpers ↓↓↓ */

    fn is_president(&self) -> bool {
        self.presidency.is(self.config.me)
    }

    fn check_shutdown(&mut self) -> bool {
        if self.shutdown_requested {
            return true;
        }
        match self.shutdown_signal.try_recv() {
            Ok(()) => {
                self.shutdown_requested = true;
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                panic!("Proposer thread disconnected from main thread")
            }
        }
    }

    /// Sleep for the retry interval plus a random jitter of up to half of it, waking early on
    /// shutdown.
    fn wait_retry_interval(&mut self) {
        let interval = self.config.retry_interval;
        let max_jitter_ms = (interval.as_millis() / 2) as u64;
        let jitter = if max_jitter_ms > 0 {
            Duration::from_millis(thread_rng().gen_range(0, max_jitter_ms))
        } else {
            Duration::ZERO
        };

        match self.shutdown_signal.recv_timeout(interval + jitter) {
            Ok(()) => self.shutdown_requested = true,
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => {
                panic!("Proposer thread disconnected from main thread")
            }
        }
    }
}

#[derive(Debug)]
pub enum ProposerError {
    LedgerError(LedgerError),
    RepliesDisconnected,
}

impl From<LedgerError> for ProposerError {
    fn from(value: LedgerError) -> Self {
        ProposerError::LedgerError(value)
    }
}
