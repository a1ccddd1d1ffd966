/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions and types for receiving messages from the P2P network.

use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError},
    thread::{self, JoinHandle},
    time::Instant,
};

use crate::types::{
    ballot::BallotNumber,
    basic::{Decree, NodeID},
};

use super::{
    messages::{BallotMessage, LearnerMessage, Message, ReplyMessage},
    network::Network,
};

/// Spawn the poller thread, which polls the [`Network`] for messages and distributes them into receiver
/// handles.
///
/// The kinds of messages that the poller distributes are:
/// 1. Ballot messages (processed by the [acceptor thread](crate::synod::acceptor)),
/// 2. Replies to ballot messages (processed by the [proposer thread](crate::synod::proposer)),
/// 3. Learner messages (processed by the [learner thread](crate::synod::learner)), and
/// 4. Decree proposals forwarded by peers, which are pushed onto the local proposal queue. Proposals
///    that do not fit in the queue are dropped.
pub(crate) fn start_polling<N: Network + 'static>(
    mut network: N,
    proposal_queue: SyncSender<Decree>,
    shutdown_signal: Receiver<()>,
) -> (
    JoinHandle<()>,
    Receiver<(NodeID, BallotMessage)>,
    Receiver<(NodeID, ReplyMessage)>,
    Receiver<(NodeID, LearnerMessage)>,
) {
    let (to_ballot_msg_receiver, ballot_msg_receiver) = mpsc::channel();
    let (to_reply_msg_receiver, reply_msg_receiver) = mpsc::channel();
    let (to_learner_msg_receiver, learner_msg_receiver) = mpsc::channel();

    let poller_thread = thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("Poller thread disconnected from main thread")
            }
        }

        if let Some((origin, msg)) = network.recv() {
            match msg {
                Message::BallotMessage(b_msg) => {
                    let _ = to_ballot_msg_receiver.send((origin, b_msg));
                }
                Message::ReplyMessage(r_msg) => {
                    let _ = to_reply_msg_receiver.send((origin, r_msg));
                }
                Message::LearnerMessage(l_msg) => {
                    let _ = to_learner_msg_receiver.send((origin, l_msg));
                }
                Message::DecreeProposal(proposal) => {
                    if let Err(TrySendError::Full(_)) = proposal_queue.try_send(proposal.decree) {
                        log::warn!("Proposal queue full, dropping decree forwarded by {}", origin);
                    }
                }
            }
        } else {
            thread::yield_now()
        }
    });

    (
        poller_thread,
        ballot_msg_receiver,
        reply_msg_receiver,
        learner_msg_receiver,
    )
}

/// A receiving end for [`ReplyMessage`]s.
///
/// Replies are only ever useful for the ballot the proposer is currently conducting, so
/// [`recv`](Self::recv) silently discards replies to any other ballot.
pub(crate) struct ReplyStub {
    receiver: Receiver<(NodeID, ReplyMessage)>,
}

impl ReplyStub {
    pub(crate) fn new(receiver: Receiver<(NodeID, ReplyMessage)>) -> ReplyStub {
        Self { receiver }
    }

    /// Receive a reply to `ballot`. Waits until the deadline is reached, and if no such reply is
    /// received returns [`ReplyReceiveError::Timeout`].
    pub(crate) fn recv(
        &self,
        ballot: BallotNumber,
        deadline: Instant,
    ) -> Result<(NodeID, ReplyMessage), ReplyReceiveError> {
        while Instant::now() < deadline {
            match self
                .receiver
                .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            {
                Ok((origin, reply)) => {
                    if reply.ballot() == ballot {
                        return Ok((origin, reply));
                    }
                    log::debug!(
                        "Discarding stale reply from {} for ballot {} (current ballot {})",
                        origin,
                        reply.ballot(),
                        ballot
                    );
                }
                Err(RecvTimeoutError::Timeout) => thread::yield_now(),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ReplyReceiveError::Disconnected)
                }
            }
        }

        Err(ReplyReceiveError::Timeout)
    }
}

#[derive(Debug)]
pub(crate) enum ReplyReceiveError {
    Disconnected,
    Timeout,
}
