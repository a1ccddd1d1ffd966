/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The event bus thread, which receives [events](crate::events) from the other threads of a replica
//! and fires the handlers registered for them.

use std::{
    sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{events::*, logging::Logger};

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

/// How long the event bus waits for an event before checking for a shutdown signal again.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) struct EventHandlers {
    pub(crate) commit_decree_handlers: Vec<HandlerPtr<CommitDecreeEvent>>,
    pub(crate) acquire_presidency_handlers: Vec<HandlerPtr<AcquirePresidencyEvent>>,
    pub(crate) next_ballot_handlers: Vec<HandlerPtr<NextBallotEvent>>,
    pub(crate) begin_ballot_handlers: Vec<HandlerPtr<BeginBallotEvent>>,
    pub(crate) retry_ballot_handlers: Vec<HandlerPtr<RetryBallotEvent>>,
    pub(crate) abandon_ballot_handlers: Vec<HandlerPtr<AbandonBallotEvent>>,
    pub(crate) forward_decree_handlers: Vec<HandlerPtr<ForwardDecreeEvent>>,
    pub(crate) promise_handlers: Vec<HandlerPtr<PromiseEvent>>,
    pub(crate) vote_handlers: Vec<HandlerPtr<VoteEvent>>,
    pub(crate) serve_missing_entries_handlers: Vec<HandlerPtr<ServeMissingEntriesEvent>>,
    pub(crate) receive_missing_entries_handlers: Vec<HandlerPtr<ReceiveMissingEntriesEvent>>,
}

impl EventHandlers {
    /// Collect the user-provided handlers, adding the default [logging](crate::logging) handlers in
    /// front of them if `log_events` is set.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        log_events: bool,
        commit_decree_handler: Option<HandlerPtr<CommitDecreeEvent>>,
        acquire_presidency_handler: Option<HandlerPtr<AcquirePresidencyEvent>>,
        next_ballot_handler: Option<HandlerPtr<NextBallotEvent>>,
        begin_ballot_handler: Option<HandlerPtr<BeginBallotEvent>>,
        retry_ballot_handler: Option<HandlerPtr<RetryBallotEvent>>,
        abandon_ballot_handler: Option<HandlerPtr<AbandonBallotEvent>>,
        forward_decree_handler: Option<HandlerPtr<ForwardDecreeEvent>>,
        promise_handler: Option<HandlerPtr<PromiseEvent>>,
        vote_handler: Option<HandlerPtr<VoteEvent>>,
        serve_missing_entries_handler: Option<HandlerPtr<ServeMissingEntriesEvent>>,
        receive_missing_entries_handler: Option<HandlerPtr<ReceiveMissingEntriesEvent>>,
    ) -> EventHandlers {
        EventHandlers {
            commit_decree_handlers: handlers(log_events, commit_decree_handler),
            acquire_presidency_handlers: handlers(log_events, acquire_presidency_handler),
            next_ballot_handlers: handlers(log_events, next_ballot_handler),
            begin_ballot_handlers: handlers(log_events, begin_ballot_handler),
            retry_ballot_handlers: handlers(log_events, retry_ballot_handler),
            abandon_ballot_handlers: handlers(log_events, abandon_ballot_handler),
            forward_decree_handlers: handlers(log_events, forward_decree_handler),
            promise_handlers: handlers(log_events, promise_handler),
            vote_handlers: handlers(log_events, vote_handler),
            serve_missing_entries_handlers: handlers(log_events, serve_missing_entries_handler),
            receive_missing_entries_handlers: handlers(log_events, receive_missing_entries_handler),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.commit_decree_handlers.is_empty()
            && self.acquire_presidency_handlers.is_empty()
            && self.next_ballot_handlers.is_empty()
            && self.begin_ballot_handlers.is_empty()
            && self.retry_ballot_handlers.is_empty()
            && self.abandon_ballot_handlers.is_empty()
            && self.forward_decree_handlers.is_empty()
            && self.promise_handlers.is_empty()
            && self.vote_handlers.is_empty()
            && self.serve_missing_entries_handlers.is_empty()
            && self.receive_missing_entries_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::CommitDecree(commit_decree_event) => self
                .commit_decree_handlers
                .iter()
                .for_each(|handler| handler(&commit_decree_event)),

            Event::AcquirePresidency(acquire_presidency_event) => self
                .acquire_presidency_handlers
                .iter()
                .for_each(|handler| handler(&acquire_presidency_event)),

            Event::NextBallot(next_ballot_event) => self
                .next_ballot_handlers
                .iter()
                .for_each(|handler| handler(&next_ballot_event)),

            Event::BeginBallot(begin_ballot_event) => self
                .begin_ballot_handlers
                .iter()
                .for_each(|handler| handler(&begin_ballot_event)),

            Event::RetryBallot(retry_ballot_event) => self
                .retry_ballot_handlers
                .iter()
                .for_each(|handler| handler(&retry_ballot_event)),

            Event::AbandonBallot(abandon_ballot_event) => self
                .abandon_ballot_handlers
                .iter()
                .for_each(|handler| handler(&abandon_ballot_event)),

            Event::ForwardDecree(forward_decree_event) => self
                .forward_decree_handlers
                .iter()
                .for_each(|handler| handler(&forward_decree_event)),

            Event::Promise(promise_event) => self
                .promise_handlers
                .iter()
                .for_each(|handler| handler(&promise_event)),

            Event::Vote(vote_event) => self
                .vote_handlers
                .iter()
                .for_each(|handler| handler(&vote_event)),

            Event::ServeMissingEntries(serve_missing_entries_event) => self
                .serve_missing_entries_handlers
                .iter()
                .for_each(|handler| handler(&serve_missing_entries_event)),

            Event::ReceiveMissingEntries(receive_missing_entries_event) => self
                .receive_missing_entries_handlers
                .iter()
                .for_each(|handler| handler(&receive_missing_entries_event)),
        }
    }
}

fn handlers<T: Logger>(log_events: bool, user_handler: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
    let mut handlers = Vec::new();
    if log_events {
        handlers.push(T::get_logger());
    }
    if let Some(handler) = user_handler {
        handlers.push(handler);
    }
    handlers
}

pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("event_bus thread disconnected from main thread")
            }
        }

        match event_subscriber.recv_timeout(EVENT_POLL_INTERVAL) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            // Every publishing thread has exited; wait for the shutdown signal.
            Err(RecvTimeoutError::Disconnected) => thread::yield_now(),
        }
    })
}
