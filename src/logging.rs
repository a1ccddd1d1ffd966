/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via replica's
//! [config](crate::replica::Configuration).
//!
//! This library logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [CommitDecree](crate::events::CommitDecreeEvent) is printed:
//!
//! ```text
//! CommitDecree, 1701329264, 12, fNGCJyk
//! ```
//!
//! In the snippet:
//! - The third value is the entry id the decree was written at.
//! - The fourth value is the first seven characters of the Base64 encoding of the SHA-256 digest of the
//!   decree.
//!
//! Ballot numbers are printed as `round.node`.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::{events::*, synod::ballot::RetryReason, types::basic::EntryID};

// Names of each event in PascalCase for printing:
pub const COMMIT_DECREE: &str = "CommitDecree";

pub const ACQUIRE_PRESIDENCY: &str = "AcquirePresidency";
pub const NEXT_BALLOT: &str = "NextBallot";
pub const BEGIN_BALLOT: &str = "BeginBallot";
pub const RETRY_BALLOT: &str = "RetryBallot";
pub const ABANDON_BALLOT: &str = "AbandonBallot";
pub const FORWARD_DECREE: &str = "ForwardDecree";

pub const PROMISE: &str = "Promise";
pub const VOTE: &str = "Vote";

pub const SERVE_MISSING_ENTRIES: &str = "ServeMissingEntries";
pub const RECEIVE_MISSING_ENTRIES: &str = "ReceiveMissingEntries";

pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for CommitDecreeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |commit_decree_event: &CommitDecreeEvent| {
            log::info!(
                "{}, {}, {}, {}",
                COMMIT_DECREE,
                secs_since_unix_epoch(commit_decree_event.timestamp),
                commit_decree_event.entry_id,
                first_seven_base64_chars(&commit_decree_event.decree.digest())
            )
        };
        Box::new(logger)
    }
}

impl Logger for AcquirePresidencyEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |acquire_presidency_event: &AcquirePresidencyEvent| {
            log::info!(
                "{}, {}, {}",
                ACQUIRE_PRESIDENCY,
                secs_since_unix_epoch(acquire_presidency_event.timestamp),
                acquire_presidency_event.ballot
            )
        };
        Box::new(logger)
    }
}

impl Logger for NextBallotEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |next_ballot_event: &NextBallotEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                NEXT_BALLOT,
                secs_since_unix_epoch(next_ballot_event.timestamp),
                next_ballot_event.next_ballot.ballot,
                next_ballot_event.next_ballot.last_contiguous_entry_id,
                next_ballot_event.quorum.len()
            )
        };
        Box::new(logger)
    }
}

impl Logger for BeginBallotEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |begin_ballot_event: &BeginBallotEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                BEGIN_BALLOT,
                secs_since_unix_epoch(begin_ballot_event.timestamp),
                begin_ballot_event.begin_ballot.ballot,
                begin_ballot_event.begin_ballot.entry_id,
                first_seven_base64_chars(&begin_ballot_event.begin_ballot.decree.digest())
            )
        };
        Box::new(logger)
    }
}

impl Logger for RetryBallotEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |retry_ballot_event: &RetryBallotEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RETRY_BALLOT,
                secs_since_unix_epoch(retry_ballot_event.timestamp),
                retry_ballot_event.ballot,
                retry_reason_info(&retry_ballot_event.reason)
            )
        };
        Box::new(logger)
    }
}

impl Logger for AbandonBallotEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |abandon_ballot_event: &AbandonBallotEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                ABANDON_BALLOT,
                secs_since_unix_epoch(abandon_ballot_event.timestamp),
                abandon_ballot_event.ballot,
                abandon_ballot_event.entry_id,
                first_seven_base64_chars(&abandon_ballot_event.existing.digest())
            )
        };
        Box::new(logger)
    }
}

impl Logger for ForwardDecreeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |forward_decree_event: &ForwardDecreeEvent| {
            log::info!(
                "{}, {}, {}, {}",
                FORWARD_DECREE,
                secs_since_unix_epoch(forward_decree_event.timestamp),
                forward_decree_event.president,
                first_seven_base64_chars(&forward_decree_event.decree.digest())
            )
        };
        Box::new(logger)
    }
}

impl Logger for PromiseEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |promise_event: &PromiseEvent| {
            log::info!(
                "{}, {}, {}, {}",
                PROMISE,
                secs_since_unix_epoch(promise_event.timestamp),
                promise_event.origin,
                promise_event.ballot
            )
        };
        Box::new(logger)
    }
}

impl Logger for VoteEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |vote_event: &VoteEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                VOTE,
                secs_since_unix_epoch(vote_event.timestamp),
                vote_event.origin,
                vote_event.begin_ballot.ballot,
                vote_event.begin_ballot.entry_id,
                first_seven_base64_chars(&vote_event.begin_ballot.decree.digest())
            )
        };
        Box::new(logger)
    }
}

impl Logger for ServeMissingEntriesEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |serve_missing_entries_event: &ServeMissingEntriesEvent| {
            log::info!(
                "{}, {}, {}, {}",
                SERVE_MISSING_ENTRIES,
                secs_since_unix_epoch(serve_missing_entries_event.timestamp),
                serve_missing_entries_event.requester,
                entry_ids_info(&serve_missing_entries_event.entry_ids)
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveMissingEntriesEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_missing_entries_event: &ReceiveMissingEntriesEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RECEIVE_MISSING_ENTRIES,
                secs_since_unix_epoch(receive_missing_entries_event.timestamp),
                receive_missing_entries_event.origin,
                entry_ids_info(&receive_missing_entries_event.entry_ids)
            )
        };
        Box::new(logger)
    }
}

fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

fn retry_reason_info(reason: &RetryReason) -> String {
    match reason {
        RetryReason::QuorumUnavailable => String::from("QuorumUnavailable"),
        RetryReason::InsufficientResponses => String::from("InsufficientResponses"),
        RetryReason::QuorumChanged => String::from("QuorumChanged"),
        RetryReason::Preempted { by } => format!("Preempted {}", by),
    }
}

// Entry ids are printed space-separated so they stay within one CSV value.
fn entry_ids_info(entry_ids: &[EntryID]) -> String {
    let ids: Vec<String> = entry_ids.iter().map(|id| id.to_string()).collect();
    ids.join(" ")
}
