/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Who the current president is, as told by the embedding application.
//!
//! Electing a president is outside the scope of this library. The application decides, by whatever
//! means it likes, and informs each replica through
//! [`Replica::appoint_president`](crate::replica::Replica::appoint_president). Safety does not depend
//! on the application being right: two replicas that both believe themselves president simply compete
//! with ballot numbers, and only progress suffers.

use std::sync::{Arc, Mutex};

use crate::types::basic::NodeID;

/// Shared handle through which every thread of a replica learns who the current president is.
#[derive(Clone, Default)]
pub(crate) struct Presidency(Arc<Mutex<Option<NodeID>>>);

impl Presidency {
    pub(crate) fn new() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }

    pub(crate) fn appoint(&self, president: Option<NodeID>) {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = president;
    }

    pub(crate) fn current(&self) -> Option<NodeID> {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn is(&self, node: NodeID) -> bool {
        self.current() == Some(node)
    }
}
