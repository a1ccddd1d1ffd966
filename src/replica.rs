/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build, run, and initialize the storage of a replica.
//!
//! Synod-rs replicates an append-only ledger of decrees across a fixed cluster of processes. In our
//! terminology, these processes are called 'replicas', and the set of all replicas is called the
//! 'cluster'. Each replica is uniquely identified by a [`NodeID`].
//!
//! The key components of this module are:
//! - The builder-pattern interface to construct a [specification of the replica](ReplicaSpec) with:
//!   1. `ReplicaSpec::builder` to construct a `ReplicaSpecBuilder`,
//!   2. The setters of the `ReplicaSpecBuilder`, and
//!   3. The `ReplicaSpecBuilder::build` method to construct a [`ReplicaSpec`],
//! - The function to [start](ReplicaSpec::start) a [`Replica`] given its specification,
//! - The function to [initialize](Replica::initialize) the replica's [ledger](crate::ledger),
//! - [The type](Replica) which keeps the replica alive, and through which decrees are submitted.
//!
//! ## The president
//!
//! Only one replica, the president, conducts ballots. Choosing it is left to the library user, who
//! informs every replica through [`Replica::appoint_president`]. Decrees submitted to any other
//! replica are forwarded to the president, or held until one is appointed.
//!
//! ## Starting a replica
//!
//! ```ignore
//! Replica::initialize(kv_store.clone())?;
//!
//! let replica =
//!     ReplicaSpec::builder()
//!     .network(network)
//!     .kv_store(kv_store)
//!     .configuration(configuration)
//!     .on_commit_decree(commit_handler)
//!     .build()
//!     .start();
//!
//! replica.appoint_president(Some(NodeID::new(0)));
//! replica.submit_decree(Decree::from("Paxos is a Greek island"))?;
//! ```
//!
//! ### Required setters
//!
//! - `.network(...)`
//! - `.kv_store(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! The optional setters are for registering user-defined event handlers for events from
//! [crate::events]:
//! - `.on_commit_decree(...)`
//! - `.on_acquire_presidency(...)`
//! - `.on_next_ballot(...)`
//! - `.on_begin_ballot(...)`
//! - `.on_retry_ballot(...)`
//! - `.on_abandon_ballot(...)`
//! - `.on_forward_decree(...)`
//! - `.on_promise(...)`
//! - `.on_vote(...)`
//! - `.on_serve_missing_entries(...)`
//! - `.on_receive_missing_entries(...)`
//!
//! The replica's [configuration](Configuration) is also built with the builder pattern:
//!
//! ```ignore
//! let configuration =
//!     Configuration::builder()
//!     .me(NodeID::new(0))
//!     .cluster((0..5).map(NodeID::new).collect())
//!     .round_trip_timeout(Duration::from_millis(500))
//!     .retry_interval(Duration::from_millis(200))
//!     .proposal_queue_capacity(1024)
//!     .log_events(true)
//!     .build();
//! ```

use std::{
    sync::mpsc::{self, Sender, SyncSender, TrySendError},
    thread::JoinHandle,
    time::Duration,
};

use typed_builder::TypedBuilder;

use crate::{
    event_bus::*,
    events::*,
    ledger::{
        pluggables::KVStore,
        store::{LedgerCamera, LedgerError, LedgerStore},
    },
    networking::{
        network::Network,
        receiving::{start_polling, ReplyStub},
        sending::SenderHandle,
    },
    presidency::Presidency,
    synod::{
        acceptor::{start_acceptor, Acceptor},
        learner::{start_learner, Learner},
        proposer::{Proposer, ProposerConfiguration},
    },
    types::{
        basic::{Decree, NodeID},
        cluster::ClusterView,
    },
};

/// Stores the user-defined parameters required to start the replica, that is:
/// 1. The replica's [`NodeID`].
/// 2. The cluster: the IDs of every replica, including this one. A ballot needs the participation of a
///    majority of it.
/// 3. The round trip timeout, which bounds how long the proposer waits for the replies to one phase of
///    a ballot.
/// 4. The retry interval, which the proposer waits (plus a random jitter of up to half of it) before
///    retrying a failed ballot.
/// 5. The proposal queue capacity, which bounds the number of decrees waiting to be proposed or
///    forwarded.
/// 6. The "Log Events" flag, if set to "true" then logs should be printed.
///
/// ## Log Events
///
/// Synod-rs logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.me(...)`
    - `.cluster(...)`
    - `.round_trip_timeout(...)`
    - `.retry_interval(...)`
    - `.proposal_queue_capacity(...)`
    - `.log_events(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the replica's node ID. Required."))]
    pub me: NodeID,
    #[builder(setter(doc = "Set the IDs of every replica in the cluster, including this one. Required."))]
    pub cluster: ClusterView,
    #[builder(setter(
        doc = "Set how long the proposer waits for the replies to one phase of a ballot. Required."
    ))]
    pub round_trip_timeout: Duration,
    #[builder(setter(doc = "Set the base interval between attempts at a failed ballot. Required."))]
    pub retry_interval: Duration,
    #[builder(setter(
        doc = "Set the maximum number of submitted decrees waiting to be proposed or forwarded. Required."
    ))]
    pub proposal_queue_capacity: usize,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}

impl From<&Configuration> for ProposerConfiguration {
    fn from(config: &Configuration) -> Self {
        ProposerConfiguration {
            me: config.me,
            cluster: config.cluster.including(config.me),
            round_trip_timeout: config.round_trip_timeout,
            retry_interval: config.retry_interval,
        }
    }
}

/// Stores all necessary parameters and trait implementations required to run the [`Replica`].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [ReplicaSpec]. On the builder call the following methods to construct a valid [ReplicaSpec].

    Required:
    - `.network(...)`
    - `.kv_store(...)`
    - `.configuration(...)`

    Optional:
    - `.on_commit_decree(...)`
    - `.on_acquire_presidency(...)`
    - `.on_next_ballot(...)`
    - `.on_begin_ballot(...)`
    - `.on_retry_ballot(...)`
    - `.on_abandon_ballot(...)`
    - `.on_forward_decree(...)`
    - `.on_promise(...)`
    - `.on_vote(...)`
    - `.on_serve_missing_entries(...)`
    - `.on_receive_missing_entries(...)`
"))]
pub struct ReplicaSpec<K: KVStore, N: Network + 'static> {
    // Required parameters
    #[builder(setter(
        doc = "Set the implementation of peer-to-peer networking. The argument must implement the [Network](crate::networking::network::Network) trait. Required."
    ))]
    network: N,
    #[builder(setter(
        doc = "Set the implementation of the replica's Key-Value store. The argument must implement the [KVStore](crate::ledger::pluggables::KVStore) trait. Required."
    ))]
    kv_store: K,
    #[builder(setter(
        doc = "Set the [configuration](Configuration), which contains the necessary parameters to run a replica. Required."
    ))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&CommitDecreeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CommitDecreeEvent>),
    doc = "Register a handler closure to be invoked after a decree is written into the replica's ledger. Optional."))]
    on_commit_decree: Option<HandlerPtr<CommitDecreeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&AcquirePresidencyEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<AcquirePresidencyEvent>),
    doc = "Register a handler closure to be invoked after the replica, as president, wins Phase 1 of a ballot. Optional."))]
    on_acquire_presidency: Option<HandlerPtr<AcquirePresidencyEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&NextBallotEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<NextBallotEvent>),
    doc = "Register a handler closure to be invoked after the replica begins Phase 1 of a ballot. Optional."))]
    on_next_ballot: Option<HandlerPtr<NextBallotEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&BeginBallotEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<BeginBallotEvent>),
    doc = "Register a handler closure to be invoked after the replica begins Phase 2 of a ballot. Optional."))]
    on_begin_ballot: Option<HandlerPtr<BeginBallotEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RetryBallotEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RetryBallotEvent>),
    doc = "Register a handler closure to be invoked after a ballot fails and is scheduled for retry. Optional."))]
    on_retry_ballot: Option<HandlerPtr<RetryBallotEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&AbandonBallotEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<AbandonBallotEvent>),
    doc = "Register a handler closure to be invoked after a ballot is abandoned because its entry was decided with another decree. Optional."))]
    on_abandon_ballot: Option<HandlerPtr<AbandonBallotEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ForwardDecreeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ForwardDecreeEvent>),
    doc = "Register a handler closure to be invoked after the replica forwards a submitted decree to the president. Optional."))]
    on_forward_decree: Option<HandlerPtr<ForwardDecreeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PromiseEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PromiseEvent>),
    doc = "Register a handler closure to be invoked after the replica's acceptor promises a ballot. Optional."))]
    on_promise: Option<HandlerPtr<PromiseEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&VoteEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<VoteEvent>),
    doc = "Register a handler closure to be invoked after the replica's acceptor votes in a ballot. Optional."))]
    on_vote: Option<HandlerPtr<VoteEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ServeMissingEntriesEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ServeMissingEntriesEvent>),
    doc = "Register a handler closure to be invoked after the replica, as president, sends a lagging peer the entries it lacks. Optional."))]
    on_serve_missing_entries: Option<HandlerPtr<ServeMissingEntriesEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveMissingEntriesEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveMissingEntriesEvent>),
    doc = "Register a handler closure to be invoked after the replica receives the entries it lacked from the president. Optional."))]
    on_receive_missing_entries: Option<HandlerPtr<ReceiveMissingEntriesEvent>>,
}

impl<K: KVStore, N: Network + 'static> ReplicaSpec<K, N> {
    /// Starts all threads and channels associated with running a replica, and returns the handles to
    /// them in a [`Replica`] struct.
    ///
    /// The ledger must have been [initialized](Replica::initialize) beforehand.
    pub fn start(self) -> Replica<K> {
        let proposer_config = ProposerConfiguration::from(&self.configuration);
        let me = self.configuration.me;
        let log_events = self.configuration.log_events;

        let presidency = Presidency::new();
        let (proposal_queue, proposals) =
            mpsc::sync_channel(self.configuration.proposal_queue_capacity);

        let (poller_shutdown, poller_shutdown_receiver) = mpsc::channel();
        let (poller, ballot_msgs, reply_msgs, learner_msgs) = start_polling(
            self.network.clone(),
            proposal_queue.clone(),
            poller_shutdown_receiver,
        );

        let event_handlers = EventHandlers::new(
            log_events,
            self.on_commit_decree,
            self.on_acquire_presidency,
            self.on_next_ballot,
            self.on_begin_ballot,
            self.on_retry_ballot,
            self.on_abandon_ballot,
            self.on_forward_decree,
            self.on_promise,
            self.on_vote,
            self.on_serve_missing_entries,
            self.on_receive_missing_entries,
        );

        let (event_publisher, event_subscriber) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };

        let ledger = LedgerStore::new(self.kv_store.clone());
        let acceptor = Acceptor::new(ledger.clone(), event_publisher.clone());
        let learner = Learner::new(
            me,
            ledger.clone(),
            SenderHandle::new(self.network.clone()),
            presidency.clone(),
            event_publisher.clone(),
        );

        let (acceptor_shutdown, acceptor_shutdown_receiver) = mpsc::channel();
        let acceptor_thread = start_acceptor(
            acceptor.clone(),
            SenderHandle::new(self.network.clone()),
            ballot_msgs,
            acceptor_shutdown_receiver,
        );

        let (learner_shutdown, learner_shutdown_receiver) = mpsc::channel();
        let learner_thread = start_learner(learner.clone(), learner_msgs, learner_shutdown_receiver);

        let (proposer_shutdown, proposer_shutdown_receiver) = mpsc::channel();
        let proposer = Proposer::new(
            proposer_config,
            ledger,
            acceptor,
            learner,
            SenderHandle::new(self.network),
            ReplyStub::new(reply_msgs),
            presidency.clone(),
            proposals,
            proposer_shutdown_receiver,
            event_publisher,
        )
        .start();

        let (event_bus_shutdown, event_bus) = match event_subscriber {
            Some(event_subscriber) => {
                let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
                let event_bus = start_event_bus(
                    event_handlers,
                    event_subscriber,
                    event_bus_shutdown_receiver,
                );
                (Some(event_bus_shutdown), Some(event_bus))
            }
            None => (None, None),
        };

        Replica {
            ledger_camera: LedgerCamera::new(self.kv_store),
            presidency,
            proposal_queue,
            poller: Some(poller),
            poller_shutdown,
            acceptor: Some(acceptor_thread),
            acceptor_shutdown,
            learner: Some(learner_thread),
            learner_shutdown,
            proposer: Some(proposer),
            proposer_shutdown,
            event_bus,
            event_bus_shutdown,
        }
    }
}

/// A handle to the background threads of a Synod-rs replica. When this value is dropped, all
/// background threads are gracefully shut down.
pub struct Replica<K: KVStore> {
    ledger_camera: LedgerCamera<K>,
    presidency: Presidency,
    proposal_queue: SyncSender<Decree>,
    poller: Option<JoinHandle<()>>,
    poller_shutdown: Sender<()>,
    acceptor: Option<JoinHandle<()>>,
    acceptor_shutdown: Sender<()>,
    learner: Option<JoinHandle<()>>,
    learner_shutdown: Sender<()>,
    proposer: Option<JoinHandle<()>>,
    proposer_shutdown: Sender<()>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl<K: KVStore> Replica<K> {
    /// Seeds the replica's progress record, if it has none yet. Existing ledger entries and progress
    /// are left untouched, so it is safe to call on every start-up.
    pub fn initialize(kv_store: K) -> Result<(), LedgerError> {
        LedgerStore::new(kv_store).initialize()
    }

    /// Queue `decree` to be decided. On the president it is put to a ballot; on any other replica it
    /// is forwarded to the president, or held until a president is appointed.
    pub fn submit_decree(&self, decree: Decree) -> Result<(), SubmitError> {
        self.proposal_queue
            .try_send(decree)
            .map_err(|err| match err {
                TrySendError::Full(decree) => SubmitError::QueueFull { decree },
                TrySendError::Disconnected(_) => SubmitError::ReplicaStopped,
            })
    }

    /// Tell the replica which node is the president, or that there is none.
    pub fn appoint_president(&self, president: Option<NodeID>) {
        self.presidency.appoint(president)
    }

    pub fn president(&self) -> Option<NodeID> {
        self.presidency.current()
    }

    /// Returns a [Ledger Camera](LedgerCamera) which can be used to peek into the replica's ledger and
    /// progress record.
    pub fn ledger(&self) -> &LedgerCamera<K> {
        &self.ledger_camera
    }
}

impl<K: KVStore> Drop for Replica<K> {
    fn drop(&mut self) {
        // The order of thread shutdown is important: the proposer, learner, and acceptor threads receive
        // messages from the poller, and assume that the poller will live longer than them.

        self.event_bus_shutdown
            .iter()
            .for_each(|shutdown| shutdown.send(()).unwrap());
        if let Some(event_bus) = self.event_bus.take() {
            event_bus.join().unwrap();
        }

        self.proposer_shutdown.send(()).unwrap();
        self.proposer.take().unwrap().join().unwrap();

        self.learner_shutdown.send(()).unwrap();
        self.learner.take().unwrap().join().unwrap();

        self.acceptor_shutdown.send(()).unwrap();
        self.acceptor.take().unwrap().join().unwrap();

        self.poller_shutdown.send(()).unwrap();
        self.poller.take().unwrap().join().unwrap();
    }
}

/// Why [`Replica::submit_decree`] refused a decree.
#[derive(Debug)]
pub enum SubmitError {
    /// The proposal queue is at capacity. The decree is handed back.
    QueueFull { decree: Decree },
    ReplicaStopped,
}
