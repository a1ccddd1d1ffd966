use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use synod_rs::{
    events::{AcquirePresidencyEvent, CommitDecreeEvent, ForwardDecreeEvent, RetryBallotEvent},
    replica::{Configuration, Replica, ReplicaSpec},
    types::{
        basic::{Decree, EntryID, NodeID},
        cluster::ClusterView,
        entries::LedgerEntry,
        progress::ProgressRecord,
    },
};

use crate::common::{mem_db::MemDB, network::NetworkStub};

use super::logging::{first_seven_base64_chars, log_with_context};

/// Upper bound on how long a test waits for the cluster to reach some state.
pub(crate) const PATIENCE: Duration = Duration::from_secs(30);

/// A replica, together with its store and the decrees it has been seen to commit.
///
/// The store outlives the replica, so a node can be [stopped](Node::stop) and [restarted](Node::restart)
/// with its ledger and progress record intact.
pub(crate) struct Node {
    me: NodeID,
    cluster: ClusterView,
    kv_store: MemDB,
    commits: Arc<Mutex<Vec<(EntryID, Decree)>>>,
    replica: Option<Replica<MemDB>>,
}

impl Node {
    pub(crate) fn new(me: NodeID, cluster: ClusterView, network: NetworkStub) -> Node {
        Self::with_store(me, cluster, network, MemDB::new())
    }

    pub(crate) fn with_store(
        me: NodeID,
        cluster: ClusterView,
        network: NetworkStub,
        kv_store: MemDB,
    ) -> Node {
        let mut node = Node {
            me,
            cluster,
            kv_store,
            commits: Arc::new(Mutex::new(Vec::new())),
            replica: None,
        };
        node.restart(network);
        node
    }

    /// Start a fresh replica on top of this node's store. The commits seen so far are forgotten.
    pub(crate) fn restart(&mut self, network: NetworkStub) {
        self.stop();
        self.commits.lock().unwrap().clear();

        Replica::initialize(self.kv_store.clone()).unwrap();

        let configuration = Configuration::builder()
            .me(self.me)
            .cluster(self.cluster.clone())
            .round_trip_timeout(Duration::from_millis(500))
            .retry_interval(Duration::from_millis(100))
            .proposal_queue_capacity(64)
            .log_events(false)
            .build();

        let replica = ReplicaSpec::builder()
            .network(network)
            .kv_store(self.kv_store.clone())
            .configuration(configuration)
            .on_commit_decree(commit_decree_handler(self.me, self.commits.clone()))
            .on_acquire_presidency(acquire_presidency_handler(self.me))
            .on_retry_ballot(retry_ballot_handler(self.me))
            .on_forward_decree(forward_decree_handler(self.me))
            .build()
            .start();

        self.replica = Some(replica);
    }

    /// Shut the replica down, as if its process crashed. The store is kept.
    pub(crate) fn stop(&mut self) {
        // Dropping the replica joins all of its threads.
        self.replica.take();
    }

    pub(crate) fn me(&self) -> NodeID {
        self.me
    }

    pub(crate) fn appoint_president(&self, president: NodeID) {
        self.replica().appoint_president(Some(president))
    }

    pub(crate) fn submit_decree(&self, decree: Decree) {
        self.replica().submit_decree(decree).unwrap()
    }

    pub(crate) fn get(&self, entry_id: EntryID) -> Option<Decree> {
        self.replica().ledger().get(entry_id).unwrap()
    }

    pub(crate) fn entries(&self) -> Vec<LedgerEntry> {
        self.replica().ledger().list_all().unwrap()
    }

    pub(crate) fn progress(&self) -> ProgressRecord {
        self.replica().ledger().progress().unwrap()
    }

    /// Decrees committed by the running replica, in the order the event bus handled them.
    pub(crate) fn commits(&self) -> Vec<(EntryID, Decree)> {
        self.commits.lock().unwrap().clone()
    }

    fn replica(&self) -> &Replica<MemDB> {
        self.replica.as_ref().expect("Node is stopped!")
    }
}

/// Poll `condition` until it holds, panicking if it doesn't within [`PATIENCE`].
pub(crate) fn wait_until(description: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + PATIENCE;
    while !condition() {
        if Instant::now() > deadline {
            panic!("Timed out waiting until {}", description);
        }
        thread::sleep(Duration::from_millis(50));
    }
}

pub(crate) fn cluster_of(size: u64) -> ClusterView {
    (0..size).map(NodeID::new).collect()
}

fn commit_decree_handler(
    me: NodeID,
    commits: Arc<Mutex<Vec<(EntryID, Decree)>>>,
) -> impl Fn(&CommitDecreeEvent) + Send + 'static {
    move |commit_decree_event: &CommitDecreeEvent| {
        log_with_context(
            me,
            &format!(
                "Committed decree, entry id: {}, decree: {}",
                commit_decree_event.entry_id,
                first_seven_base64_chars(&commit_decree_event.decree)
            ),
        );
        commits.lock().unwrap().push((
            commit_decree_event.entry_id,
            commit_decree_event.decree.clone(),
        ));
    }
}

fn acquire_presidency_handler(me: NodeID) -> impl Fn(&AcquirePresidencyEvent) + Send + 'static {
    move |acquire_presidency_event: &AcquirePresidencyEvent| {
        log_with_context(
            me,
            &format!(
                "Acquired presidency, ballot: {}",
                acquire_presidency_event.ballot
            ),
        );
    }
}

fn retry_ballot_handler(me: NodeID) -> impl Fn(&RetryBallotEvent) + Send + 'static {
    move |retry_ballot_event: &RetryBallotEvent| {
        log_with_context(
            me,
            &format!(
                "Retrying ballot {}, reason: {:?}",
                retry_ballot_event.ballot, retry_ballot_event.reason
            ),
        );
    }
}

fn forward_decree_handler(me: NodeID) -> impl Fn(&ForwardDecreeEvent) + Send + 'static {
    move |forward_decree_event: &ForwardDecreeEvent| {
        log_with_context(
            me,
            &format!(
                "Forwarded decree {} to {}",
                first_seven_base64_chars(&forward_decree_event.decree),
                forward_decree_event.president
            ),
        );
    }
}
