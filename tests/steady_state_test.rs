use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use log::LevelFilter;
use synod_rs::{
    networking::{
        messages::{Message, NextBallot, ReplyMessage, Success, Voted},
        network::Network,
    },
    types::{
        ballot::BallotNumber,
        basic::{Decree, EntryID, NodeID},
    },
};

mod common;

use crate::common::{
    logging::setup_logger,
    network::mock_network,
    node::{cluster_of, wait_until, Node},
};

fn is_voted_from(from: NodeID, to: NodeID, message: &Message) -> Option<&Voted> {
    match message {
        Message::ReplyMessage(ReplyMessage::Voted(voted))
            if from == NodeID::new(1) && to == NodeID::new(0) =>
        {
            Some(voted)
        }
        _ => None,
    }
}

#[test]
fn stale_votes_are_ignored_test() {
    setup_logger(LevelFilter::Debug);

    // 1. Start 3 replicas. Node 1's votes never reach node 0, except the ones replayed for the
    //    president's first ballot once it has moved on.
    let cluster = cluster_of(3);
    let (network_stubs, switchboard) = mock_network(cluster.iter().copied());
    let mut replayer = network_stubs[1].clone();
    let president = NodeID::new(0);
    let stale = BallotNumber::new(1, president);

    let blocked = Arc::new(AtomicBool::new(true));
    let replaying = Arc::new(AtomicBool::new(false));
    let (blocked_in_filter, replaying_in_filter) = (blocked.clone(), replaying.clone());
    switchboard.set_filter(move |from, to, message| match is_voted_from(from, to, message) {
        Some(voted) if blocked_in_filter.load(Ordering::SeqCst) => {
            replaying_in_filter.load(Ordering::SeqCst) && voted.ballot == stale
        }
        _ => true,
    });

    let nodes: Vec<Node> = cluster
        .iter()
        .copied()
        .zip(network_stubs)
        .map(|(me, network)| Node::new(me, cluster.clone(), network))
        .collect();
    for node in &nodes {
        node.appoint_president(president);
    }

    let decree = Decree::from("Decided with fresh votes");
    nodes[0].submit_decree(decree.clone());

    // 2. Wait until the first ballot failed, then keep replaying node 1's vote for it.
    wait_until("node 0 retried with a higher ballot", || {
        nodes[0].progress().last_tried > stale
    });
    replaying.store(true, Ordering::SeqCst);

    let until = Instant::now() + Duration::from_millis(1500);
    while Instant::now() < until {
        replayer.send(
            president,
            Voted {
                ballot: stale,
                entry_id: EntryID::new(1),
            }
            .into(),
        );
        thread::sleep(Duration::from_millis(10));
    }
    for node in &nodes {
        assert_eq!(node.get(EntryID::new(1)), None);
    }

    // 3. Once node 1's real votes get through, the decree is decided, once.
    blocked.store(false, Ordering::SeqCst);
    wait_until("every node holds the decree at entry 1", || {
        nodes
            .iter()
            .all(|node| node.get(EntryID::new(1)) == Some(decree.clone()))
    });
    assert_eq!(nodes[0].entries().len(), 1);
}

#[test]
fn decided_entry_is_abandoned_test() {
    setup_logger(LevelFilter::Debug);

    // 1. Start 3 replicas. Node 1's first vote is held back until the test releases it.
    let cluster = cluster_of(3);
    let (network_stubs, switchboard) = mock_network(cluster.iter().copied());
    let mut informant = network_stubs[2].clone();
    let president = NodeID::new(0);

    let holding = Arc::new(AtomicBool::new(false));
    let released = Arc::new(AtomicBool::new(false));
    let (holding_in_filter, released_in_filter) = (holding.clone(), released.clone());
    switchboard.set_filter(move |from, to, message| {
        if is_voted_from(from, to, message).is_some() && !released_in_filter.load(Ordering::SeqCst) {
            holding_in_filter.store(true, Ordering::SeqCst);
            let give_up = Instant::now() + Duration::from_secs(5);
            while !released_in_filter.load(Ordering::SeqCst) && Instant::now() < give_up {
                thread::sleep(Duration::from_millis(1));
            }
        }
        true
    });

    let nodes: Vec<Node> = cluster
        .iter()
        .copied()
        .zip(network_stubs)
        .map(|(me, network)| Node::new(me, cluster.clone(), network))
        .collect();
    for node in &nodes {
        node.appoint_president(president);
    }

    let mine = Decree::from("Proposed at entry 1");
    nodes[0].submit_decree(mine.clone());

    // 2. While the ballot for entry 1 is in flight, node 0 learns that entry 1 was decided with another
    //    decree.
    while !holding.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }
    let theirs = Decree::from("Decided elsewhere");
    informant.send(
        president,
        Success {
            entry_id: EntryID::new(1),
            decree: theirs.clone(),
        }
        .into(),
    );
    while nodes[0].get(EntryID::new(1)).is_none() {
        thread::sleep(Duration::from_millis(1));
    }
    released.store(true, Ordering::SeqCst);

    // 3. The ballot is abandoned, and the decree moves to the next entry within the same term.
    wait_until("node 0 holds the decree at entry 2", || {
        nodes[0].get(EntryID::new(2)) == Some(mine.clone())
    });
    assert_eq!(nodes[0].get(EntryID::new(1)), Some(theirs));
    assert_eq!(nodes[0].progress().last_tried, BallotNumber::new(1, president));

    wait_until("every node holds the same 2 decrees", || {
        nodes.iter().all(|node| node.entries() == nodes[0].entries())
    });
}

#[test]
fn preempted_president_jumps_past_the_higher_ballot_test() {
    setup_logger(LevelFilter::Debug);

    // 1. Start 3 replicas, and decide a decree in node 0's first term.
    let cluster = cluster_of(3);
    let (network_stubs, _) = mock_network(cluster.iter().copied());
    let mut rival = network_stubs[2].clone();
    let president = NodeID::new(0);

    let nodes: Vec<Node> = cluster
        .iter()
        .copied()
        .zip(network_stubs)
        .map(|(me, network)| Node::new(me, cluster.clone(), network))
        .collect();
    for node in &nodes {
        node.appoint_president(president);
    }

    let first = Decree::from("First");
    nodes[0].submit_decree(first.clone());
    wait_until("every node holds the first decree", || {
        nodes
            .iter()
            .all(|node| node.get(EntryID::new(1)) == Some(first.clone()))
    });
    assert_eq!(nodes[0].progress().last_tried, BallotNumber::new(1, president));

    // 2. Nodes 0 and 1 promise a much higher ballot begun by node 2.
    let higher = BallotNumber::new(5, NodeID::new(2));
    rival.broadcast(
        NextBallot {
            ballot: higher,
            last_contiguous_entry_id: EntryID::new(1),
        }
        .into(),
    );
    wait_until("nodes 0 and 1 promised the higher ballot", || {
        nodes[0..2]
            .iter()
            .all(|node| node.progress().next_bal == higher)
    });

    // 3. Node 0's term is void. Its next ballot number is bumped past the one it promised.
    let second = Decree::from("Second");
    nodes[0].submit_decree(second.clone());
    wait_until("every node holds the second decree", || {
        nodes
            .iter()
            .all(|node| node.get(EntryID::new(2)) == Some(second.clone()))
    });
    assert_eq!(nodes[0].progress().last_tried, BallotNumber::new(6, president));
}
