use std::collections::HashSet;

use synod_rs::types::{
    ballot::{next_ballot, BallotNumber},
    basic::NodeID,
    cluster::ClusterView,
};

fn view(ids: &[u64]) -> ClusterView {
    ids.iter().copied().map(NodeID::new).collect()
}

#[test]
fn majority_test() {
    let five = view(&[0, 1, 2, 3, 4]);
    let three = view(&[0, 1, 2]);

    assert!(view(&[0, 2, 4]).has_majority_of(&five));
    assert!(view(&[1, 2]).has_majority_of(&three));
    assert!(five.has_majority_of(&five));

    assert!(!view(&[3, 4]).has_majority_of(&five));
    assert!(!view(&[2]).has_majority_of(&three));
    assert!(!ClusterView::new().has_majority_of(&three));

    // Half is not a majority.
    assert!(!view(&[0, 1]).has_majority_of(&view(&[0, 1, 2, 3])));

    // Nodes outside the cluster don't count towards a majority of it.
    assert!(!view(&[0, 7, 8, 9]).has_majority_of(&three));

    // A cluster of one is a majority of itself.
    assert!(view(&[0]).has_majority_of(&view(&[0])));
}

#[test]
fn cluster_view_test() {
    let three = view(&[0, 1, 2]);

    assert_eq!(three.excluding(NodeID::new(1)), view(&[0, 2]));
    assert_eq!(three.including(NodeID::new(5)), view(&[0, 1, 2, 5]));
    assert_eq!(three.including(NodeID::new(2)), three);
    assert_eq!(three.intersection(&view(&[2, 3, 4])), view(&[2]));
    assert!(three.contains(&NodeID::new(0)));
    assert!(!three.contains(&NodeID::new(3)));
    assert_eq!(three.iter().count(), 3);
}

#[test]
fn ballot_ordering_test() {
    let node_a = NodeID::new(1);
    let node_b = NodeID::new(2);

    // Rounds are compared first, then node ids.
    assert!(BallotNumber::new(2, node_a) > BallotNumber::new(1, node_b));
    assert!(BallotNumber::new(1, node_b) > BallotNumber::new(1, node_a));

    // NEVER is below every ballot a node can begin.
    assert!(BallotNumber::NEVER.is_never());
    assert!(next_ballot(BallotNumber::NEVER, NodeID::new(0)) > BallotNumber::NEVER);
    assert!(!next_ballot(BallotNumber::NEVER, NodeID::new(0)).is_never());

    assert_eq!(BallotNumber::new(3, node_b).to_string(), "3.2");
}

#[test]
fn next_ballot_is_monotonic_test() {
    let me = NodeID::new(3);
    let mut ballot = BallotNumber::NEVER;
    for _ in 0..100 {
        let next = next_ballot(ballot, me);
        assert!(next > ballot);
        assert_eq!(next.node, me);
        ballot = next;
    }

    // Jumping past a ballot begun by another node.
    let foreign = BallotNumber::new(57, NodeID::new(4));
    assert!(next_ballot(foreign, me) > foreign);
}

#[test]
fn ballots_are_unique_across_nodes_test() {
    let previous = BallotNumber::new(9, NodeID::new(0));
    let ballots: HashSet<BallotNumber> = (0..5)
        .map(|node| next_ballot(previous, NodeID::new(node)))
        .collect();

    assert_eq!(ballots.len(), 5);
}
