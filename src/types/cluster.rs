/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Named subsets of the cluster and the majority predicate used to size quorums.

use std::collections::{btree_set, BTreeSet};

use super::basic::NodeID;

/// An ordered set of nodes, e.g., "all nodes", "online nodes", or the quorum of a ballot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterView(BTreeSet<NodeID>);

impl ClusterView {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Returns true iff this view contains more than half of the nodes in `all`.
    ///
    /// Members of this view that are not in `all` do not count.
    pub fn has_majority_of(&self, all: &ClusterView) -> bool {
        self.0.intersection(&all.0).count() > all.len() / 2
    }

    pub fn including(&self, node: NodeID) -> ClusterView {
        let mut nodes = self.0.clone();
        nodes.insert(node);
        ClusterView(nodes)
    }

    pub fn excluding(&self, node: NodeID) -> ClusterView {
        let mut nodes = self.0.clone();
        nodes.remove(&node);
        ClusterView(nodes)
    }

    pub fn intersection(&self, other: &ClusterView) -> ClusterView {
        ClusterView(self.0.intersection(&other.0).copied().collect())
    }

    pub fn contains(&self, node: &NodeID) -> bool {
        self.0.contains(node)
    }

    pub fn insert(&mut self, node: NodeID) -> bool {
        self.0.insert(node)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, NodeID> {
        self.0.iter()
    }
}

impl FromIterator<NodeID> for ClusterView {
    fn from_iter<T: IntoIterator<Item = NodeID>>(iter: T) -> Self {
        ClusterView(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ClusterView {
    type Item = &'a NodeID;
    type IntoIter = btree_set::Iter<'a, NodeID>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
