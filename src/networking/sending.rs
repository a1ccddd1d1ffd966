/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions and types for sending messages to the P2P network.

use crate::types::{basic::NodeID, cluster::ClusterView};

use super::{messages::Message, network::Network};

/// Handle for sending and broadcasting messages to the [`Network`].
///
/// It can be used to send or broadcast instances of any type that implement the [`Into<Message>`]
/// trait.
#[derive(Clone)]
pub(crate) struct SenderHandle<N: Network> {
    network: N,
}

impl<N: Network> SenderHandle<N> {
    pub(crate) fn new(network: N) -> Self {
        Self { network }
    }

    pub(crate) fn send<S: Into<Message>>(&mut self, peer: NodeID, msg: S) {
        self.network.send(peer, msg.into())
    }

    pub(crate) fn broadcast<S: Into<Message>>(&mut self, msg: S) {
        self.network.broadcast(msg.into())
    }

    /// Send `msg` to every member of `peers`.
    pub(crate) fn multicast<S: Into<Message>>(&mut self, peers: &ClusterView, msg: S) {
        let msg = msg.into();
        for peer in peers {
            self.network.send(*peer, msg.clone())
        }
    }

    /// The members of `all` that the network reports reachable, plus `me`, which is always reachable to
    /// itself.
    pub(crate) fn online(&self, all: &ClusterView, me: NodeID) -> ClusterView {
        self.network
            .online_peers()
            .into_iter()
            .filter(|peer| all.contains(peer))
            .collect::<ClusterView>()
            .including(me)
    }
}
