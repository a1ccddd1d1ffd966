/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use crate::types::basic::NodeID;

use super::messages::Message;

/// The transport a replica uses to talk to its peers. Delivery is at-most-once: messages may be lost,
/// but are never duplicated or corrupted.
pub trait Network: Clone + Send {
    /// Send a message to every peer except this replica, without blocking.
    fn broadcast(&mut self, message: Message);

    /// Send a message to the specified peer without blocking.
    fn send(&mut self, peer: NodeID, message: Message);

    /// Receive a message from any peer. Returns immediately with a None if no message is available now.
    fn recv(&mut self) -> Option<(NodeID, Message)>;

    /// The peers currently believed reachable. May or may not include this replica.
    fn online_peers(&self) -> Vec<NodeID>;
}
