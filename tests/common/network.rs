use std::{
    collections::{HashMap, HashSet},
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
};

use synod_rs::{networking::messages::Message, networking::network::Network, types::basic::NodeID};

/// Decides whether a message from the first node to the second is delivered. A filter runs on the
/// sending thread, so it may also hold a message back by blocking.
pub(crate) type MessageFilter = Arc<dyn Fn(NodeID, NodeID, &Message) -> bool + Send + Sync>;

/// Shared control over the mock network: which nodes are reachable, and which messages get through.
///
/// Messages to or from an offline node are lost, not delayed.
#[derive(Clone, Default)]
pub(crate) struct Switchboard {
    offline: Arc<Mutex<HashSet<NodeID>>>,
    filter: Arc<Mutex<Option<MessageFilter>>>,
}

impl Switchboard {
    pub(crate) fn set_online(&self, node: NodeID, online: bool) {
        let mut offline = self.offline.lock().unwrap();
        if online {
            offline.remove(&node);
        } else {
            offline.insert(node);
        }
    }

    pub(crate) fn is_online(&self, node: NodeID) -> bool {
        !self.offline.lock().unwrap().contains(&node)
    }

    /// Only deliver the messages for which `filter` returns true.
    pub(crate) fn set_filter(
        &self,
        filter: impl Fn(NodeID, NodeID, &Message) -> bool + Send + Sync + 'static,
    ) {
        *self.filter.lock().unwrap() = Some(Arc::new(filter));
    }

    fn delivers(&self, from: NodeID, to: NodeID, message: &Message) -> bool {
        if !self.is_online(from) || !self.is_online(to) {
            return false;
        }
        // Released before the filter runs, so a blocking filter doesn't stall other senders.
        let filter = self.filter.lock().unwrap().clone();
        filter.map_or(true, |filter| filter(from, to, message))
    }
}

/// A mock network stub which passes messages from and to threads using channels.
#[derive(Clone)]
pub(crate) struct NetworkStub {
    me: NodeID,
    all_peers: HashMap<NodeID, Sender<(NodeID, Message)>>,
    inbox: Arc<Mutex<Receiver<(NodeID, Message)>>>,
    switchboard: Switchboard,
}

impl Network for NetworkStub {
    fn broadcast(&mut self, message: Message) {
        for (peer, sender) in &self.all_peers {
            if *peer != self.me && self.switchboard.delivers(self.me, *peer, &message) {
                let _ = sender.send((self.me, message.clone()));
            }
        }
    }

    fn send(&mut self, peer: NodeID, message: Message) {
        if let Some(sender) = self.all_peers.get(&peer) {
            if self.switchboard.delivers(self.me, peer, &message) {
                let _ = sender.send((self.me, message));
            }
        }
    }

    fn recv(&mut self) -> Option<(NodeID, Message)> {
        match self.inbox.lock().unwrap().try_recv() {
            Ok(o_m) => Some(o_m),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => panic!(),
        }
    }

    fn online_peers(&self) -> Vec<NodeID> {
        if !self.switchboard.is_online(self.me) {
            return Vec::new();
        }
        self.all_peers
            .keys()
            .copied()
            .filter(|peer| *peer != self.me && self.switchboard.is_online(*peer))
            .collect()
    }
}

pub(crate) fn mock_network(
    peers: impl Iterator<Item = NodeID>,
) -> (Vec<NetworkStub>, Switchboard) {
    let switchboard = Switchboard::default();
    let mut all_peers = HashMap::new();
    let peer_and_inboxes: Vec<(NodeID, Receiver<(NodeID, Message)>)> = peers
        .map(|peer| {
            let (sender, receiver) = mpsc::channel();
            all_peers.insert(peer, sender);

            (peer, receiver)
        })
        .collect();

    let stubs = peer_and_inboxes
        .into_iter()
        .map(|(me, inbox)| NetworkStub {
            me,
            all_peers: all_peers.clone(),
            inbox: Arc::new(Mutex::new(inbox)),
            switchboard: switchboard.clone(),
        })
        .collect();

    (stubs, switchboard)
}
