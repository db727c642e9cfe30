//! In-process star transport.
//!
//! Messages are cloned between queues instead of crossing a socket, so a
//! whole room can run inside one test with full control over delivery.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use loopjam_types::Message;

use crate::transport::{PeerId, Transport, TransportEvent};

#[derive(Default)]
struct Hub {
    host_inbox: Vec<TransportEvent>,
    peer_inboxes: HashMap<PeerId, Vec<TransportEvent>>,
    next_peer_id: u64,
}

type Shared = Arc<Mutex<Hub>>;

fn lock(hub: &Shared) -> MutexGuard<'_, Hub> {
    hub.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The hosting end of a loopback room.
pub struct LoopbackHost {
    hub: Shared,
}

impl LoopbackHost {
    pub fn new() -> Self {
        Self {
            hub: Arc::new(Mutex::new(Hub { next_peer_id: 1, ..Hub::default() })),
        }
    }

    /// Open a new connection to this host.
    pub fn connect(&self) -> LoopbackPeer {
        let mut hub = lock(&self.hub);
        let id = PeerId(hub.next_peer_id);
        hub.next_peer_id += 1;
        hub.peer_inboxes.insert(
            id,
            vec![
                TransportEvent::ConnectionOpened(PeerId::HOST),
                TransportEvent::StatusChanged { connected: true, peer_count: 1 },
            ],
        );
        let peer_count = hub.peer_inboxes.len();
        hub.host_inbox.push(TransportEvent::ConnectionOpened(id));
        hub.host_inbox.push(TransportEvent::StatusChanged { connected: true, peer_count });
        LoopbackPeer {
            id,
            hub: Arc::clone(&self.hub),
        }
    }
}

impl Default for LoopbackHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LoopbackHost {
    fn is_host(&self) -> bool {
        true
    }

    fn send_to_host(&mut self, message: &Message) {
        debug!("Host dropping send_to_host({})", message.kind());
    }

    fn send_to_peer(&mut self, peer: PeerId, message: &Message) {
        match lock(&self.hub).peer_inboxes.get_mut(&peer) {
            Some(inbox) => inbox.push(TransportEvent::Message(PeerId::HOST, message.clone())),
            None => debug!("Dropping {} for closed {}", message.kind(), peer),
        }
    }

    fn broadcast(&mut self, message: &Message, exclude: Option<PeerId>) {
        let mut hub = lock(&self.hub);
        for (peer, inbox) in hub.peer_inboxes.iter_mut() {
            if Some(*peer) != exclude {
                inbox.push(TransportEvent::Message(PeerId::HOST, message.clone()));
            }
        }
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        std::mem::take(&mut lock(&self.hub).host_inbox)
    }

    fn peer_count(&self) -> usize {
        lock(&self.hub).peer_inboxes.len()
    }
}

/// A participant's end of a loopback room.
pub struct LoopbackPeer {
    id: PeerId,
    hub: Shared,
}

impl LoopbackPeer {
    /// The id the host sees for this connection.
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Drop the connection without any goodbye, as a network failure would.
    pub fn disconnect(&mut self) {
        let mut hub = lock(&self.hub);
        if hub.peer_inboxes.remove(&self.id).is_some() {
            let peer_count = hub.peer_inboxes.len();
            hub.host_inbox.push(TransportEvent::ConnectionClosed(self.id));
            hub.host_inbox.push(TransportEvent::StatusChanged { connected: true, peer_count });
        }
    }
}

impl Transport for LoopbackPeer {
    fn is_host(&self) -> bool {
        false
    }

    fn send_to_host(&mut self, message: &Message) {
        let mut hub = lock(&self.hub);
        if hub.peer_inboxes.contains_key(&self.id) {
            hub.host_inbox.push(TransportEvent::Message(self.id, message.clone()));
        } else {
            debug!("{} disconnected, dropping {}", self.id, message.kind());
        }
    }

    fn send_to_peer(&mut self, peer: PeerId, message: &Message) {
        if peer == PeerId::HOST {
            self.send_to_host(message);
        }
    }

    fn broadcast(&mut self, message: &Message, _exclude: Option<PeerId>) {
        self.send_to_host(message);
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        lock(&self.hub)
            .peer_inboxes
            .get_mut(&self.id)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    fn peer_count(&self) -> usize {
        usize::from(lock(&self.hub).peer_inboxes.contains_key(&self.id))
    }
}
