//! The boundary between the sync layer and whatever moves bytes.
//!
//! Topology is a star: the host can reach every peer, a peer can reach only
//! the host. Sends are fire-and-forget; a failed send is logged and dropped.

use loopjam_types::Message;

/// Transport-level handle for one connection.
///
/// Assigned by the transport; unrelated to player ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub u64);

impl PeerId {
    /// How a peer's transport names its single connection.
    pub const HOST: PeerId = PeerId(0);
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == PeerId::HOST {
            write!(f, "host")
        } else {
            write!(f, "peer#{}", self.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    ConnectionOpened(PeerId),
    ConnectionClosed(PeerId),
    Message(PeerId, Message),
    StatusChanged { connected: bool, peer_count: usize },
}

pub trait Transport {
    /// Whether this end is the relay every other participant connects to.
    fn is_host(&self) -> bool;

    /// Peer side: send to the host. Hosts drop the message.
    fn send_to_host(&mut self, message: &Message);

    /// Send to one connection.
    fn send_to_peer(&mut self, peer: PeerId, message: &Message);

    /// Host side: send to every connection except `exclude`.
    fn broadcast(&mut self, message: &Message, exclude: Option<PeerId>);

    /// Drain everything that happened since the last poll. Never blocks.
    fn poll_events(&mut self) -> Vec<TransportEvent>;

    fn peer_count(&self) -> usize;
}
