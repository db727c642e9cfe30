//! Network layer for loopjam rooms.
//!
//! The room creator hosts; every other participant connects to the host, which
//! relays each message to everyone else. [`SyncSession`] sits on top of any
//! [`Transport`] and keeps the local replica of the room in step.

pub mod framing;
pub mod host;
pub mod loopback;
pub mod peer;
pub mod session;
pub mod transport;

pub use host::HostTransport;
pub use loopback::{LoopbackHost, LoopbackPeer};
pub use peer::PeerTransport;
pub use session::{ActionRejected, SyncSession};
pub use transport::{PeerId, Transport, TransportEvent};
