//! TCP transport for the room host.
//!
//! Accepts peer connections, reads their messages on background threads, and
//! writes to any subset of them from the owning thread.

use std::collections::HashMap;
use std::io::{self, BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use log::{debug, error, info, warn};

use loopjam_types::Message;

use crate::framing::{decode_frame, encode_frame, read_frame, write_frame};
use crate::transport::{PeerId, Transport, TransportEvent};

/// What a reader thread reports back.
enum Inbound {
    Message(Message),
    Closed,
}

/// A connected peer with its write half.
struct Connection {
    addr: SocketAddr,
    writer: BufWriter<TcpStream>,
}

impl Connection {
    fn send_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        write_frame(&mut self.writer, frame)
    }
}

pub struct HostTransport {
    listener: TcpListener,
    connections: HashMap<PeerId, Connection>,
    inbound_rx: Receiver<(PeerId, Inbound)>,
    inbound_tx: Sender<(PeerId, Inbound)>,
    next_peer_id: u64,
    /// Events produced outside `poll_events` (e.g. a failed write).
    pending: Vec<TransportEvent>,
}

impl HostTransport {
    /// Bind the host to an address.
    pub fn bind(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;

        let (inbound_tx, inbound_rx) = mpsc::channel();

        info!("HostTransport listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            connections: HashMap::new(),
            inbound_rx,
            inbound_tx,
            next_peer_id: 1,
            pending: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept any pending TCP connections.
    fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        warn!("Failed to make stream from {} blocking: {}", addr, e);
                    }
                    let _ = stream.set_nodelay(true);

                    let read_stream = match stream.try_clone() {
                        Ok(s) => s,
                        Err(e) => {
                            error!("Failed to clone stream: {}", e);
                            continue;
                        }
                    };

                    let peer = PeerId(self.next_peer_id);
                    self.next_peer_id += 1;

                    let inbound_tx = self.inbound_tx.clone();
                    thread::spawn(move || {
                        peer_reader_thread(peer, read_stream, inbound_tx);
                    });

                    self.connections.insert(peer, Connection {
                        addr,
                        writer: BufWriter::new(stream),
                    });
                    self.pending.push(TransportEvent::ConnectionOpened(peer));
                    self.push_status();

                    info!("{} connected from {}", peer, addr);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!("Accept error: {}", e);
                    break;
                }
            }
        }
    }

    fn drop_connection(&mut self, peer: PeerId) {
        if let Some(conn) = self.connections.remove(&peer) {
            info!("{} ({}) disconnected", peer, conn.addr);
            self.pending.push(TransportEvent::ConnectionClosed(peer));
            self.push_status();
        }
    }

    fn push_status(&mut self) {
        self.pending.push(TransportEvent::StatusChanged {
            connected: true,
            peer_count: self.connections.len(),
        });
    }

    fn send_frame_to(&mut self, peer: PeerId, frame: &[u8]) {
        let failed = match self.connections.get_mut(&peer) {
            Some(conn) => match conn.send_frame(frame) {
                Ok(()) => false,
                Err(e) => {
                    warn!("Failed to send to {}: {}", peer, e);
                    true
                }
            },
            None => {
                debug!("Dropping message for unknown {}", peer);
                false
            }
        };
        if failed {
            self.drop_connection(peer);
        }
    }
}

impl Transport for HostTransport {
    fn is_host(&self) -> bool {
        true
    }

    fn send_to_host(&mut self, message: &Message) {
        debug!("Host dropping send_to_host({})", message.kind());
    }

    fn send_to_peer(&mut self, peer: PeerId, message: &Message) {
        match encode_frame(message) {
            Ok(frame) => self.send_frame_to(peer, &frame),
            Err(e) => error!("Failed to encode {}: {}", message.kind(), e),
        }
    }

    fn broadcast(&mut self, message: &Message, exclude: Option<PeerId>) {
        let frame = match encode_frame(message) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode {}: {}", message.kind(), e);
                return;
            }
        };
        let targets: Vec<PeerId> = self
            .connections
            .keys()
            .copied()
            .filter(|p| Some(*p) != exclude)
            .collect();
        for peer in targets {
            self.send_frame_to(peer, &frame);
        }
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        self.accept_connections();

        while let Ok((peer, inbound)) = self.inbound_rx.try_recv() {
            match inbound {
                Inbound::Message(msg) => {
                    // Frames still queued from a connection we already dropped.
                    if self.connections.contains_key(&peer) {
                        self.pending.push(TransportEvent::Message(peer, msg));
                    }
                }
                Inbound::Closed => self.drop_connection(peer),
            }
        }

        std::mem::take(&mut self.pending)
    }

    fn peer_count(&self) -> usize {
        self.connections.len()
    }
}

/// Background thread that reads messages from a peer and forwards them.
fn peer_reader_thread(peer: PeerId, stream: TcpStream, inbound_tx: Sender<(PeerId, Inbound)>) {
    let mut reader = BufReader::new(stream);

    loop {
        let payload = match read_frame(&mut reader) {
            Ok(payload) => payload,
            Err(e) => {
                if e.kind() != io::ErrorKind::UnexpectedEof {
                    warn!("{} read error: {}", peer, e);
                }
                let _ = inbound_tx.send((peer, Inbound::Closed));
                break;
            }
        };

        match decode_frame::<Message>(&payload) {
            Ok(msg) => {
                if inbound_tx.send((peer, Inbound::Message(msg))).is_err() {
                    // Receiver dropped, host is shutting down
                    break;
                }
            }
            Err(e) => warn!("{} sent an undecodable frame: {}", peer, e),
        }
    }

    debug!("{} reader thread exiting", peer);
}
