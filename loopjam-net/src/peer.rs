//! TCP transport for a participant that joined someone else's room.

use std::io::{self, BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use log::{debug, info, warn};

use loopjam_types::Message;

use crate::framing::{decode_frame, read_frame, write_message};
use crate::transport::{PeerId, Transport, TransportEvent};

pub struct PeerTransport {
    writer: Option<BufWriter<TcpStream>>,
    inbound_rx: Receiver<Option<Message>>,
    pending: Vec<TransportEvent>,
}

impl PeerTransport {
    /// Connect to a host.
    pub fn connect(addr: &str) -> io::Result<Self> {
        info!("Connecting to host at {}", addr);

        let stream = TcpStream::connect(addr)?;
        let _ = stream.set_nodelay(true);
        let read_stream = stream.try_clone()?;

        let (inbound_tx, inbound_rx) = mpsc::channel();
        thread::spawn(move || {
            host_reader_thread(read_stream, inbound_tx);
        });

        info!("Connected to host at {}", addr);

        Ok(Self {
            writer: Some(BufWriter::new(stream)),
            inbound_rx,
            pending: vec![
                TransportEvent::ConnectionOpened(PeerId::HOST),
                TransportEvent::StatusChanged { connected: true, peer_count: 1 },
            ],
        })
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    fn mark_closed(&mut self) {
        if self.writer.take().is_some() {
            warn!("Host connection lost");
            self.pending.push(TransportEvent::ConnectionClosed(PeerId::HOST));
            self.pending.push(TransportEvent::StatusChanged { connected: false, peer_count: 0 });
        }
    }
}

impl Transport for PeerTransport {
    fn is_host(&self) -> bool {
        false
    }

    fn send_to_host(&mut self, message: &Message) {
        let Some(writer) = self.writer.as_mut() else {
            debug!("Not connected, dropping {}", message.kind());
            return;
        };
        if let Err(e) = write_message(writer, message) {
            warn!("Failed to send {} to host: {}", message.kind(), e);
            self.mark_closed();
        }
    }

    fn send_to_peer(&mut self, peer: PeerId, message: &Message) {
        if peer == PeerId::HOST {
            self.send_to_host(message);
        } else {
            debug!("Peers only reach the host; dropping {} for {}", message.kind(), peer);
        }
    }

    fn broadcast(&mut self, message: &Message, _exclude: Option<PeerId>) {
        // The host does the fan-out.
        self.send_to_host(message);
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        loop {
            match self.inbound_rx.try_recv() {
                Ok(Some(msg)) => self.pending.push(TransportEvent::Message(PeerId::HOST, msg)),
                Ok(None) => self.mark_closed(),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.mark_closed();
                    break;
                }
            }
        }
        std::mem::take(&mut self.pending)
    }

    fn peer_count(&self) -> usize {
        usize::from(self.is_connected())
    }
}

/// Background thread that reads messages from the host. Sends `None` on close.
fn host_reader_thread(stream: TcpStream, inbound_tx: Sender<Option<Message>>) {
    let mut reader = BufReader::new(stream);

    loop {
        let payload = match read_frame(&mut reader) {
            Ok(payload) => payload,
            Err(e) => {
                if e.kind() != io::ErrorKind::UnexpectedEof {
                    warn!("Host read error: {}", e);
                }
                let _ = inbound_tx.send(None);
                break;
            }
        };

        match decode_frame::<Message>(&payload) {
            Ok(msg) => {
                if inbound_tx.send(Some(msg)).is_err() {
                    break;
                }
            }
            Err(e) => warn!("Host sent an undecodable frame: {}", e),
        }
    }

    debug!("Host reader thread exiting");
}
