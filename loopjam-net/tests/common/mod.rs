#![allow(dead_code)]
//! Test harness utilities for loopjam-net integration tests.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use loopjam_net::framing::{read_message, write_message};
use loopjam_net::{HostTransport, LoopbackHost, LoopbackPeer, SyncSession, Transport};
use loopjam_types::{Clock, Message, Player, PlayerId, RoomCode, RoomState};

/// A clock the test moves by hand. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<Mutex<f64>>);

impl ManualClock {
    pub fn at(ms: f64) -> Self {
        Self(Arc::new(Mutex::new(ms)))
    }

    pub fn set(&self, ms: f64) {
        *self.0.lock().unwrap() = ms;
    }

    pub fn advance(&self, ms: f64) {
        *self.0.lock().unwrap() += ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        *self.0.lock().unwrap()
    }
}

pub type HostSession = SyncSession<LoopbackHost, ManualClock>;
pub type PeerSession = SyncSession<LoopbackPeer, ManualClock>;

pub fn player(name: &str) -> Player {
    Player::with_default_loops(PlayerId::new(name), name, "#ff8800")
}

pub fn code() -> RoomCode {
    RoomCode::parse("JAMS").unwrap()
}

/// A whole room running in-process: the host session plus one session per
/// joined peer, all reading the same manual clock.
pub struct Room {
    pub clock: ManualClock,
    pub host: HostSession,
    pub peers: Vec<PeerSession>,
}

impl Room {
    /// Host named `host` and peers joined in the given order, fully synced.
    pub fn new(host: &str, peers: &[&str]) -> Self {
        let clock = ManualClock::at(1_000.0);
        let transport = LoopbackHost::new();
        let mut room = Room {
            clock: clock.clone(),
            host: SyncSession::host(transport, clock, code(), player(host)),
            peers: Vec::new(),
        };
        for name in peers {
            room.join(name);
        }
        room
    }

    pub fn join(&mut self, name: &str) -> usize {
        let transport = self.host.transport().connect();
        let session = SyncSession::join(transport, self.clock.clone(), code(), player(name));
        self.peers.push(session);
        self.pump();
        self.peers.len() - 1
    }

    /// Poll every session enough rounds for any reaction chain to settle.
    pub fn pump(&mut self) {
        for _ in 0..8 {
            self.host.poll();
            for peer in &mut self.peers {
                peer.poll();
            }
        }
    }

    pub fn states(&self) -> Vec<&RoomState> {
        std::iter::once(self.host.state())
            .chain(self.peers.iter().map(|p| p.state()))
            .collect()
    }

    pub fn assert_converged(&self) {
        let states = self.states();
        for (i, state) in states.iter().enumerate().skip(1) {
            assert_eq!(*state, states[0], "replica {} diverged from host", i);
        }
    }
}

/// Drive a TCP host transport until `expected` peers are connected.
pub fn drive_until_peers(host: &mut HostTransport, expected: usize, timeout: Duration) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        host.poll_events();
        if host.peer_count() >= expected {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!(
        "Timed out waiting for {} peers (have {})",
        expected,
        host.peer_count()
    );
}

/// A raw TCP client for protocol-level tests.
pub struct RawClient {
    pub reader: BufReader<TcpStream>,
    pub writer: BufWriter<TcpStream>,
}

impl RawClient {
    pub fn connect(addr: &str) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    pub fn send(&mut self, msg: &Message) -> std::io::Result<()> {
        write_message(&mut self.writer, msg)
    }

    pub fn recv(&mut self) -> std::io::Result<Message> {
        read_message(&mut self.reader)
    }
}

/// Poll a session until `done` holds, or panic after `timeout`.
pub fn drive_until<T: Transport, C: Clock>(
    session: &mut SyncSession<T, C>,
    timeout: Duration,
    mut done: impl FnMut(&SyncSession<T, C>) -> bool,
) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        session.poll();
        if done(session) {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("Timed out driving session for {}", session.me());
}

pub fn loop_id(name: &str) -> loopjam_types::LoopId {
    loopjam_types::LoopId::new(name)
}

pub fn id(name: &str) -> PlayerId {
    PlayerId::new(name)
}
