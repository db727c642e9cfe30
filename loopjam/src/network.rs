//! Host and join modes: drive a `SyncSession` from stdin and a wall clock.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use loopjam_net::{ActionRejected, HostTransport, PeerTransport, SyncSession, Transport};
use loopjam_types::{
    Clock, Player, Role, RoomCode, SystemClock, TransportState, BEATS_PER_BAR,
};

use crate::commands::{self, Command, ParseError};
use crate::config::{self, Config};
use crate::status;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

// =============================================================================
// Modes
// =============================================================================

pub fn run_host(config: &Config, me: Player, port: u16) -> io::Result<()> {
    let transport = HostTransport::bind(&format!("0.0.0.0:{}", port))?;
    let addr = transport.local_addr()?;
    let code = RoomCode::generate();

    log::info!("Hosting room {} on {}", code, addr);
    println!("room {} open on port {} (share: --join <your-ip>:{} {})", code, addr.port(), addr.port(), code);

    let mut session = SyncSession::host(transport, SystemClock, code, me);
    if let Err(e) = session.update_transport(false, config.tempo(), 0, 0) {
        log::warn!("Could not set starting tempo: {}", e);
    }
    run(session, config)
}

pub fn run_join(config: &Config, me: Player, addr: &str, code: &str) -> io::Result<()> {
    let code = RoomCode::parse(code).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let transport = PeerTransport::connect(addr)?;

    println!("joined room {} at {}", code, addr);
    let session = SyncSession::join(transport, SystemClock, code, me);
    run(session, config)
}

// =============================================================================
// Event loop
// =============================================================================

fn run<T: Transport>(mut session: SyncSession<T>, config: &Config) -> io::Result<()> {
    let lines = spawn_stdin_reader();
    let clock = SystemClock;

    session.on_state_change(|state| {
        log::debug!(
            "state: {} players, section {}, playing={}",
            state.player_count(),
            state.current_section_index,
            state.transport.is_playing
        );
    });
    session.on_clock_sync(|update| {
        log::debug!(
            "clock from {}: offset {:.1} ms, position {:.2}",
            update.leader,
            update.offset,
            update.transport_position
        );
    });
    session.on_latency_update(|peer, latency| {
        log::info!("latency to {}: {:.1} ms", peer, latency);
    });

    let mut last_clock_sync = Instant::now();
    let mut last_ping = Instant::now();
    let mut was_connected = false;

    loop {
        session.poll();

        if let Some(room) = session.wrong_room() {
            println!("host is running room {}, not the code you gave; leaving", room);
            session.leave();
            session.poll();
            return Ok(());
        }

        if session.role() == Role::Peer {
            if session.is_connected() {
                was_connected = true;
            } else if was_connected {
                println!("lost connection to host");
                return Ok(());
            }
        }

        loop {
            match lines.try_recv() {
                Ok(line) => match commands::parse(&line) {
                    Ok(Command::Quit) => {
                        session.leave();
                        session.poll();
                        return Ok(());
                    }
                    Ok(command) => {
                        if let Err(e) = execute(&mut session, command) {
                            println!("! {}", e);
                        }
                    }
                    Err(ParseError::Empty) => {}
                    Err(e) => println!("! {}", e),
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::info!("stdin closed, leaving");
                    session.leave();
                    return Ok(());
                }
            }
        }

        let now = clock.now_ms();
        if session.is_leader() {
            let position = playback_position(&session.state().transport, now);
            let bar = (position / f64::from(BEATS_PER_BAR)) as u32;
            if session.state().transport.is_playing && bar != session.state().transport.current_bar {
                if let Err(e) = session.on_bar(bar) {
                    log::warn!("bar tick failed: {}", e);
                }
            }
            if last_clock_sync.elapsed() >= config.clock_sync_interval() {
                last_clock_sync = Instant::now();
                let _ = session.send_clock_sync(position);
            }
        }

        if last_ping.elapsed() >= config.ping_interval() {
            last_ping = Instant::now();
            session.ping_peers();
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn execute<T: Transport>(session: &mut SyncSession<T>, command: Command) -> Result<(), ActionRejected> {
    let transport = session.state().transport.clone();
    match command {
        Command::Trigger { loop_id, active } => session.trigger_loop(&loop_id, active),
        Command::Volume { loop_id, volume } => session.update_loop_volume(&loop_id, volume),
        Command::Transpose { loop_id, semitones } => session.update_loop_transpose(&loop_id, semitones),
        Command::Pattern { loop_id, notes } => session.update_loop_pattern(&loop_id, notes, None),
        Command::Vote(index) => session.vote_section(index),
        Command::Create { memory } => session.vote_create_section(memory),
        Command::Queue(index) => session.queue_section(index),
        Command::Change(index) => session.change_section(index),
        Command::Play => session.update_transport(true, transport.tempo, 0, 0),
        Command::Stop => session.update_transport(
            false,
            transport.tempo,
            transport.current_beat,
            transport.current_bar,
        ),
        Command::Tempo(bpm) => session.update_transport(
            transport.is_playing,
            config::clamp_tempo(bpm),
            transport.current_beat,
            transport.current_bar,
        ),
        Command::Ping => {
            session.ping_peers();
            Ok(())
        }
        Command::State => {
            print!("{}", status::describe(session.state(), session.me()));
            Ok(())
        }
        Command::Help => {
            println!("{}", commands::HELP);
            Ok(())
        }
        Command::Quit => Ok(()),
    }
}

/// Beats elapsed since the transport started, or the stored position when stopped.
pub fn playback_position(transport: &TransportState, now_ms: f64) -> f64 {
    match (transport.is_playing, transport.start_time) {
        (true, Some(start)) => {
            let elapsed = (now_ms - start).max(0.0);
            elapsed * f64::from(transport.tempo) / 60_000.0
        }
        _ => {
            f64::from(transport.current_bar) * f64::from(BEATS_PER_BAR)
                + f64::from(transport.current_beat)
        }
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("stdin read error: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_while_playing_follows_tempo() {
        let transport = TransportState {
            tempo: 120.0,
            is_playing: true,
            current_beat: 0,
            current_bar: 0,
            start_time: Some(10_000.0),
        };
        // 120 bpm: two beats a second.
        assert_eq!(playback_position(&transport, 13_000.0), 6.0);
        assert_eq!(playback_position(&transport, 9_000.0), 0.0);
    }

    #[test]
    fn test_position_when_stopped_uses_bar_and_beat() {
        let transport = TransportState {
            tempo: 90.0,
            is_playing: false,
            current_beat: 3,
            current_bar: 2,
            start_time: None,
        };
        assert_eq!(playback_position(&transport, 99_999.0), 11.0);
    }

    #[test]
    fn test_position_survives_huge_bar_numbers() {
        let transport = TransportState {
            tempo: 120.0,
            is_playing: false,
            current_beat: u32::MAX,
            current_bar: u32::MAX,
            start_time: None,
        };
        let expected = f64::from(u32::MAX) * 4.0 + f64::from(u32::MAX);
        assert_eq!(playback_position(&transport, 0.0), expected);
    }
}
