//! The sync layer: one participant's replica of the room plus the rules for
//! keeping it in step with everyone else's.
//!
//! Local actions and inbound messages take the same path: the message is
//! folded into state by the reducer, then whatever reply or follow-up it calls
//! for is sent. The host additionally relays every inbound message to all
//! other connections.

use std::collections::HashMap;

use log::{debug, info, warn};
use thiserror::Error;

use loopjam_types::clock::LatencyEstimate;
use loopjam_types::reduce::reduce_message;
use loopjam_types::votes::{create_votes_invalidated, forced_section_change};
use loopjam_types::{
    clock_offset, loop_state_hash, one_way_latency, Clock, ClockUpdate, LatencyTracker,
    LoopId, Message, NoteEvent, Player, PlayerId, Role, RoomCode, RoomState, SystemClock,
    BEATS_PER_BAR,
};

use crate::transport::{PeerId, Transport, TransportEvent};

/// Why a local action was not sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionRejected {
    #[error("only the leader can do that")]
    NotLeader,
    #[error("you have no loop '{0}'")]
    UnknownLoop(LoopId),
    #[error("there is no section {0}")]
    UnknownSection(usize),
    #[error("you are not in the room")]
    NotInRoom,
}

type StateListener = Box<dyn FnMut(&RoomState) + Send>;
type ClockListener = Box<dyn FnMut(&ClockUpdate) + Send>;
type LatencyListener = Box<dyn FnMut(&PlayerId, f64) + Send>;

pub struct SyncSession<T: Transport, C: Clock = SystemClock> {
    transport: T,
    clock: C,
    role: Role,
    me: PlayerId,
    state: RoomState,
    /// Host only: the connection each remote player joined through.
    routes: HashMap<PlayerId, PeerId>,
    latency: LatencyTracker,
    last_clock: Option<ClockUpdate>,
    connected: bool,
    /// Peer only: false until the host's `state_sync` for the requested room
    /// has replaced the local stub. The host is always synced.
    synced: bool,
    /// Peer only: a room code the host answered with instead of ours.
    wrong_room: Option<RoomCode>,
    state_listeners: Vec<StateListener>,
    clock_listeners: Vec<ClockListener>,
    latency_listeners: Vec<LatencyListener>,
}

impl<T: Transport, C: Clock> SyncSession<T, C> {
    /// Create a room on a hosting transport. The creator becomes leader.
    pub fn host(transport: T, clock: C, room: RoomCode, me: Player) -> Self {
        debug_assert!(transport.is_host());
        info!("Hosting room {} as {}", room, me.id);
        Self::start(transport, clock, Role::Host, room, me)
    }

    /// Join a room through a peer transport already connected to its host.
    pub fn join(transport: T, clock: C, room: RoomCode, me: Player) -> Self {
        debug_assert!(!transport.is_host());
        info!("Joining room {} as {}", room, me.id);
        Self::start(transport, clock, Role::Peer, room, me)
    }

    fn start(transport: T, clock: C, role: Role, room: RoomCode, me: Player) -> Self {
        let mut session = Self {
            transport,
            clock,
            role,
            me: me.id.clone(),
            state: RoomState::new(room),
            routes: HashMap::new(),
            latency: LatencyTracker::new(),
            last_clock: None,
            connected: role == Role::Host,
            synced: role == Role::Host,
            wrong_room: None,
            state_listeners: Vec::new(),
            clock_listeners: Vec::new(),
            latency_listeners: Vec::new(),
        };
        session.dispatch(Message::Join { player: me });
        session
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn state(&self) -> &RoomState {
        &self.state
    }

    pub fn me(&self) -> &PlayerId {
        &self.me
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Before the first state sync a joiner only sees itself, so it never
    /// counts as leader.
    pub fn is_leader(&self) -> bool {
        self.synced && self.state.is_leader(&self.me)
    }

    /// Whether this replica holds the room's state yet.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Set when the host answered a join with the state of a different room.
    pub fn wrong_room(&self) -> Option<&RoomCode> {
        self.wrong_room.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn latency(&self, peer: &PlayerId) -> Option<&LatencyEstimate> {
        self.latency.get(peer)
    }

    pub fn last_clock(&self) -> Option<&ClockUpdate> {
        self.last_clock.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ---------------------------------------------------------------------
    // Listeners
    // ---------------------------------------------------------------------

    pub fn on_state_change(&mut self, listener: impl FnMut(&RoomState) + Send + 'static) {
        self.state_listeners.push(Box::new(listener));
    }

    pub fn on_clock_sync(&mut self, listener: impl FnMut(&ClockUpdate) + Send + 'static) {
        self.clock_listeners.push(Box::new(listener));
    }

    pub fn on_latency_update(&mut self, listener: impl FnMut(&PlayerId, f64) + Send + 'static) {
        self.latency_listeners.push(Box::new(listener));
    }

    // ---------------------------------------------------------------------
    // Outbound actions
    // ---------------------------------------------------------------------

    pub fn trigger_loop(&mut self, loop_id: &LoopId, active: bool) -> Result<(), ActionRejected> {
        self.require_own_loop(loop_id)?;
        self.dispatch(Message::LoopTrigger {
            player_id: self.me.clone(),
            loop_id: loop_id.clone(),
            active,
        });
        Ok(())
    }

    pub fn update_loop_pattern(
        &mut self,
        loop_id: &LoopId,
        pattern: Vec<NoteEvent>,
        variation: Option<u32>,
    ) -> Result<(), ActionRejected> {
        self.require_own_loop(loop_id)?;
        self.dispatch(Message::LoopUpdate {
            player_id: self.me.clone(),
            loop_id: loop_id.clone(),
            pattern,
            variation,
        });
        Ok(())
    }

    pub fn update_loop_volume(&mut self, loop_id: &LoopId, volume: f32) -> Result<(), ActionRejected> {
        self.require_own_loop(loop_id)?;
        self.dispatch(Message::LoopVolume {
            player_id: self.me.clone(),
            loop_id: loop_id.clone(),
            volume,
        });
        Ok(())
    }

    pub fn update_loop_transpose(
        &mut self,
        loop_id: &LoopId,
        transpose: i32,
    ) -> Result<(), ActionRejected> {
        self.require_own_loop(loop_id)?;
        self.dispatch(Message::LoopTranspose {
            player_id: self.me.clone(),
            loop_id: loop_id.clone(),
            transpose,
        });
        Ok(())
    }

    pub fn vote_section(&mut self, section_index: usize) -> Result<(), ActionRejected> {
        self.require_member()?;
        self.require_section(section_index)?;
        self.dispatch(Message::SectionVote {
            player_id: self.me.clone(),
            section_index,
        });
        Ok(())
    }

    /// Vote to create a section from the loops currently playing.
    pub fn vote_create_section(&mut self, has_memory: bool) -> Result<(), ActionRejected> {
        self.require_member()?;
        self.dispatch(Message::CreateSectionVote {
            player_id: self.me.clone(),
            has_memory,
            loop_state_hash: loop_state_hash(&self.state),
        });
        Ok(())
    }

    pub fn queue_section(&mut self, section_index: usize) -> Result<(), ActionRejected> {
        self.require_leader()?;
        self.require_section(section_index)?;
        self.dispatch(Message::SectionQueue {
            player_id: self.me.clone(),
            section_index,
        });
        Ok(())
    }

    /// Switch sections immediately, restoring the target's memory if it has one.
    pub fn change_section(&mut self, section_index: usize) -> Result<(), ActionRejected> {
        self.require_leader()?;
        let snapshot = self
            .state
            .section(section_index)
            .ok_or(ActionRejected::UnknownSection(section_index))?
            .memory()
            .cloned();
        self.dispatch(Message::SectionChange {
            player_id: self.me.clone(),
            section_index,
            snapshot,
        });
        Ok(())
    }

    pub fn update_transport(
        &mut self,
        is_playing: bool,
        tempo: f32,
        current_beat: u32,
        current_bar: u32,
    ) -> Result<(), ActionRejected> {
        self.require_leader()?;
        let start_time = match (self.state.transport.is_playing, is_playing) {
            (false, true) => Some(self.clock.now_ms()),
            (true, true) => self.state.transport.start_time,
            (_, false) => None,
        };
        self.dispatch(Message::Transport {
            player_id: self.me.clone(),
            is_playing,
            tempo,
            current_beat,
            current_bar,
            start_time,
        });
        Ok(())
    }

    /// Leader clock broadcast. `transport_position` is in beats.
    pub fn send_clock_sync(&mut self, transport_position: f64) -> Result<(), ActionRejected> {
        self.require_leader()?;
        self.dispatch(Message::ClockSync {
            player_id: self.me.clone(),
            leader_time: self.clock.now_ms(),
            transport_position,
            tempo: self.state.transport.tempo,
        });
        Ok(())
    }

    pub fn ping_peers(&mut self) {
        self.dispatch(Message::Ping {
            player_id: self.me.clone(),
            send_time: self.clock.now_ms(),
        });
    }

    /// Announce departure. The session should be dropped afterwards.
    pub fn leave(&mut self) {
        if self.state.has_player(&self.me) {
            self.dispatch(Message::Leave { player_id: self.me.clone() });
        }
    }

    /// Bar tick from the playback engine. Only the leader acts on it: a queued
    /// section takes over at the bar line, otherwise a section with a bar
    /// length advances to the next one once it has played out.
    pub fn on_bar(&mut self, bar: u32) -> Result<(), ActionRejected> {
        if !self.is_leader() {
            return Ok(());
        }
        let transport = self.state.transport.clone();
        if transport.current_bar != bar {
            self.update_transport(transport.is_playing, transport.tempo, 0, bar)?;
        }

        if let Some(next) = self.state.next_section_index {
            return self.change_section(next);
        }
        let Some(section) = self.state.current_section() else {
            return Ok(());
        };
        let played = bar.saturating_sub(self.state.section_start_bar);
        let following = self.state.current_section_index + 1;
        if section.bars > 0 && played >= section.bars && following < self.state.sections.len() {
            debug!("Section {} played {} bars, advancing", section.name, played);
            return self.change_section(following);
        }
        Ok(())
    }

    /// Playback position in beats implied by the transport fields.
    pub fn transport_position(&self) -> f64 {
        let t = &self.state.transport;
        f64::from(t.current_bar) * f64::from(BEATS_PER_BAR) + f64::from(t.current_beat)
    }

    // ---------------------------------------------------------------------
    // Inbound
    // ---------------------------------------------------------------------

    /// Process everything the transport has delivered. Returns true if room
    /// state changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        for event in self.transport.poll_events() {
            match event {
                TransportEvent::Message(peer, message) => {
                    changed |= self.receive(Some(peer), message);
                }
                TransportEvent::ConnectionOpened(peer) => {
                    debug!("{} opened", peer);
                }
                TransportEvent::ConnectionClosed(peer) => self.connection_closed(peer),
                TransportEvent::StatusChanged { connected, peer_count } => {
                    debug!("Transport status: connected={} peers={}", connected, peer_count);
                    self.connected = connected;
                }
            }
        }
        changed
    }

    fn connection_closed(&mut self, peer: PeerId) {
        if self.role == Role::Peer {
            warn!("Lost connection to host of room {}", self.state.room_id);
            return;
        }
        let gone: Vec<PlayerId> = self
            .routes
            .iter()
            .filter(|(_, p)| **p == peer)
            .map(|(id, _)| id.clone())
            .collect();
        for id in gone {
            self.routes.remove(&id);
            // No timeout-based departure: the player stays in the room until
            // an explicit leave arrives.
            if self.state.has_player(&id) {
                warn!("{} dropped without leaving; keeping them in room", id);
            }
        }
    }

    /// Send a locally originated message and apply it here.
    fn dispatch(&mut self, message: Message) {
        debug!("-> {}", message.kind());
        match self.role {
            Role::Host => self.transport.broadcast(&message, None),
            Role::Peer => self.transport.send_to_host(&message),
        }
        self.receive(None, message);
    }

    /// Apply one message. `from` is the connection it arrived on, `None` for
    /// local actions.
    fn receive(&mut self, from: Option<PeerId>, message: Message) -> bool {
        if let Some(peer) = from {
            debug!("<- {} via {}", message.kind(), peer);
        }

        if self.role == Role::Host && from.is_some() {
            // Pongs go only to the pinger.
            if let Message::Pong { to, .. } = &message {
                if to != &self.me {
                    self.route_to(to, &message);
                    return false;
                }
            } else {
                self.transport.broadcast(&message, from);
            }
            if let (Message::Join { player }, Some(peer)) = (&message, from) {
                self.routes.insert(player.id.clone(), peer);
            }
        }

        if let (Role::Peer, Message::StateSync { state }) = (self.role, &message) {
            if state.room_id != self.state.room_id {
                warn!(
                    "Host sent state for room {}, expected {}; ignoring",
                    state.room_id, self.state.room_id
                );
                self.wrong_room = Some(state.room_id.clone());
                return false;
            }
            if !self.synced {
                info!("Synced with room {} ({} players)", state.room_id, state.player_count());
            }
            self.synced = true;
        }

        let before = (!message.is_ephemeral()).then(|| self.state.clone());
        reduce_message(&message, &mut self.state, self.role);

        self.react(from, &message);

        let changed = before.is_some_and(|b| b != self.state);
        if changed {
            self.notify_state();
        }
        changed
    }

    fn react(&mut self, from: Option<PeerId>, message: &Message) {
        match message {
            Message::Join { player } => {
                if let (Role::Host, Some(peer)) = (self.role, from) {
                    debug!("Sending state sync to {} ({})", player.id, peer);
                    let sync = Message::StateSync { state: Box::new(self.state.clone()) };
                    self.transport.send_to_peer(peer, &sync);
                }
            }
            Message::Leave { player_id } => {
                self.routes.remove(player_id);
                self.latency.forget(player_id);
            }
            Message::Ping { player_id, send_time } if player_id != &self.me => {
                let pong = Message::Pong {
                    player_id: self.me.clone(),
                    to: player_id.clone(),
                    send_time: *send_time,
                    receive_time: self.clock.now_ms(),
                };
                match self.role {
                    Role::Host => self.route_to(player_id, &pong),
                    Role::Peer => self.transport.send_to_host(&pong),
                }
            }
            Message::Pong { player_id, to, send_time, .. } if to == &self.me => {
                let latency = one_way_latency(self.clock.now_ms(), *send_time);
                self.latency.record(player_id, latency);
                for listener in &mut self.latency_listeners {
                    listener(player_id, latency);
                }
            }
            Message::ClockSync { player_id, leader_time, transport_position, tempo }
                if player_id != &self.me =>
            {
                let update = ClockUpdate {
                    leader: player_id.clone(),
                    leader_time: *leader_time,
                    transport_position: *transport_position,
                    tempo: *tempo,
                    offset: clock_offset(self.clock.now_ms(), *leader_time),
                };
                for listener in &mut self.clock_listeners {
                    listener(&update);
                }
                self.last_clock = Some(update);
            }
            // Every replica sees the tipping vote; the leader alone acts on it.
            Message::SectionVote { .. } if self.is_leader() => {
                if let Some(change) = forced_section_change(&self.state, &self.me) {
                    info!("Section vote reached majority");
                    self.dispatch(change);
                }
            }
            Message::LoopUpdate { .. } if self.is_leader() => {
                if create_votes_invalidated(&self.state) {
                    info!("Creation votes went stale, resetting");
                    self.dispatch(Message::CreateSectionReset {});
                }
            }
            _ => {}
        }
    }

    /// Host: deliver to the connection a player joined through.
    fn route_to(&mut self, player: &PlayerId, message: &Message) {
        match self.routes.get(player) {
            Some(peer) => self.transport.send_to_peer(*peer, message),
            None => debug!("No route to {}, dropping {}", player, message.kind()),
        }
    }

    fn notify_state(&mut self) {
        for listener in &mut self.state_listeners {
            listener(&self.state);
        }
    }

    // ---------------------------------------------------------------------
    // Sender-side checks
    // ---------------------------------------------------------------------

    fn require_member(&self) -> Result<(), ActionRejected> {
        if self.synced && self.state.has_player(&self.me) {
            Ok(())
        } else {
            Err(ActionRejected::NotInRoom)
        }
    }

    fn require_leader(&self) -> Result<(), ActionRejected> {
        self.require_member()?;
        if self.is_leader() {
            Ok(())
        } else {
            Err(ActionRejected::NotLeader)
        }
    }

    fn require_own_loop(&self, loop_id: &LoopId) -> Result<(), ActionRejected> {
        self.require_member()?;
        match self.state.loop_ref(&self.me, loop_id) {
            Some(_) => Ok(()),
            None => Err(ActionRejected::UnknownLoop(loop_id.clone())),
        }
    }

    fn require_section(&self, index: usize) -> Result<(), ActionRejected> {
        match self.state.section(index) {
            Some(_) => Ok(()),
            None => Err(ActionRejected::UnknownSection(index)),
        }
    }
}
