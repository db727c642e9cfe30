//! Wire messages. Every mutation of room state travels as one of these.
//!
//! Encoded as JSON with a `type` discriminator and camelCase fields. The
//! schema carries no version; unrecognized types decode to [`Message::Unknown`]
//! and are ignored.

use serde::{Deserialize, Serialize};

use crate::{LoopId, LoopStateHash, NoteEvent, Player, PlayerId, RoomState, Snapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Message {
    Join {
        player: Player,
    },
    Leave {
        player_id: PlayerId,
    },
    Transport {
        player_id: PlayerId,
        is_playing: bool,
        tempo: f32,
        current_beat: u32,
        current_bar: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_time: Option<f64>,
    },
    LoopTrigger {
        player_id: PlayerId,
        loop_id: LoopId,
        active: bool,
    },
    LoopUpdate {
        player_id: PlayerId,
        loop_id: LoopId,
        pattern: Vec<NoteEvent>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variation: Option<u32>,
    },
    LoopVolume {
        player_id: PlayerId,
        loop_id: LoopId,
        volume: f32,
    },
    LoopTranspose {
        player_id: PlayerId,
        loop_id: LoopId,
        transpose: i32,
    },
    SectionQueue {
        player_id: PlayerId,
        section_index: usize,
    },
    SectionChange {
        player_id: PlayerId,
        section_index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<Snapshot>,
    },
    SectionVote {
        player_id: PlayerId,
        section_index: usize,
    },
    CreateSectionVote {
        player_id: PlayerId,
        has_memory: bool,
        loop_state_hash: LoopStateHash,
    },
    CreateSectionReset {},
    StateSync {
        state: Box<RoomState>,
    },
    Ping {
        player_id: PlayerId,
        send_time: f64,
    },
    Pong {
        player_id: PlayerId,
        /// The player whose ping this answers.
        to: PlayerId,
        send_time: f64,
        receive_time: f64,
    },
    ClockSync {
        player_id: PlayerId,
        leader_time: f64,
        transport_position: f64,
        tempo: f32,
    },
    #[serde(other)]
    Unknown,
}

impl Message {
    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Join { .. } => "join",
            Message::Leave { .. } => "leave",
            Message::Transport { .. } => "transport",
            Message::LoopTrigger { .. } => "loop_trigger",
            Message::LoopUpdate { .. } => "loop_update",
            Message::LoopVolume { .. } => "loop_volume",
            Message::LoopTranspose { .. } => "loop_transpose",
            Message::SectionQueue { .. } => "section_queue",
            Message::SectionChange { .. } => "section_change",
            Message::SectionVote { .. } => "section_vote",
            Message::CreateSectionVote { .. } => "create_section_vote",
            Message::CreateSectionReset {} => "create_section_reset",
            Message::StateSync { .. } => "state_sync",
            Message::Ping { .. } => "ping",
            Message::Pong { .. } => "pong",
            Message::ClockSync { .. } => "clock_sync",
            Message::Unknown => "unknown",
        }
    }

    /// The player that originated the message, when the message names one.
    pub fn sender(&self) -> Option<&PlayerId> {
        match self {
            Message::Join { player } => Some(&player.id),
            Message::Leave { player_id }
            | Message::Transport { player_id, .. }
            | Message::LoopTrigger { player_id, .. }
            | Message::LoopUpdate { player_id, .. }
            | Message::LoopVolume { player_id, .. }
            | Message::LoopTranspose { player_id, .. }
            | Message::SectionQueue { player_id, .. }
            | Message::SectionChange { player_id, .. }
            | Message::SectionVote { player_id, .. }
            | Message::CreateSectionVote { player_id, .. }
            | Message::Ping { player_id, .. }
            | Message::Pong { player_id, .. }
            | Message::ClockSync { player_id, .. } => Some(player_id),
            Message::CreateSectionReset {} | Message::StateSync { .. } | Message::Unknown => None,
        }
    }

    /// Messages that carry no replicated state and never touch `RoomState`.
    pub fn is_ephemeral(&self) -> bool {
        matches!(
            self,
            Message::Ping { .. } | Message::Pong { .. } | Message::ClockSync { .. }
        )
    }
}
