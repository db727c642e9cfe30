//! The replicated room document.

use serde::{Deserialize, Serialize};

use super::section::{default_sections, Section};
use super::player::{Loop, Player};
use crate::{LoopId, LoopStateHash, PlayerId, RoomCode};

pub const DEFAULT_TEMPO: f32 = 120.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportState {
    pub tempo: f32,
    pub is_playing: bool,
    pub current_beat: u32,
    pub current_bar: u32,
    /// Shared start timestamp (ms since epoch) when playback began.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            tempo: DEFAULT_TEMPO,
            is_playing: false,
            current_beat: 0,
            current_bar: 0,
            start_time: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionVote {
    pub player_id: PlayerId,
    pub section_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSectionVote {
    pub player_id: PlayerId,
    pub has_memory: bool,
    pub loop_state_hash: LoopStateHash,
}

/// Session state held by every participant.
///
/// Mutated only through [`crate::reduce::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    pub room_id: RoomCode,
    pub players: Vec<Player>,
    pub sections: Vec<Section>,
    pub current_section_index: usize,
    #[serde(default)]
    pub next_section_index: Option<usize>,
    /// Transport bar at which the current section began.
    #[serde(default)]
    pub section_start_bar: u32,
    #[serde(default)]
    pub section_votes: Vec<SectionVote>,
    #[serde(default)]
    pub create_section_votes: Vec<CreateSectionVote>,
    pub transport: TransportState,
    #[serde(default)]
    pub leader_id: Option<PlayerId>,
}

impl RoomState {
    /// An empty room. The first player to join becomes leader.
    pub fn new(room_id: RoomCode) -> Self {
        Self {
            room_id,
            players: Vec::new(),
            sections: default_sections(),
            current_section_index: 0,
            next_section_index: None,
            section_start_bar: 0,
            section_votes: Vec::new(),
            create_section_votes: Vec::new(),
            transport: TransportState::default(),
            leader_id: None,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    pub fn has_player(&self, id: &PlayerId) -> bool {
        self.player(id).is_some()
    }

    /// Look up a loop through its owner's collection only.
    pub fn loop_ref(&self, player_id: &PlayerId, loop_id: &LoopId) -> Option<&Loop> {
        self.player(player_id).and_then(|p| p.loop_ref(loop_id))
    }

    pub fn loop_mut(&mut self, player_id: &PlayerId, loop_id: &LoopId) -> Option<&mut Loop> {
        self.player_mut(player_id).and_then(|p| p.loop_mut(loop_id))
    }

    /// Every unmuted loop, in player order then loop order.
    pub fn active_loops(&self) -> impl Iterator<Item = &Loop> {
        self.players.iter().flat_map(|p| p.active_loops())
    }

    pub fn is_leader(&self, id: &PlayerId) -> bool {
        self.leader_id.as_ref() == Some(id)
    }

    pub fn leader(&self) -> Option<&Player> {
        self.leader_id.as_ref().and_then(|id| self.player(id))
    }

    pub fn current_section(&self) -> Option<&Section> {
        self.sections.get(self.current_section_index)
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    /// Record a player's section vote, replacing any earlier one.
    pub fn set_section_vote(&mut self, vote: SectionVote) {
        self.section_votes.retain(|v| v.player_id != vote.player_id);
        self.section_votes.push(vote);
    }

    /// Record a player's create-section vote, replacing any earlier one.
    pub fn set_create_section_vote(&mut self, vote: CreateSectionVote) {
        self.create_section_votes
            .retain(|v| v.player_id != vote.player_id);
        self.create_section_votes.push(vote);
    }

    pub fn clear_section_votes(&mut self) {
        self.section_votes.clear();
    }

    pub fn clear_create_section_votes(&mut self) {
        self.create_section_votes.clear();
    }
}
