//! Participants and the loops they own.

use serde::{Deserialize, Serialize};

use crate::{LoopId, PlayerId};

pub const DEFAULT_VELOCITY: f32 = 0.8;
pub const MAX_LOOP_VOLUME: f32 = 2.0;

/// A single note in a loop pattern.
///
/// Duplicate or overlapping events are allowed; editors de-duplicate before
/// sending an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    /// Pitch name, e.g. `C3` or `kick`.
    pub note: String,
    /// Offset in beats from the loop start.
    pub time: f32,
    /// Duration token, e.g. `8n`.
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f32>,
}

impl NoteEvent {
    pub fn new(note: impl Into<String>, time: f32, duration: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            time,
            duration: duration.into(),
            velocity: None,
        }
    }

    pub fn with_velocity(mut self, velocity: f32) -> Self {
        self.velocity = Some(velocity.clamp(0.0, 1.0));
        self
    }

    /// Effective velocity, defaulting to 0.8.
    pub fn velocity(&self) -> f32 {
        self.velocity.unwrap_or(DEFAULT_VELOCITY).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentCategory {
    Drums,
    Bass,
    Chords,
    Melody,
    Fx,
}

impl InstrumentCategory {
    pub const ALL: [InstrumentCategory; 5] = [
        InstrumentCategory::Drums,
        InstrumentCategory::Bass,
        InstrumentCategory::Chords,
        InstrumentCategory::Melody,
        InstrumentCategory::Fx,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentCategory::Drums => "drums",
            InstrumentCategory::Bass => "bass",
            InstrumentCategory::Chords => "chords",
            InstrumentCategory::Melody => "melody",
            InstrumentCategory::Fx => "fx",
        }
    }

    fn default_bars(&self) -> u32 {
        match self {
            InstrumentCategory::Drums | InstrumentCategory::Bass => 1,
            InstrumentCategory::Chords | InstrumentCategory::Fx => 2,
            InstrumentCategory::Melody => 4,
        }
    }
}

/// A loop owned by exactly one player. `player_id` never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loop {
    pub id: LoopId,
    pub player_id: PlayerId,
    pub name: String,
    pub bars: u32,
    pub color: String,
    pub pattern: Vec<NoteEvent>,
    pub volume: f32,
    pub transpose: i32,
    pub muted: bool,
    pub instrument: InstrumentCategory,
    #[serde(default)]
    pub variation: u32,
}

impl Loop {
    pub fn new(player_id: PlayerId, instrument: InstrumentCategory, color: &str) -> Self {
        Self {
            id: LoopId::new(instrument.as_str()),
            player_id,
            name: instrument.as_str().to_string(),
            bars: instrument.default_bars(),
            color: color.to_string(),
            pattern: Vec::new(),
            volume: 1.0,
            transpose: 0,
            muted: true,
            instrument,
            variation: 0,
        }
    }

    /// Length of the loop in beats.
    pub fn length_beats(&self) -> f32 {
        (self.bars.max(1) * super::BEATS_PER_BAR) as f32
    }

    /// Set volume, clamped into `0.0..=2.0`.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_LOOP_VOLUME);
    }
}

/// A participant in the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub loops: Vec<Loop>,
}

impl Player {
    /// A player with no loops.
    pub fn new(id: PlayerId, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            color: color.into(),
            loops: Vec::new(),
        }
    }

    /// A player carrying the default kit: one muted loop per instrument category.
    pub fn with_default_loops(
        id: PlayerId,
        name: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        let mut player = Self::new(id, name, color);
        player.loops = InstrumentCategory::ALL
            .iter()
            .map(|&cat| Loop::new(player.id.clone(), cat, &player.color))
            .collect();
        player
    }

    pub fn loop_ref(&self, loop_id: &LoopId) -> Option<&Loop> {
        self.loops.iter().find(|l| &l.id == loop_id)
    }

    pub fn loop_mut(&mut self, loop_id: &LoopId) -> Option<&mut Loop> {
        self.loops.iter_mut().find(|l| &l.id == loop_id)
    }

    pub fn active_loops(&self) -> impl Iterator<Item = &Loop> {
        self.loops.iter().filter(|l| !l.muted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_defaults_when_absent() {
        let ev = NoteEvent::new("C3", 0.0, "8n");
        assert_eq!(ev.velocity(), DEFAULT_VELOCITY);
        assert_eq!(ev.with_velocity(1.5).velocity(), 1.0);
    }

    #[test]
    fn default_kit_is_muted_and_owned() {
        let p = Player::with_default_loops(PlayerId::new("p1"), "Ada", "#f00");
        assert_eq!(p.loops.len(), InstrumentCategory::ALL.len());
        assert!(p.loops.iter().all(|l| l.muted && l.player_id == p.id));
        assert_eq!(p.active_loops().count(), 0);
        assert!(p.loop_ref(&LoopId::new("bass")).is_some());
    }

    #[test]
    fn volume_is_clamped() {
        let mut l = Loop::new(PlayerId::new("p"), InstrumentCategory::Bass, "#000");
        l.set_volume(3.5);
        assert_eq!(l.volume, 2.0);
        l.set_volume(-1.0);
        assert_eq!(l.volume, 0.0);
        assert_eq!(l.length_beats(), 4.0);
    }

    #[test]
    fn note_event_omits_missing_velocity_on_the_wire() {
        let json = serde_json::to_string(&NoteEvent::new("kick", 1.5, "16n")).unwrap();
        assert!(!json.contains("velocity"));
        let back: NoteEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.time, 1.5);
    }
}
