//! Song sections and the loop snapshots memory sections carry.

use serde::{Deserialize, Serialize};

use crate::{LoopId, NoteEvent, PlayerId, SectionId};

/// Bar length given to sections created by vote.
pub const CREATED_SECTION_BARS: u32 = 16;

/// One loop's remembered configuration.
///
/// `volume`, `transpose` and `variation` may be missing in snapshots written by
/// older peers; restore leaves those fields untouched when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub loop_id: LoopId,
    pub player_id: PlayerId,
    pub pattern: Vec<NoteEvent>,
    pub muted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transpose: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A song section. Sections are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    pub name: String,
    /// Bars after which the leader auto-advances. 0 means manual only.
    pub bars: u32,
    pub has_memory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
}

impl Section {
    pub fn manual(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: SectionId::new(id),
            name: name.into(),
            bars: 0,
            has_memory: false,
            snapshot: None,
        }
    }

    /// The snapshot to restore when changing to this section, if it remembers one.
    pub fn memory(&self) -> Option<&Snapshot> {
        if self.has_memory {
            self.snapshot.as_ref()
        } else {
            None
        }
    }
}

/// The sections every new room starts with.
pub fn default_sections() -> Vec<Section> {
    ["A", "B", "C"]
        .iter()
        .map(|name| Section::manual(format!("section-{}", name.to_lowercase()), *name))
        .collect()
}

/// Name for the next created section: the first unused letter `D..=J`,
/// then `A2`, `A3`, ...
pub fn next_section_name(sections: &[Section]) -> String {
    let taken = |name: &str| sections.iter().any(|s| s.name == name);
    if let Some(letter) = ('D'..='J').map(String::from).find(|n| !taken(n)) {
        return letter;
    }
    (2u32..)
        .map(|n| format!("A{}", n))
        .find(|n| !taken(n))
        .unwrap_or_else(|| format!("A{}", sections.len()))
}
