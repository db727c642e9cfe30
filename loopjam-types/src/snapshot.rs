//! Capture and restore of the loop configuration a memory section remembers.

use crate::{RoomState, Snapshot, SnapshotEntry};

/// Record every unmuted loop across all players.
pub fn capture(state: &RoomState) -> Snapshot {
    let entries = state
        .active_loops()
        .map(|lp| SnapshotEntry {
            loop_id: lp.id.clone(),
            player_id: lp.player_id.clone(),
            pattern: lp.pattern.clone(),
            muted: lp.muted,
            volume: Some(lp.volume),
            transpose: Some(lp.transpose),
            variation: Some(lp.variation),
        })
        .collect();
    Snapshot { entries }
}

/// Mute every loop, then bring back exactly the loops named in the snapshot.
///
/// Entries naming a player or loop that no longer exists are skipped. Optional
/// entry fields that are absent keep the loop's current value.
pub fn restore(state: &mut RoomState, snapshot: &Snapshot) {
    for player in &mut state.players {
        for lp in &mut player.loops {
            lp.muted = true;
        }
    }

    for entry in &snapshot.entries {
        let Some(lp) = state.loop_mut(&entry.player_id, &entry.loop_id) else {
            log::debug!(
                "snapshot entry {}/{} has no matching loop",
                entry.player_id,
                entry.loop_id
            );
            continue;
        };
        lp.pattern = entry.pattern.clone();
        lp.muted = entry.muted;
        if let Some(volume) = entry.volume {
            lp.set_volume(volume);
        }
        if let Some(transpose) = entry.transpose {
            lp.transpose = transpose;
        }
        if let Some(variation) = entry.variation {
            lp.variation = variation;
        }
    }
}
