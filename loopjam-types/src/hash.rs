//! Content digest of the live loop configuration.
//!
//! Create-section votes are correlated by this digest: two votes name the same
//! proposal when they were cast against the same set of unmuted loops.

use std::hash::Hasher;

use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::RoomState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoopStateHash(pub u64);

impl std::fmt::Display for LoopStateHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Hash every unmuted loop (owner id, loop id, full pattern) in room order.
pub fn loop_state_hash(state: &RoomState) -> LoopStateHash {
    let mut hasher = XxHash64::with_seed(0);
    for lp in state.active_loops() {
        hasher.write(lp.player_id.as_str().as_bytes());
        hasher.write_u8(0);
        hasher.write(lp.id.as_str().as_bytes());
        hasher.write_u8(0);
        match serde_json::to_vec(&lp.pattern) {
            Ok(bytes) => hasher.write(&bytes),
            // Vec<NoteEvent> always serializes; fall back to the length so the
            // digest still changes with the pattern size.
            Err(_) => hasher.write_usize(lp.pattern.len()),
        }
        hasher.write_u8(0xff);
    }
    LoopStateHash(hasher.finish())
}
