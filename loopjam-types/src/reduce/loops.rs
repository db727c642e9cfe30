use crate::{Message, RoomState};

/// Loop messages only ever reach a loop through its owner's collection.
pub(super) fn reduce(message: &Message, state: &mut RoomState) {
    match message {
        Message::LoopTrigger { player_id, loop_id, active } => {
            if let Some(lp) = state.loop_mut(player_id, loop_id) {
                lp.muted = !active;
            }
        }
        Message::LoopUpdate { player_id, loop_id, pattern, variation } => {
            if let Some(lp) = state.loop_mut(player_id, loop_id) {
                lp.pattern = pattern.clone();
                if let Some(variation) = variation {
                    lp.variation = *variation;
                }
            }
        }
        Message::LoopVolume { player_id, loop_id, volume } => {
            if let Some(lp) = state.loop_mut(player_id, loop_id) {
                lp.set_volume(*volume);
            }
        }
        Message::LoopTranspose { player_id, loop_id, transpose } => {
            if let Some(lp) = state.loop_mut(player_id, loop_id) {
                lp.transpose = *transpose;
            }
        }
        _ => {}
    }
}
