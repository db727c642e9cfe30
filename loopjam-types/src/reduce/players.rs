use crate::{Player, PlayerId, RoomState};

pub(super) fn join(player: &Player, state: &mut RoomState) {
    if state.has_player(&player.id) {
        return;
    }
    state.players.push(player.clone());
    log::info!("player {} '{}' joined room {}", player.id, player.name, state.room_id);

    // First player in (or the only one left after a wedge) takes the lead.
    if state.leader().is_none() {
        state.leader_id = Some(player.id.clone());
        log::info!("player {} is now leader", player.id);
    }
}

pub(super) fn leave(player_id: &PlayerId, state: &mut RoomState) {
    let before = state.players.len();
    state.players.retain(|p| &p.id != player_id);
    if state.players.len() == before {
        return;
    }
    state.section_votes.retain(|v| &v.player_id != player_id);
    state.create_section_votes.retain(|v| &v.player_id != player_id);
    log::info!("player {} left room {}", player_id, state.room_id);

    if state.is_leader(player_id) {
        state.leader_id = state.players.first().map(|p| p.id.clone());
        match &state.leader_id {
            Some(next) => log::info!("leadership passed to {}", next),
            None => log::info!("room {} is empty", state.room_id),
        }
    }
}
