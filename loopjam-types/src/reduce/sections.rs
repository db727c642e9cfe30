use crate::snapshot::restore;
use crate::votes::settle_create_section;
use crate::{CreateSectionVote, Message, RoomState, SectionVote};

pub(super) fn reduce(message: &Message, state: &mut RoomState) {
    match message {
        Message::SectionQueue { section_index, .. } => {
            if state.section(*section_index).is_none() {
                return;
            }
            state.next_section_index = Some(*section_index);
            state.clear_section_votes();
        }
        Message::SectionChange { section_index, snapshot, .. } => {
            if state.section(*section_index).is_none() {
                return;
            }
            if let Some(snapshot) = snapshot {
                restore(state, snapshot);
            }
            state.current_section_index = *section_index;
            state.section_start_bar = state.transport.current_bar;
            state.next_section_index = None;
            state.clear_section_votes();
            log::info!(
                "room {} moved to section {}",
                state.room_id,
                state.sections[*section_index].name
            );
        }
        Message::SectionVote { player_id, section_index } => {
            if !state.has_player(player_id) || state.section(*section_index).is_none() {
                return;
            }
            state.set_section_vote(SectionVote {
                player_id: player_id.clone(),
                section_index: *section_index,
            });
        }
        Message::CreateSectionVote { player_id, has_memory, loop_state_hash } => {
            if !state.has_player(player_id) {
                return;
            }
            state.set_create_section_vote(CreateSectionVote {
                player_id: player_id.clone(),
                has_memory: *has_memory,
                loop_state_hash: *loop_state_hash,
            });
            settle_create_section(state);
        }
        Message::CreateSectionReset {} => state.clear_create_section_votes(),
        _ => {}
    }
}
