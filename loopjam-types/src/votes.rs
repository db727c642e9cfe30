//! Majority tallies for section-change and section-creation votes.
//!
//! Tallies are recomputed from the full vote list every time, so the order in
//! which vote messages arrive does not change the outcome.

use std::collections::HashMap;

use crate::snapshot::capture;
use crate::state::{next_section_name, CREATED_SECTION_BARS};
use crate::{loop_state_hash, LoopStateHash, Message, PlayerId, RoomState, Section, SectionId};

/// `count` is a strict majority of `population`.
pub fn is_strict_majority(count: usize, population: usize) -> bool {
    population > 0 && count * 2 > population
}

/// The section index whose votes strictly exceed half the players, if any.
pub fn section_vote_winner(state: &RoomState) -> Option<usize> {
    let population = state.player_count();
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for vote in &state.section_votes {
        match counts.iter_mut().find(|(idx, _)| *idx == vote.section_index) {
            Some((_, count)) => *count += 1,
            None => counts.push((vote.section_index, 1)),
        }
    }
    counts
        .into_iter()
        .find(|&(_, count)| is_strict_majority(count, population))
        .map(|(idx, _)| idx)
}

/// The `section_change` a majority of section votes forces, sent as `by`.
///
/// Carries the target section's snapshot when it has memory.
pub fn forced_section_change(state: &RoomState, by: &PlayerId) -> Option<Message> {
    let index = section_vote_winner(state)?;
    let section = state.section(index)?;
    Some(Message::SectionChange {
        player_id: by.clone(),
        section_index: index,
        snapshot: section.memory().cloned(),
    })
}

/// Winning creation proposal: the hash with a strict majority of votes, and
/// whether any of those votes asked for memory.
pub fn create_section_winner(state: &RoomState) -> Option<(LoopStateHash, bool)> {
    let population = state.player_count();
    let mut tally: HashMap<LoopStateHash, (usize, bool)> = HashMap::new();
    for vote in &state.create_section_votes {
        let entry = tally.entry(vote.loop_state_hash).or_insert((0, false));
        entry.0 += 1;
        entry.1 |= vote.has_memory;
    }
    // Walk in vote order so the result never depends on map iteration order.
    state.create_section_votes.iter().find_map(|vote| {
        let (count, has_memory) = tally[&vote.loop_state_hash];
        is_strict_majority(count, population).then_some((vote.loop_state_hash, has_memory))
    })
}

/// Append a section if a creation proposal has reached majority.
///
/// Returns the new section's index. Clears creation votes when it fires.
pub fn settle_create_section(state: &mut RoomState) -> Option<usize> {
    let (hash, has_memory) = create_section_winner(state)?;
    let name = next_section_name(&state.sections);
    let section = Section {
        id: SectionId::new(format!("section-{}", state.sections.len())),
        name,
        bars: CREATED_SECTION_BARS,
        has_memory,
        snapshot: has_memory.then(|| capture(state)),
    };
    log::info!(
        "section '{}' created by vote (hash {}, memory={})",
        section.name,
        hash,
        has_memory
    );
    state.sections.push(section);
    state.clear_create_section_votes();
    Some(state.sections.len() - 1)
}

/// Creation votes cast against a loop configuration that is no longer live.
pub fn stale_create_votes(state: &RoomState) -> usize {
    let current = loop_state_hash(state);
    state
        .create_section_votes
        .iter()
        .filter(|v| v.loop_state_hash != current)
        .count()
}

/// More than half the players hold a stale creation vote.
pub fn create_votes_invalidated(state: &RoomState) -> bool {
    is_strict_majority(stale_create_votes(state), state.player_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CreateSectionVote, LoopId, Player, RoomCode, SectionVote};

    fn room(players: usize) -> RoomState {
        let mut state = RoomState::new(RoomCode::parse("VOTE").unwrap());
        for i in 0..players {
            let id = PlayerId::new(format!("p{}", i));
            state.players.push(Player::with_default_loops(id, format!("P{}", i), "#fff"));
        }
        state
    }

    fn vote(state: &mut RoomState, player: usize, index: usize) {
        state.set_section_vote(SectionVote {
            player_id: PlayerId::new(format!("p{}", player)),
            section_index: index,
        });
    }

    fn create_vote(state: &mut RoomState, player: usize, hash: u64, has_memory: bool) {
        state.set_create_section_vote(CreateSectionVote {
            player_id: PlayerId::new(format!("p{}", player)),
            has_memory,
            loop_state_hash: LoopStateHash(hash),
        });
    }

    #[test]
    fn strict_majority_boundaries() {
        assert!(is_strict_majority(1, 1));
        assert!(!is_strict_majority(1, 2));
        assert!(is_strict_majority(2, 2));
        assert!(!is_strict_majority(1, 3));
        assert!(is_strict_majority(2, 3));
        assert!(!is_strict_majority(2, 4));
        assert!(!is_strict_majority(1, 0));
    }

    #[test]
    fn lone_player_wins_with_one_vote() {
        let mut state = room(1);
        vote(&mut state, 0, 2);
        assert_eq!(section_vote_winner(&state), Some(2));
    }

    #[test]
    fn half_of_two_is_not_enough() {
        let mut state = room(2);
        vote(&mut state, 0, 1);
        assert_eq!(section_vote_winner(&state), None);
        vote(&mut state, 1, 2);
        assert_eq!(section_vote_winner(&state), None);
        vote(&mut state, 1, 1);
        assert_eq!(section_vote_winner(&state), Some(1));
    }

    #[test]
    fn odd_population_needs_more_than_half() {
        let mut state = room(5);
        vote(&mut state, 0, 1);
        vote(&mut state, 1, 1);
        vote(&mut state, 2, 2);
        assert_eq!(section_vote_winner(&state), None);
        vote(&mut state, 3, 1);
        assert_eq!(section_vote_winner(&state), Some(1));
    }

    #[test]
    fn forced_change_carries_memory_snapshot() {
        let mut state = room(1);
        state.sections[1].has_memory = true;
        state.sections[1].snapshot = Some(crate::Snapshot::default());
        vote(&mut state, 0, 1);
        match forced_section_change(&state, &PlayerId::new("p0")) {
            Some(Message::SectionChange { section_index, snapshot, .. }) => {
                assert_eq!(section_index, 1);
                assert!(snapshot.is_some());
            }
            other => panic!("Expected SectionChange, got {:?}", other),
        }
    }

    #[test]
    fn creation_ors_memory_preference_and_captures() {
        let mut state = room(2);
        state
            .loop_mut(&PlayerId::new("p0"), &LoopId::new("drums"))
            .unwrap()
            .muted = false;
        create_vote(&mut state, 0, 7, true);
        assert_eq!(settle_create_section(&mut state), None);
        create_vote(&mut state, 1, 7, false);
        let index = settle_create_section(&mut state).unwrap();

        let section = &state.sections[index];
        assert_eq!(section.name, "D");
        assert_eq!(section.bars, CREATED_SECTION_BARS);
        assert!(section.has_memory);
        assert_eq!(section.snapshot.as_ref().map(|s| s.len()), Some(1));
        assert!(state.create_section_votes.is_empty());
    }

    #[test]
    fn split_hashes_do_not_create() {
        let mut state = room(3);
        create_vote(&mut state, 0, 1, false);
        create_vote(&mut state, 1, 2, false);
        create_vote(&mut state, 2, 3, false);
        assert_eq!(settle_create_section(&mut state), None);
        assert_eq!(state.sections.len(), 3);
    }

    #[test]
    fn stale_votes_are_counted_against_live_hash() {
        let mut state = room(3);
        let live = loop_state_hash(&state).0;
        create_vote(&mut state, 0, live, false);
        create_vote(&mut state, 1, live.wrapping_add(1), false);
        assert_eq!(stale_create_votes(&state), 1);
        assert!(!create_votes_invalidated(&state));
        create_vote(&mut state, 2, live.wrapping_add(1), false);
        assert!(create_votes_invalidated(&state));
    }
}
