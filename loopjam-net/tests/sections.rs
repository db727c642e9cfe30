mod common;

use common::{id, loop_id, Room};
use loopjam_types::NoteEvent;

fn groove() -> Vec<NoteEvent> {
    vec![
        NoteEvent::new("kick", 0.0, "8n"),
        NoteEvent::new("snare", 1.0, "8n").with_velocity(0.6),
    ]
}

/// Record the current loops into a new memory section and return its index.
fn remember(room: &mut Room) -> usize {
    room.host.vote_create_section(true).unwrap();
    for peer in &mut room.peers {
        peer.vote_create_section(true).unwrap();
    }
    room.pump();
    room.host.state().sections.len() - 1
}

#[test]
fn test_queue_then_change() {
    let mut room = Room::new("host", &["alice"]);

    room.host.queue_section(2).unwrap();
    room.pump();
    assert_eq!(room.peers[0].state().next_section_index, Some(2));

    room.host.change_section(2).unwrap();
    room.pump();

    room.assert_converged();
    let state = room.peers[0].state();
    assert_eq!(state.current_section_index, 2);
    assert_eq!(state.next_section_index, None);
}

#[test]
fn test_memory_section_restores_loops() {
    let mut room = Room::new("host", &["alice"]);
    room.host.trigger_loop(&loop_id("drums"), true).unwrap();
    room.host.update_loop_pattern(&loop_id("drums"), groove(), Some(2)).unwrap();
    room.peers[0].trigger_loop(&loop_id("melody"), true).unwrap();
    room.peers[0].update_loop_volume(&loop_id("melody"), 0.5).unwrap();
    room.pump();

    let memory = remember(&mut room);
    assert_eq!(memory, 3);

    // Move on: different loops, different settings.
    room.host.trigger_loop(&loop_id("drums"), false).unwrap();
    room.host.trigger_loop(&loop_id("bass"), true).unwrap();
    room.peers[0].update_loop_volume(&loop_id("melody"), 1.5).unwrap();
    room.pump();

    room.host.change_section(memory).unwrap();
    room.pump();

    room.assert_converged();
    let state = room.peers[0].state();
    let drums = state.loop_ref(&id("host"), &loop_id("drums")).unwrap();
    assert!(!drums.muted);
    assert_eq!(drums.pattern, groove());
    assert_eq!(drums.variation, 2);
    assert!(state.loop_ref(&id("host"), &loop_id("bass")).unwrap().muted);
    let melody = state.loop_ref(&id("alice"), &loop_id("melody")).unwrap();
    assert!(!melody.muted);
    assert_eq!(melody.volume, 0.5);
}

#[test]
fn test_manual_section_change_leaves_loops_alone() {
    let mut room = Room::new("host", &["alice"]);
    room.peers[0].trigger_loop(&loop_id("chords"), true).unwrap();
    room.pump();

    room.host.change_section(1).unwrap();
    room.pump();

    let chords = room.host.state().loop_ref(&id("alice"), &loop_id("chords")).unwrap();
    assert!(!chords.muted);
}

#[test]
fn test_bar_tick_takes_queued_section() {
    let mut room = Room::new("host", &["alice"]);
    room.host.update_transport(true, 120.0, 0, 0).unwrap();
    room.host.queue_section(1).unwrap();
    room.pump();

    room.host.on_bar(1).unwrap();
    room.pump();

    room.assert_converged();
    let state = room.peers[0].state();
    assert_eq!(state.current_section_index, 1);
    assert_eq!(state.section_start_bar, 1);
    assert_eq!(state.transport.current_bar, 1);
}

#[test]
fn test_sections_with_length_auto_advance() {
    let mut room = Room::new("solo", &[]);
    room.host.trigger_loop(&loop_id("drums"), true).unwrap();
    let first = remember(&mut room);
    room.host.trigger_loop(&loop_id("bass"), true).unwrap();
    let second = remember(&mut room);
    assert_eq!((first, second), (3, 4));

    room.host.update_transport(true, 120.0, 0, 0).unwrap();
    room.host.change_section(first).unwrap();

    room.host.on_bar(8).unwrap();
    assert_eq!(room.host.state().current_section_index, first);

    room.host.on_bar(16).unwrap();
    let state = room.host.state();
    assert_eq!(state.current_section_index, second);
    assert_eq!(state.section_start_bar, 16);

    // Last section: nothing follows, stays put.
    room.host.on_bar(40).unwrap();
    assert_eq!(room.host.state().current_section_index, second);
}

#[test]
fn test_manual_sections_never_auto_advance() {
    let mut room = Room::new("solo", &[]);
    room.host.on_bar(100).unwrap();
    assert_eq!(room.host.state().current_section_index, 0);
}

#[test]
fn test_followers_ignore_bar_ticks() {
    let mut room = Room::new("host", &["alice"]);
    room.host.queue_section(2).unwrap();
    room.pump();

    room.peers[0].on_bar(4).unwrap();
    room.pump();

    assert_eq!(room.host.state().current_section_index, 0);
    assert_eq!(room.host.state().transport.current_bar, 0);
}

#[test]
fn test_transport_start_time_comes_from_leader_clock() {
    let mut room = Room::new("host", &["alice"]);
    room.clock.set(5_000.0);

    room.host.update_transport(true, 98.0, 0, 0).unwrap();
    room.pump();

    let transport = &room.peers[0].state().transport;
    assert!(transport.is_playing);
    assert_eq!(transport.tempo, 98.0);
    assert_eq!(transport.start_time, Some(5_000.0));

    room.host.update_transport(false, 98.0, 0, 0).unwrap();
    room.pump();
    assert_eq!(room.peers[0].state().transport.start_time, None);
}
