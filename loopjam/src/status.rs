use std::fmt::Write;

use loopjam_types::{PlayerId, RoomState};

/// Human-readable dump of the room for the `state` command.
pub fn describe(state: &RoomState, me: &PlayerId) -> String {
    let mut out = String::new();
    let t = &state.transport;
    let _ = writeln!(
        out,
        "room {}  {} {:.1} bpm  bar {} beat {}",
        state.room_id,
        if t.is_playing { "playing" } else { "stopped" },
        t.tempo,
        t.current_bar,
        t.current_beat
    );

    for player in &state.players {
        let mut tags = Vec::new();
        if state.is_leader(&player.id) {
            tags.push("leader");
        }
        if &player.id == me {
            tags.push("you");
        }
        let tags = if tags.is_empty() { String::new() } else { format!(" ({})", tags.join(", ")) };
        let active: Vec<&str> = player.active_loops().map(|l| l.id.as_str()).collect();
        let _ = writeln!(
            out,
            "  {}{}: {}",
            player.name,
            tags,
            if active.is_empty() { "-".to_string() } else { active.join(" ") }
        );
    }

    for (i, section) in state.sections.iter().enumerate() {
        let marker = if i == state.current_section_index {
            '>'
        } else if state.next_section_index == Some(i) {
            '+'
        } else {
            ' '
        };
        let votes = state.section_votes.iter().filter(|v| v.section_index == i).count();
        let _ = write!(out, " {}{} {}", marker, i, section.name);
        if section.bars > 0 {
            let _ = write!(out, " [{} bars]", section.bars);
        }
        if section.has_memory {
            let _ = write!(out, " *");
        }
        if votes > 0 {
            let _ = write!(out, " votes:{}", votes);
        }
        out.push('\n');
    }

    if !state.create_section_votes.is_empty() {
        let _ = writeln!(
            out,
            "  create votes: {}/{}",
            state.create_section_votes.len(),
            state.player_count()
        );
    }
    out
}
