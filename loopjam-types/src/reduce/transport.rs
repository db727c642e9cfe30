use crate::{Message, RoomState};

pub(super) fn reduce(message: &Message, state: &mut RoomState) {
    if let Message::Transport {
        is_playing,
        tempo,
        current_beat,
        current_bar,
        start_time,
        ..
    } = message
    {
        let t = &mut state.transport;
        t.is_playing = *is_playing;
        t.tempo = *tempo;
        t.current_beat = *current_beat;
        t.current_bar = *current_bar;
        if start_time.is_some() || !is_playing {
            t.start_time = *start_time;
        }
    }
}
