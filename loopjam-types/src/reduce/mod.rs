//! Pure state transitions for room messages.
//!
//! `apply` is the single place messages turn into state. Local actions and
//! inbound network messages both go through it, so every replica runs the
//! same logic.
//!
//! Reducers are pure: they never perform I/O and never emit messages. They
//! also never reject a message on business rules (who may send what is
//! checked by the sender); a message naming a player, loop or section that
//! does not exist is a no-op.

mod loops;
mod players;
mod sections;
mod transport;

use crate::{Message, RoomState};

/// How this replica participates in the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Room creator; relays every message and answers joins with a full sync.
    Host,
    /// Any other participant.
    Peer,
}

/// Fold one message into the state, returning the next state.
pub fn apply(mut state: RoomState, message: &Message, role: Role) -> RoomState {
    reduce_message(message, &mut state, role);
    state
}

/// In-place variant of [`apply`].
pub fn reduce_message(message: &Message, state: &mut RoomState, role: Role) {
    match message {
        Message::Join { player } => players::join(player, state),
        Message::Leave { player_id } => players::leave(player_id, state),

        Message::Transport { .. } => transport::reduce(message, state),

        Message::LoopTrigger { .. }
        | Message::LoopUpdate { .. }
        | Message::LoopVolume { .. }
        | Message::LoopTranspose { .. } => loops::reduce(message, state),

        Message::SectionQueue { .. }
        | Message::SectionChange { .. }
        | Message::SectionVote { .. }
        | Message::CreateSectionVote { .. }
        | Message::CreateSectionReset {} => sections::reduce(message, state),

        Message::StateSync { state: incoming } => {
            // The host is the source of truth and never adopts a sync.
            if role == Role::Peer {
                *state = (**incoming).clone();
            }
        }

        // Timing traffic is delivered to listeners, not folded into the document.
        Message::Ping { .. } | Message::Pong { .. } | Message::ClockSync { .. } => {}

        Message::Unknown => {}
    }
}
