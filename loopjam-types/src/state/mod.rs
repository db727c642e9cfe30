pub mod player;
pub mod room;
pub mod section;

pub use player::*;
pub use room::*;
pub use section::*;

/// Beats in one bar. Note event times live in `0..bars * BEATS_PER_BAR`.
pub const BEATS_PER_BAR: u32 = 4;
