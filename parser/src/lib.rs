pub mod analyzer;
pub mod decrypt;
mod error;
pub mod packet;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod types;
mod wowsreplay;

pub use analyzer::battle_controller::{DecodedBattle, decode_battle, decode_replay};
pub use error::*;
pub use strum;
pub use wowsreplay::*;
