mod controller;
pub mod state;

pub use controller::*;
pub use state::*;

use serde::Serialize;
use tracing::info;

use crate::analyzer::Analyzer;
use crate::packet::Parser;
use crate::{Error, ReplayFile};

/// The complete result of decoding one replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedBattle {
    pub map_name: String,
    pub owner_team_id: i64,
    pub snapshots: Vec<Snapshot>,
    pub packet_stats: PacketStats,
}

/// Parses, decrypts and replays `data`, sampling the battle every
/// `sample_interval` seconds of game time.
///
/// Either every snapshot is returned or an error is; a framing error anywhere
/// in the stream discards everything decoded so far.
pub fn decode_battle(data: &[u8], sample_interval: f32) -> Result<DecodedBattle, Error> {
    let replay = ReplayFile::from_bytes(data)?;
    decode_replay(&replay, sample_interval)
}

/// Same as [`decode_battle`] for an already decrypted replay.
pub fn decode_replay(replay: &ReplayFile, sample_interval: f32) -> Result<DecodedBattle, Error> {
    let mut controller = BattleController::new(&replay.meta, sample_interval)?;
    for packet in Parser::new(&replay.packet_data) {
        controller.process(&packet?);
    }
    controller.finish();

    let (snapshots, packet_stats) = controller.into_parts();
    let battle = DecodedBattle {
        map_name: replay.meta.mapName.clone(),
        owner_team_id: replay.meta.owner_team_id(),
        snapshots,
        packet_stats,
    };
    info!(
        map = %battle.map_name,
        snapshots = battle.snapshots.len(),
        packets = battle.packet_stats.total,
        "decoded battle"
    );
    Ok(battle)
}
