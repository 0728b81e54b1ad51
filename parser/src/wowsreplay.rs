use std::path::Path;

use nom::bytes::complete::take;
use nom::number::complete::le_u32;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Error;
use crate::decrypt;
use crate::types::{AccountId, EntityId, GameParamId};

/// Magic bytes every replay container starts with.
pub const REPLAY_SIGNATURE: [u8; 4] = [0x12, 0x32, 0x34, 0x11];

/// One entry of the vehicle -> ship-id table in the engine metadata.
#[allow(non_snake_case)]
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct VehicleInfoMeta {
    pub shipId: GameParamId,
    /// 0 = the recording player, 1 = ally, 2 = enemy
    pub relation: u32,
    /// Account id of the player driving this vehicle
    pub id: AccountId,
    pub name: String,
}

/// A player from the engine metadata roster.
#[allow(non_snake_case)]
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct RosterPlayer {
    pub accountId: AccountId,
    pub avatarId: u64,
    /// Entity id of this player's ship in the packet stream
    pub vehicleId: EntityId,
    pub nickname: String,
    pub shipParamsId: GameParamId,
    pub teamId: i64,
    pub isOwner: bool,
    pub isAlly: bool,
    pub maxHealth: u32,
}

/// The first JSON block of a replay. Fields this crate does not interpret are
/// kept in `extra`.
#[allow(non_snake_case)]
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ReplayMeta {
    pub mapName: String,
    pub mapDisplayName: String,
    pub clientVersionFromExe: String,
    pub playerName: String,
    pub dateTime: String,
    pub duration: u32,
    pub players: Vec<RosterPlayer>,
    pub vehicles: Vec<VehicleInfoMeta>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ReplayMeta {
    pub fn roster_player(&self, vehicle: EntityId) -> Option<&RosterPlayer> {
        self.players.iter().find(|p| p.vehicleId == vehicle)
    }

    /// Looks up a hull in the vehicle table by the driving account.
    pub fn ship_id_for_account(&self, account: AccountId) -> Option<GameParamId> {
        self.vehicles
            .iter()
            .find(|v| v.id == account)
            .map(|v| v.shipId)
    }

    /// Roster entry of the player who recorded the replay.
    ///
    /// Prefers the roster's `isOwner` flag, then the vehicle table's self
    /// relation resolved through the roster.
    pub fn owner(&self) -> Option<&RosterPlayer> {
        if let Some(owner) = self.players.iter().find(|p| p.isOwner) {
            return Some(owner);
        }
        self.vehicles
            .iter()
            .filter(|v| v.relation == 0)
            .find_map(|v| self.players.iter().find(|p| p.accountId == v.id))
    }

    /// Team of the player who recorded the replay, team 0 when unknown.
    pub fn owner_team_id(&self) -> i64 {
        self.owner().map(|p| p.teamId).unwrap_or(0)
    }
}

/// The raw sections of a replay file, before decryption.
#[derive(Debug)]
pub struct ReplayContainer<'a> {
    pub signature: [u8; 4],
    pub engine_metadata: ReplayMeta,
    pub extra_blocks: Vec<serde_json::Value>,
    pub encrypted_tail: &'a [u8],
}

fn metadata_block(i: &[u8]) -> nom::IResult<&[u8], &[u8]> {
    let (i, len) = le_u32(i)?;
    take(len)(i)
}

impl<'a> ReplayContainer<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, Error> {
        let signature = match data.get(..4) {
            Some(sig) if sig == REPLAY_SIGNATURE => REPLAY_SIGNATURE,
            _ => {
                return Err(Error::Format {
                    expected: REPLAY_SIGNATURE,
                    found: data[..data.len().min(4)].to_vec(),
                });
            }
        };

        let (mut rest, block_count) = le_u32::<_, nom::error::Error<&[u8]>>(&data[4..])
            .map_err(|_| Error::truncated("missing metadata block count"))?;
        if block_count == 0 {
            return Err(Error::truncated("container holds no engine metadata block"));
        }

        let mut blocks = Vec::new();
        for index in 0..block_count as usize {
            let (remaining, block) = metadata_block(rest).map_err(|_| {
                Error::truncated(format!(
                    "metadata block {index} of {block_count} runs past the end of the file"
                ))
            })?;
            blocks.push(block);
            rest = remaining;
        }

        let engine_metadata = serde_json::from_slice(blocks[0])
            .map_err(|source| Error::MalformedMetadata { index: 0, source })?;
        let extra_blocks = blocks[1..]
            .iter()
            .enumerate()
            .map(|(idx, block)| {
                serde_json::from_slice(block).map_err(|source| Error::MalformedMetadata {
                    index: idx + 1,
                    source,
                })
            })
            .collect::<Result<Vec<serde_json::Value>, Error>>()?;

        Ok(Self {
            signature,
            engine_metadata,
            extra_blocks,
            encrypted_tail: rest,
        })
    }
}

/// A fully decrypted replay: metadata plus the inflated packet stream.
#[derive(Debug, Clone)]
pub struct ReplayFile {
    pub meta: ReplayMeta,
    pub extra_blocks: Vec<serde_json::Value>,
    pub packet_data: Vec<u8>,
}

impl ReplayFile {
    pub fn from_file(replay: &Path) -> Result<Self, Error> {
        let data = std::fs::read(replay)?;
        Self::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        let container = ReplayContainer::parse(data)?;
        let packet_data = decrypt::decrypt_stream(container.encrypted_tail)?;
        debug!(
            map = %container.engine_metadata.mapName,
            extra_blocks = container.extra_blocks.len(),
            encrypted = container.encrypted_tail.len(),
            decrypted = packet_data.len(),
            "decoded replay container"
        );

        Ok(Self {
            meta: container.engine_metadata,
            extra_blocks: container.extra_blocks,
            packet_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::testing::ContainerBuilder;

    fn block(json: &str) -> Vec<u8> {
        let mut out = (json.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(json.as_bytes());
        out
    }

    #[test]
    fn splits_metadata_and_tail() {
        let mut data = REPLAY_SIGNATURE.to_vec();
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend(block(r#"{"mapName":"spaces/16_OC_bees_to_honey","weather":"rain"}"#));
        data.extend(block(r#"[{"arbitrary":true}]"#));
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);

        let container = ReplayContainer::parse(&data).unwrap();
        assert_eq!(container.signature, REPLAY_SIGNATURE);
        assert_eq!(container.engine_metadata.mapName, "spaces/16_OC_bees_to_honey");
        assert_eq!(
            container.engine_metadata.extra.get("weather"),
            Some(&serde_json::Value::String("rain".into()))
        );
        assert_eq!(container.extra_blocks.len(), 1);
        assert_eq!(container.extra_blocks[0][0]["arbitrary"], true);
        assert_eq!(container.encrypted_tail, &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut data = ContainerBuilder::new(r#"{"mapName":"test_map"}"#).build();
        data[0] ^= 0xFF;
        let err = ReplayFile::from_bytes(&data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        let err = ReplayContainer::parse(&[0x12, 0x32]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn rejects_truncated_metadata_block() {
        let mut data = REPLAY_SIGNATURE.to_vec();
        data.extend_from_slice(&1u32.to_le_bytes());
        let full = block(r#"{"mapName":"test_map"}"#);
        data.extend_from_slice(&full[..full.len() - 5]);

        let err = ReplayContainer::parse(&data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedData);
    }

    #[test]
    fn rejects_missing_block_count_and_empty_container() {
        let err = ReplayContainer::parse(&REPLAY_SIGNATURE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedData);

        let mut data = REPLAY_SIGNATURE.to_vec();
        data.extend_from_slice(&0u32.to_le_bytes());
        let err = ReplayContainer::parse(&data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedData);
    }

    #[test]
    fn rejects_malformed_json() {
        let mut data = REPLAY_SIGNATURE.to_vec();
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend(block(r#"{"mapName":"test_map"}"#));
        data.extend(block(r#"{"unterminated": "#));

        let err = ReplayContainer::parse(&data).unwrap_err();
        assert!(matches!(err, Error::MalformedMetadata { index: 1, .. }));
        assert_eq!(err.kind(), ErrorKind::TruncatedData);
    }

    #[test]
    fn owner_team_prefers_roster_flag() {
        let meta: ReplayMeta = serde_json::from_str(
            r#"{
                "mapName": "spaces/01_solomon_islands",
                "players": [
                    {"accountId": 10, "vehicleId": 100, "teamId": 1, "isOwner": false},
                    {"accountId": 11, "vehicleId": 101, "teamId": 0, "isOwner": true}
                ],
                "vehicles": [{"id": 10, "shipId": 4001, "relation": 0}]
            }"#,
        )
        .unwrap();
        assert_eq!(meta.owner_team_id(), 0);
        assert_eq!(meta.ship_id_for_account(AccountId(10)), Some(GameParamId(4001)));
        assert_eq!(meta.roster_player(EntityId(101)).unwrap().accountId, AccountId(11));
    }

    #[test]
    fn owner_team_falls_back_to_vehicle_relation() {
        let meta: ReplayMeta = serde_json::from_str(
            r#"{
                "players": [{"accountId": 10, "vehicleId": 100, "teamId": 1}],
                "vehicles": [{"id": 10, "shipId": 4001, "relation": 0}]
            }"#,
        )
        .unwrap();
        assert_eq!(meta.owner_team_id(), 1);
        assert_eq!(meta.owner().unwrap().vehicleId, EntityId(100));
        assert_eq!(ReplayMeta::default().owner_team_id(), 0);
    }
}
