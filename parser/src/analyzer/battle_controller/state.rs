use serde::Serialize;

use crate::ReplayMeta;
use crate::types::{AccountId, EntityId, GameClock, GameParamId, Relation, WorldPos};

/// Everything the minimap needs to know about one ship entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub id: EntityId,
    pub owner_account_id: Option<AccountId>,
    pub ship_kind_id: Option<GameParamId>,
    /// Last real sighting on the map plane. `None` until the first visible
    /// position update.
    pub position: Option<WorldPos>,
    /// Heading in radians
    pub yaw: f32,
    pub is_alive: bool,
    /// `None` until a position update says either way.
    pub is_visible: Option<bool>,
    pub team_id: Option<i64>,
    pub is_owner: bool,
    pub is_ally: bool,
}

impl EntityState {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            owner_account_id: None,
            ship_kind_id: None,
            position: None,
            yaw: 0.0,
            is_alive: true,
            is_visible: None,
            team_id: None,
            is_owner: false,
            is_ally: false,
        }
    }

    /// Creates a row seeded with whatever the roster knows about `id`.
    pub fn from_roster(id: EntityId, meta: &ReplayMeta) -> Self {
        let mut entity = Self::new(id);
        if let Some(player) = meta.roster_player(id) {
            entity.owner_account_id = Some(player.accountId);
            entity.ship_kind_id = if player.shipParamsId.raw() != 0 {
                Some(player.shipParamsId)
            } else {
                meta.ship_id_for_account(player.accountId)
            };
            entity.team_id = Some(player.teamId);
            entity.is_owner = meta.owner().is_some_and(|owner| owner.vehicleId == id);
            entity.is_ally = player.isAlly;
        }
        entity
    }

    /// Relation to the recording player, whose team is `owner_team_id`.
    /// Entities with no roster entry count as enemies.
    pub fn relation(&self, owner_team_id: i64) -> Relation {
        if self.is_owner {
            Relation::SELF
        } else if self.is_ally || self.team_id == Some(owner_team_id) {
            Relation::ALLY
        } else {
            Relation::ENEMY
        }
    }

    /// Alive but not currently spotted.
    pub fn is_hidden(&self) -> bool {
        self.is_alive && self.is_visible == Some(false)
    }
}

/// Current state of a capture zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureZone {
    pub id: u32,
    pub position: WorldPos,
    pub radius: f32,
    /// -1 when neutral
    pub owner_team_id: i64,
    pub invader_team_id: i64,
    pub is_contested: bool,
    /// Fraction captured, 0..1
    pub progress: f32,
}

impl CaptureZone {
    pub fn is_neutral(&self) -> bool {
        self.owner_team_id < 0
    }

    /// 'A' for zone 0, 'B' for zone 1, and so on.
    pub fn label(&self) -> char {
        char::from_u32('A' as u32 + self.id % 26).unwrap_or('?')
    }
}

/// A copy of the battle state at one sampled instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub timestamp: GameClock,
    /// Sorted by entity id
    pub entities: Vec<EntityState>,
    /// Sorted by zone id
    pub capture_zones: Vec<CaptureZone>,
}

impl Snapshot {
    pub fn entity(&self, id: EntityId) -> Option<&EntityState> {
        self.entities
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|idx| &self.entities[idx])
    }
}
