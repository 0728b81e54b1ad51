use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

/// Per-replay-session entity identifier for ships.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EntityId {
    fn from(v: u32) -> Self {
        EntityId(v)
    }
}

/// A persistent player account identifier.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl AccountId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A game parameter type identifier (which ship hull a vehicle is).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameParamId(pub u32);

impl GameParamId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for GameParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// World-space position (2D projection of BigWorld coordinates).
/// X = east/west, Z = north/south. Origin at map center.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct WorldPos {
    pub x: f32,
    pub z: f32,
}

/// A game clock value in seconds since the replay started recording.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct GameClock(pub f32);

impl GameClock {
    pub fn seconds(self) -> f32 {
        self.0
    }
}

impl fmt::Display for GameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}s", self.0)
    }
}

impl std::ops::Add<f32> for GameClock {
    type Output = GameClock;
    fn add(self, rhs: f32) -> GameClock {
        GameClock(self.0 + rhs)
    }
}

impl std::ops::Sub for GameClock {
    type Output = f32;
    fn sub(self, rhs: GameClock) -> f32 {
        self.0 - rhs.0
    }
}

/// How an entity relates to the player who recorded the replay.
///
/// Uses the replay metadata encoding: 0 = self, 1 = ally, anything else = enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Relation(u32);

impl Relation {
    pub const SELF: Relation = Relation(0);
    pub const ALLY: Relation = Relation(1);
    pub const ENEMY: Relation = Relation(2);

    pub fn new(value: u32) -> Self {
        Relation(value)
    }

    pub fn is_self(self) -> bool {
        self.0 == 0
    }

    pub fn is_ally(self) -> bool {
        self.0 == 1
    }

    pub fn is_enemy(self) -> bool {
        self.0 > 1
    }

    /// Self or ally.
    pub fn is_friendly(self) -> bool {
        self.0 <= 1
    }
}

/// Ship class, used to pick a minimap icon.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Species {
    Destroyer,
    Cruiser,
    Battleship,
    AirCarrier,
    Submarine,
    Auxiliary,
}

impl Species {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn relation_classes() {
        assert!(Relation::SELF.is_self());
        assert!(Relation::SELF.is_friendly());
        assert!(Relation::ALLY.is_ally());
        assert!(!Relation::ALLY.is_enemy());
        assert!(Relation::new(7).is_enemy());
    }

    #[test]
    fn species_parses_case_insensitively() {
        assert_eq!(Species::from_str("aircarrier").unwrap(), Species::AirCarrier);
        assert_eq!(Species::Destroyer.name(), "Destroyer");
    }
}
