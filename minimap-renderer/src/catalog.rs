use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use wows_replay_core::types::{GameParamId, Species};

use crate::error::RenderError;

/// Resolves ship hulls to the class and name shown on the minimap.
///
/// Backed by whatever game-data source the caller has; the renderer only
/// needs these two lookups.
pub trait ShipCatalog: Send + Sync {
    fn species(&self, ship: GameParamId) -> Option<Species>;
    fn short_name(&self, ship: GameParamId) -> Option<&str>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShipInfo {
    pub species: Species,
    pub short_name: String,
}

/// A catalog loaded from a JSON object keyed by ship id:
///
/// ```json
/// { "4074714064": { "species": "Destroyer", "short_name": "Shimakaze" } }
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticShipCatalog {
    ships: HashMap<GameParamId, ShipInfo>,
}

impl StaticShipCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ship: GameParamId, species: Species, short_name: &str) {
        self.ships.insert(
            ship,
            ShipInfo {
                species,
                short_name: short_name.to_string(),
            },
        );
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let ships = serde_json::from_str(json)?;
        Ok(Self { ships })
    }

    pub fn from_file(path: &Path) -> Result<Self, RenderError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| RenderError::missing(path, e.to_string()))?;
        Self::from_json(&json).map_err(|e| RenderError::missing(path, e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.ships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ships.is_empty()
    }
}

impl ShipCatalog for StaticShipCatalog {
    fn species(&self, ship: GameParamId) -> Option<Species> {
        self.ships.get(&ship).map(|info| info.species)
    }

    fn short_name(&self, ship: GameParamId) -> Option<&str> {
        self.ships.get(&ship).map(|info| info.short_name.as_str())
    }
}
