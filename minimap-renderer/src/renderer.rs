use wows_replay_core::analyzer::battle_controller::{CaptureZone, EntityState, Snapshot};
use wows_replay_core::types::Relation;

use crate::MINIMAP_SIZE;
use crate::assets::ICON_SIZE;
use crate::catalog::ShipCatalog;
use crate::draw_command::{DrawCommand, ShipVisibility, ZoneStyle};
use crate::map_data::{MapGeometry, MinimapPos};

const SELF_COLOR: [u8; 3] = [255, 255, 255];
const ALLY_COLOR: [u8; 3] = [76, 232, 170]; // Green
const ENEMY_COLOR: [u8; 3] = [254, 77, 42]; // Red
const NEUTRAL_COLOR: [u8; 3] = [255, 255, 255];
const HIDDEN_COLOR: [u8; 3] = [128, 128, 128];
const HIDDEN_OPACITY: f32 = 0.4;
const OWNED_ZONE_ALPHA: f32 = 0.15;
const MIN_ZONE_RADIUS: i32 = 5;
/// Ships further than this past the minimap edge are not drawn.
const OFF_MAP_MARGIN: i32 = ICON_SIZE as i32 * 2;

/// Whether a marker at `pos` reaching `extent` pixels out can touch the minimap.
fn on_minimap(pos: MinimapPos, extent: i32) -> bool {
    let range = -extent..=MINIMAP_SIZE as i32 + extent;
    range.contains(&pos.x) && range.contains(&pos.y)
}

/// Configurable rendering options.
#[derive(Clone, Debug)]
pub struct RenderOptions {
    pub show_ship_names: bool,
    pub show_capture_points: bool,
    pub show_dead_ships: bool,
    pub show_hidden_ships: bool,
    pub show_timer: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_ship_names: true,
            show_capture_points: true,
            show_dead_ships: true,
            show_hidden_ships: true,
            show_timer: true,
        }
    }
}

/// Turns snapshots into draw commands.
///
/// Holds only immutable per-replay data, so one renderer can be shared by
/// every compositing worker.
pub struct MinimapRenderer<'a> {
    geometry: MapGeometry,
    catalog: &'a dyn ShipCatalog,
    owner_team_id: i64,
    pub options: RenderOptions,
}

/// Stacking order on the minimap; higher draws later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DrawPriority {
    Sunk,
    Hidden,
    Visible,
    Owner,
}

impl<'a> MinimapRenderer<'a> {
    pub fn new(
        geometry: MapGeometry,
        catalog: &'a dyn ShipCatalog,
        owner_team_id: i64,
        options: RenderOptions,
    ) -> Self {
        Self {
            geometry,
            catalog,
            owner_team_id,
            options,
        }
    }

    pub fn geometry(&self) -> &MapGeometry {
        &self.geometry
    }

    pub fn draw_frame(&self, snapshot: &Snapshot) -> Vec<DrawCommand> {
        let mut commands = Vec::new();

        // Capture points (drawn first so they're behind everything)
        if self.options.show_capture_points {
            commands.extend(
                snapshot
                    .capture_zones
                    .iter()
                    .filter_map(|zone| self.capture_point(zone)),
            );
        }

        let mut ships: Vec<(DrawPriority, &EntityState)> = snapshot
            .entities
            .iter()
            .filter(|e| e.position.is_some())
            .map(|e| (self.priority(e), e))
            .filter(|(priority, _)| match priority {
                DrawPriority::Sunk => self.options.show_dead_ships,
                DrawPriority::Hidden => self.options.show_hidden_ships,
                _ => true,
            })
            .collect();
        ships.sort_by_key(|(priority, e)| (*priority, e.id));

        for (priority, entity) in ships {
            if let Some(cmd) = self.ship(entity, priority) {
                commands.push(cmd);
            }
        }

        if self.options.show_timer {
            commands.push(DrawCommand::Timer {
                elapsed: snapshot.timestamp.seconds(),
            });
        }

        commands
    }

    fn priority(&self, entity: &EntityState) -> DrawPriority {
        if !entity.is_alive {
            DrawPriority::Sunk
        } else if entity.is_hidden() {
            DrawPriority::Hidden
        } else if entity.relation(self.owner_team_id).is_self() {
            DrawPriority::Owner
        } else {
            DrawPriority::Visible
        }
    }

    fn ship(&self, entity: &EntityState, priority: DrawPriority) -> Option<DrawCommand> {
        let pos = self
            .geometry
            .world_to_minimap(entity.position?, MINIMAP_SIZE, MINIMAP_SIZE);
        if !on_minimap(pos, OFF_MAP_MARGIN) {
            return None;
        }
        let relation = entity.relation(self.owner_team_id);
        let species = entity
            .ship_kind_id
            .and_then(|ship| self.catalog.species(ship));

        if priority == DrawPriority::Sunk {
            return Some(DrawCommand::DeadShip {
                entity_id: entity.id,
                pos,
                yaw: entity.yaw,
                species,
                color: None,
                is_self: relation.is_self(),
            });
        }

        let ship_name = if self.options.show_ship_names && !relation.is_self() {
            entity
                .ship_kind_id
                .and_then(|ship| self.catalog.short_name(ship))
                .map(str::to_string)
        } else {
            None
        };
        let (color, visibility, opacity) = if priority == DrawPriority::Hidden {
            (HIDDEN_COLOR, ShipVisibility::Hidden, HIDDEN_OPACITY)
        } else {
            (ship_color_rgb(relation), ShipVisibility::Visible, 1.0)
        };

        Some(DrawCommand::Ship {
            entity_id: entity.id,
            pos,
            yaw: entity.yaw,
            species,
            color: Some(color),
            visibility,
            opacity,
            is_self: relation.is_self(),
            ship_name,
        })
    }

    fn capture_point(&self, zone: &CaptureZone) -> Option<DrawCommand> {
        let pos = self
            .geometry
            .world_to_minimap(zone.position, MINIMAP_SIZE, MINIMAP_SIZE);
        let px_radius = (zone.radius as f64 / self.geometry.world_width() * MINIMAP_SIZE as f64)
            .clamp(MIN_ZONE_RADIUS as f64, MINIMAP_SIZE as f64) as i32;
        let px_radius = px_radius.max(MIN_ZONE_RADIUS);
        if !on_minimap(pos, px_radius) {
            return None;
        }
        let color = self.zone_color(zone.owner_team_id);
        let style = if zone.is_contested {
            ZoneStyle::Contested
        } else if zone.is_neutral() {
            ZoneStyle::Neutral
        } else {
            ZoneStyle::Owned
        };
        let invader_color = if zone.is_contested && zone.invader_team_id >= 0 {
            Some(self.zone_color(zone.invader_team_id))
        } else {
            None
        };

        Some(DrawCommand::CapturePoint {
            pos,
            radius: px_radius,
            color,
            alpha: if style == ZoneStyle::Owned {
                OWNED_ZONE_ALPHA
            } else {
                0.0
            },
            style,
            label: zone.label().to_string(),
            progress: zone.progress.clamp(0.0, 1.0),
            invader_color,
        })
    }

    /// Green for the recording player's team, red for the other, white when neutral.
    fn zone_color(&self, team_id: i64) -> [u8; 3] {
        if team_id < 0 {
            NEUTRAL_COLOR
        } else if team_id == self.owner_team_id {
            ALLY_COLOR
        } else {
            ENEMY_COLOR
        }
    }
}

/// Get the ship color as an RGB array based on relation.
fn ship_color_rgb(relation: Relation) -> [u8; 3] {
    if relation.is_self() {
        SELF_COLOR
    } else if relation.is_ally() {
        ALLY_COLOR
    } else {
        ENEMY_COLOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticShipCatalog;
    use crate::map_data::MinimapPos;
    use wows_replay_core::types::{AccountId, EntityId, GameClock, GameParamId, Species, WorldPos};

    const DD: GameParamId = GameParamId(4001);

    fn catalog() -> StaticShipCatalog {
        let mut catalog = StaticShipCatalog::new();
        catalog.insert(DD, Species::Destroyer, "Shima");
        catalog
    }

    fn ship(id: u32, team: i64, x: f32, z: f32) -> EntityState {
        let mut e = EntityState::new(EntityId(id));
        e.owner_account_id = Some(AccountId(id as u64));
        e.ship_kind_id = Some(DD);
        e.team_id = Some(team);
        e.position = Some(WorldPos { x, z });
        e.is_visible = Some(true);
        e
    }

    fn snapshot(entities: Vec<EntityState>, capture_zones: Vec<CaptureZone>) -> Snapshot {
        Snapshot {
            timestamp: GameClock(65.0),
            entities,
            capture_zones,
        }
    }

    fn zone(id: u32, owner: i64, invader: i64, contested: bool) -> CaptureZone {
        CaptureZone {
            id,
            position: WorldPos { x: 0.0, z: 0.0 },
            radius: 100.0,
            owner_team_id: owner,
            invader_team_id: invader,
            is_contested: contested,
            progress: 0.5,
        }
    }

    #[test]
    fn dead_ship_lands_on_mapped_pixel() {
        let catalog = catalog();
        let renderer = MinimapRenderer::new(
            MapGeometry::square(1000.0),
            &catalog,
            0,
            RenderOptions::default(),
        );
        let mut wreck = ship(7, 1, 100.0, 200.0);
        wreck.is_alive = false;

        let commands = renderer.draw_frame(&snapshot(vec![wreck], vec![]));
        match &commands[0] {
            DrawCommand::DeadShip {
                entity_id,
                pos,
                species,
                ..
            } => {
                assert_eq!(*entity_id, EntityId(7));
                assert_eq!(*pos, MinimapPos { x: 460, y: 230 });
                assert_eq!(*species, Some(Species::Destroyer));
            }
            other => panic!("expected dead ship, got {other:?}"),
        }
        assert!(matches!(commands[1], DrawCommand::Timer { elapsed } if elapsed == 65.0));
    }

    #[test]
    fn draw_order_is_sunk_hidden_visible_owner() {
        let catalog = catalog();
        let renderer = MinimapRenderer::new(
            MapGeometry::square(1000.0),
            &catalog,
            0,
            RenderOptions::default(),
        );

        let mut owner = ship(1, 0, 0.0, 0.0);
        owner.is_owner = true;
        let enemy = ship(2, 1, 10.0, 10.0);
        let mut hidden = ship(3, 1, 20.0, 20.0);
        hidden.is_visible = Some(false);
        let mut sunk = ship(4, 0, 30.0, 30.0);
        sunk.is_alive = false;
        let ally = ship(5, 0, 40.0, 40.0);

        let commands =
            renderer.draw_frame(&snapshot(vec![owner, enemy, hidden, sunk, ally], vec![]));
        let order: Vec<u32> = commands
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCommand::Ship { entity_id, .. } | DrawCommand::DeadShip { entity_id, .. } => {
                    Some(entity_id.raw())
                }
                _ => None,
            })
            .collect();
        assert_eq!(order, vec![4, 3, 2, 5, 1]);
    }

    #[test]
    fn colors_labels_and_hidden_style() {
        let catalog = catalog();
        let renderer = MinimapRenderer::new(
            MapGeometry::square(1000.0),
            &catalog,
            0,
            RenderOptions::default(),
        );

        let mut owner = ship(1, 0, 0.0, 0.0);
        owner.is_owner = true;
        let ally = ship(2, 0, 0.0, 0.0);
        let mut hidden = ship(3, 1, 0.0, 0.0);
        hidden.is_visible = Some(false);

        let commands = renderer.draw_frame(&snapshot(vec![owner, ally, hidden], vec![]));
        for cmd in &commands {
            if let DrawCommand::Ship {
                entity_id,
                color,
                visibility,
                opacity,
                is_self,
                ship_name,
                ..
            } = cmd
            {
                match entity_id.raw() {
                    1 => {
                        assert!(*is_self);
                        assert_eq!(*color, Some(SELF_COLOR));
                        assert_eq!(*ship_name, None);
                    }
                    2 => {
                        assert_eq!(*color, Some(ALLY_COLOR));
                        assert_eq!(ship_name.as_deref(), Some("Shima"));
                    }
                    3 => {
                        assert_eq!(*visibility, ShipVisibility::Hidden);
                        assert_eq!(*color, Some(HIDDEN_COLOR));
                        assert_eq!(*opacity, HIDDEN_OPACITY);
                        assert_eq!(ship_name.as_deref(), Some("Shima"));
                    }
                    other => panic!("unexpected entity {other}"),
                }
            }
        }
    }

    #[test]
    fn skips_unpositioned_and_filtered_ships() {
        let catalog = catalog();
        let options = RenderOptions {
            show_dead_ships: false,
            show_hidden_ships: false,
            show_timer: false,
            ..Default::default()
        };
        let renderer = MinimapRenderer::new(MapGeometry::square(1000.0), &catalog, 0, options);

        let mut unseen = ship(1, 1, 0.0, 0.0);
        unseen.position = None;
        let mut sunk = ship(2, 1, 0.0, 0.0);
        sunk.is_alive = false;
        let mut hidden = ship(3, 1, 0.0, 0.0);
        hidden.is_visible = Some(false);

        let commands = renderer.draw_frame(&snapshot(vec![unseen, sunk, hidden], vec![]));
        assert!(commands.is_empty());
    }

    #[test]
    fn unknown_hull_has_no_species_or_label() {
        let catalog = StaticShipCatalog::new();
        let renderer = MinimapRenderer::new(
            MapGeometry::square(1000.0),
            &catalog,
            0,
            RenderOptions::default(),
        );
        let commands = renderer.draw_frame(&snapshot(vec![ship(9, 1, 0.0, 0.0)], vec![]));
        match &commands[0] {
            DrawCommand::Ship {
                species,
                ship_name,
                color,
                ..
            } => {
                assert_eq!(*species, None);
                assert_eq!(*ship_name, None);
                assert_eq!(*color, Some(ENEMY_COLOR));
            }
            other => panic!("expected ship, got {other:?}"),
        }
    }

    #[test]
    fn capture_zone_styles() {
        let catalog = catalog();
        let renderer = MinimapRenderer::new(
            MapGeometry::square(1000.0),
            &catalog,
            1,
            RenderOptions {
                show_timer: false,
                ..Default::default()
            },
        );
        let zones = vec![
            zone(0, -1, -1, false),
            zone(1, 1, -1, false),
            zone(2, 0, 1, true),
        ];
        let commands = renderer.draw_frame(&snapshot(vec![], zones));
        assert_eq!(commands.len(), 3);

        let expect = [
            (ZoneStyle::Neutral, NEUTRAL_COLOR, 0.0, None, "A"),
            (ZoneStyle::Owned, ALLY_COLOR, OWNED_ZONE_ALPHA, None, "B"),
            (
                ZoneStyle::Contested,
                ENEMY_COLOR,
                0.0,
                Some(ALLY_COLOR),
                "C",
            ),
        ];
        for (cmd, (want_style, want_color, want_alpha, want_invader, want_label)) in
            commands.iter().zip(expect)
        {
            match cmd {
                DrawCommand::CapturePoint {
                    pos,
                    radius,
                    color,
                    alpha,
                    style,
                    label,
                    invader_color,
                    ..
                } => {
                    assert_eq!(*pos, MinimapPos { x: 384, y: 384 });
                    // 100 / 1000 * 768
                    assert_eq!(*radius, 76);
                    assert_eq!(*style, want_style);
                    assert_eq!(*color, want_color);
                    assert_eq!(*alpha, want_alpha);
                    assert_eq!(*invader_color, want_invader);
                    assert_eq!(label, want_label);
                }
                other => panic!("expected capture point, got {other:?}"),
            }
        }
    }

    #[test]
    fn far_off_markers_are_culled_and_zone_radius_is_capped() {
        let catalog = catalog();
        let renderer = MinimapRenderer::new(
            MapGeometry::square(1000.0),
            &catalog,
            0,
            RenderOptions {
                show_timer: false,
                ..Default::default()
            },
        );
        let lost = ship(1, 0, 0.0, -1e30);
        let mut wreck = ship(2, 1, 1e30, 0.0);
        wreck.is_alive = false;
        // just past the edge, still partly visible
        let edge = ship(3, 1, 520.0, 0.0);
        let mut far_zone = zone(0, -1, -1, false);
        far_zone.position = WorldPos { x: 5e6, z: 0.0 };
        let mut huge_zone = zone(1, 0, -1, false);
        huge_zone.radius = 1e30;
        let mut bad_zone = zone(2, 1, -1, false);
        bad_zone.radius = f32::NAN;

        let commands = renderer.draw_frame(&snapshot(
            vec![lost, wreck, edge],
            vec![far_zone, huge_zone, bad_zone],
        ));
        assert_eq!(commands.len(), 3);
        match &commands[0] {
            DrawCommand::CapturePoint { radius, .. } => assert_eq!(*radius, MINIMAP_SIZE as i32),
            other => panic!("expected capture point, got {other:?}"),
        }
        match &commands[1] {
            DrawCommand::CapturePoint { radius, .. } => assert_eq!(*radius, MIN_ZONE_RADIUS),
            other => panic!("expected capture point, got {other:?}"),
        }
        match &commands[2] {
            DrawCommand::Ship { entity_id, pos, .. } => {
                assert_eq!(*entity_id, EntityId(3));
                assert_eq!(pos.x, 783);
            }
            other => panic!("expected ship, got {other:?}"),
        }
    }
}
