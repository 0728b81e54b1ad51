use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{Level, debug, span, trace, warn};

use crate::analyzer::Analyzer;
use crate::packet::{CaptureZonePacket, Packet, PacketType, PositionPacket, ShipDestroyedPacket};
use crate::types::{EntityId, GameClock, WorldPos};
use crate::{Error, ReplayMeta};

use super::state::{CaptureZone, EntityState, Snapshot};

/// Snapshot cadence used when the caller does not pick one.
pub const DEFAULT_SAMPLE_INTERVAL: f32 = 2.0;

/// Coordinate the server sends for ships that are currently not spotted.
pub const HIDDEN_POSITION: f32 = -2500.0;

/// Smallest sample interval accepted, in seconds.
pub const MIN_SAMPLE_INTERVAL: f32 = 0.001;

/// Latest plausible game clock. Packets stamped outside `0..=MAX_BATTLE_CLOCK`
/// are counted as invalid and skipped.
pub const MAX_BATTLE_CLOCK: f32 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecodePhase {
    /// No packet seen yet.
    Idle,
    Dispatching,
    /// `finish` ran; further packets are ignored.
    Done,
}

/// Per-kind packet counters for one decode pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PacketStats {
    pub total: usize,
    pub positions: usize,
    pub deaths: usize,
    pub capture_zones: usize,
    pub invalid: usize,
    pub unknown: usize,
    /// Unknown packet type -> occurrences
    pub unknown_types: BTreeMap<u32, usize>,
}

/// Replays the packet stream into live entity and capture-zone tables and
/// samples them into [`Snapshot`]s.
pub struct BattleController<'replay> {
    game_meta: &'replay ReplayMeta,
    sample_interval: f32,
    phase: DecodePhase,
    entities: HashMap<EntityId, EntityState>,
    capture_zones: BTreeMap<u32, CaptureZone>,
    /// Clock of the first applied packet; boundary `k` is `origin + k * interval`.
    sample_origin: f64,
    next_boundary: u64,
    last_clock: GameClock,
    /// A packet changed state since the last snapshot.
    dirty: bool,
    snapshots: Vec<Snapshot>,
    stats: PacketStats,
}

impl<'replay> BattleController<'replay> {
    pub fn new(game_meta: &'replay ReplayMeta, sample_interval: f32) -> Result<Self, Error> {
        if !sample_interval.is_finite() || sample_interval < MIN_SAMPLE_INTERVAL {
            return Err(Error::InvalidSampleInterval(sample_interval));
        }

        Ok(Self {
            game_meta,
            sample_interval,
            phase: DecodePhase::Idle,
            entities: HashMap::default(),
            capture_zones: BTreeMap::default(),
            sample_origin: 0.0,
            next_boundary: 1,
            last_clock: GameClock::default(),
            dirty: false,
            snapshots: Vec::new(),
            stats: PacketStats::default(),
        })
    }

    pub fn phase(&self) -> DecodePhase {
        self.phase
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntityState> {
        self.entities.get(&id)
    }

    pub fn capture_zone(&self, id: u32) -> Option<&CaptureZone> {
        self.capture_zones.get(&id)
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn stats(&self) -> &PacketStats {
        &self.stats
    }

    pub fn into_parts(self) -> (Vec<Snapshot>, PacketStats) {
        (self.snapshots, self.stats)
    }

    fn entity_mut(&mut self, id: EntityId) -> &mut EntityState {
        let meta = self.game_meta;
        self.entities
            .entry(id)
            .or_insert_with(|| EntityState::from_roster(id, meta))
    }

    fn take_snapshot(&mut self, timestamp: GameClock) {
        let mut entities: Vec<EntityState> = self.entities.values().cloned().collect();
        entities.sort_by_key(|e| e.id);
        let capture_zones = self.capture_zones.values().cloned().collect();

        trace!(%timestamp, entities = entities.len(), "snapshot");
        self.snapshots.push(Snapshot {
            timestamp,
            entities,
            capture_zones,
        });
        self.dirty = false;
    }

    fn boundary(&self, k: u64) -> f64 {
        self.sample_origin + k as f64 * self.sample_interval as f64
    }

    /// Emits one snapshot per sample boundary that `clock` has reached.
    fn sample_until(&mut self, clock: GameClock) {
        let reached = ((clock.seconds() as f64 - self.sample_origin) / self.sample_interval as f64)
            .floor();
        while reached >= self.next_boundary as f64 {
            let timestamp = GameClock(self.boundary(self.next_boundary) as f32);
            self.take_snapshot(timestamp);
            self.next_boundary += 1;
        }
    }

    fn handle_position(&mut self, pos: &PositionPacket) {
        let (x, z) = (pos.position.x, pos.position.z);
        let entity = self.entity_mut(pos.pid);
        if x == HIDDEN_POSITION || z == HIDDEN_POSITION {
            entity.is_visible = Some(false);
            return;
        }

        entity.position = Some(WorldPos { x, z });
        entity.yaw = pos.rotation.yaw;
        entity.is_visible = Some(true);
    }

    fn handle_death(&mut self, death: &ShipDestroyedPacket) {
        debug!(victim = %death.victim, killer = %death.killer, cause = death.cause, "ship destroyed");
        self.entity_mut(death.victim).is_alive = false;
    }

    fn handle_capture_zone(&mut self, zone: &CaptureZonePacket) {
        let state = CaptureZone {
            id: zone.zone_id,
            position: WorldPos {
                x: zone.x,
                z: zone.z,
            },
            radius: zone.radius,
            owner_team_id: zone.owner_team as i64,
            invader_team_id: zone.invader_team as i64,
            is_contested: zone.contested,
            progress: zone.progress,
        };
        self.capture_zones.insert(zone.zone_id, state);
    }
}

impl Analyzer for BattleController<'_> {
    fn process(&mut self, packet: &Packet<'_>) {
        let span = span!(Level::TRACE, "packet processing");
        let _enter = span.enter();

        if self.phase == DecodePhase::Done {
            warn!(clock = %packet.clock, "packet after decode finished, ignoring");
            return;
        }

        self.stats.total += 1;
        if !(0.0..=MAX_BATTLE_CLOCK).contains(&packet.clock.seconds()) {
            debug!(
                packet_type = packet.packet_type,
                clock = packet.clock.seconds(),
                "packet clock outside the battle, skipping"
            );
            self.stats.invalid += 1;
            return;
        }

        if self.phase == DecodePhase::Idle {
            self.phase = DecodePhase::Dispatching;
            self.sample_origin = packet.clock.seconds() as f64;
        }
        self.sample_until(packet.clock);
        self.last_clock = packet.clock;

        match &packet.payload {
            PacketType::Position(pos)
                if !(pos.position.x.is_finite() && pos.position.z.is_finite()) =>
            {
                debug!(entity = %pos.pid, "non-finite position, skipping");
                self.stats.invalid += 1;
                return;
            }
            PacketType::Position(pos) => {
                self.stats.positions += 1;
                self.handle_position(pos);
            }
            PacketType::ShipDestroyed(death) => {
                self.stats.deaths += 1;
                self.handle_death(death);
            }
            PacketType::CaptureZone(zone) => {
                self.stats.capture_zones += 1;
                self.handle_capture_zone(zone);
            }
            PacketType::Unknown(payload) => {
                trace!(packet_type = packet.packet_type, len = payload.len(), "unknown packet");
                self.stats.unknown += 1;
                *self.stats.unknown_types.entry(packet.packet_type).or_default() += 1;
                return;
            }
            PacketType::Invalid(payload) => {
                debug!(
                    packet_type = packet.packet_type,
                    len = payload.len(),
                    "payload too short for packet type, skipping"
                );
                self.stats.invalid += 1;
                return;
            }
        }
        self.dirty = true;
    }

    fn finish(&mut self) {
        if self.phase == DecodePhase::Done {
            return;
        }
        if self.dirty {
            self.take_snapshot(self.last_clock);
        }
        self.phase = DecodePhase::Done;
        debug!(
            snapshots = self.snapshots.len(),
            packets = self.stats.total,
            unknown = self.stats.unknown,
            "battle decode finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Parser;
    use crate::testing::{ZoneFields, capture_zone_packet, death_packet, frame, position_packet};

    fn run<'m>(meta: &'m ReplayMeta, interval: f32, stream: &[u8]) -> BattleController<'m> {
        let mut controller = BattleController::new(meta, interval).unwrap();
        for packet in Parser::new(stream) {
            controller.process(&packet.unwrap());
        }
        controller.finish();
        controller
    }

    #[test]
    fn hidden_sentinel_keeps_last_real_position() {
        let meta = ReplayMeta::default();
        let mut stream = position_packet(1.0, 7, 100.0, 200.0, 0.5);
        stream.extend(position_packet(1.2, 7, HIDDEN_POSITION, HIDDEN_POSITION, 3.0));

        let controller = run(&meta, 2.0, &stream);
        let ship = controller.entity(EntityId(7)).unwrap();
        assert_eq!(ship.is_visible, Some(false));
        assert_eq!(ship.position, Some(WorldPos { x: 100.0, z: 200.0 }));
        assert_eq!(ship.yaw, 0.5);
    }

    #[test]
    fn sentinel_on_either_axis_hides() {
        let meta = ReplayMeta::default();
        let mut stream = position_packet(1.0, 7, 100.0, 200.0, 0.0);
        stream.extend(position_packet(1.1, 7, 10.0, HIDDEN_POSITION, 0.0));

        let controller = run(&meta, 2.0, &stream);
        let ship = controller.entity(EntityId(7)).unwrap();
        assert_eq!(ship.is_visible, Some(false));
        assert_eq!(ship.position, Some(WorldPos { x: 100.0, z: 200.0 }));
    }

    #[test]
    fn first_sighting_hidden_leaves_position_unknown() {
        let meta = ReplayMeta::default();
        let stream = position_packet(1.0, 3, HIDDEN_POSITION, HIDDEN_POSITION, 0.0);
        let controller = run(&meta, 2.0, &stream);
        let ship = controller.entity(EntityId(3)).unwrap();
        assert_eq!(ship.position, None);
        assert_eq!(ship.is_visible, Some(false));
    }

    #[test]
    fn death_flips_alive_without_removing() {
        let meta = ReplayMeta::default();
        let mut stream = position_packet(1.0, 7, 100.0, 200.0, 0.0);
        stream.extend(death_packet(1.5, 7, 8));
        stream.extend(death_packet(1.6, 42, 8));

        let controller = run(&meta, 2.0, &stream);
        let snapshot = controller.snapshots().last().unwrap();
        let ship = snapshot.entity(EntityId(7)).unwrap();
        assert!(!ship.is_alive);
        assert_eq!(ship.position, Some(WorldPos { x: 100.0, z: 200.0 }));
        // never positioned, but the kill still creates a row
        assert!(!snapshot.entity(EntityId(42)).unwrap().is_alive);
        assert_eq!(snapshot.entities.len(), 2);
    }

    #[test]
    fn samples_on_interval_boundaries() {
        let meta = ReplayMeta::default();
        let mut stream = position_packet(10.0, 1, 0.0, 0.0, 0.0);
        stream.extend(position_packet(11.0, 1, 1.0, 0.0, 0.0));
        stream.extend(position_packet(12.0, 1, 2.0, 0.0, 0.0));
        stream.extend(position_packet(17.5, 1, 3.0, 0.0, 0.0));

        let controller = run(&meta, 2.0, &stream);
        let stamps: Vec<f32> = controller
            .snapshots()
            .iter()
            .map(|s| s.timestamp.seconds())
            .collect();
        assert_eq!(stamps, vec![12.0, 14.0, 16.0, 17.5]);

        // boundary snapshots are taken before the packet at that clock
        let x_at = |idx: usize| {
            controller.snapshots()[idx].entities[0]
                .position
                .unwrap()
                .x
        };
        assert_eq!(x_at(0), 1.0);
        assert_eq!(x_at(2), 2.0);
        assert_eq!(x_at(3), 3.0);
    }

    #[test]
    fn no_trailing_snapshot_without_changes() {
        let meta = ReplayMeta::default();
        let mut stream = position_packet(0.0, 1, 0.0, 0.0, 0.0);
        stream.extend(frame(0x55, 2.0, &[0; 8]));

        let controller = run(&meta, 2.0, &stream);
        assert_eq!(controller.snapshots().len(), 1);
        assert_eq!(controller.snapshots()[0].timestamp, GameClock(2.0));
    }

    #[test]
    fn snapshots_do_not_alias_live_state() {
        let meta = ReplayMeta::default();
        let mut stream = position_packet(0.0, 1, 5.0, 5.0, 0.0);
        stream.extend(position_packet(1.0, 1, 6.0, 6.0, 0.0));
        stream.extend(death_packet(3.0, 1, 2));

        let controller = run(&meta, 1.0, &stream);
        let first = &controller.snapshots()[0];
        assert!(first.entities[0].is_alive);
        assert_eq!(first.entities[0].position, Some(WorldPos { x: 5.0, z: 5.0 }));
        assert!(!controller.snapshots().last().unwrap().entities[0].is_alive);
    }

    #[test]
    fn unknown_and_invalid_packets_are_counted_and_skipped() {
        let meta = ReplayMeta::default();
        let mut stream = frame(0x99, 0.5, &[1, 2, 3, 4]);
        stream.extend(frame(0x99, 0.6, &[]));
        stream.extend(frame(crate::packet::POSITION_PACKET, 0.7, &[0; 3]));
        stream.extend(position_packet(0.8, 4, 1.0, 1.0, 0.0));

        let controller = run(&meta, 2.0, &stream);
        let stats = controller.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.unknown, 2);
        assert_eq!(stats.unknown_types.get(&0x99), Some(&2));
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.positions, 1);
        assert_eq!(controller.snapshots().len(), 1);
    }

    #[test]
    fn capture_zones_update_in_place() {
        let meta = ReplayMeta::default();
        let mut stream = capture_zone_packet(
            1.0,
            ZoneFields {
                zone_id: 1,
                x: 50.0,
                z: -50.0,
                ..Default::default()
            },
        );
        stream.extend(capture_zone_packet(
            1.5,
            ZoneFields {
                zone_id: 1,
                x: 50.0,
                z: -50.0,
                owner_team: 1,
                invader_team: 0,
                contested: true,
                progress: 0.3,
                ..Default::default()
            },
        ));
        stream.extend(capture_zone_packet(
            1.6,
            ZoneFields {
                zone_id: 0,
                ..Default::default()
            },
        ));

        let controller = run(&meta, 2.0, &stream);
        let zone = controller.capture_zone(1).unwrap();
        assert_eq!(zone.owner_team_id, 1);
        assert!(zone.is_contested);
        assert_eq!(zone.position, WorldPos { x: 50.0, z: -50.0 });

        let snapshot = &controller.snapshots()[0];
        let ids: Vec<u32> = snapshot.capture_zones.iter().map(|z| z.id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn rejects_unusable_intervals() {
        let meta = ReplayMeta::default();
        for interval in [0.0, -1.0, 1e-30, f32::NAN, f32::INFINITY] {
            let err = BattleController::new(&meta, interval).err().unwrap();
            assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn phases_advance() {
        let meta = ReplayMeta::default();
        let mut controller = BattleController::new(&meta, 2.0).unwrap();
        assert_eq!(controller.phase(), DecodePhase::Idle);

        let stream = position_packet(0.0, 1, 0.0, 0.0, 0.0);
        for packet in Parser::new(&stream) {
            controller.process(&packet.unwrap());
        }
        assert_eq!(controller.phase(), DecodePhase::Dispatching);
        controller.finish();
        assert_eq!(controller.phase(), DecodePhase::Done);
        controller.finish();
        assert_eq!(controller.snapshots().len(), 1);
    }

    #[test]
    fn implausible_clocks_are_skipped_without_sampling() {
        let meta = ReplayMeta::default();
        let mut stream = position_packet(1.0, 1, 0.0, 0.0, 0.0);
        stream.extend(position_packet(1e8, 1, 5.0, 5.0, 0.0));
        stream.extend(position_packet(1e8 + 8.0, 1, 6.0, 6.0, 0.0));
        stream.extend(position_packet(-50.0, 1, 7.0, 7.0, 0.0));
        stream.extend(position_packet(f32::NAN, 1, 8.0, 8.0, 0.0));
        stream.extend(position_packet(4.0, 1, 9.0, 9.0, 0.0));

        let controller = run(&meta, 2.0, &stream);
        assert_eq!(controller.stats().invalid, 4);
        assert_eq!(controller.stats().positions, 2);
        let stamps: Vec<f32> = controller
            .snapshots()
            .iter()
            .map(|s| s.timestamp.seconds())
            .collect();
        assert_eq!(stamps, vec![3.0, 4.0]);
        assert_eq!(
            controller.entity(EntityId(1)).unwrap().position,
            Some(WorldPos { x: 9.0, z: 9.0 })
        );
    }

    #[test]
    fn long_jump_emits_one_snapshot_per_boundary() {
        let meta = ReplayMeta::default();
        let mut stream = position_packet(0.5, 1, 0.0, 0.0, 0.0);
        stream.extend(position_packet(MAX_BATTLE_CLOCK, 1, 1.0, 1.0, 0.0));

        let controller = run(&meta, 2.0, &stream);
        let snapshots = controller.snapshots();
        // boundaries 2.5, 4.5, ... 86398.5 plus the trailing snapshot
        assert_eq!(snapshots.len(), 43_199 + 1);
        assert_eq!(snapshots[0].timestamp, GameClock(2.5));
        assert_eq!(snapshots[43_198].timestamp, GameClock(86_398.5));
        assert_eq!(snapshots.last().unwrap().timestamp, GameClock(MAX_BATTLE_CLOCK));
    }

    #[test]
    fn non_finite_positions_are_invalid() {
        let meta = ReplayMeta::default();
        let mut stream = position_packet(1.0, 1, 10.0, 10.0, 0.0);
        stream.extend(position_packet(1.5, 1, f32::NAN, 0.0, 0.0));
        stream.extend(position_packet(1.6, 1, 0.0, f32::NEG_INFINITY, 0.0));

        let controller = run(&meta, 2.0, &stream);
        assert_eq!(controller.stats().invalid, 2);
        let ship = controller.entity(EntityId(1)).unwrap();
        assert_eq!(ship.position, Some(WorldPos { x: 10.0, z: 10.0 }));
        assert_eq!(ship.is_visible, Some(true));
    }
}
