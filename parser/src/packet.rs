use kinded::Kinded;
use nom::IResult;
use nom::number::complete::{le_f32, le_i32, le_u8, le_u32};
use serde::Serialize;

use crate::Error;
use crate::types::{EntityId, GameClock};

pub const POSITION_PACKET: u32 = 0x0A;
pub const SHIP_DESTROYED_PACKET: u32 = 0x0C;
pub const CAPTURE_ZONE_PACKET: u32 = 0x0D;

/// Size of the `payload_size`, `packet_type` and `clock` header.
pub const PACKET_HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rot3 {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// Absolute position of an entity. `y` is altitude; the map plane is `x`/`z`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionPacket {
    pub pid: EntityId,
    pub space_id: u32,
    pub position: Vec3,
    pub rotation: Rot3,
    pub is_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShipDestroyedPacket {
    pub victim: EntityId,
    pub killer: EntityId,
    pub cause: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CaptureZonePacket {
    pub zone_id: u32,
    pub x: f32,
    pub z: f32,
    pub radius: f32,
    /// -1 while nobody holds the zone
    pub owner_team: i32,
    pub invader_team: i32,
    pub contested: bool,
    /// Fraction captured, 0..1
    pub progress: f32,
}

#[derive(Debug, Serialize, Kinded)]
pub enum PacketType<'a> {
    Position(PositionPacket),
    ShipDestroyed(ShipDestroyedPacket),
    CaptureZone(CaptureZonePacket),
    /// A packet type this crate does not interpret.
    Unknown(&'a [u8]),
    /// A known packet type whose payload was too short to decode.
    Invalid(&'a [u8]),
}

#[derive(Debug, Serialize)]
pub struct Packet<'a> {
    pub packet_size: u32,
    pub packet_type: u32,
    pub clock: GameClock,
    pub payload: PacketType<'a>,
}

fn position(i: &[u8]) -> IResult<&[u8], PositionPacket> {
    let (i, pid) = le_u32(i)?;
    let (i, space_id) = le_u32(i)?;
    let (i, x) = le_f32(i)?;
    let (i, y) = le_f32(i)?;
    let (i, z) = le_f32(i)?;
    let (i, yaw) = le_f32(i)?;
    let (i, pitch) = le_f32(i)?;
    let (i, roll) = le_f32(i)?;
    let (i, is_error) = le_u8(i)?;
    Ok((
        i,
        PositionPacket {
            pid: EntityId(pid),
            space_id,
            position: Vec3 { x, y, z },
            rotation: Rot3 { yaw, pitch, roll },
            is_error: is_error != 0,
        },
    ))
}

fn ship_destroyed(i: &[u8]) -> IResult<&[u8], ShipDestroyedPacket> {
    let (i, victim) = le_u32(i)?;
    let (i, killer) = le_u32(i)?;
    let (i, cause) = le_u32(i)?;
    Ok((
        i,
        ShipDestroyedPacket {
            victim: EntityId(victim),
            killer: EntityId(killer),
            cause,
        },
    ))
}

fn capture_zone(i: &[u8]) -> IResult<&[u8], CaptureZonePacket> {
    let (i, zone_id) = le_u32(i)?;
    let (i, x) = le_f32(i)?;
    let (i, z) = le_f32(i)?;
    let (i, radius) = le_f32(i)?;
    let (i, owner_team) = le_i32(i)?;
    let (i, invader_team) = le_i32(i)?;
    let (i, contested) = le_u8(i)?;
    let (i, progress) = le_f32(i)?;
    Ok((
        i,
        CaptureZonePacket {
            zone_id,
            x,
            z,
            radius,
            owner_team,
            invader_team,
            contested: contested != 0,
            progress,
        },
    ))
}

fn decode_payload(packet_type: u32, payload: &[u8]) -> PacketType<'_> {
    let decoded = match packet_type {
        POSITION_PACKET => position(payload).map(|(_, p)| PacketType::Position(p)),
        SHIP_DESTROYED_PACKET => ship_destroyed(payload).map(|(_, p)| PacketType::ShipDestroyed(p)),
        CAPTURE_ZONE_PACKET => capture_zone(payload).map(|(_, p)| PacketType::CaptureZone(p)),
        _ => return PacketType::Unknown(payload),
    };
    decoded.unwrap_or(PacketType::Invalid(payload))
}

/// Walks a decrypted packet stream one framed packet at a time.
///
/// A header or payload that runs past the end of the buffer yields
/// [`Error::PacketFraming`] once, after which the parser is exhausted.
pub struct Parser<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Parser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Byte offset of the next packet header.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn parse_packet(&mut self) -> Option<Result<Packet<'a>, Error>> {
        let remaining = &self.data[self.offset..];
        if remaining.is_empty() {
            return None;
        }

        let header = match packet_header(remaining) {
            Ok((_, header)) => header,
            Err(_) => return Some(Err(self.fail(PACKET_HEADER_SIZE, remaining.len()))),
        };
        let (packet_size, packet_type, clock) = header;
        let body = &remaining[PACKET_HEADER_SIZE..];
        let needed = packet_size as usize;
        if needed > body.len() {
            return Some(Err(self.fail(needed, body.len())));
        }

        let payload = &body[..needed];
        self.offset += PACKET_HEADER_SIZE + needed;
        Some(Ok(Packet {
            packet_size,
            packet_type,
            clock: GameClock(clock),
            payload: decode_payload(packet_type, payload),
        }))
    }

    fn fail(&mut self, needed: usize, remaining: usize) -> Error {
        let offset = self.offset;
        self.offset = self.data.len();
        Error::PacketFraming {
            offset,
            needed,
            remaining,
        }
    }
}

fn packet_header(i: &[u8]) -> IResult<&[u8], (u32, u32, f32)> {
    let (i, packet_size) = le_u32(i)?;
    let (i, packet_type) = le_u32(i)?;
    let (i, clock) = le_f32(i)?;
    Ok((i, (packet_size, packet_type, clock)))
}

impl<'a> Iterator for Parser<'a> {
    type Item = Result<Packet<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.parse_packet()
    }
}
