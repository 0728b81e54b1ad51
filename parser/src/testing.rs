//! Builders for synthetic replay files.
//!
//! Real replays are large and tied to a particular client build, so tests in
//! this crate and in downstream crates assemble containers from scratch: a
//! metadata block, optional extra blocks and a packet stream that gets
//! compressed and chain-encrypted exactly like the game client does it.

use std::io::Write;

use ::crypto::blowfish::Blowfish;
use ::crypto::symmetriccipher::BlockEncryptor;
use flate2::Compression;
use flate2::write::ZlibEncoder;

use crate::REPLAY_SIGNATURE;
use crate::decrypt::{BLOCK_SIZE, BLOWFISH_KEY};
use crate::packet::{CAPTURE_ZONE_PACKET, POSITION_PACKET, SHIP_DESTROYED_PACKET};

pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .expect("writing to a Vec cannot fail");
    encoder.finish().expect("writing to a Vec cannot fail")
}

/// Inverse of [`crate::decrypt::decrypt_blocks`]. Pads `plain` with zeroes to
/// a whole number of blocks and prepends an arbitrary key-setup block.
pub fn encrypt_tail(plain: &[u8]) -> Vec<u8> {
    let cipher = Blowfish::new(&BLOWFISH_KEY);
    let mut padded = plain.to_vec();
    padded.resize(plain.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, 0);

    let mut out = vec![0xA5; BLOCK_SIZE];
    let mut previous = [0u8; BLOCK_SIZE];
    for chunk in padded.chunks_exact(BLOCK_SIZE) {
        let mut mixed = [0u8; BLOCK_SIZE];
        for (m, (c, p)) in mixed.iter_mut().zip(chunk.iter().zip(previous.iter())) {
            *m = c ^ p;
        }
        let mut encrypted = [0u8; BLOCK_SIZE];
        cipher.encrypt_block(&mixed, &mut encrypted);
        out.extend_from_slice(&encrypted);
        previous.copy_from_slice(chunk);
    }
    out
}

/// Frames a single packet: size, type, clock, payload.
pub fn frame(packet_type: u32, clock: f32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(12 + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&packet_type.to_le_bytes());
    out.extend_from_slice(&clock.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn position_packet(clock: f32, entity_id: u32, x: f32, z: f32, yaw: f32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(33);
    payload.extend_from_slice(&entity_id.to_le_bytes());
    payload.extend_from_slice(&0u32.to_le_bytes());
    for value in [x, 0.0, z, yaw, 0.0, 0.0] {
        payload.extend_from_slice(&value.to_le_bytes());
    }
    payload.push(0);
    frame(POSITION_PACKET, clock, &payload)
}

pub fn death_packet(clock: f32, victim: u32, killer: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(12);
    for value in [victim, killer, 2] {
        payload.extend_from_slice(&value.to_le_bytes());
    }
    frame(SHIP_DESTROYED_PACKET, clock, &payload)
}

/// Field values for a synthetic capture-zone packet.
#[derive(Debug, Clone, Copy)]
pub struct ZoneFields {
    pub zone_id: u32,
    pub x: f32,
    pub z: f32,
    pub radius: f32,
    pub owner_team: i32,
    pub invader_team: i32,
    pub contested: bool,
    pub progress: f32,
}

impl Default for ZoneFields {
    fn default() -> Self {
        Self {
            zone_id: 0,
            x: 0.0,
            z: 0.0,
            radius: 100.0,
            owner_team: -1,
            invader_team: -1,
            contested: false,
            progress: 0.0,
        }
    }
}

pub fn capture_zone_packet(clock: f32, zone: ZoneFields) -> Vec<u8> {
    let mut payload = Vec::with_capacity(29);
    payload.extend_from_slice(&zone.zone_id.to_le_bytes());
    for value in [zone.x, zone.z, zone.radius] {
        payload.extend_from_slice(&value.to_le_bytes());
    }
    payload.extend_from_slice(&zone.owner_team.to_le_bytes());
    payload.extend_from_slice(&zone.invader_team.to_le_bytes());
    payload.push(zone.contested as u8);
    payload.extend_from_slice(&zone.progress.to_le_bytes());
    frame(CAPTURE_ZONE_PACKET, clock, &payload)
}

/// Assembles a complete replay container.
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    engine_metadata: String,
    extra_blocks: Vec<String>,
    packets: Vec<u8>,
}

impl ContainerBuilder {
    pub fn new(engine_metadata: &str) -> Self {
        Self {
            engine_metadata: engine_metadata.to_owned(),
            extra_blocks: Vec::new(),
            packets: Vec::new(),
        }
    }

    pub fn extra_block(mut self, json: &str) -> Self {
        self.extra_blocks.push(json.to_owned());
        self
    }

    /// Appends already framed packet bytes to the stream.
    pub fn packet(mut self, framed: Vec<u8>) -> Self {
        self.packets.extend(framed);
        self
    }

    pub fn packets(mut self, framed: impl IntoIterator<Item = Vec<u8>>) -> Self {
        for packet in framed {
            self.packets.extend(packet);
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = REPLAY_SIGNATURE.to_vec();
        out.extend_from_slice(&(1 + self.extra_blocks.len() as u32).to_le_bytes());
        for block in std::iter::once(&self.engine_metadata).chain(self.extra_blocks.iter()) {
            out.extend_from_slice(&(block.len() as u32).to_le_bytes());
            out.extend_from_slice(block.as_bytes());
        }
        out.extend(encrypt_tail(&compress(&self.packets)));
        out
    }
}
