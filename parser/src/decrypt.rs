//! Reverses the replay tail's block-chained Blowfish encryption and inflates
//! the result into the raw packet stream.

use std::io::Read;

use ::crypto::blowfish::Blowfish;
use ::crypto::symmetriccipher::BlockDecryptor;
use flate2::read::ZlibDecoder;
use tracing::trace;

use crate::Error;

/// Fixed key shared by every replay.
pub const BLOWFISH_KEY: [u8; 16] = [
    0x29, 0xB7, 0xC9, 0x09, 0x38, 0x3F, 0x84, 0x88, 0xFA, 0x98, 0xEC, 0x4E, 0x13, 0x19, 0x79, 0xFB,
];

pub const BLOCK_SIZE: usize = 8;

/// Decrypts the tail without inflating it.
///
/// The first block belongs to the key setup and is skipped. Every following
/// block is decrypted on its own and then XORed with the previous *decrypted*
/// block (the first one with zero), which is not the same as CBC.
pub fn decrypt_blocks(tail: &[u8]) -> Result<Vec<u8>, Error> {
    if tail.len() % BLOCK_SIZE != 0 {
        return Err(Error::corrupt(format!(
            "encrypted tail is {} bytes, not a multiple of {BLOCK_SIZE}",
            tail.len()
        )));
    }
    if tail.len() <= BLOCK_SIZE {
        return Err(Error::corrupt("no payload blocks follow the key block"));
    }

    let cipher = Blowfish::new(&BLOWFISH_KEY);
    let mut decrypted = Vec::with_capacity(tail.len() - BLOCK_SIZE);
    let mut previous = [0u8; BLOCK_SIZE];
    for chunk in tail.chunks_exact(BLOCK_SIZE).skip(1) {
        let mut block = [0u8; BLOCK_SIZE];
        cipher.decrypt_block(chunk, &mut block);
        for (b, prev) in block.iter_mut().zip(previous.iter()) {
            *b ^= prev;
        }
        decrypted.extend_from_slice(&block);
        previous = block;
    }

    trace!(blocks = decrypted.len() / BLOCK_SIZE, "decrypted replay tail");
    Ok(decrypted)
}

pub fn inflate(compressed: &[u8]) -> Result<Vec<u8>, Error> {
    let mut inflated = Vec::with_capacity(compressed.len() * 4);
    ZlibDecoder::new(compressed)
        .read_to_end(&mut inflated)
        .map_err(Error::Inflate)?;
    Ok(inflated)
}

/// Decrypts and inflates the encrypted tail of a replay container.
pub fn decrypt_stream(tail: &[u8]) -> Result<Vec<u8>, Error> {
    let decrypted = decrypt_blocks(tail)?;
    inflate(&decrypted)
}
