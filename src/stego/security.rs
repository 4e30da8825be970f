// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Security header codec.
//!
//! The security header binds the embedded matrix to a document key. It is
//! written in front of the dimension header on the secure path:
//!
//! ```text
//! [32 bits] key fingerprint (first 4 bytes of SHA-256(key), big-endian)
//! [32 bits] unix timestamp (seconds)
//! [16 bits] CRC-16 over payload bits || fingerprint || timestamp
//! ```

use crc::{Crc, CRC_16_IBM_3740};

use crate::stego::bits::{bits_to_bytes, push_u16, push_u32, read_u16, read_u32};
use crate::stego::error::{Result, StegoError};

/// Fingerprint + timestamp + checksum.
pub const SECURITY_HEADER_BITS: usize = 32 + 32 + 16;

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF), catalogued as IBM-3740.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Metadata riding in front of the dimension header on the secure path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityHeader {
    pub key_fingerprint: u32,
    pub timestamp: u32,
    pub checksum: u16,
}

impl SecurityHeader {
    /// Build a header for `payload_bits`, computing the checksum.
    pub fn new(key_fingerprint: u32, timestamp: u32, payload_bits: &[bool]) -> Self {
        Self {
            key_fingerprint,
            timestamp,
            checksum: compute_checksum(payload_bits, key_fingerprint, timestamp),
        }
    }

    /// Serialize to exactly [`SECURITY_HEADER_BITS`] bits.
    pub fn to_bits(&self) -> Vec<bool> {
        let mut bits = Vec::with_capacity(SECURITY_HEADER_BITS);
        push_u32(&mut bits, self.key_fingerprint);
        push_u32(&mut bits, self.timestamp);
        push_u16(&mut bits, self.checksum);
        bits
    }

    /// Parse the first [`SECURITY_HEADER_BITS`] bits.
    ///
    /// # Errors
    /// [`StegoError::Framing`] if fewer than 80 bits are available.
    pub fn from_bits(bits: &[bool]) -> Result<Self> {
        if bits.len() < SECURITY_HEADER_BITS {
            return Err(StegoError::Framing(format!(
                "security header needs {SECURITY_HEADER_BITS} bits, got {}",
                bits.len()
            )));
        }
        Ok(Self {
            key_fingerprint: read_u32(&bits[..32]),
            timestamp: read_u32(&bits[32..64]),
            checksum: read_u16(&bits[64..80]),
        })
    }
}

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, no reflection, no xor-out).
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Checksum binding payload bits to a key fingerprint and timestamp.
///
/// Payload bits are packed MSB-first (final byte zero-padded), followed by
/// the fingerprint and timestamp as big-endian `u32`s.
pub fn compute_checksum(payload_bits: &[bool], key_fingerprint: u32, timestamp: u32) -> u16 {
    let mut data = bits_to_bytes(payload_bits);
    data.extend_from_slice(&key_fingerprint.to_be_bytes());
    data.extend_from_slice(&timestamp.to_be_bytes());
    crc16(&data)
}
