// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Single-bit LSB codec and bit-sequence helpers.
//!
//! Integers are serialized MSB-first, one `bool` per bit, which is the order
//! they are written into consecutive pixels.

/// Write `bit` into the least significant bit of `channel`.
///
/// The upper 7 bits are left untouched.
#[inline]
pub fn embed_bit(channel: u8, bit: bool) -> u8 {
    (channel & 0xFE) | bit as u8
}

/// Read the least significant bit of `channel` (true iff odd).
#[inline]
pub fn extract_bit(channel: u8) -> bool {
    channel & 1 == 1
}

/// Append `value` as 16 bits, MSB first.
pub fn push_u16(bits: &mut Vec<bool>, value: u16) {
    for shift in (0..16).rev() {
        bits.push((value >> shift) & 1 == 1);
    }
}

/// Append `value` as 32 bits, MSB first.
pub fn push_u32(bits: &mut Vec<bool>, value: u32) {
    for shift in (0..32).rev() {
        bits.push((value >> shift) & 1 == 1);
    }
}

/// Read a big-endian `u16` from the first 16 entries of `bits`.
///
/// Panics if fewer than 16 bits are supplied; callers slice exact widths.
pub fn read_u16(bits: &[bool]) -> u16 {
    bits[..16].iter().fold(0u16, |acc, &b| (acc << 1) | b as u16)
}

/// Read a big-endian `u32` from the first 32 entries of `bits`.
pub fn read_u32(bits: &[bool]) -> u32 {
    bits[..32].iter().fold(0u32, |acc, &b| (acc << 1) | b as u32)
}

/// Pack bits MSB-first into bytes, zero-padding the final byte.
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &b)| byte | ((b as u8) << (7 - i)))
        })
        .collect()
}
