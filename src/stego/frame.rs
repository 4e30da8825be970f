// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Dimension header framing.
//!
//! The header is the fixed 40-bit block that precedes the matrix bits:
//!
//! ```text
//! [16 bits] matrix width  (MSB first)
//! [16 bits] matrix height (MSB first)
//! [ 8 bits] terminator 00000000
//! ```
//!
//! On the secure path an 80-bit security header sits in front of it, so the
//! terminator is expected to end at bit 120 instead of bit 40.

use crate::stego::bits::{push_u16, read_u16};
use crate::stego::error::{Result, StegoError};

/// Width + height + terminator.
pub const HEADER_BITS: usize = 16 + 16 + TERMINATOR_BITS;

/// Length of the terminator sentinel.
pub const TERMINATOR_BITS: usize = 8;

/// Default number of bits scanned past the expected terminator position.
pub const DEFAULT_LOOKAHEAD: usize = 500;

/// Matrix dimensions carried in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub width: u16,
    pub height: u16,
}

impl Header {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Matrix bits announced by this header.
    pub fn payload_bits(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Serialize to exactly [`HEADER_BITS`] bits.
    pub fn to_bits(&self) -> Vec<bool> {
        let mut bits = Vec::with_capacity(HEADER_BITS);
        push_u16(&mut bits, self.width);
        push_u16(&mut bits, self.height);
        bits.extend(std::iter::repeat(false).take(TERMINATOR_BITS));
        bits
    }

    /// Parse a header from its first [`HEADER_BITS`] bits.
    ///
    /// # Errors
    /// [`StegoError::Framing`] if too few bits are supplied, the terminator
    /// does not match, or a dimension is zero.
    pub fn from_bits(bits: &[bool]) -> Result<Self> {
        if bits.len() < HEADER_BITS {
            return Err(StegoError::Framing(format!(
                "header needs {HEADER_BITS} bits, got {}",
                bits.len()
            )));
        }
        if !is_terminator(&bits[32..HEADER_BITS]) {
            return Err(StegoError::Framing("header terminator mismatch".into()));
        }
        Self::from_dimension_bits(&bits[..32])
    }

    fn from_dimension_bits(bits: &[bool]) -> Result<Self> {
        let header = Self::new(read_u16(&bits[..16]), read_u16(&bits[16..32]));
        if header.width == 0 || header.height == 0 {
            return Err(StegoError::Framing(format!(
                "malformed header: {}x{} matrix",
                header.width, header.height
            )));
        }
        Ok(header)
    }
}

fn is_terminator(bits: &[bool]) -> bool {
    bits.len() == TERMINATOR_BITS && bits.iter().all(|b| !b)
}

/// Header located by [`scan_header`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedHeader {
    /// The `prefix_bits` read before the dimension header (security header).
    pub prefix: Vec<bool>,
    pub header: Header,
}

/// Read bits until the terminator is found, with a bounded lookahead.
///
/// `prefix_bits` is the length of any block preceding the dimension header
/// (0 on the plain path, 80 on the secure path). The first terminator match
/// is accepted only if it ends exactly at `prefix_bits + HEADER_BITS`; a later
/// match means the stream is misaligned and is rejected rather than decoded
/// into a wrong-size matrix.
///
/// # Errors
/// [`StegoError::Framing`] if the stream ends first, no terminator appears
/// within `lookahead` bits past the expected position, the first match is
/// misaligned, or the decoded dimensions are zero.
pub fn scan_header<I>(bits: &mut I, prefix_bits: usize, lookahead: usize) -> Result<ScannedHeader>
where
    I: Iterator<Item = bool>,
{
    let header_len = prefix_bits + HEADER_BITS;
    let limit = header_len + lookahead;
    let mut read: Vec<bool> = Vec::with_capacity(header_len);

    loop {
        let Some(bit) = bits.next() else {
            return Err(StegoError::Framing(format!(
                "stream ended after {} bits without a header terminator",
                read.len()
            )));
        };
        read.push(bit);
        if read.len() < header_len {
            continue;
        }

        if is_terminator(&read[read.len() - TERMINATOR_BITS..]) {
            if read.len() != header_len {
                return Err(StegoError::Framing(format!(
                    "terminator ends at bit {} instead of {header_len}: header misaligned",
                    read.len()
                )));
            }
            let header = Header::from_dimension_bits(&read[prefix_bits..prefix_bits + 32])?;
            read.truncate(prefix_bits);
            return Ok(ScannedHeader { prefix: read, header });
        }

        if read.len() > limit {
            return Err(StegoError::Framing(format!(
                "header terminator not found within {lookahead} bits"
            )));
        }
    }
}
