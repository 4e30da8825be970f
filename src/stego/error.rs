// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the watermarking pipeline.
//!
//! [`StegoError`] covers every failure mode from capacity planning through
//! framing, decryption and authorization.

use thiserror::Error;

/// Errors that can occur while embedding or extracting a watermark.
#[derive(Debug, Error)]
pub enum StegoError {
    /// The payload (plus framing) does not fit in the cover image.
    #[error("capacity exceeded: need {needed} bits, cover holds {available} bits ({} short)", shortfall(.needed, .available))]
    Capacity {
        /// Bits required for header(s) and matrix.
        needed: usize,
        /// Bits the cover can carry.
        available: usize,
    },
    /// Header or terminator missing, misaligned or malformed.
    #[error("framing error: {0}")]
    Framing(String),
    /// Authenticated encryption failed.
    #[error("encryption failed")]
    EncryptionFailed,
    /// Authenticated decryption failed (wrong key, tampered or malformed token).
    #[error("decryption failed (wrong key or corrupted data)")]
    DecryptionFailed,
    /// Authorization checks did not pass.
    #[error("authorization failed (score {score}/100)")]
    Unauthorized {
        /// Advisory score computed by the validator.
        score: u8,
    },
    /// The cover is not a lossless raster, or compared images differ in shape.
    #[error("image format error: {0}")]
    IoFormat(String),
    /// The payload matrix is empty or inconsistent with its dimensions.
    #[error("invalid payload matrix: {0}")]
    InvalidMatrix(String),
    /// A document key could not be decoded or has the wrong length.
    #[error("invalid document key")]
    InvalidKey,
    /// Image decoding or encoding failed.
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
    /// Configuration could not be loaded or is out of range.
    #[error("configuration error: {0}")]
    Config(String),
    /// A key store operation failed.
    #[error("key store error: {0}")]
    Store(String),
}

impl StegoError {
    /// Exact bit deficit carried by a [`StegoError::Capacity`] error.
    pub fn deficit(&self) -> Option<usize> {
        match self {
            Self::Capacity { needed, available } => Some(needed.saturating_sub(*available)),
            _ => None,
        }
    }
}

fn shortfall(needed: &usize, available: &usize) -> usize {
    needed.saturating_sub(*available)
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StegoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_reports_deficit() {
        let err = StegoError::Capacity { needed: 481, available: 100 };
        assert_eq!(err.deficit(), Some(381));
        assert!(err.to_string().contains("381 short"));
    }

    #[test]
    fn deficit_absent_for_other_variants() {
        assert_eq!(StegoError::DecryptionFailed.deficit(), None);
        assert_eq!(StegoError::Framing("x".into()).deficit(), None);
    }
}
