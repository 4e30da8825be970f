// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Watermarking configuration.
//!
//! Every field has a default, so an empty TOML document (or
//! `WatermarkConfig::default()`) gives the standard behaviour:
//!
//! ```toml
//! channel = "blue"
//! bucket_secs = 3600
//! timestamp_tolerance_secs = 315360000
//! checksum_policy = "exact"
//! terminator_lookahead = 500
//! auth_threshold = 100
//!
//! [kdf]
//! memory_kib = 19456
//! iterations = 2
//! parallelism = 1
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::stego::error::{Result, StegoError};
use crate::stego::frame::DEFAULT_LOOKAHEAD;

/// Ten years of seconds (leap days ignored).
const TEN_YEARS_SECS: u64 = 10 * 365 * 24 * 3600;

/// Colour channel whose LSB carries the bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Red,
    Green,
    #[default]
    Blue,
}

impl Channel {
    /// Byte offset of this channel within an RGB pixel.
    pub const fn offset(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }
}

/// How strictly the extracted checksum is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumPolicy {
    /// Recompute the CRC-16 and require equality.
    #[default]
    Exact,
    /// Legacy behaviour: any non-zero checksum passes.
    PresenceOnly,
}

/// Argon2id cost parameters for document key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

/// Tunables for embedding, key derivation and validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    pub channel: Channel,
    /// Width of the key-derivation time bucket.
    pub bucket_secs: u64,
    pub kdf: KdfParams,
    /// Accepted distance between a header timestamp and now.
    pub timestamp_tolerance_secs: u64,
    pub checksum_policy: ChecksumPolicy,
    /// Bits scanned past the expected terminator before giving up.
    pub terminator_lookahead: usize,
    /// Minimum score for authorization (all checks must pass regardless).
    pub auth_threshold: u8,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            channel: Channel::Blue,
            bucket_secs: 3600,
            kdf: KdfParams::default(),
            timestamp_tolerance_secs: TEN_YEARS_SECS,
            checksum_policy: ChecksumPolicy::Exact,
            terminator_lookahead: DEFAULT_LOOKAHEAD,
            auth_threshold: 100,
        }
    }
}

impl WatermarkConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| StegoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| StegoError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Reject values that would make derivation or validation meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_secs == 0 {
            return Err(StegoError::Config("bucket_secs must be > 0".into()));
        }
        if self.kdf.iterations == 0 || self.kdf.parallelism == 0 {
            return Err(StegoError::Config("kdf iterations and parallelism must be > 0".into()));
        }
        if self.kdf.parallelism > argon2::Params::MAX_P_COST {
            return Err(StegoError::Config(format!(
                "kdf parallelism must be <= {}",
                argon2::Params::MAX_P_COST
            )));
        }
        if (self.kdf.memory_kib as u64) < 8 * self.kdf.parallelism as u64 {
            return Err(StegoError::Config(
                "kdf memory_kib must be at least 8 * parallelism".into(),
            ));
        }
        if self.auth_threshold > 100 {
            return Err(StegoError::Config("auth_threshold must be <= 100".into()));
        }
        Ok(())
    }
}
