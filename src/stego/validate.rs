// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Authorization scoring for extracted security headers.
//!
//! Three independent checks feed a 0–100 advisory score:
//!
//! | check                   | weight |
//! |-------------------------|--------|
//! | key fingerprint match   | 50     |
//! | timestamp plausibility  | 25     |
//! | checksum                | 25     |
//!
//! Authorization requires every check to pass. The timestamp window is a
//! corruption sanity check measured in years, not a replay control.

use log::{debug, warn};

use crate::stego::config::{ChecksumPolicy, WatermarkConfig};
use crate::stego::crypto::{key_fingerprint, DocumentKey};
use crate::stego::error::{Result, StegoError};
use crate::stego::security::{compute_checksum, SecurityHeader};

const KEY_MATCH_POINTS: u8 = 50;
const TIMESTAMP_POINTS: u8 = 25;
const CHECKSUM_POINTS: u8 = 25;

/// Per-check outcome plus the aggregate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationResult {
    pub key_match: bool,
    pub timestamp_plausible: bool,
    pub checksum_valid: bool,
    /// Weighted score, 0–100.
    pub score: u8,
    pub authorized: bool,
}

impl ValidationResult {
    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    /// Turn a failed validation into [`StegoError::Unauthorized`].
    pub fn require_authorized(self) -> Result<Self> {
        if self.authorized {
            Ok(self)
        } else {
            Err(StegoError::Unauthorized { score: self.score })
        }
    }

    /// Names of the checks that failed, for display.
    pub fn failed_checks(&self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if !self.key_match {
            failed.push("key_match");
        }
        if !self.timestamp_plausible {
            failed.push("timestamp");
        }
        if !self.checksum_valid {
            failed.push("checksum");
        }
        failed
    }
}

/// Validate an extracted header against a caller-supplied key.
///
/// `payload_bits` are the matrix bits read after the header; the checksum is
/// recomputed over them exactly as it was at embed time.
pub fn validate(
    header: &SecurityHeader,
    key: &DocumentKey,
    payload_bits: &[bool],
    now_secs: u64,
    config: &WatermarkConfig,
) -> ValidationResult {
    let key_match = key_fingerprint(key) == header.key_fingerprint;

    let timestamp_plausible =
        now_secs.abs_diff(header.timestamp as u64) <= config.timestamp_tolerance_secs;

    let checksum_valid = match config.checksum_policy {
        ChecksumPolicy::Exact => {
            compute_checksum(payload_bits, header.key_fingerprint, header.timestamp) == header.checksum
        }
        ChecksumPolicy::PresenceOnly => header.checksum != 0,
    };

    let score = [
        (key_match, KEY_MATCH_POINTS),
        (timestamp_plausible, TIMESTAMP_POINTS),
        (checksum_valid, CHECKSUM_POINTS),
    ]
    .iter()
    .filter(|(passed, _)| *passed)
    .map(|(_, points)| points)
    .sum::<u8>();

    let authorized =
        key_match && timestamp_plausible && checksum_valid && score >= config.auth_threshold;

    let result = ValidationResult { key_match, timestamp_plausible, checksum_valid, score, authorized };
    if authorized {
        debug!("authorization passed (score {score})");
    } else {
        warn!(
            "authorization failed (score {score}, failed: {})",
            result.failed_checks().join(", ")
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_760_000_000;

    fn key(b: u8) -> DocumentKey {
        DocumentKey::from_bytes(&[b; 32]).unwrap()
    }

    fn bits() -> Vec<bool> {
        (0..441).map(|i| i % 7 == 0).collect()
    }

    #[test]
    fn all_checks_pass() {
        let k = key(1);
        let header = SecurityHeader::new(k.fingerprint(), NOW as u32, &bits());
        let r = validate(&header, &k, &bits(), NOW, &WatermarkConfig::default());
        assert!(r.is_authorized());
        assert_eq!(r.score, 100);
        assert!(r.failed_checks().is_empty());
        assert!(r.require_authorized().is_ok());
    }

    #[test]
    fn wrong_key_scores_at_most_fifty() {
        let header = SecurityHeader::new(key(1).fingerprint(), NOW as u32, &bits());
        let r = validate(&header, &key(2), &bits(), NOW, &WatermarkConfig::default());
        assert!(!r.key_match);
        assert!(!r.authorized);
        assert!(r.score <= 50);
        assert!(matches!(r.require_authorized(), Err(StegoError::Unauthorized { score: 50 })));
    }

    #[test]
    fn implausible_timestamp() {
        let k = key(1);
        let header = SecurityHeader::new(k.fingerprint(), 0, &bits());
        let r = validate(&header, &k, &bits(), NOW, &WatermarkConfig::default());
        assert!(!r.timestamp_plausible);
        assert_eq!(r.score, 75);
        assert!(!r.authorized);
    }

    #[test]
    fn flipped_payload_bit_fails_exact_checksum() {
        let k = key(1);
        let header = SecurityHeader::new(k.fingerprint(), NOW as u32, &bits());
        let mut tampered = bits();
        tampered[100] = !tampered[100];
        let r = validate(&header, &k, &tampered, NOW, &WatermarkConfig::default());
        assert!(!r.checksum_valid);
        assert_eq!(r.score, 75);
        assert_eq!(r.failed_checks(), vec!["checksum"]);
    }

    #[test]
    fn presence_only_accepts_any_nonzero_checksum() {
        let k = key(1);
        let cfg = WatermarkConfig { checksum_policy: ChecksumPolicy::PresenceOnly, ..Default::default() };
        let real = compute_checksum(&bits(), k.fingerprint(), NOW as u32);
        let wrong = if real == 0xBEEF { 0x1234 } else { 0xBEEF };
        let header = SecurityHeader { key_fingerprint: k.fingerprint(), timestamp: NOW as u32, checksum: wrong };

        let r = validate(&header, &k, &bits(), NOW, &cfg);
        assert!(r.checksum_valid);
        assert_eq!(r.score, 100);
        assert!(r.authorized);

        let strict = validate(&header, &k, &bits(), NOW, &WatermarkConfig::default());
        assert!(!strict.checksum_valid);
        assert_eq!(strict.score, 75);
    }

    #[test]
    fn presence_only_rejects_zero_checksum() {
        let k = key(1);
        let cfg = WatermarkConfig { checksum_policy: ChecksumPolicy::PresenceOnly, ..Default::default() };
        let header = SecurityHeader { key_fingerprint: k.fingerprint(), timestamp: NOW as u32, checksum: 0 };
        let r = validate(&header, &k, &bits(), NOW, &cfg);
        assert!(!r.checksum_valid);
        assert_eq!(r.score, 75);
        assert!(!r.authorized);
        assert_eq!(r.failed_checks(), vec!["checksum"]);
    }
}
