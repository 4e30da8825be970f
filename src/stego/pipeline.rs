// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Document-bound embed/extract pipeline.
//!
//! The secure path composes the security layer with the LSB codec:
//! 1. Derive a document key from the document bytes, context and time bucket
//! 2. Encrypt the credential into an `enc:` token
//! 3. Render the token as a monochrome bitmap (external [`BitmapCodec`])
//! 4. Prefix the bitmap with an 80-bit security header bound to the key
//! 5. Write header + bitmap into the cover LSBs
//!
//! Recovery runs the same steps backwards and finishes with authorization
//! scoring.

use image::RgbImage;
use log::{debug, info, warn};

use crate::stego::capacity::{Framing, ShrinkPolicy};
use crate::stego::clock::Clock;
use crate::stego::config::WatermarkConfig;
use crate::stego::crypto::{self, DocumentKey};
use crate::stego::error::{Result, StegoError};
use crate::stego::lsb::{embed_framed, extract_framed, EmbedOptions, EmbedReport};
use crate::stego::matrix::PayloadMatrix;
use crate::stego::security::{SecurityHeader, SECURITY_HEADER_BITS};
use crate::stego::validate::{validate, ValidationResult};

/// Text ⇄ monochrome bitmap codec (typically a QR encoder/decoder).
pub trait BitmapCodec {
    /// Render `text` as a payload matrix.
    fn encode_text(&self, text: &str) -> Result<PayloadMatrix>;

    /// Read text back from a matrix; `None` if nothing decodes.
    fn decode_bitmap(&self, matrix: &PayloadMatrix) -> Option<String>;
}

/// Everything read back by [`secure_extract`].
#[derive(Debug, Clone)]
pub struct SecureExtraction {
    pub matrix: PayloadMatrix,
    pub security_header: SecurityHeader,
    pub validation: ValidationResult,
}

/// Embed `matrix` behind a security header bound to `key`.
///
/// The header timestamp is the clock's current time and the checksum covers
/// the matrix actually written (after any auto-shrink).
///
/// # Errors
/// - [`StegoError::Capacity`] if the framed matrix does not fit under
///   [`ShrinkPolicy::Strict`], or nothing fits at all.
pub fn secure_embed(
    cover: &RgbImage,
    matrix: &PayloadMatrix,
    key: &DocumentKey,
    clock: &dyn Clock,
    options: EmbedOptions,
) -> Result<EmbedReport> {
    let fingerprint = key.fingerprint();
    let timestamp = u32::try_from(clock.now_secs()).unwrap_or(u32::MAX);
    debug!("secure embed: key {fingerprint:08x}, timestamp {timestamp}");

    embed_framed(cover, matrix, Framing::Secure, options, |fitted| {
        SecurityHeader::new(fingerprint, timestamp, fitted.bits()).to_bits()
    })
}

/// Extract a secure-framed matrix and score it against `key`.
///
/// A wrong key is not an error here: the matrix is still returned and the
/// [`ValidationResult`] says why authorization failed.
///
/// # Errors
/// - [`StegoError::Framing`] if the headers cannot be located.
pub fn secure_extract(
    stego: &RgbImage,
    key: &DocumentKey,
    clock: &dyn Clock,
    config: &WatermarkConfig,
) -> Result<SecureExtraction> {
    let (prefix, matrix) = extract_framed(stego, SECURITY_HEADER_BITS, config)?;
    let security_header = SecurityHeader::from_bits(&prefix)?;
    let validation = validate(&security_header, key, matrix.bits(), clock.now_secs(), config);
    Ok(SecureExtraction { matrix, security_header, validation })
}

/// Result of [`watermark_credential`].
#[derive(Debug, Clone)]
pub struct WatermarkReceipt {
    pub report: EmbedReport,
    /// Hex SHA-256 of the document.
    pub document_fingerprint: String,
    pub key_fingerprint: u32,
    /// HMAC of the document fingerprint under the derived key.
    pub signature: String,
}

/// Bind `credential` to `document` and hide it in `cover`.
///
/// # Arguments
/// - `document`: bytes of the document the cover image travels with.
/// - `context`: optional extra binding (user id, purpose); may be empty.
/// - `credential`: text to protect.
///
/// # Errors
/// - [`StegoError::EncryptionFailed`] if the credential cannot be sealed.
/// - Any error from `codec.encode_text`.
/// - [`StegoError::Capacity`] as for [`secure_embed`].
#[allow(clippy::too_many_arguments)]
pub fn watermark_credential(
    cover: &RgbImage,
    document: &[u8],
    context: &str,
    credential: &str,
    codec: &dyn BitmapCodec,
    clock: &dyn Clock,
    config: &WatermarkConfig,
    policy: ShrinkPolicy,
) -> Result<WatermarkReceipt> {
    let key = crypto::derive_key(document, context, clock, config)?;
    let token = crypto::encrypt(credential, &key)?;
    let matrix = codec.encode_text(&token)?;

    let options = EmbedOptions::from_config(config).with_policy(policy);
    let report = secure_embed(cover, &matrix, &key, clock, options)?;

    let document_fingerprint = crypto::document_fingerprint(document);
    let signature = crypto::sign_document(&document_fingerprint, &key)?;
    info!(
        "watermarked credential for document {} with key {:08x}",
        &document_fingerprint[..16],
        key.fingerprint()
    );
    Ok(WatermarkReceipt {
        report,
        document_fingerprint,
        key_fingerprint: key.fingerprint(),
        signature,
    })
}

/// Credential read back by [`recover_credential`].
#[derive(Debug, Clone)]
pub struct RecoveredCredential {
    /// `None` when an `enc:` token did not open under the derived key.
    pub credential: Option<String>,
    /// Whether the payload was an `enc:` token (legacy payloads are plaintext).
    pub was_encrypted: bool,
    pub validation: ValidationResult,
}

impl RecoveredCredential {
    /// The credential, or [`StegoError::DecryptionFailed`] if it stayed sealed.
    pub fn into_credential(self) -> Result<String> {
        self.credential.ok_or(StegoError::DecryptionFailed)
    }
}

/// Recover a credential hidden by [`watermark_credential`].
///
/// The key is re-derived from `document`, so a document that differs by a
/// single byte (or a different time bucket) fails the key check. A token that
/// does not open under the derived key leaves `credential` empty; the
/// [`ValidationResult`] still says which checks failed.
///
/// # Errors
/// - [`StegoError::Framing`] if the headers cannot be located or the bitmap
///   does not decode.
pub fn recover_credential(
    stego: &RgbImage,
    document: &[u8],
    context: &str,
    codec: &dyn BitmapCodec,
    clock: &dyn Clock,
    config: &WatermarkConfig,
) -> Result<RecoveredCredential> {
    let key = crypto::derive_key(document, context, clock, config)?;
    let extraction = secure_extract(stego, &key, clock, config)?;

    let payload = codec
        .decode_bitmap(&extraction.matrix)
        .ok_or_else(|| StegoError::Framing("payload bitmap did not decode".into()))?;

    let was_encrypted = crypto::is_encrypted(&payload);
    let credential = if was_encrypted {
        match crypto::decrypt(&payload, &key) {
            Ok(plain) => Some(plain),
            Err(e) => {
                warn!("credential token did not open: {e}");
                None
            }
        }
    } else {
        Some(payload)
    };

    Ok(RecoveredCredential { credential, was_encrypted, validation: extraction.validation })
}
