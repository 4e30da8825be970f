// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! LSB watermarking engine.
//!
//! Two embedding paths share one bit layout (one bit per pixel, in the LSB of
//! a single channel, raster order):
//!
//! - **Plain** (`embed` / `extract`): a 40-bit dimension header followed by
//!   the payload matrix bits.
//! - **Secure** (`secure_embed` / `secure_extract`): an 80-bit security header
//!   (key fingerprint, timestamp, CRC-16) in front of the plain layout, so a
//!   matrix can be bound to a document-derived key and scored on extraction.
//!
//! `watermark_credential` / `recover_credential` run the whole document-bound
//! flow: key derivation, credential encryption, bitmap rendering through an
//! external [`BitmapCodec`](pipeline::BitmapCodec), secure embedding.

pub mod error;
pub mod bits;
pub mod matrix;
pub mod capacity;
pub mod frame;
pub mod lsb;
pub mod security;
pub mod crypto;
pub mod validate;
pub mod pipeline;
pub mod config;
pub mod clock;
pub mod cache;
pub mod store;

pub use error::{Result, StegoError};
pub use matrix::PayloadMatrix;
pub use capacity::{
    analyze_cover, fit_matrix, plan, plan_secure, predict_quality, resize_to_fit, CapacityPlan,
    CoverAnalysis, Framing, QualityLevel, QualityPrediction, ShrinkPolicy, UtilizationWarning,
};
pub use frame::Header;
pub use lsb::{
    compare_images, embed, embed_bits, encode_png, extract, load_cover, BitReader, EmbedOptions,
    EmbedReport, EmbedWarning, ImageComparison,
};
pub use security::SecurityHeader;
pub use crypto::{
    decrypt, derive_key, derive_key_at, document_fingerprint, encrypt, is_encrypted,
    key_fingerprint, sign_document, verify_document_signature, DocumentKey,
};
pub use validate::{validate, ValidationResult};
pub use pipeline::{
    recover_credential, secure_embed, secure_extract, watermark_credential, BitmapCodec,
    RecoveredCredential, SecureExtraction, WatermarkReceipt,
};
pub use config::{Channel, ChecksumPolicy, KdfParams, WatermarkConfig};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cache::TtlCache;
pub use store::{CachedKeyStore, KeyRecord, KeyStore, MemoryKeyStore};
