// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! # stegmark-core
//!
//! Hides a credential, rendered as a small monochrome bitmap, in the pixel
//! LSBs of a lossless cover image, and optionally binds it to the document
//! the image travels with.
//!
//! - **Plain** watermarks survive as long as the image is not recompressed
//!   and can be extracted by anyone who knows the layout.
//! - **Secure** watermarks carry a security header tied to a key derived from
//!   the document's content (Argon2id), and the credential itself is sealed
//!   with AES-256-GCM-SIV. Extraction returns a scored
//!   [`ValidationResult`] explaining which checks passed.
//!
//! All codec and crypto operations are synchronous and work on in-memory
//! buffers. Time is read through an injected [`Clock`].
//!
//! # Quick start
//!
//! ```rust,ignore
//! use stegmark_core::{embed, extract, EmbedOptions, PayloadMatrix, WatermarkConfig};
//!
//! let cover = stegmark_core::load_cover(&std::fs::read("cover.png").unwrap()).unwrap();
//! let matrix = PayloadMatrix::from_luma(&qr_bitmap, 1).unwrap();
//! let report = embed(&cover, &matrix, EmbedOptions::default()).unwrap();
//! let recovered = extract(&report.stego, &WatermarkConfig::default()).unwrap();
//! assert_eq!(recovered, matrix);
//! ```

pub mod stego;

pub use stego::*;
