// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! LSB embedder and extractor.
//!
//! Bits are written one per pixel into the least significant bit of a single
//! channel, walking the interleaved RGB buffer in raster order. Pixels past
//! the end of the bitstream are left untouched.

use std::io::Cursor;

use image::{ImageFormat, RgbImage};
use log::{debug, info, warn};

use crate::stego::bits::{embed_bit, extract_bit};
use crate::stego::capacity::{fit_matrix, psnr, CapacityPlan, Framing, ShrinkPolicy, UtilizationWarning};
use crate::stego::config::{Channel, WatermarkConfig};
use crate::stego::error::{Result, StegoError};
use crate::stego::frame::{scan_header, Header};
use crate::stego::matrix::PayloadMatrix;

const CHANNELS: usize = 3;

/// Knobs for a single embed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmbedOptions {
    pub policy: ShrinkPolicy,
    pub channel: Channel,
    /// Caller knows the payload was rendered from the cover itself.
    pub same_source: bool,
}

impl EmbedOptions {
    /// Options using the channel from `config`.
    pub fn from_config(config: &WatermarkConfig) -> Self {
        Self { channel: config.channel, ..Self::default() }
    }

    pub fn with_policy(mut self, policy: ShrinkPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Advisory attached to a successful embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedWarning {
    Utilization(UtilizationWarning),
    /// The payload was shrunk to fit; it no longer matches the input size.
    Resized { from: (u16, u16), to: (u16, u16) },
    /// Cover and payload come from the same picture.
    SameSource,
}

/// Output of [`embed`]: the new image plus what actually went into it.
#[derive(Debug, Clone)]
pub struct EmbedReport {
    pub stego: RgbImage,
    pub requested: (u16, u16),
    pub achieved: (u16, u16),
    pub plan: CapacityPlan,
    pub warnings: Vec<EmbedWarning>,
}

impl EmbedReport {
    pub fn was_resized(&self) -> bool {
        self.requested != self.achieved
    }
}

/// Iterator over the channel LSBs of an image in raster order.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    raw: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(image: &'a RgbImage, channel: Channel) -> Self {
        Self { raw: image.as_raw(), pos: channel.offset() }
    }
}

impl Iterator for BitReader<'_> {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        let byte = *self.raw.get(self.pos)?;
        self.pos += CHANNELS;
        Some(extract_bit(byte))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = if self.pos < self.raw.len() {
            (self.raw.len() - self.pos).div_ceil(CHANNELS)
        } else {
            0
        };
        (n, Some(n))
    }
}

impl ExactSizeIterator for BitReader<'_> {}

/// Write `bits` into a copy of `cover`, one per pixel.
///
/// # Errors
/// [`StegoError::Capacity`] if `bits` is longer than the pixel count. Nothing
/// is written in that case.
pub fn embed_bits(cover: &RgbImage, bits: &[bool], channel: Channel) -> Result<RgbImage> {
    let available = cover.width() as usize * cover.height() as usize;
    if bits.len() > available {
        return Err(StegoError::Capacity { needed: bits.len(), available });
    }
    let offset = channel.offset();
    let mut stego = cover.clone();
    for (pixel, &bit) in stego.chunks_exact_mut(CHANNELS).zip(bits) {
        pixel[offset] = embed_bit(pixel[offset], bit);
    }
    Ok(stego)
}

/// Plain embed: `[width][height][terminator][matrix bits]`.
pub fn embed(cover: &RgbImage, matrix: &PayloadMatrix, options: EmbedOptions) -> Result<EmbedReport> {
    embed_framed(cover, matrix, Framing::Plain, options, |_| Vec::new())
}

/// Embed with an optional prefix block computed from the fitted matrix.
///
/// `prefix` sees the matrix that will actually be written (after any
/// shrink) and must return exactly `framing.header_bits() - HEADER_BITS`
/// bits.
pub(crate) fn embed_framed<F>(
    cover: &RgbImage,
    matrix: &PayloadMatrix,
    framing: Framing,
    options: EmbedOptions,
    prefix: F,
) -> Result<EmbedReport>
where
    F: FnOnce(&PayloadMatrix) -> Vec<bool>,
{
    let fit = fit_matrix(matrix, cover.width(), cover.height(), framing, options.policy)?;

    let mut warnings = Vec::new();
    if fit.was_resized() {
        warnings.push(EmbedWarning::Resized { from: fit.requested, to: fit.achieved });
    }
    if let Some(w) = fit.plan.warning {
        warnings.push(EmbedWarning::Utilization(w));
    }
    if options.same_source {
        warnings.push(EmbedWarning::SameSource);
    }

    let mut stream = prefix(&*fit.matrix);
    stream.extend(Header::new(fit.achieved.0, fit.achieved.1).to_bits());
    stream.extend_from_slice(fit.matrix.bits());
    debug_assert_eq!(stream.len(), fit.plan.total_bits_needed);

    let stego = embed_bits(cover, &stream, options.channel)?;

    info!(
        "embedded {}x{} matrix into {}x{} cover ({} bits, {:.2}% utilization)",
        fit.achieved.0,
        fit.achieved.1,
        cover.width(),
        cover.height(),
        stream.len(),
        fit.plan.utilization_pct
    );
    for w in &warnings {
        match w {
            EmbedWarning::Utilization(u) => warn!("{}", u.message()),
            EmbedWarning::Resized { from, to } => {
                warn!("payload resized from {}x{} to {}x{}", from.0, from.1, to.0, to.1)
            }
            EmbedWarning::SameSource => warn!("cover and payload share the same source image"),
        }
    }

    Ok(EmbedReport {
        stego,
        requested: fit.requested,
        achieved: fit.achieved,
        plan: fit.plan,
        warnings,
    })
}

/// Plain extract: locate the header and read the matrix behind it.
///
/// # Errors
/// [`StegoError::Framing`] when the header cannot be located or the decoded
/// matrix is larger than the bits left in the image.
pub fn extract(stego: &RgbImage, config: &WatermarkConfig) -> Result<PayloadMatrix> {
    extract_framed(stego, 0, config).map(|(_, matrix)| matrix)
}

/// Extract a matrix preceded by a `prefix_bits` block; returns both.
pub(crate) fn extract_framed(
    stego: &RgbImage,
    prefix_bits: usize,
    config: &WatermarkConfig,
) -> Result<(Vec<bool>, PayloadMatrix)> {
    let mut reader = BitReader::new(stego, config.channel);
    let scanned = scan_header(&mut reader, prefix_bits, config.terminator_lookahead)?;
    let header = scanned.header;

    let needed = header.payload_bits();
    let remaining = reader.len();
    if needed > remaining {
        return Err(StegoError::Framing(format!(
            "malformed header: {}x{} matrix needs {needed} bits, only {remaining} remain",
            header.width, header.height
        )));
    }

    let bits: Vec<bool> = reader.take(needed).collect();
    debug!("extracted {}x{} matrix", header.width, header.height);
    let matrix = PayloadMatrix::from_bits(header.width, header.height, bits)?;
    Ok((scanned.prefix, matrix))
}

/// Decode cover bytes into an RGB buffer, refusing lossy formats.
///
/// # Errors
/// [`StegoError::IoFormat`] for JPEG or lossy WebP input,
/// [`StegoError::Image`] when the bytes cannot be decoded.
pub fn load_cover(bytes: &[u8]) -> Result<RgbImage> {
    let format = image::guess_format(bytes)?;
    if is_lossy(format, bytes) {
        return Err(StegoError::IoFormat(format!(
            "{format:?} is lossy; LSB payloads need a lossless cover"
        )));
    }
    let img = image::load_from_memory_with_format(bytes, format)?;
    Ok(img.to_rgb8())
}

fn is_lossy(format: ImageFormat, bytes: &[u8]) -> bool {
    match format {
        ImageFormat::Jpeg => true,
        // RIFF....WEBPVP8 (lossy) vs VP8L (lossless)
        ImageFormat::WebP => bytes.get(12..16) == Some(b"VP8 ".as_slice()),
        _ => false,
    }
}

/// Encode a stego image as PNG.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Measured difference between a cover and its stego image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageComparison {
    /// Mean squared error over all channels.
    pub mse: f64,
    pub psnr_db: f64,
    /// Pixels with at least one differing channel.
    pub changed_pixels: usize,
}

/// Compare two images of the same size.
pub fn compare_images(a: &RgbImage, b: &RgbImage) -> Result<ImageComparison> {
    if a.dimensions() != b.dimensions() {
        return Err(StegoError::IoFormat(format!(
            "cannot compare {}x{} with {}x{}",
            a.width(),
            a.height(),
            b.width(),
            b.height()
        )));
    }
    let mut sq_sum = 0u64;
    let mut changed_pixels = 0usize;
    for (pa, pb) in a.chunks_exact(CHANNELS).zip(b.chunks_exact(CHANNELS)) {
        let mut changed = false;
        for (&x, &y) in pa.iter().zip(pb) {
            let d = x.abs_diff(y) as u64;
            sq_sum += d * d;
            changed |= d != 0;
        }
        changed_pixels += changed as usize;
    }
    let samples = a.as_raw().len();
    let mse = if samples == 0 { 0.0 } else { sq_sum as f64 / samples as f64 };
    Ok(ImageComparison { mse, psnr_db: psnr(mse), changed_pixels })
}
