// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Monochrome payload bitmap.
//!
//! A [`PayloadMatrix`] is the credential rendered as a grid of on/off cells
//! (a QR symbol in practice). `true` marks a dark module. Cells are stored
//! row-major, which is also the order they are embedded.

use image::{GrayImage, Luma};

use crate::stego::error::{Result, StegoError};

/// Luma values below this are read as dark (set) cells.
const DARK_THRESHOLD: u8 = 128;

/// A row-major bitmap of `width * height` cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadMatrix {
    width: u16,
    height: u16,
    bits: Vec<bool>,
}

impl PayloadMatrix {
    /// An all-light matrix of the given size.
    ///
    /// # Errors
    /// [`StegoError::InvalidMatrix`] if either dimension is zero.
    pub fn new(width: u16, height: u16) -> Result<Self> {
        Self::from_bits(width, height, vec![false; width as usize * height as usize])
    }

    /// Build a matrix from row-major bits.
    ///
    /// # Errors
    /// [`StegoError::InvalidMatrix`] if a dimension is zero or `bits.len()`
    /// differs from `width * height`.
    pub fn from_bits(width: u16, height: u16, bits: Vec<bool>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(StegoError::InvalidMatrix(format!(
                "dimensions must be non-zero, got {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize;
        if bits.len() != expected {
            return Err(StegoError::InvalidMatrix(format!(
                "{width}x{height} needs {expected} bits, got {}",
                bits.len()
            )));
        }
        Ok(Self { width, height, bits })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Number of cells (= embedded payload bits).
    pub fn bit_count(&self) -> usize {
        self.bits.len()
    }

    /// Row-major cell values.
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// Cell at column `x`, row `y`.
    pub fn get(&self, x: u16, y: u16) -> bool {
        self.bits[y as usize * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u16, y: u16, value: bool) {
        let idx = y as usize * self.width as usize + x as usize;
        self.bits[idx] = value;
    }

    /// Nearest-neighbour resample to `width x height`.
    ///
    /// Only ever picks existing cell values, so the result stays strictly
    /// binary. Resampling to the current size returns an identical matrix.
    pub fn resize_nearest(&self, width: u16, height: u16) -> Result<Self> {
        if width == self.width && height == self.height {
            return Ok(self.clone());
        }
        let mut bits = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height as usize {
            let sy = y * self.height as usize / height.max(1) as usize;
            for x in 0..width as usize {
                let sx = x * self.width as usize / width.max(1) as usize;
                bits.push(self.bits[sy * self.width as usize + sx]);
            }
        }
        Self::from_bits(width, height, bits)
    }

    /// Threshold a grayscale bitmap into a matrix, one cell per `scale` pixels.
    ///
    /// Each cell samples the top-left pixel of its `scale x scale` block, so a
    /// QR image rendered with box size `scale` maps back to its modules.
    pub fn from_luma(img: &GrayImage, scale: u32) -> Result<Self> {
        let scale = scale.max(1);
        let (w, h) = (img.width() / scale, img.height() / scale);
        let width = u16::try_from(w)
            .map_err(|_| StegoError::InvalidMatrix(format!("width {w} exceeds 65535")))?;
        let height = u16::try_from(h)
            .map_err(|_| StegoError::InvalidMatrix(format!("height {h} exceeds 65535")))?;
        let mut bits = Vec::with_capacity(w as usize * h as usize);
        for y in 0..h {
            for x in 0..w {
                bits.push(img.get_pixel(x * scale, y * scale).0[0] < DARK_THRESHOLD);
            }
        }
        Self::from_bits(width, height, bits)
    }

    /// Render to a black-on-white grayscale bitmap, `scale` pixels per cell.
    ///
    /// # Errors
    /// [`StegoError::InvalidMatrix`] if the scaled bitmap would not fit in
    /// `u32` dimensions or addressable memory.
    pub fn to_luma(&self, scale: u32) -> Result<GrayImage> {
        let scale = scale.max(1);
        let too_large =
            || StegoError::InvalidMatrix(format!("{}x{} at scale {scale} is too large", self.width, self.height));
        let w = (self.width as u32).checked_mul(scale).ok_or_else(too_large)?;
        let h = (self.height as u32).checked_mul(scale).ok_or_else(too_large)?;
        (w as usize).checked_mul(h as usize).ok_or_else(too_large)?;
        Ok(GrayImage::from_fn(w, h, |x, y| {
            let dark = self.get((x / scale) as u16, (y / scale) as u16);
            Luma([if dark { 0 } else { 255 }])
        }))
    }
}
