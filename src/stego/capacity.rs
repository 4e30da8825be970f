// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Capacity planning and shrink-to-fit.
//!
//! One payload bit rides in one pixel (a single fixed channel), so a
//! `W x H` cover carries exactly `W * H` bits. Framing overhead is 40 bits
//! on the plain path and 120 bits on the secure path (80-bit security header
//! in front of the 40-bit dimension header).

use std::borrow::Cow;

use log::{debug, info};

use crate::stego::error::{Result, StegoError};
use crate::stego::frame::HEADER_BITS;
use crate::stego::matrix::PayloadMatrix;
use crate::stego::security::SECURITY_HEADER_BITS;

/// Which framing precedes the matrix bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `[width][height][terminator]`
    Plain,
    /// `[fingerprint][timestamp][crc16][width][height][terminator]`
    Secure,
}

impl Framing {
    /// Total header bits for this framing.
    pub const fn header_bits(self) -> usize {
        match self {
            Framing::Plain => HEADER_BITS,
            Framing::Secure => SECURITY_HEADER_BITS + HEADER_BITS,
        }
    }
}

/// What to do when the matrix does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShrinkPolicy {
    /// Nearest-neighbour shrink to the largest square that fits.
    #[default]
    AutoShrink,
    /// Refuse with a [`StegoError::Capacity`] carrying the exact deficit.
    Strict,
}

/// Advisory raised from the utilization percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilizationWarning {
    /// Above 90%: visible artefacts become likely.
    QualityRisk,
    /// 75–90%: a smaller matrix would leave more headroom.
    ConsiderShrinking,
    /// 50–75%: worth knowing, no action needed.
    Informational,
}

impl UtilizationWarning {
    fn from_utilization(pct: f64) -> Option<Self> {
        if pct > 90.0 {
            Some(Self::QualityRisk)
        } else if pct > 75.0 {
            Some(Self::ConsiderShrinking)
        } else if pct > 50.0 {
            Some(Self::Informational)
        } else {
            None
        }
    }

    /// Human-readable advisory text.
    pub fn message(self) -> &'static str {
        match self {
            Self::QualityRisk => "very high capacity utilization (>90%): image quality may be affected",
            Self::ConsiderShrinking => "high capacity utilization (>75%): consider a smaller payload matrix",
            Self::Informational => "moderate capacity utilization (>50%)",
        }
    }
}

/// Result of [`plan`]: does the matrix fit, and how tightly.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityPlan {
    pub fits: bool,
    /// Matrix bits plus header bits.
    pub total_bits_needed: usize,
    /// `cover_w * cover_h`.
    pub cover_capacity_bits: usize,
    /// `total_bits_needed / cover_capacity_bits * 100`.
    pub utilization_pct: f64,
    /// Spare bits after embedding; negative when the payload does not fit.
    pub remaining_bits: i64,
    pub warning: Option<UtilizationWarning>,
}

impl CapacityPlan {
    /// Bits missing for the payload to fit (0 when it fits).
    pub fn deficit(&self) -> usize {
        self.total_bits_needed.saturating_sub(self.cover_capacity_bits)
    }
}

/// Plan a plain (non-secure) embed of a `matrix_w x matrix_h` payload.
pub fn plan(matrix_w: u16, matrix_h: u16, cover_w: u32, cover_h: u32) -> CapacityPlan {
    plan_framed(matrix_w, matrix_h, cover_w, cover_h, Framing::Plain)
}

/// Plan a secure embed (security header included in the overhead).
pub fn plan_secure(matrix_w: u16, matrix_h: u16, cover_w: u32, cover_h: u32) -> CapacityPlan {
    plan_framed(matrix_w, matrix_h, cover_w, cover_h, Framing::Secure)
}

/// Plan an embed under an explicit framing.
pub fn plan_framed(
    matrix_w: u16,
    matrix_h: u16,
    cover_w: u32,
    cover_h: u32,
    framing: Framing,
) -> CapacityPlan {
    let cover_capacity_bits = cover_w as usize * cover_h as usize;
    let total_bits_needed = matrix_w as usize * matrix_h as usize + framing.header_bits();
    let utilization_pct = if cover_capacity_bits == 0 {
        f64::INFINITY
    } else {
        total_bits_needed as f64 / cover_capacity_bits as f64 * 100.0
    };
    CapacityPlan {
        fits: total_bits_needed <= cover_capacity_bits,
        total_bits_needed,
        cover_capacity_bits,
        utilization_pct,
        remaining_bits: cover_capacity_bits as i64 - total_bits_needed as i64,
        warning: UtilizationWarning::from_utilization(utilization_pct),
    }
}

/// Largest square side `s` with `s * s + header_bits <= capacity_bits`.
fn max_square_side(capacity_bits: usize, header_bits: usize) -> usize {
    let available = capacity_bits.saturating_sub(header_bits);
    isqrt(available).min(u16::MAX as usize)
}

/// Integer square root (floor).
fn isqrt(n: usize) -> usize {
    if n < 2 {
        return n;
    }
    // Float estimate, then correct for rounding in either direction.
    let mut s = (n as f64).sqrt() as usize;
    while s * s > n {
        s -= 1;
    }
    while (s + 1) * (s + 1) <= n {
        s += 1;
    }
    s
}

/// Shrink `matrix` to the largest square that fits `cover_capacity_bits`.
///
/// A matrix that already fits is returned unchanged, so applying this twice
/// at the same capacity equals applying it once.
///
/// # Errors
/// [`StegoError::Capacity`] when not even a 1x1 matrix plus header fits.
pub fn resize_to_fit<'a>(
    matrix: &'a PayloadMatrix,
    cover_capacity_bits: usize,
    framing: Framing,
) -> Result<Cow<'a, PayloadMatrix>> {
    let header_bits = framing.header_bits();
    if matrix.bit_count() + header_bits <= cover_capacity_bits {
        return Ok(Cow::Borrowed(matrix));
    }
    let side = max_square_side(cover_capacity_bits, header_bits);
    if side == 0 {
        return Err(StegoError::Capacity {
            needed: header_bits + 1,
            available: cover_capacity_bits,
        });
    }
    let side = side as u16;
    info!(
        "shrinking payload matrix {}x{} -> {side}x{side} to fit {cover_capacity_bits} bits",
        matrix.width(),
        matrix.height()
    );
    Ok(Cow::Owned(matrix.resize_nearest(side, side)?))
}

/// A matrix ready to embed, with the requested-vs-achieved sizes.
#[derive(Debug, Clone)]
pub struct FitOutcome<'a> {
    pub matrix: Cow<'a, PayloadMatrix>,
    pub requested: (u16, u16),
    pub achieved: (u16, u16),
    /// Plan for the achieved size.
    pub plan: CapacityPlan,
}

impl FitOutcome<'_> {
    /// True when auto-shrink altered the payload.
    pub fn was_resized(&self) -> bool {
        self.requested != self.achieved
    }
}

/// Check capacity up front and apply `policy` when the matrix is too large.
///
/// # Errors
/// [`StegoError::Capacity`] under [`ShrinkPolicy::Strict`] when the matrix
/// does not fit, or under either policy when nothing fits at all.
pub fn fit_matrix<'a>(
    matrix: &'a PayloadMatrix,
    cover_w: u32,
    cover_h: u32,
    framing: Framing,
    policy: ShrinkPolicy,
) -> Result<FitOutcome<'a>> {
    let requested = (matrix.width(), matrix.height());
    let initial = plan_framed(requested.0, requested.1, cover_w, cover_h, framing);
    debug!(
        "capacity plan: {} of {} bits ({:.1}%)",
        initial.total_bits_needed, initial.cover_capacity_bits, initial.utilization_pct
    );

    if initial.fits {
        return Ok(FitOutcome {
            matrix: Cow::Borrowed(matrix),
            requested,
            achieved: requested,
            plan: initial,
        });
    }

    if policy == ShrinkPolicy::Strict {
        return Err(StegoError::Capacity {
            needed: initial.total_bits_needed,
            available: initial.cover_capacity_bits,
        });
    }

    let resized = resize_to_fit(matrix, initial.cover_capacity_bits, framing)?;
    let achieved = (resized.width(), resized.height());
    let plan = plan_framed(achieved.0, achieved.1, cover_w, cover_h, framing);
    Ok(FitOutcome { matrix: resized, requested, achieved, plan })
}

/// Capacity profile of a cover image.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverAnalysis {
    pub total_pixels: usize,
    /// One bit per pixel.
    pub usable_capacity: usize,
    pub header_bits: usize,
    pub available_for_matrix: usize,
    /// Largest square matrix side that fits.
    pub max_matrix_side: u16,
    /// Largest square side keeping utilization at or below 50%.
    pub recommended_matrix_side: u16,
    /// Share of the capacity left for the matrix after framing, in percent.
    pub efficiency_score: f64,
}

/// Profile a `cover_w x cover_h` cover for the given framing.
pub fn analyze_cover(cover_w: u32, cover_h: u32, framing: Framing) -> CoverAnalysis {
    let total_pixels = cover_w as usize * cover_h as usize;
    let header_bits = framing.header_bits();
    let available_for_matrix = total_pixels.saturating_sub(header_bits);
    let efficiency_score = if total_pixels == 0 {
        0.0
    } else {
        (available_for_matrix as f64 / total_pixels as f64 * 1000.0).round() / 10.0
    };
    CoverAnalysis {
        total_pixels,
        usable_capacity: total_pixels,
        header_bits,
        available_for_matrix,
        max_matrix_side: max_square_side(total_pixels, header_bits) as u16,
        recommended_matrix_side: max_square_side(total_pixels / 2, header_bits) as u16,
        efficiency_score,
    }
}

/// Coarse visual-quality band derived from the predicted PSNR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// Expected distortion from embedding `bits` into a cover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityPrediction {
    /// Mean squared error over all three channels.
    pub mse: f64,
    /// Peak signal-to-noise ratio in dB (infinite when nothing changes).
    pub psnr_db: f64,
    pub level: QualityLevel,
}

/// Predict distortion assuming half of the written LSBs actually flip.
pub fn predict_quality(bits: usize, cover_w: u32, cover_h: u32) -> QualityPrediction {
    let samples = cover_w as f64 * cover_h as f64 * 3.0;
    let mse = if samples == 0.0 { 0.0 } else { bits as f64 * 0.5 / samples };
    let psnr_db = psnr(mse);
    let level = if psnr_db >= 65.0 {
        QualityLevel::Excellent
    } else if psnr_db >= 60.0 {
        QualityLevel::Good
    } else if psnr_db >= 55.0 {
        QualityLevel::Fair
    } else {
        QualityLevel::Poor
    };
    QualityPrediction { mse, psnr_db, level }
}

/// PSNR for 8-bit samples.
pub(crate) fn psnr(mse: f64) -> f64 {
    if mse <= 0.0 {
        f64::INFINITY
    } else {
        10.0 * (255.0f64 * 255.0 / mse).log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u16, h: u16) -> PayloadMatrix {
        PayloadMatrix::from_bits(w, h, vec![true; w as usize * h as usize]).unwrap()
    }

    #[test]
    fn large_cover_no_warning() {
        // 21x21 + 40 = 481 bits in 10,000
        let p = plan(21, 21, 100, 100);
        assert!(p.fits);
        assert_eq!(p.total_bits_needed, 481);
        assert_eq!(p.cover_capacity_bits, 10_000);
        assert!((p.utilization_pct - 4.81).abs() < 1e-9);
        assert_eq!(p.remaining_bits, 9_519);
        assert_eq!(p.warning, None);
    }

    #[test]
    fn tight_cover_suggests_shrinking() {
        let p = plan(21, 21, 25, 25);
        assert!(p.fits);
        assert!((p.utilization_pct - 76.96).abs() < 0.01);
        assert_eq!(p.warning, Some(UtilizationWarning::ConsiderShrinking));
    }

    #[test]
    fn warning_bands() {
        assert_eq!(UtilizationWarning::from_utilization(95.0), Some(UtilizationWarning::QualityRisk));
        assert_eq!(UtilizationWarning::from_utilization(90.0), Some(UtilizationWarning::ConsiderShrinking));
        assert_eq!(UtilizationWarning::from_utilization(60.0), Some(UtilizationWarning::Informational));
        assert_eq!(UtilizationWarning::from_utilization(50.0), None);
    }

    #[test]
    fn secure_plan_adds_security_header() {
        let p = plan_secure(21, 21, 100, 100);
        assert_eq!(p.total_bits_needed, 441 + 120);
    }

    #[test]
    fn overflow_reports_negative_remaining() {
        let p = plan(21, 21, 10, 10);
        assert!(!p.fits);
        assert_eq!(p.remaining_bits, -381);
        assert_eq!(p.deficit(), 381);
    }

    #[test]
    fn shrink_to_largest_square() {
        // 100 - 40 = 60 -> 7x7
        let m = solid(21, 21);
        let r = resize_to_fit(&m, 100, Framing::Plain).unwrap();
        assert_eq!((r.width(), r.height()), (7, 7));
        assert!(r.bits().iter().all(|b| *b));
    }

    #[test]
    fn shrink_is_idempotent() {
        let m = solid(21, 21);
        let once = resize_to_fit(&m, 100, Framing::Plain).unwrap().into_owned();
        let twice = resize_to_fit(&once, 100, Framing::Plain).unwrap();
        assert_eq!(*twice, once);
        assert!(matches!(twice, Cow::Borrowed(_)));
    }

    #[test]
    fn shrink_fails_below_header() {
        let m = solid(3, 3);
        let err = resize_to_fit(&m, 40, Framing::Plain).unwrap_err();
        assert_eq!(err.deficit(), Some(1));
        let err = resize_to_fit(&m, 30, Framing::Plain).unwrap_err();
        assert_eq!(err.deficit(), Some(11));
    }

    #[test]
    fn strict_policy_reports_exact_deficit() {
        let m = solid(21, 21);
        let err = fit_matrix(&m, 10, 10, Framing::Plain, ShrinkPolicy::Strict).unwrap_err();
        assert_eq!(err.deficit(), Some(381));
    }

    #[test]
    fn auto_shrink_reports_requested_and_achieved() {
        let m = solid(21, 21);
        let fit = fit_matrix(&m, 10, 10, Framing::Plain, ShrinkPolicy::AutoShrink).unwrap();
        assert!(fit.was_resized());
        assert_eq!(fit.requested, (21, 21));
        assert_eq!(fit.achieved, (7, 7));
        assert_eq!(fit.plan.total_bits_needed, 89);
    }

    #[test]
    fn isqrt_exact_and_between_squares() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(60), 7);
        assert_eq!(isqrt(64), 8);
        assert_eq!(isqrt(9_960), 99);
    }

    #[test]
    fn analysis_of_100x100() {
        let a = analyze_cover(100, 100, Framing::Plain);
        assert_eq!(a.usable_capacity, 10_000);
        assert_eq!(a.available_for_matrix, 9_960);
        assert_eq!(a.max_matrix_side, 99);
        // 5000 - 40 = 4960 -> 70
        assert_eq!(a.recommended_matrix_side, 70);
        assert!((a.efficiency_score - 99.6).abs() < 1e-9);
    }

    #[test]
    fn quality_prediction_bands() {
        let light = predict_quality(481, 100, 100);
        assert_eq!(light.level, QualityLevel::Excellent);
        let full = predict_quality(10_000, 100, 100);
        assert!((full.mse - 1.0 / 6.0).abs() < 1e-12);
        assert_eq!(full.level, QualityLevel::Fair);
        assert!(predict_quality(0, 10, 10).psnr_db.is_infinite());
    }
}
