//! Per-channel tolerance comparison of the strict failures.

use super::{Check, CheckResult, CheckType};
use crate::diff::{AlternativeDiff, PropertyValue};
use crate::hint_mask::HintMaskHelper;
use crate::raster::{RasterImage, TRANSPARENT};
use crate::result::PixelCheckResult;
use crate::summary::PixelSummary;
use image::Rgba;
use rayon::prelude::*;
use std::collections::BTreeSet;

/// Tolerance evaluation of one pixel pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzyPixel {
    /// Visualisation colour; transparent when every channel is within tolerance
    pub color: Rgba<u8>,
    /// Largest absolute channel difference
    pub component: u16,
    /// Sum of absolute channel differences
    pub global: u16,
    /// Some channel differs by more than the tolerance
    pub failing: bool,
}

/// Compare the RGB channels of two pixels under `tolerance`.
///
/// Each channel maps to `128 + excess / 2`, where `excess` is the signed
/// difference beyond the tolerance, so the visualisation pixel is mid-grey
/// on channels that are within tolerance.
#[must_use]
pub fn fuzzy_pixel(current: &Rgba<u8>, saved: &Rgba<u8>, tolerance: u8) -> FuzzyPixel {
    let t = i16::from(tolerance);
    let mut channels = [0u8; 3];
    let mut component = 0u16;
    let mut global = 0u16;
    let mut failing = false;
    for (i, channel) in channels.iter_mut().enumerate() {
        let diff = i16::from(current.0[i]) - i16::from(saved.0[i]);
        let abs = diff.unsigned_abs();
        component = component.max(abs);
        global += abs;
        let excess = if diff > t {
            diff - t
        } else if diff < -t {
            diff + t
        } else {
            0
        };
        failing |= excess != 0;
        *channel = (128 + excess / 2).clamp(0, 255) as u8;
    }
    let color = if failing {
        Rgba([channels[0], channels[1], channels[2], 255])
    } else {
        TRANSPARENT
    };
    FuzzyPixel {
        color,
        component,
        global,
        failing,
    }
}

/// Result of re-examining the strict failures under tolerance
#[derive(Debug, Clone)]
pub struct FuzzyScan {
    /// Pixels still failing
    pub summary: PixelSummary,
    /// Largest channel difference among the strict failures
    pub max_component: u16,
    /// Largest summed difference among the strict failures
    pub max_global: u16,
    /// Visualisation colour of every still-failing pixel
    pub pixels: Vec<(u32, u32, Rgba<u8>)>,
}

impl FuzzyScan {
    /// Paint the failing pixels onto a transparent canvas
    #[must_use]
    pub fn render(&self, width: u32, height: u32) -> RasterImage {
        let mut image = RasterImage::new(width, height);
        for (x, y, color) in &self.pixels {
            if *x < width && *y < height {
                image.put_pixel(*x, *y, *color);
            }
        }
        image
    }
}

/// Re-examine only `strict` failures, one column per task
#[must_use]
pub fn fuzzy_scan(current: &RasterImage, saved: &RasterImage, strict: &PixelSummary, tolerance: u8) -> FuzzyScan {
    let columns: Vec<(u32, Vec<(u32, FuzzyPixel)>)> = strict
        .column_indices()
        .into_par_iter()
        .map(|x| {
            let rows = strict
                .column(x)
                .map(|rows| {
                    rows.iter()
                        .map(|&y| (y, fuzzy_pixel(current.get_pixel(x, y), saved.get_pixel(x, y), tolerance)))
                        .collect()
                })
                .unwrap_or_default();
            (x, rows)
        })
        .collect();

    let mut max_component = 0;
    let mut max_global = 0;
    let mut pixels = Vec::new();
    let mut failing_columns = Vec::with_capacity(columns.len());
    for (x, rows) in columns {
        let mut failing = BTreeSet::new();
        for (y, px) in rows {
            max_component = max_component.max(px.component);
            max_global = max_global.max(px.global);
            if px.failing {
                failing.insert(y);
                pixels.push((x, y, px.color));
            }
        }
        failing_columns.push((x, failing));
    }
    FuzzyScan {
        summary: PixelSummary::from_columns(strict.total_pixels(), failing_columns),
        max_component,
        max_global,
        pixels,
    }
}

/// Passes when every strict failure is within tolerance
#[derive(Debug, Clone)]
pub struct FuzzyCheck {
    tolerance: u8,
    hints: HintMaskHelper,
}

impl FuzzyCheck {
    /// Create a fuzzy check
    #[must_use]
    pub const fn new(tolerance: u8, hints: HintMaskHelper) -> Self {
        Self { tolerance, hints }
    }
}

impl Check for FuzzyCheck {
    fn check_type(&self) -> CheckType {
        CheckType::Fuzzy
    }

    fn run(&self, result: &mut CheckResult) -> bool {
        let comparison = &mut result.comparison;
        let (Some((current, saved)), Some(strict)) =
            (comparison.image_pair(), comparison.strict_summary().cloned())
        else {
            return false;
        };
        let scan = fuzzy_scan(&current, &saved, &strict, self.tolerance);
        let passed = scan.summary.is_empty();
        comparison.set_fuzzy_summary(scan.summary);
        passed
    }

    fn diff(&self, diff: &mut AlternativeDiff) -> PixelCheckResult<bool> {
        let kind = CheckType::Fuzzy;
        let (Some((current, saved)), Some(strict)) =
            (diff.comparison.image_pair(), diff.comparison.strict_summary().cloned())
        else {
            diff.log("fuzzy comparison needs both images and a strict summary");
            return Ok(false);
        };
        let scan = fuzzy_scan(&current, &saved, &strict, self.tolerance);
        let (width, height) = current.dimensions();
        diff.set_property(kind, "tolerance", PropertyValue::Number(f64::from(self.tolerance)));
        diff.set_property(kind, "failed_pixels", PropertyValue::Number(scan.summary.failed_count() as f64));
        diff.set_property(kind, "max_component_diff", PropertyValue::Number(f64::from(scan.max_component)));
        diff.set_property(kind, "max_global_diff", PropertyValue::Number(f64::from(scan.max_global)));
        diff.set_image(kind, scan.render(width, height));
        diff.set_hint(kind, self.hints.render(&scan.summary, width, height));
        let passed = scan.summary.is_empty();
        diff.comparison.set_fuzzy_summary(scan.summary);
        Ok(passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::strict_scan;
    use proptest::prelude::*;

    #[test]
    fn test_tolerance_boundary() {
        let a = Rgba([100, 100, 100, 255]);
        assert!(!fuzzy_pixel(&a, &Rgba([110, 100, 100, 255]), 10).failing);
        assert!(fuzzy_pixel(&a, &Rgba([111, 100, 100, 255]), 10).failing);
        assert!(!fuzzy_pixel(&a, &Rgba([90, 110, 90, 255]), 10).failing);
    }

    #[test]
    fn test_resolved_pixel_is_transparent() {
        let px = fuzzy_pixel(&Rgba([10, 10, 10, 255]), &Rgba([12, 8, 10, 255]), 2);
        assert_eq!(px.color, TRANSPARENT);
        assert_eq!(px.component, 2);
        assert_eq!(px.global, 4);
    }

    #[test]
    fn test_visualisation_channels() {
        // current - saved = +30, -30, 0 with tolerance 10 => excess +20, -20, 0
        let px = fuzzy_pixel(&Rgba([130, 70, 50, 255]), &Rgba([100, 100, 50, 255]), 10);
        assert!(px.failing);
        assert_eq!(px.color, Rgba([138, 118, 128, 255]));
    }

    #[test]
    fn test_scan_only_revisits_strict_failures() {
        let a = RasterImage::from_pixel(6, 6, Rgba([50, 50, 50, 255]));
        let mut b = a.clone();
        b.put_pixel(1, 1, Rgba([53, 50, 50, 255]));
        b.put_pixel(4, 2, Rgba([90, 50, 50, 255]));
        let strict = strict_scan(&a, &b, &[]);
        assert_eq!(strict.failed_count(), 2);
        let scan = fuzzy_scan(&a, &b, &strict, 5);
        assert_eq!(scan.summary.failed_count(), 1);
        assert!(scan.summary.contains(4, 2));
        assert_eq!(scan.max_component, 40);
        let image = scan.render(6, 6);
        assert_eq!(*image.get_pixel(1, 1), TRANSPARENT);
        assert_eq!(image.get_pixel(4, 2).0[3], 255);
    }

    proptest! {
        #[test]
        fn prop_within_tolerance_never_fails(base in any::<[u8; 3]>(), delta in any::<[i8; 3]>(), t in any::<u8>()) {
            let shifted: Vec<u8> = base
                .iter()
                .zip(delta.iter())
                .map(|(b, d)| {
                    let bounded = i16::from(*d).clamp(-i16::from(t), i16::from(t));
                    (i16::from(*b) + bounded).clamp(0, 255) as u8
                })
                .collect();
            let a = Rgba([base[0], base[1], base[2], 255]);
            let b = Rgba([shifted[0], shifted[1], shifted[2], 255]);
            prop_assert!(!fuzzy_pixel(&a, &b, t).failing);
        }
    }
}
