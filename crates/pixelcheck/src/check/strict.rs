//! Pixel-exact comparison.

use super::{Check, CheckResult, CheckType};
use crate::config::ShadingConfig;
use crate::diff::{AlternativeDiff, PropertyValue};
use crate::hint_mask::HintMaskHelper;
use crate::raster::{same_rgb, RasterImage, ShadedRegion, TRANSPARENT};
use crate::result::PixelCheckResult;
use crate::summary::PixelSummary;
use image::Rgba;
use rayon::prelude::*;
use std::collections::BTreeSet;

/// Colour of a strictly failing pixel in the review image
pub const STRICT_FAIL_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Compare every RGB pixel, skipping `excluded` regions, one column per task.
///
/// Both images must have the same dimensions.
#[must_use]
pub fn strict_scan(current: &RasterImage, saved: &RasterImage, excluded: &[ShadedRegion]) -> PixelSummary {
    let (width, height) = current.dimensions();
    let columns: Vec<(u32, BTreeSet<u32>)> = (0..width)
        .into_par_iter()
        .map(|x| {
            let rows = (0..height)
                .filter(|&y| !excluded.iter().any(|r| r.contains(x, y)))
                .filter(|&y| !same_rgb(current.get_pixel(x, y), saved.get_pixel(x, y)))
                .collect();
            (x, rows)
        })
        .collect();
    PixelSummary::from_columns(u64::from(width) * u64::from(height), columns)
}

/// Zero differing pixels outside shaded regions
#[derive(Debug, Clone)]
pub struct StrictCheck {
    check_shaded: bool,
    margin: u32,
    hints: HintMaskHelper,
}

impl StrictCheck {
    /// Create a strict check
    #[must_use]
    pub const fn new(shading: &ShadingConfig, hints: HintMaskHelper) -> Self {
        Self {
            check_shaded: shading.check_shaded,
            margin: shading.margin,
            hints,
        }
    }

    fn excluded(&self, shaded: &[ShadedRegion]) -> Vec<ShadedRegion> {
        if self.check_shaded {
            Vec::new()
        } else {
            shaded.iter().map(|r| r.inflate(self.margin)).collect()
        }
    }

    fn render(current: &RasterImage, summary: &PixelSummary, excluded: &[ShadedRegion]) -> RasterImage {
        let (width, height) = current.dimensions();
        RasterImage::from_fn(width, height, |x, y| {
            if summary.contains(x, y) {
                STRICT_FAIL_COLOR
            } else if excluded.iter().any(|r| r.contains(x, y)) {
                TRANSPARENT
            } else {
                let Rgba([r, g, b, _]) = *current.get_pixel(x, y);
                Rgba([r / 2, g / 2, b / 2, 128])
            }
        })
    }
}

impl Check for StrictCheck {
    fn check_type(&self) -> CheckType {
        CheckType::Strict
    }

    fn run(&self, result: &mut CheckResult) -> bool {
        let comparison = &mut result.comparison;
        let Some((current, saved)) = comparison.image_pair() else {
            return false;
        };
        let excluded = self.excluded(&comparison.shaded);
        let summary = strict_scan(&current, &saved, &excluded);
        let passed = summary.is_empty();
        comparison.set_strict_summary(summary);
        passed
    }

    fn diff(&self, diff: &mut AlternativeDiff) -> PixelCheckResult<bool> {
        let kind = CheckType::Strict;
        let Some((current, saved)) = diff.comparison.image_pair() else {
            diff.log("strict comparison needs both images");
            return Ok(false);
        };
        if current.dimensions() != saved.dimensions() {
            diff.log("strict comparison skipped: dimensions differ");
            return Ok(false);
        }
        let excluded = self.excluded(&diff.comparison.shaded);
        let summary = strict_scan(&current, &saved, &excluded);
        let (width, height) = current.dimensions();
        diff.set_property(kind, "failed_pixels", PropertyValue::Number(summary.failed_count() as f64));
        diff.set_property(kind, "total_pixels", PropertyValue::Number(summary.total_pixels() as f64));
        diff.set_image(kind, Self::render(&current, &summary, &excluded));
        diff.set_hint(kind, self.hints.render(&summary, width, height));
        let passed = summary.is_empty();
        diff.comparison.set_strict_summary(summary);
        Ok(passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(w: u32, h: u32) -> RasterImage {
        RasterImage::from_pixel(w, h, Rgba([100, 100, 100, 255]))
    }

    #[test]
    fn test_identical_images_have_no_failures() {
        let a = gray(10, 10);
        let summary = strict_scan(&a, &a.clone(), &[]);
        assert!(summary.is_empty());
        assert_eq!(summary.total_pixels(), 100);
    }

    #[test]
    fn test_alpha_is_ignored() {
        let a = gray(4, 4);
        let b = RasterImage::from_pixel(4, 4, Rgba([100, 100, 100, 0]));
        assert!(strict_scan(&a, &b, &[]).is_empty());
    }

    #[test]
    fn test_differences_are_recorded_per_column() {
        let a = gray(10, 10);
        let mut b = gray(10, 10);
        b.put_pixel(3, 4, Rgba([101, 100, 100, 255]));
        b.put_pixel(3, 7, Rgba([0, 0, 0, 255]));
        b.put_pixel(8, 0, Rgba([100, 100, 99, 255]));
        let summary = strict_scan(&a, &b, &[]);
        assert_eq!(summary.failed_count(), 3);
        assert_eq!(summary.column_indices(), vec![3, 8]);
        assert!(summary.contains(3, 7));
    }

    #[test]
    fn test_shaded_region_excluded() {
        let a = gray(10, 10);
        let mut b = gray(10, 10);
        b.put_pixel(5, 5, Rgba([0, 0, 0, 255]));
        b.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        let summary = strict_scan(&a, &b, &[ShadedRegion::new(4, 4, 3, 3)]);
        assert_eq!(summary.failed_count(), 1);
        assert!(summary.contains(0, 0));
    }

    #[test]
    fn test_check_shaded_compares_everything() {
        let check = StrictCheck::new(
            &ShadingConfig {
                check_shaded: true,
                margin: 5,
            },
            HintMaskHelper::default(),
        );
        assert!(check.excluded(&[ShadedRegion::new(0, 0, 2, 2)]).is_empty());
        let margin_only = StrictCheck::new(
            &ShadingConfig {
                check_shaded: false,
                margin: 1,
            },
            HintMaskHelper::default(),
        );
        assert_eq!(
            margin_only.excluded(&[ShadedRegion::new(2, 2, 2, 2)]),
            vec![ShadedRegion::new(1, 1, 4, 4)]
        );
    }
}
