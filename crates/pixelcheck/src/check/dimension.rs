//! Width/height gate.

use super::{Check, CheckResult, CheckType, Comparison};
use crate::diff::{AlternativeDiff, PropertyValue};
use crate::result::PixelCheckResult;

/// Fails unless captured and saved images have identical dimensions
#[derive(Debug, Clone, Copy, Default)]
pub struct DimensionCheck;

impl DimensionCheck {
    fn matches(comparison: &Comparison) -> bool {
        match (&comparison.current, &comparison.saved) {
            (Some(current), Some(saved)) => current.dimensions() == saved.dimensions(),
            _ => false,
        }
    }
}

impl Check for DimensionCheck {
    fn check_type(&self) -> CheckType {
        CheckType::Dimension
    }

    fn run(&self, result: &mut CheckResult) -> bool {
        Self::matches(&result.comparison)
    }

    fn diff(&self, diff: &mut AlternativeDiff) -> PixelCheckResult<bool> {
        let kind = CheckType::Dimension;
        let current = diff.comparison.current.as_ref().map(|c| c.dimensions());
        let saved = diff.comparison.saved.as_ref().map(|s| s.dimensions());
        if let Some((w, h)) = current {
            diff.set_property(kind, "current_width", PropertyValue::Number(f64::from(w)));
            diff.set_property(kind, "current_height", PropertyValue::Number(f64::from(h)));
        } else {
            diff.log("current image unavailable");
        }
        if let Some((w, h)) = saved {
            diff.set_property(kind, "saved_width", PropertyValue::Number(f64::from(w)));
            diff.set_property(kind, "saved_height", PropertyValue::Number(f64::from(h)));
        }
        let matches = Self::matches(&diff.comparison);
        if let (false, Some((cw, ch)), Some((sw, sh))) = (matches, current, saved) {
            diff.log(format!("dimensions differ: current {cw}x{ch}, saved {sw}x{sh}"));
        }
        Ok(matches)
    }
}
