//! Minimum strict-match ratio.

use super::{Check, CheckResult, CheckType, Comparison};
use crate::diff::{AlternativeDiff, PropertyValue};
use crate::result::PixelCheckResult;

/// Fails when the strict confidence is below the global or test minimum
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceCheck {
    global_min: f64,
}

impl ConfidenceCheck {
    /// Create a check with a global minimum confidence
    #[must_use]
    pub const fn new(global_min: f64) -> Self {
        Self { global_min }
    }

    /// Confidence the alternative must reach
    #[must_use]
    pub fn required(&self, comparison: &Comparison) -> f64 {
        self.global_min.max(comparison.confidence)
    }

    fn evaluate_confidence(&self, comparison: &Comparison) -> Option<(f64, bool)> {
        let confidence = comparison.strict_summary()?.confidence();
        let passed = confidence >= self.global_min && confidence >= comparison.confidence;
        Some((confidence, passed))
    }
}

impl Check for ConfidenceCheck {
    fn check_type(&self) -> CheckType {
        CheckType::Confidence
    }

    fn run(&self, result: &mut CheckResult) -> bool {
        let comparison = &result.comparison;
        match self.evaluate_confidence(comparison) {
            Some((confidence, passed)) => {
                if !passed {
                    tracing::debug!(
                        confidence,
                        required = self.required(comparison),
                        alternative = %comparison.alternative.path,
                        "pixelcheck.confidence.below_minimum"
                    );
                }
                passed
            }
            None => false,
        }
    }

    fn diff(&self, diff: &mut AlternativeDiff) -> PixelCheckResult<bool> {
        let kind = CheckType::Confidence;
        let required = self.required(&diff.comparison);
        diff.set_property(kind, "required", PropertyValue::Number(required));
        let Some((confidence, passed)) = self.evaluate_confidence(&diff.comparison) else {
            diff.log("confidence unavailable: no strict summary");
            return Ok(false);
        };
        diff.set_property(kind, "confidence", PropertyValue::Number(confidence));
        if !passed {
            diff.log(format!("confidence {confidence:.6} below required {required:.6}"));
        }
        Ok(passed)
    }
}
