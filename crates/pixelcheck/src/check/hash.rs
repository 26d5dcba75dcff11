//! Content hash comparison.

use super::{Check, CheckResult, CheckType, Comparison};
use crate::diff::{AlternativeDiff, PropertyValue};
use crate::raster::image_hash;
use crate::result::PixelCheckResult;

/// Passes when the captured image hashes to any recorded hash
#[derive(Debug, Clone, Copy, Default)]
pub struct HashCheck;

impl HashCheck {
    /// Hash of the current image, computed once per comparison
    fn current_hash(comparison: &mut Comparison) -> Option<String> {
        if comparison.current_hash.is_none() {
            let current = comparison.current.as_ref()?;
            match image_hash(&comparison.hash_algorithm, current) {
                Ok(hash) => comparison.current_hash = Some(hash),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        alternative = %comparison.alternative.path,
                        "pixelcheck.hash.unavailable"
                    );
                    return None;
                }
            }
        }
        comparison.current_hash.clone()
    }
}

impl Check for HashCheck {
    fn check_type(&self) -> CheckType {
        CheckType::Hash
    }

    fn run(&self, result: &mut CheckResult) -> bool {
        let comparison = &mut result.comparison;
        Self::current_hash(comparison)
            .is_some_and(|hash| comparison.known_hashes.contains(&hash))
    }

    fn diff(&self, diff: &mut AlternativeDiff) -> PixelCheckResult<bool> {
        let algorithm = diff.comparison.hash_algorithm.clone();
        diff.set_property(CheckType::Hash, "algorithm", PropertyValue::Text(algorithm));
        let Some(hash) = Self::current_hash(&mut diff.comparison) else {
            diff.log("current image hash unavailable");
            return Ok(false);
        };
        let matches = diff.comparison.known_hashes.contains(&hash);
        diff.set_property(CheckType::Hash, "current_hash", PropertyValue::Text(hash));
        diff.set_property(CheckType::Hash, "matches", PropertyValue::Flag(matches));
        Ok(matches)
    }
}
