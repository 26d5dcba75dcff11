//! Loading of the recorded image.

use super::{Check, CheckResult, CheckType, Comparison};
use crate::diff::{AlternativeDiff, PropertyValue};
use crate::result::PixelCheckResult;
use crate::store::ImageStore;
use std::sync::Arc;

/// Loads the alternative's saved image. Failing this fails the alternative.
#[derive(Clone)]
pub struct LoadRecordedCheck {
    store: Arc<dyn ImageStore>,
}

impl std::fmt::Debug for LoadRecordedCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadRecordedCheck").finish_non_exhaustive()
    }
}

impl LoadRecordedCheck {
    /// Create a check reading from `store`
    #[must_use]
    pub fn new(store: Arc<dyn ImageStore>) -> Self {
        Self { store }
    }

    fn load(&self, comparison: &mut Comparison) -> bool {
        if comparison.saved.is_none() {
            comparison.saved = self
                .store
                .load(&comparison.scope, &comparison.alternative.path);
        }
        if comparison.saved.is_none() {
            tracing::info!(
                scope = %comparison.scope,
                path = %comparison.alternative.path,
                "pixelcheck.load.missing"
            );
        }
        comparison.saved.is_some()
    }
}

impl Check for LoadRecordedCheck {
    fn check_type(&self) -> CheckType {
        CheckType::LoadRecorded
    }

    fn run(&self, result: &mut CheckResult) -> bool {
        self.load(&mut result.comparison)
    }

    fn diff(&self, diff: &mut AlternativeDiff) -> PixelCheckResult<bool> {
        let loaded = self.load(&mut diff.comparison);
        let path = diff.comparison.alternative.path.clone();
        if !loaded {
            diff.log(format!("recorded image {path} could not be loaded"));
        }
        diff.set_property(CheckType::LoadRecorded, "path", PropertyValue::Text(path));
        diff.set_property(CheckType::LoadRecorded, "loaded", PropertyValue::Flag(loaded));
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screenshot::ScreenshotCheck;
    use crate::store::MemoryImageStore;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_loads_from_scope() {
        let store = Arc::new(MemoryImageStore::new());
        store.insert("suite", "main.png", RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])));
        let screenshot = ScreenshotCheck::new("t", "suite", "main.png", "h");
        let mut result =
            CheckResult::new(Comparison::new(&screenshot, screenshot.main.clone(), None, None));
        let check = LoadRecordedCheck::new(store);
        assert!(check.run(&mut result));
        assert!(result.comparison.saved.is_some());
    }

    #[test]
    fn test_missing_image_fails() {
        let store = Arc::new(MemoryImageStore::new());
        let screenshot = ScreenshotCheck::new("t", "suite", "gone.png", "h");
        let mut result =
            CheckResult::new(Comparison::new(&screenshot, screenshot.main.clone(), None, None));
        assert!(!LoadRecordedCheck::new(store).run(&mut result));
    }
}
