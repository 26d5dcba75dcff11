//! Comparison orchestrator.
//!
//! `compare` runs the check registry against every recorded candidate in
//! list order and queues a [`Failure`] when none passes. `generate_diff`
//! rebuilds the comparison from a failure for human review, once per
//! bundle, with alternatives processed in parallel.

use crate::check::{CheckRegistry, CheckResult, CheckStatus, Comparison};
use crate::config::PixelCheckConfig;
use crate::diff::{AlternativeDiff, DiffBundle, DiffReport, PropertyValue};
use crate::failure::{Failure, FailureId};
use crate::queue::FailureQueue;
use crate::raster::RasterImage;
use crate::result::{PixelCheckError, PixelCheckResult};
use crate::screenshot::{Alternative, ScreenshotCheck};
use crate::store::ImageStore;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use uuid::Uuid;

/// Result of comparing one captured screenshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparisonOutcome {
    /// A candidate matched
    Passed {
        /// Path of the matching candidate
        alternative: String,
    },
    /// No candidate matched; the failure was queued
    Failed {
        /// Id of the queued failure
        id: FailureId,
    },
}

impl ComparisonOutcome {
    /// Whether a candidate matched
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }
}

/// Runs comparisons, queues failures and generates review diffs
#[derive(Debug)]
pub struct Comparator {
    config: PixelCheckConfig,
    store: Arc<dyn ImageStore>,
    registry: CheckRegistry,
    queue: Arc<FailureQueue>,
    bundles: Mutex<HashMap<FailureId, Arc<DiffBundle>>>,
}

impl Comparator {
    /// Comparator with the standard checks
    ///
    /// # Errors
    /// Returns error if the configuration is invalid
    pub fn new(config: PixelCheckConfig, store: Arc<dyn ImageStore>) -> PixelCheckResult<Self> {
        config.validate()?;
        let registry = CheckRegistry::standard(&config, Arc::clone(&store));
        Ok(Self::with_registry(config, store, registry))
    }

    /// Comparator over a custom check registry
    #[must_use]
    pub fn with_registry(
        config: PixelCheckConfig,
        store: Arc<dyn ImageStore>,
        registry: CheckRegistry,
    ) -> Self {
        Self {
            config,
            store,
            registry,
            queue: Arc::new(FailureQueue::new()),
            bundles: Mutex::new(HashMap::new()),
        }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &PixelCheckConfig {
        &self.config
    }

    /// Image store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ImageStore> {
        &self.store
    }

    /// Failure review queue
    #[must_use]
    pub const fn queue(&self) -> &Arc<FailureQueue> {
        &self.queue
    }

    /// Check registry
    #[must_use]
    pub const fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    /// Compare `current` against every candidate of `screenshot`
    ///
    /// # Errors
    /// Returns error only if the failure record cannot be built
    pub fn compare(
        &self,
        current: Option<Arc<RasterImage>>,
        screenshot: &ScreenshotCheck,
    ) -> PixelCheckResult<ComparisonOutcome> {
        let mut current_hash = None;
        for alternative in screenshot.candidates() {
            let comparison = Comparison::new(
                screenshot,
                alternative.clone(),
                current.clone(),
                current_hash.clone(),
            );
            let mut result = CheckResult::new(comparison);
            let status = self.registry.run(&mut result);
            current_hash = result.comparison.current_hash.take().or(current_hash);
            if status == CheckStatus::Passed {
                tracing::info!(
                    test_id = %screenshot.test_id,
                    alternative = %alternative.path,
                    executed = ?result.comparison.executed(),
                    "pixelcheck.compare.passed"
                );
                return Ok(ComparisonOutcome::Passed {
                    alternative: alternative.path.clone(),
                });
            }
        }
        let failure = self.record_failure(current, screenshot, current_hash);
        let id = failure.id();
        self.queue.add_value(failure);
        self.evict(&id);
        tracing::info!(failure = %id, pending = self.queue.pending(), "pixelcheck.compare.failed");
        Ok(ComparisonOutcome::Failed { id })
    }

    /// Where the current image of a failure for `screenshot` is persisted
    #[must_use]
    pub fn failure_image_path(&self, screenshot: &ScreenshotCheck) -> PathBuf {
        self.config
            .failures
            .directory
            .join(&screenshot.scope)
            .join(&screenshot.test_id)
            .join(format!("{}.png", Uuid::new_v4()))
    }

    fn record_failure(
        &self,
        current: Option<Arc<RasterImage>>,
        screenshot: &ScreenshotCheck,
        current_hash: Option<String>,
    ) -> Failure {
        let failure = Failure::new(screenshot.clone()).with_current_hash(current_hash);
        let Some(image) = current else {
            return failure;
        };
        if !self.config.failures.persist {
            return failure.with_current_image(image);
        }
        let target = self.failure_image_path(screenshot);
        match self.store.save_absolute(&target, &image) {
            Ok((format, path)) => failure.with_current_path(path, format),
            Err(err) => {
                tracing::warn!(
                    test_id = %screenshot.test_id,
                    path = %target.display(),
                    error = %err,
                    "pixelcheck.compare.persist_failed"
                );
                failure.with_current_image(image)
            }
        }
    }

    fn bundles(&self) -> MutexGuard<'_, HashMap<FailureId, Arc<DiffBundle>>> {
        self.bundles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared diff bundle for a queued failure
    #[must_use]
    pub fn bundle(&self, id: &FailureId) -> Option<Arc<DiffBundle>> {
        let mut bundles = self.bundles();
        if let Some(bundle) = bundles.get(id) {
            return Some(Arc::clone(bundle));
        }
        let failure = self.queue.get(id)?;
        let bundle = Arc::new(DiffBundle::new(failure));
        bundles.insert(id.clone(), Arc::clone(&bundle));
        Some(bundle)
    }

    /// Drop the cached bundle of `id`
    pub fn evict(&self, id: &FailureId) {
        self.bundles().remove(id);
    }

    /// Remove every queued failure and cached bundle
    pub fn clear(&self) -> Vec<FailureId> {
        let ids = self.queue.clear();
        self.bundles().clear();
        ids
    }

    /// Remove the failures of tests named `test_name`
    pub fn clear_test_name(&self, test_name: &str) -> Vec<FailureId> {
        let ids = self.queue.clear_test_name(test_name);
        ids.iter().for_each(|id| self.evict(id));
        ids
    }

    /// Remove the failures of test `test_id`
    pub fn clear_test_id(&self, test_id: &str) -> Vec<FailureId> {
        let ids = self.queue.clear_test_id(test_id);
        ids.iter().for_each(|id| self.evict(id));
        ids
    }

    /// Decoded current image of a failure
    ///
    /// # Errors
    /// Returns error if the failure names a persisted image that cannot be loaded
    pub fn current_image(&self, failure: &Failure) -> PixelCheckResult<Option<Arc<RasterImage>>> {
        if let Some(image) = &failure.current_image {
            return Ok(Some(Arc::clone(image)));
        }
        let Some(path) = &failure.current_path else {
            return Ok(None);
        };
        self.store
            .load_absolute(path)
            .map(Some)
            .ok_or_else(|| PixelCheckError::ImageNotFound {
                path: path.display().to_string(),
            })
    }

    /// Generate the review output of `bundle` unless already generated
    ///
    /// # Errors
    /// Returns error if the current image cannot be loaded or a diff step
    /// fails; the bundle stays incomplete
    pub fn generate_diff<'a>(&self, bundle: &'a DiffBundle) -> PixelCheckResult<&'a DiffReport> {
        bundle.get_or_generate(|failure| self.build_report(failure))
    }

    fn build_report(&self, failure: &Failure) -> PixelCheckResult<DiffReport> {
        let start = Instant::now();
        let current = self.current_image(failure)?;
        let candidates: Vec<Alternative> = failure.screenshot.candidates().cloned().collect();
        let count = candidates.len();
        let alternatives = candidates
            .into_par_iter()
            .map(|alternative| {
                let comparison = Comparison::new(
                    &failure.screenshot,
                    alternative,
                    current.clone(),
                    failure.current_hash.clone(),
                );
                let mut diff = AlternativeDiff::new(comparison);
                self.registry.diff(&mut diff)?;
                Ok(diff)
            })
            .collect::<PixelCheckResult<Vec<_>>>()?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let mut properties = BTreeMap::new();
        properties.insert("generation_ms".to_string(), PropertyValue::Number(elapsed_ms));
        properties.insert("alternatives".to_string(), PropertyValue::Number(count as f64));
        tracing::info!(
            failure = %failure.id(),
            alternatives = count,
            elapsed_ms,
            "pixelcheck.diff.generated"
        );
        Ok(DiffReport {
            alternatives,
            properties,
            current,
        })
    }

    /// Generate the diff if needed and save every image, hint and mask
    /// under `dir`. Returns the written paths.
    ///
    /// # Errors
    /// Returns error if generation or any save fails
    pub fn export_diff(&self, bundle: &DiffBundle, dir: &Path) -> PixelCheckResult<Vec<PathBuf>> {
        let report = self.generate_diff(bundle)?;
        let mut written = Vec::new();
        if let Some(current) = &report.current {
            let (_, path) = self.store.save_absolute(&dir.join("current.png"), current)?;
            written.push(path);
        }
        for (index, alternative) in report.alternatives.iter().enumerate() {
            let prefix = format!("alt{index}");
            let outputs = alternative
                .images()
                .iter()
                .map(|(kind, image)| (format!("{prefix}-{kind}.png"), image))
                .chain(
                    alternative
                        .hints()
                        .iter()
                        .map(|(kind, image)| (format!("{prefix}-{kind}.png"), image)),
                )
                .chain(
                    alternative
                        .masks()
                        .iter()
                        .map(|(kind, image)| (format!("{prefix}-{kind}_mask.png"), image)),
                );
            for (name, image) in outputs {
                let (_, path) = self.store.save_absolute(&dir.join(name), image)?;
                written.push(path);
            }
        }
        tracing::info!(failure = %bundle.id(), files = written.len(), dir = %dir.display(), "pixelcheck.diff.exported");
        Ok(written)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::check::CheckType;
    use crate::raster::image_hash;
    use crate::store::MemoryImageStore;
    use image::Rgba;

    fn solid(w: u32, h: u32, v: u8) -> RasterImage {
        RasterImage::from_pixel(w, h, Rgba([v, v, v, 255]))
    }

    fn setup(saved: RasterImage) -> (Arc<MemoryImageStore>, Comparator, ScreenshotCheck) {
        let store = Arc::new(MemoryImageStore::new());
        let hash = image_hash("SHA-256", &saved).unwrap();
        store.insert("suite", "main.png", saved);
        let comparator = Comparator::new(PixelCheckConfig::default(), store.clone()).unwrap();
        let screenshot = ScreenshotCheck::new("t1", "suite", "main.png", hash);
        (store, comparator, screenshot)
    }

    #[test]
    fn test_identical_image_passes() {
        let (_, comparator, screenshot) = setup(solid(4, 4, 50));
        let outcome = comparator.compare(Some(Arc::new(solid(4, 4, 50))), &screenshot).unwrap();
        assert!(outcome.is_passed());
        assert!(comparator.queue().is_empty());
    }

    #[test]
    fn test_mismatch_queues_and_persists() {
        let (store, comparator, screenshot) = setup(solid(4, 4, 50));
        let outcome = comparator.compare(Some(Arc::new(solid(4, 4, 200))), &screenshot).unwrap();
        let ComparisonOutcome::Failed { id } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(id, FailureId::new("t1", "suite", "main.png"));
        let failure = comparator.queue().get(&id).unwrap();
        assert!(failure.current_path.is_some());
        assert!(failure.current_image.is_none());
        assert_eq!(store.saved_count(), 1);
    }

    #[test]
    fn test_alternative_matches() {
        let (store, comparator, screenshot) = setup(solid(4, 4, 50));
        store.insert("suite", "alt.png", solid(4, 4, 90));
        let screenshot = screenshot.with_alternative("alt.png", "unrelated");
        let outcome = comparator.compare(Some(Arc::new(solid(4, 4, 90))), &screenshot).unwrap();
        assert_eq!(
            outcome,
            ComparisonOutcome::Passed {
                alternative: "alt.png".to_string()
            }
        );
    }

    #[test]
    fn test_missing_current_fails() {
        let (_, comparator, screenshot) = setup(solid(4, 4, 50));
        let outcome = comparator.compare(None, &screenshot).unwrap();
        assert!(!outcome.is_passed());
    }

    #[test]
    fn test_diff_report_contents() {
        let (_, comparator, screenshot) = setup(solid(8, 8, 50));
        let mut current = solid(8, 8, 50);
        for x in 2..5 {
            for y in 2..5 {
                current.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }
        let ComparisonOutcome::Failed { id } =
            comparator.compare(Some(Arc::new(current)), &screenshot).unwrap()
        else {
            panic!("expected failure");
        };
        let bundle = comparator.bundle(&id).unwrap();
        let report = comparator.generate_diff(&bundle).unwrap();
        assert_eq!(report.property("alternatives"), Some(&PropertyValue::Number(1.0)));
        let alt = report.alternative("main.png").unwrap();
        assert_eq!(
            alt.property(CheckType::Strict, "failed_pixels"),
            Some(&PropertyValue::Number(9.0))
        );
        assert!(alt.image(CheckType::Strict).is_some());
        assert!(alt.hint(CheckType::StrictHint).is_some());
        assert!(alt.property(CheckType::Cluster, "duration_ms").is_some());
        assert!(Arc::ptr_eq(&bundle, &comparator.bundle(&id).unwrap()));
    }

    #[test]
    fn test_refailure_requeues_with_fresh_bundle() {
        let (_, comparator, screenshot) = setup(solid(4, 4, 50));
        let ComparisonOutcome::Failed { id } =
            comparator.compare(Some(Arc::new(solid(4, 4, 51))), &screenshot).unwrap()
        else {
            panic!("expected failure");
        };
        let first = comparator.bundle(&id).unwrap();
        let (polled, _) = comparator.queue().poll().unwrap();
        assert_eq!(polled, id);
        assert_eq!(comparator.queue().pending(), 0);

        comparator.compare(Some(Arc::new(solid(4, 4, 52))), &screenshot).unwrap();
        assert_eq!(comparator.queue().len(), 1);
        assert_eq!(comparator.queue().pending(), 1);
        assert_eq!(comparator.queue().peek().map(|(peeked, _)| peeked), Some(id.clone()));

        let second = comparator.bundle(&id).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        let expected = image_hash("SHA-256", &solid(4, 4, 52)).unwrap();
        assert_eq!(second.failure().current_hash.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn test_export_writes_images() {
        let (store, comparator, screenshot) = setup(solid(6, 6, 50));
        let ComparisonOutcome::Failed { id } =
            comparator.compare(Some(Arc::new(solid(6, 6, 120))), &screenshot).unwrap()
        else {
            panic!("expected failure");
        };
        let bundle = comparator.bundle(&id).unwrap();
        let written = comparator.export_diff(&bundle, Path::new("/export")).unwrap();
        assert!(written.contains(&PathBuf::from("/export/current.png")));
        assert!(written.contains(&PathBuf::from("/export/alt0-strict.png")));
        assert!(written.contains(&PathBuf::from("/export/alt0-strict_hint.png")));
        assert!(store.load_absolute(Path::new("/export/alt0-strict_mask.png")).is_some());
    }

    #[test]
    fn test_scoped_clear_evicts_bundles() {
        let (_, comparator, screenshot) = setup(solid(4, 4, 50));
        let ComparisonOutcome::Failed { id } =
            comparator.compare(Some(Arc::new(solid(4, 4, 51))), &screenshot).unwrap()
        else {
            panic!("expected failure");
        };
        let first = comparator.bundle(&id).unwrap();
        assert_eq!(comparator.clear_test_id("t1"), vec![id.clone()]);
        assert!(comparator.bundle(&id).is_none());
        drop(first);
    }
}
