//! Review output: per-alternative images, hints, properties and log lines.
//!
//! A [`DiffBundle`] is generated at most once. Readers either see no
//! report or the complete one; concurrent generators serialise on the
//! bundle lock and the loser returns the winner's report.

use crate::check::{CheckType, Comparison};
use crate::failure::{Failure, FailureId};
use crate::hint_mask::HintMask;
use crate::raster::RasterImage;
use crate::result::PixelCheckResult;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// A scalar shown next to the review images
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Free text
    Text(String),
    /// Numeric measurement
    Number(f64),
    /// Yes/no
    Flag(bool),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Flag(b) => write!(f, "{b}"),
        }
    }
}

/// Review output for one alternative
#[derive(Debug, Clone)]
pub struct AlternativeDiff {
    /// Comparison state the diff steps read and extend
    pub comparison: Comparison,
    images: BTreeMap<CheckType, RasterImage>,
    hints: BTreeMap<CheckType, RasterImage>,
    masks: BTreeMap<CheckType, RasterImage>,
    properties: BTreeMap<(CheckType, String), PropertyValue>,
    log: Vec<String>,
}

impl AlternativeDiff {
    /// Empty diff over `comparison`
    #[must_use]
    pub const fn new(comparison: Comparison) -> Self {
        Self {
            comparison,
            images: BTreeMap::new(),
            hints: BTreeMap::new(),
            masks: BTreeMap::new(),
            properties: BTreeMap::new(),
            log: Vec::new(),
        }
    }

    /// Path of the alternative this diff covers
    #[must_use]
    pub fn path(&self) -> &str {
        &self.comparison.alternative.path
    }

    /// Append a review log line
    pub fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!(alternative = %self.path(), line = %line, "pixelcheck.diff.log");
        self.log.push(line);
    }

    /// Set a property, replacing any previous value
    pub fn set_property(&mut self, kind: CheckType, name: &str, value: PropertyValue) {
        self.properties.insert((kind, name.to_string()), value);
    }

    /// Store the review image rendered by `kind`
    pub fn set_image(&mut self, kind: CheckType, image: RasterImage) {
        self.images.insert(kind, image);
    }

    /// Store the hint (under `kind`'s hint type) and mask rendered for `kind`
    pub fn set_hint(&mut self, kind: CheckType, overlay: HintMask) {
        self.hints.insert(kind.hint().unwrap_or(kind), overlay.hint);
        if let Some(mask) = overlay.mask {
            self.masks.insert(kind, mask);
        }
    }

    /// Review image of an image type
    #[must_use]
    pub fn image(&self, kind: CheckType) -> Option<&RasterImage> {
        self.images.get(&kind)
    }

    /// Hint overlay of a hint type
    #[must_use]
    pub fn hint(&self, kind: CheckType) -> Option<&RasterImage> {
        self.hints.get(&kind)
    }

    /// Mask rendered alongside an image type
    #[must_use]
    pub fn mask(&self, kind: CheckType) -> Option<&RasterImage> {
        self.masks.get(&kind)
    }

    /// All review images
    #[must_use]
    pub const fn images(&self) -> &BTreeMap<CheckType, RasterImage> {
        &self.images
    }

    /// All hint overlays
    #[must_use]
    pub const fn hints(&self) -> &BTreeMap<CheckType, RasterImage> {
        &self.hints
    }

    /// All masks
    #[must_use]
    pub const fn masks(&self) -> &BTreeMap<CheckType, RasterImage> {
        &self.masks
    }

    /// Property by check and name
    #[must_use]
    pub fn property(&self, kind: CheckType, name: &str) -> Option<&PropertyValue> {
        self.properties.get(&(kind, name.to_string()))
    }

    /// All properties
    #[must_use]
    pub const fn properties(&self) -> &BTreeMap<(CheckType, String), PropertyValue> {
        &self.properties
    }

    /// Review log lines, oldest first
    #[must_use]
    pub fn log_lines(&self) -> &[String] {
        &self.log
    }
}

/// Complete review output for one failure
#[derive(Debug, Clone)]
pub struct DiffReport {
    /// Per-alternative output, main image first
    pub alternatives: Vec<AlternativeDiff>,
    /// Properties not tied to one alternative
    pub properties: BTreeMap<String, PropertyValue>,
    /// The current image the alternatives were compared against
    pub current: Option<Arc<RasterImage>>,
}

impl DiffReport {
    /// Output for the alternative stored at `path`
    #[must_use]
    pub fn alternative(&self, path: &str) -> Option<&AlternativeDiff> {
        self.alternatives.iter().find(|alt| alt.path() == path)
    }

    /// Global property by name
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

/// A failure plus its lazily generated review output
#[derive(Debug)]
pub struct DiffBundle {
    id: FailureId,
    failure: Failure,
    lock: Mutex<()>,
    report: OnceLock<DiffReport>,
}

impl DiffBundle {
    /// Bundle for `failure`, not yet generated
    #[must_use]
    pub fn new(failure: Failure) -> Self {
        Self {
            id: failure.id(),
            failure,
            lock: Mutex::new(()),
            report: OnceLock::new(),
        }
    }

    /// Failure identity
    #[must_use]
    pub const fn id(&self) -> &FailureId {
        &self.id
    }

    /// The recorded failure
    #[must_use]
    pub const fn failure(&self) -> &Failure {
        &self.failure
    }

    /// Whether the review output has been generated
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.report.get().is_some()
    }

    /// Generated review output, if any
    #[must_use]
    pub fn report(&self) -> Option<&DiffReport> {
        self.report.get()
    }

    /// Return the report, running `generate` under the bundle lock if
    /// no report exists yet. An error leaves the bundle incomplete.
    ///
    /// # Errors
    /// Propagates the error from `generate`
    pub fn get_or_generate<F>(&self, generate: F) -> PixelCheckResult<&DiffReport>
    where
        F: FnOnce(&Failure) -> PixelCheckResult<DiffReport>,
    {
        if let Some(report) = self.report.get() {
            return Ok(report);
        }
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(report) = self.report.get() {
            return Ok(report);
        }
        let report = generate(&self.failure)?;
        Ok(self.report.get_or_init(|| report))
    }
}
