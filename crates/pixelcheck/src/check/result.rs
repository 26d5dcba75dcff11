//! Per-alternative comparison state.

use super::CheckType;
use crate::raster::{RasterImage, ShadedRegion};
use crate::screenshot::{Alternative, ScreenshotCheck};
use crate::summary::PixelSummary;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Outcome of a comparison against one alternative
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckStatus {
    /// No check has decided yet
    #[default]
    Unknown,
    /// A sufficient check succeeded
    Passed,
    /// A non-sufficient check failed
    Failed,
}

/// Inputs and intermediate results shared by the check and diff pipelines.
///
/// One `Comparison` covers exactly one alternative image.
#[derive(Debug, Clone)]
pub struct Comparison {
    /// Freshly captured image, if capture succeeded
    pub current: Option<Arc<RasterImage>>,
    /// Hash of `current` with the recorded algorithm, if already known
    pub current_hash: Option<String>,
    /// Scope the alternative path resolves in
    pub scope: String,
    /// Alternative under comparison
    pub alternative: Alternative,
    /// Hashes of every recorded candidate
    pub known_hashes: Vec<String>,
    /// Algorithm the hashes were recorded with
    pub hash_algorithm: String,
    /// Test-specific minimum confidence
    pub confidence: f64,
    /// Regions excluded from pixel comparison
    pub shaded: Vec<ShadedRegion>,
    /// Loaded saved image
    pub saved: Option<Arc<RasterImage>>,
    outcomes: BTreeMap<CheckType, bool>,
    executed: BTreeSet<CheckType>,
    strict_summary: Option<Arc<PixelSummary>>,
    fuzzy_summary: Option<Arc<PixelSummary>>,
}

impl Comparison {
    /// State for comparing `current` against one candidate of `screenshot`
    #[must_use]
    pub fn new(
        screenshot: &ScreenshotCheck,
        alternative: Alternative,
        current: Option<Arc<RasterImage>>,
        current_hash: Option<String>,
    ) -> Self {
        Self {
            current,
            current_hash,
            scope: screenshot.scope.clone(),
            alternative,
            known_hashes: screenshot.candidates().map(|a| a.hash.clone()).collect(),
            hash_algorithm: screenshot.hash_algorithm.clone(),
            confidence: screenshot.confidence,
            shaded: screenshot.shaded.clone(),
            saved: None,
            outcomes: BTreeMap::new(),
            executed: BTreeSet::new(),
            strict_summary: None,
            fuzzy_summary: None,
        }
    }

    /// Record a check outcome without marking it executed
    pub fn record(&mut self, kind: CheckType, outcome: bool) {
        self.outcomes.insert(kind, outcome);
    }

    /// Record a check that actually ran
    pub fn mark_executed(&mut self, kind: CheckType, outcome: bool) {
        self.executed.insert(kind);
        self.outcomes.insert(kind, outcome);
    }

    /// Whether `kind` actually ran against this alternative
    #[must_use]
    pub fn has_run(&self, kind: CheckType) -> bool {
        self.executed.contains(&kind)
    }

    /// Recorded outcome of `kind`, if it was evaluated at all
    #[must_use]
    pub fn outcome(&self, kind: CheckType) -> Option<bool> {
        self.outcomes.get(&kind).copied()
    }

    /// All recorded outcomes
    #[must_use]
    pub const fn outcomes(&self) -> &BTreeMap<CheckType, bool> {
        &self.outcomes
    }

    /// Checks that actually ran
    #[must_use]
    pub const fn executed(&self) -> &BTreeSet<CheckType> {
        &self.executed
    }

    /// First dependency in `deps` that has not run
    #[must_use]
    pub fn missing_dependency(&self, deps: &[CheckType]) -> Option<CheckType> {
        deps.iter().copied().find(|dep| !self.has_run(*dep))
    }

    /// Memoized strict summary
    #[must_use]
    pub fn strict_summary(&self) -> Option<&Arc<PixelSummary>> {
        self.strict_summary.as_ref()
    }

    /// Store the strict summary
    pub fn set_strict_summary(&mut self, summary: PixelSummary) {
        self.strict_summary = Some(Arc::new(summary));
    }

    /// Memoized fuzzy summary
    #[must_use]
    pub fn fuzzy_summary(&self) -> Option<&Arc<PixelSummary>> {
        self.fuzzy_summary.as_ref()
    }

    /// Store the fuzzy summary
    pub fn set_fuzzy_summary(&mut self, summary: PixelSummary) {
        self.fuzzy_summary = Some(Arc::new(summary));
    }

    /// Current and saved image, when both are present
    #[must_use]
    pub fn image_pair(&self) -> Option<(Arc<RasterImage>, Arc<RasterImage>)> {
        Some((Arc::clone(self.current.as_ref()?), Arc::clone(self.saved.as_ref()?)))
    }
}

/// Check pipeline state for one alternative
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Shared comparison state
    pub comparison: Comparison,
    status: CheckStatus,
}

impl CheckResult {
    /// Fresh result with `Unknown` status
    #[must_use]
    pub const fn new(comparison: Comparison) -> Self {
        Self {
            comparison,
            status: CheckStatus::Unknown,
        }
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> CheckStatus {
        self.status
    }

    /// Move the status forward. `Failed` is terminal and `Passed` is only
    /// reachable from `Unknown`. Returns whether the status changed.
    pub fn try_transition(&mut self, to: CheckStatus) -> bool {
        let allowed = match (self.status, to) {
            (CheckStatus::Failed, _) | (_, CheckStatus::Unknown) => false,
            (CheckStatus::Unknown, _) | (CheckStatus::Passed, CheckStatus::Failed) => true,
            (CheckStatus::Passed, CheckStatus::Passed) => false,
        };
        if allowed {
            self.status = to;
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison() -> Comparison {
        let screenshot = ScreenshotCheck::new("t", "s", "a.png", "h");
        Comparison::new(&screenshot, screenshot.main.clone(), None, None)
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut result = CheckResult::new(comparison());
        assert!(result.try_transition(CheckStatus::Failed));
        assert!(!result.try_transition(CheckStatus::Passed));
        assert!(!result.try_transition(CheckStatus::Unknown));
        assert_eq!(result.status(), CheckStatus::Failed);
    }

    #[test]
    fn test_passed_only_from_unknown() {
        let mut result = CheckResult::new(comparison());
        assert!(result.try_transition(CheckStatus::Passed));
        assert!(!result.try_transition(CheckStatus::Passed));
        assert!(result.try_transition(CheckStatus::Failed));
        assert_eq!(result.status(), CheckStatus::Failed);
    }

    #[test]
    fn test_record_does_not_mark_executed() {
        let mut c = comparison();
        c.record(CheckType::Strict, false);
        assert_eq!(c.outcome(CheckType::Strict), Some(false));
        assert!(!c.has_run(CheckType::Strict));
        assert_eq!(
            c.missing_dependency(&[CheckType::LoadRecorded, CheckType::Strict]),
            Some(CheckType::LoadRecorded)
        );
        c.mark_executed(CheckType::LoadRecorded, true);
        c.mark_executed(CheckType::Strict, false);
        assert_eq!(
            c.missing_dependency(&[CheckType::LoadRecorded, CheckType::Strict]),
            None
        );
    }
}
