//! The PixelCheck pipeline.
//!
//! Checks run in ascending priority against one alternative at a time:
//!
//! ```text
//! Hash(0) ─► LoadRecorded(10) ─► Dimension(20) ─► Strict(30)
//!                                                    │
//!                   Cluster(60) ◄── Fuzzy(50) ◄── Confidence(40)
//! ```
//!
//! A *sufficient* check that succeeds passes the alternative; a
//! non-sufficient check that fails fails it. Anything else leaves the
//! decision to later checks. Once decided, the remaining checks are
//! recorded as not passed without running.

mod cluster;
mod confidence;
mod dimension;
mod fuzzy;
mod hash;
mod load;
mod result;
mod strict;

pub use cluster::{get_clusters, has_clusters, ClusterCheck, ClusterScan};
pub use confidence::ConfidenceCheck;
pub use dimension::DimensionCheck;
pub use fuzzy::{fuzzy_pixel, fuzzy_scan, FuzzyCheck, FuzzyPixel, FuzzyScan};
pub use hash::HashCheck;
pub use load::LoadRecordedCheck;
pub use result::{CheckResult, CheckStatus, Comparison};
pub use strict::{strict_scan, StrictCheck};

use crate::config::PixelCheckConfig;
use crate::diff::{AlternativeDiff, PropertyValue};
use crate::hint_mask::HintMaskHelper;
use crate::result::{PixelCheckError, PixelCheckResult};
use crate::store::ImageStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Every kind of check, plus the hint images some of them render
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CheckType {
    /// Content hash matches a recorded hash
    Hash,
    /// Saved image could be loaded
    LoadRecorded,
    /// Width and height match
    Dimension,
    /// Pixel-exact comparison
    Strict,
    /// Strict match ratio above the required minimum
    Confidence,
    /// Per-channel tolerance comparison
    Fuzzy,
    /// Remaining failures are isolated pixels
    Cluster,
    /// Outline of strict failures
    StrictHint,
    /// Outline of fuzzy failures
    FuzzyHint,
    /// Outline of clustered failures
    ClusterHint,
}

impl CheckType {
    /// All executable checks in priority order
    pub const CHECKS: [Self; 7] = [
        Self::Hash,
        Self::LoadRecorded,
        Self::Dimension,
        Self::Strict,
        Self::Confidence,
        Self::Fuzzy,
        Self::Cluster,
    ];

    /// Display name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::LoadRecorded => "load_recorded",
            Self::Dimension => "dimension",
            Self::Strict => "strict",
            Self::Confidence => "confidence",
            Self::Fuzzy => "fuzzy",
            Self::Cluster => "cluster",
            Self::StrictHint => "strict_hint",
            Self::FuzzyHint => "fuzzy_hint",
            Self::ClusterHint => "cluster_hint",
        }
    }

    /// Execution priority, ascending. Hint types never execute.
    #[must_use]
    pub const fn priority(self) -> Option<i32> {
        match self {
            Self::Hash => Some(0),
            Self::LoadRecorded => Some(10),
            Self::Dimension => Some(20),
            Self::Strict => Some(30),
            Self::Confidence => Some(40),
            Self::Fuzzy => Some(50),
            Self::Cluster => Some(60),
            Self::StrictHint | Self::FuzzyHint | Self::ClusterHint => None,
        }
    }

    /// Success alone passes the comparison
    #[must_use]
    pub const fn is_sufficient(self) -> bool {
        matches!(self, Self::Hash | Self::Strict | Self::Fuzzy | Self::Cluster)
    }

    /// Whether this type is a runnable check
    #[must_use]
    pub const fn is_check(self) -> bool {
        self.priority().is_some()
    }

    /// Whether the diff step renders a review image of this type
    #[must_use]
    pub const fn is_image(self) -> bool {
        matches!(self, Self::Strict | Self::Fuzzy | Self::Cluster)
    }

    /// Whether this type is a hint overlay
    #[must_use]
    pub const fn is_hint(self) -> bool {
        matches!(self, Self::StrictHint | Self::FuzzyHint | Self::ClusterHint)
    }

    /// Hint overlay rendered alongside this check's image
    #[must_use]
    pub const fn hint(self) -> Option<Self> {
        match self {
            Self::Strict => Some(Self::StrictHint),
            Self::Fuzzy => Some(Self::FuzzyHint),
            Self::Cluster => Some(Self::ClusterHint),
            _ => None,
        }
    }

    /// Dependencies every configuration shares. Cluster adds its source.
    #[must_use]
    pub const fn base_dependencies(self) -> &'static [Self] {
        match self {
            Self::Dimension => &[Self::LoadRecorded],
            Self::Strict => &[Self::LoadRecorded, Self::Dimension],
            Self::Confidence => &[Self::LoadRecorded, Self::Dimension, Self::Strict],
            Self::Fuzzy => &[Self::LoadRecorded, Self::Dimension, Self::Confidence],
            Self::Cluster => &[Self::LoadRecorded, Self::Dimension],
            _ => &[],
        }
    }

    /// Image types in review order
    #[must_use]
    pub fn images() -> Vec<Self> {
        Self::CHECKS.into_iter().filter(|t| t.is_image()).collect()
    }

    /// Hint types in review order
    #[must_use]
    pub fn hints() -> Vec<Self> {
        Self::CHECKS.into_iter().filter_map(Self::hint).collect()
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single step of the comparison pipeline.
///
/// Implementors provide `run` and `diff`; the dispatch wrappers
/// `evaluate` and `evaluate_diff` enforce the dependency and sufficiency
/// protocol and should not normally be overridden.
pub trait Check: Send + Sync + fmt::Debug {
    /// Which check this is
    fn check_type(&self) -> CheckType;

    /// Success alone passes the comparison
    fn is_sufficient(&self) -> bool {
        self.check_type().is_sufficient()
    }

    /// Execution order, ascending
    fn priority(&self) -> i32 {
        self.check_type().priority().unwrap_or(i32::MAX)
    }

    /// Checks that must have run against the same alternative first
    fn dependencies(&self) -> Vec<CheckType> {
        self.check_type().base_dependencies().to_vec()
    }

    /// Run against one alternative, returning the boolean outcome
    fn run(&self, result: &mut CheckResult) -> bool;

    /// Produce review output for one alternative
    ///
    /// # Errors
    /// Returns error if review images cannot be produced
    fn diff(&self, diff: &mut AlternativeDiff) -> PixelCheckResult<bool>;

    /// Run with the short-circuit, dependency and sufficiency rules applied
    fn evaluate(&self, result: &mut CheckResult) -> bool {
        let kind = self.check_type();
        if result.status() != CheckStatus::Unknown {
            result.comparison.record(kind, false);
            return false;
        }
        if let Some(missing) = result.comparison.missing_dependency(&self.dependencies()) {
            tracing::debug!(
                check = %kind,
                missing = %missing,
                alternative = %result.comparison.alternative.path,
                "pixelcheck.check.skipped"
            );
            result.comparison.record(kind, false);
            return false;
        }
        let outcome = self.run(result);
        result.comparison.mark_executed(kind, outcome);
        if outcome == self.is_sufficient() {
            let to = if outcome {
                CheckStatus::Passed
            } else {
                CheckStatus::Failed
            };
            result.try_transition(to);
        }
        tracing::debug!(
            check = %kind,
            outcome,
            status = ?result.status(),
            alternative = %result.comparison.alternative.path,
            "pixelcheck.check.evaluated"
        );
        outcome
    }

    /// Produce review output if the dependencies ran, timing the step
    ///
    /// # Errors
    /// Propagates errors from `diff`
    fn evaluate_diff(&self, diff: &mut AlternativeDiff) -> PixelCheckResult<bool> {
        let kind = self.check_type();
        if let Some(missing) = diff.comparison.missing_dependency(&self.dependencies()) {
            diff.log(format!("{kind} skipped: {missing} has not run"));
            diff.comparison.record(kind, false);
            return Ok(false);
        }
        let start = Instant::now();
        let outcome = self.diff(diff);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        diff.set_property(kind, "duration_ms", PropertyValue::Number(elapsed_ms));
        let passed = outcome?;
        diff.comparison.mark_executed(kind, passed);
        Ok(passed)
    }
}

/// Ordered check list plus a dependency lookup keyed by check type
#[derive(Debug)]
pub struct CheckRegistry {
    checks: Vec<Box<dyn Check>>,
    dependencies: HashMap<CheckType, Vec<CheckType>>,
}

impl CheckRegistry {
    /// The six standard checks configured from `config`
    #[must_use]
    pub fn standard(config: &PixelCheckConfig, store: Arc<dyn ImageStore>) -> Self {
        let hints = HintMaskHelper::from_config(&config.hints);
        let checks: Vec<Box<dyn Check>> = vec![
            Box::new(HashCheck),
            Box::new(LoadRecordedCheck::new(store)),
            Box::new(DimensionCheck),
            Box::new(StrictCheck::new(&config.shading, hints)),
            Box::new(ConfidenceCheck::new(config.confidence.min_confidence)),
            Box::new(FuzzyCheck::new(config.fuzzy.tolerance, hints)),
            Box::new(ClusterCheck::new(&config.cluster, hints)),
        ];
        Self::build(checks)
    }

    /// Registry over a custom check list
    ///
    /// # Errors
    /// Returns error if a check depends on one that is not registered or
    /// that would run after it
    pub fn from_checks(checks: Vec<Box<dyn Check>>) -> PixelCheckResult<Self> {
        let registry = Self::build(checks);
        registry.validate()?;
        Ok(registry)
    }

    fn build(mut checks: Vec<Box<dyn Check>>) -> Self {
        checks.sort_by_key(|c| c.priority());
        let dependencies = checks
            .iter()
            .map(|c| (c.check_type(), c.dependencies()))
            .collect();
        Self {
            checks,
            dependencies,
        }
    }

    fn validate(&self) -> PixelCheckResult<()> {
        for (index, check) in self.checks.iter().enumerate() {
            for dep in self.dependencies_of(check.check_type()) {
                let position = self.checks.iter().position(|c| c.check_type() == *dep);
                match position {
                    Some(p) if p < index => {}
                    Some(_) => {
                        return Err(PixelCheckError::InvalidConfig {
                            message: format!("{} runs before its dependency {dep}", check.check_type()),
                        })
                    }
                    None => {
                        return Err(PixelCheckError::InvalidConfig {
                            message: format!("{} depends on unregistered {dep}", check.check_type()),
                        })
                    }
                }
            }
        }
        Ok(())
    }

    /// Registered checks in execution order
    #[must_use]
    pub fn checks(&self) -> &[Box<dyn Check>] {
        &self.checks
    }

    /// Declared dependencies of a registered check
    #[must_use]
    pub fn dependencies_of(&self, kind: CheckType) -> &[CheckType] {
        self.dependencies.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Evaluate every check against one alternative
    pub fn run(&self, result: &mut CheckResult) -> CheckStatus {
        for check in &self.checks {
            check.evaluate(result);
        }
        result.status()
    }

    /// Run every diff step against one alternative, in order
    ///
    /// # Errors
    /// Stops at the first diff step that errors
    pub fn diff(&self, diff: &mut AlternativeDiff) -> PixelCheckResult<()> {
        for check in &self.checks {
            check.evaluate_diff(diff)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::screenshot::ScreenshotCheck;
    use proptest::prelude::*;

    #[derive(Debug)]
    struct Scripted {
        kind: CheckType,
        outcome: bool,
        deps: Vec<CheckType>,
    }

    impl Check for Scripted {
        fn check_type(&self) -> CheckType {
            self.kind
        }

        fn dependencies(&self) -> Vec<CheckType> {
            self.deps.clone()
        }

        fn run(&self, _result: &mut CheckResult) -> bool {
            self.outcome
        }

        fn diff(&self, _diff: &mut AlternativeDiff) -> PixelCheckResult<bool> {
            Ok(self.outcome)
        }
    }

    fn result() -> CheckResult {
        let screenshot = ScreenshotCheck::new("t", "s", "a.png", "h");
        CheckResult::new(Comparison::new(&screenshot, screenshot.main.clone(), None, None))
    }

    fn scripted(kind: CheckType, outcome: bool) -> Scripted {
        Scripted {
            kind,
            outcome,
            deps: Vec::new(),
        }
    }

    #[test]
    fn test_type_table() {
        let priorities: Vec<_> = CheckType::CHECKS
            .iter()
            .map(|t| t.priority().unwrap_or(-1))
            .collect();
        assert_eq!(priorities, vec![0, 10, 20, 30, 40, 50, 60]);
        assert_eq!(
            CheckType::images(),
            vec![CheckType::Strict, CheckType::Fuzzy, CheckType::Cluster]
        );
        assert_eq!(
            CheckType::hints(),
            vec![CheckType::StrictHint, CheckType::FuzzyHint, CheckType::ClusterHint]
        );
        assert!(!CheckType::StrictHint.is_check());
    }

    #[test]
    fn test_sufficient_success_passes() {
        let mut r = result();
        assert!(scripted(CheckType::Hash, true).evaluate(&mut r));
        assert_eq!(r.status(), CheckStatus::Passed);
    }

    #[test]
    fn test_sufficient_failure_leaves_unknown() {
        let mut r = result();
        assert!(!scripted(CheckType::Hash, false).evaluate(&mut r));
        assert_eq!(r.status(), CheckStatus::Unknown);
        assert!(r.comparison.has_run(CheckType::Hash));
    }

    #[test]
    fn test_non_sufficient_failure_fails() {
        let mut r = result();
        assert!(!scripted(CheckType::LoadRecorded, false).evaluate(&mut r));
        assert_eq!(r.status(), CheckStatus::Failed);
    }

    #[test]
    fn test_decided_result_short_circuits() {
        let mut r = result();
        r.try_transition(CheckStatus::Failed);
        assert!(!scripted(CheckType::Strict, true).evaluate(&mut r));
        assert_eq!(r.comparison.outcome(CheckType::Strict), Some(false));
        assert!(!r.comparison.has_run(CheckType::Strict));
    }

    #[test]
    fn test_missing_dependency_skips_without_deciding() {
        let mut r = result();
        let check = Scripted {
            kind: CheckType::Strict,
            outcome: true,
            deps: vec![CheckType::LoadRecorded],
        };
        assert!(!check.evaluate(&mut r));
        assert_eq!(r.status(), CheckStatus::Unknown);
        assert!(!r.comparison.has_run(CheckType::Strict));
    }

    #[test]
    fn test_registry_rejects_misordered_dependency() {
        let checks: Vec<Box<dyn Check>> = vec![Box::new(Scripted {
            kind: CheckType::Dimension,
            outcome: true,
            deps: vec![CheckType::Cluster],
        })];
        assert!(CheckRegistry::from_checks(checks).is_err());
    }

    #[test]
    fn test_registry_sorts_by_priority() {
        let checks: Vec<Box<dyn Check>> = vec![
            Box::new(scripted(CheckType::Strict, false)),
            Box::new(scripted(CheckType::Hash, false)),
            Box::new(scripted(CheckType::LoadRecorded, true)),
        ];
        let registry = CheckRegistry::from_checks(checks).unwrap();
        let order: Vec<_> = registry.checks().iter().map(|c| c.check_type()).collect();
        assert_eq!(
            order,
            vec![CheckType::Hash, CheckType::LoadRecorded, CheckType::Strict]
        );
    }

    proptest! {
        #[test]
        fn prop_failed_status_never_passes(
            outcomes in proptest::collection::vec(any::<bool>(), 7),
            order in Just(CheckType::CHECKS.to_vec()).prop_shuffle(),
        ) {
            let mut r = result();
            let mut failed = false;
            for (kind, outcome) in order.into_iter().zip(outcomes) {
                scripted(kind, outcome).evaluate(&mut r);
                if failed {
                    prop_assert_eq!(r.status(), CheckStatus::Failed);
                }
                failed |= r.status() == CheckStatus::Failed;
            }
        }
    }
}
