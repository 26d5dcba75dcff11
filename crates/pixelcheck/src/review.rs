//! Human review of queued failures.
//!
//! A [`ReviewSession`] shows one failure's diff to a [`ReviewDecider`]
//! and applies the decision. Batch review walks the entries queued when
//! it starts, warming the next bundle's diff on the rayon pool while the
//! current one is being decided.

use crate::comparator::Comparator;
use crate::diff::{DiffBundle, DiffReport};
use crate::failure::{Failure, FailureId};
use crate::raster::image_hash;
use crate::result::{PixelCheckError, PixelCheckResult};
use crate::store::Repository;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::sync::Arc;
use uuid::Uuid;

/// Reviewer verdict on one failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    /// Record the current image as an accepted alternative
    Accept,
    /// Drop the failure without recording anything
    Reject,
    /// Keep the failure and move it to the back of the queue
    Ignore,
    /// Treat this failure as ignored and stop the batch
    Abort,
}

/// Source of review decisions, typically a UI
pub trait ReviewDecider {
    /// Decide on one failure given its generated diff
    ///
    /// # Errors
    /// Returns error if no decision could be obtained
    fn decide(&mut self, bundle: &DiffBundle, report: &DiffReport) -> PixelCheckResult<Decision>;
}

impl<F> ReviewDecider for F
where
    F: FnMut(&DiffBundle, &DiffReport) -> PixelCheckResult<Decision>,
{
    fn decide(&mut self, bundle: &DiffBundle, report: &DiffReport) -> PixelCheckResult<Decision> {
        self(bundle, report)
    }
}

/// What a review pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewReport {
    /// Accepted failures
    pub accepted: Vec<FailureId>,
    /// Rejected failures
    pub rejected: Vec<FailureId>,
    /// Ignored failures, including the one an abort stopped at
    pub ignored: Vec<FailureId>,
    /// Failures that vanished before the decision could be applied
    pub not_applied: Vec<FailureId>,
    /// Failures whose review errored, with the formatted error
    pub errors: Vec<(FailureId, String)>,
    /// The pass was stopped by an abort
    pub aborted: bool,
}

impl ReviewReport {
    /// Number of failures the pass looked at
    #[must_use]
    pub fn processed(&self) -> usize {
        self.accepted.len()
            + self.rejected.len()
            + self.ignored.len()
            + self.not_applied.len()
            + self.errors.len()
    }

    fn record(&mut self, id: FailureId, decision: Decision) {
        match decision {
            Decision::Accept => self.accepted.push(id),
            Decision::Reject => self.rejected.push(id),
            Decision::Ignore | Decision::Abort => self.ignored.push(id),
        }
    }
}

/// Applies review decisions against a comparator's queue
#[derive(Debug, Clone)]
pub struct ReviewSession {
    id: Uuid,
    comparator: Arc<Comparator>,
    repository: Arc<dyn Repository>,
}

impl ReviewSession {
    /// Session over `comparator`'s queue, recording accepted images in `repository`
    #[must_use]
    pub fn new(comparator: Arc<Comparator>, repository: Arc<dyn Repository>) -> Self {
        Self {
            id: Uuid::new_v4(),
            comparator,
            repository,
        }
    }

    /// Session identifier
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The comparator this session reviews
    #[must_use]
    pub const fn comparator(&self) -> &Arc<Comparator> {
        &self.comparator
    }

    /// Apply `decision` to `id`. Returns `Ok(false)` if the failure is no
    /// longer queued.
    ///
    /// # Errors
    /// Returns `PersistFailed` if an accepted image cannot be recorded;
    /// the failure is then moved to the back of the queue
    pub fn apply(&self, id: &FailureId, decision: Decision) -> PixelCheckResult<bool> {
        let queue = self.comparator.queue();
        let Some(failure) = queue.get(id) else {
            tracing::warn!(session = %self.id, failure = %id, ?decision, "pixelcheck.review.unknown_failure");
            return Ok(false);
        };
        match decision {
            Decision::Accept => self.accept(id, &failure)?,
            Decision::Reject => {
                queue.remove(id);
                self.comparator.evict(id);
            }
            Decision::Ignore | Decision::Abort => {
                queue.touch(id);
            }
        }
        tracing::info!(session = %self.id, failure = %id, ?decision, "pixelcheck.review.applied");
        Ok(true)
    }

    fn accept(&self, id: &FailureId, failure: &Failure) -> PixelCheckResult<()> {
        let (alt_path, alt_hash) = self.persisted_current(failure)?;
        let check = &failure.screenshot;
        let added = self.repository.add_alternative(
            &check.test_id,
            &check.scope,
            &check.main.path,
            &check.main.hash,
            &alt_path,
            &alt_hash,
        );
        if !added {
            self.comparator.queue().touch(id);
            return Err(PixelCheckError::PersistFailed {
                id: id.to_string(),
                message: "repository refused the alternative".to_string(),
            });
        }
        self.comparator.queue().remove(id);
        self.comparator.evict(id);
        Ok(())
    }

    /// Path and hash of the current image, saving it first if the
    /// failure only holds it in memory
    fn persisted_current(&self, failure: &Failure) -> PixelCheckResult<(String, String)> {
        let image = self.comparator.current_image(failure)?;
        let hash = match (&failure.current_hash, &image) {
            (Some(hash), _) => hash.clone(),
            (None, Some(image)) => image_hash(&failure.screenshot.hash_algorithm, image)?,
            (None, None) => {
                return Err(PixelCheckError::ImageNotFound {
                    path: format!("current image of {}", failure.id()),
                })
            }
        };
        if let Some(path) = &failure.current_path {
            return Ok((path.display().to_string(), hash));
        }
        let image = image.ok_or_else(|| PixelCheckError::ImageNotFound {
            path: format!("current image of {}", failure.id()),
        })?;
        let target = self.comparator.failure_image_path(&failure.screenshot);
        let (_, path) = self.comparator.store().save_absolute(&target, &image)?;
        Ok((path.display().to_string(), hash))
    }

    /// Generate the diff for `id` and ask `decider`. `None` if the
    /// failure is no longer queued.
    fn decide(
        &self,
        id: &FailureId,
        decider: &mut impl ReviewDecider,
    ) -> PixelCheckResult<Option<Decision>> {
        let Some(bundle) = self.comparator.bundle(id) else {
            return Ok(None);
        };
        let report = self.comparator.generate_diff(&bundle)?;
        decider.decide(&bundle, report).map(Some)
    }

    fn review_one(
        &self,
        id: &FailureId,
        decider: &mut impl ReviewDecider,
        report: &mut ReviewReport,
        batch: bool,
    ) -> ControlFlow<()> {
        let outcome = self.decide(id, decider).and_then(|decision| match decision {
            Some(decision) => Ok(self.apply(id, decision)?.then_some(decision)),
            None => Ok(None),
        });
        match outcome {
            Ok(Some(decision)) => {
                report.record(id.clone(), decision);
                if decision == Decision::Abort {
                    report.aborted = true;
                    return ControlFlow::Break(());
                }
            }
            Ok(None) => report.not_applied.push(id.clone()),
            Err(err) => {
                let err = match err {
                    review @ PixelCheckError::Review { .. } => review,
                    other => PixelCheckError::Review {
                        id: id.to_string(),
                        message: other.to_string(),
                    },
                };
                tracing::warn!(session = %self.id, failure = %id, error = %err, batch, "pixelcheck.review.error");
                if batch {
                    self.comparator.queue().touch(id);
                }
                report.errors.push((id.clone(), err.to_string()));
            }
        }
        ControlFlow::Continue(())
    }

    fn prefetch(&self, id: FailureId) {
        let comparator = Arc::clone(&self.comparator);
        let session = self.id;
        rayon::spawn(move || {
            let Some(bundle) = comparator.bundle(&id) else {
                return;
            };
            if let Err(err) = comparator.generate_diff(&bundle) {
                tracing::debug!(%session, failure = %id, error = %err, "pixelcheck.review.prefetch_failed");
            }
        });
    }

    /// Review the oldest queued failure. On error the failure is left
    /// where it is. An abort is treated as an ignore.
    pub fn review_next(&self, decider: &mut impl ReviewDecider) -> ReviewReport {
        let mut report = ReviewReport::default();
        let ids = self.comparator.queue().ids();
        let Some(id) = ids.first() else {
            return report;
        };
        if let Some(next) = ids.get(1) {
            self.prefetch(next.clone());
        }
        let _ = self.review_one(id, decider, &mut report, false);
        report
    }

    /// Review every failure queued when the pass starts, each at most
    /// once. A failing item is ignored so the pass always completes; an
    /// abort stops it and returns what was collected so far.
    pub fn review_all(&self, decider: &mut impl ReviewDecider) -> ReviewReport {
        let mut report = ReviewReport::default();
        let ids = self.comparator.queue().ids();
        tracing::info!(session = %self.id, pending = ids.len(), "pixelcheck.review.batch_started");
        for (index, id) in ids.iter().enumerate() {
            if let Some(next) = ids.get(index + 1) {
                self.prefetch(next.clone());
            }
            if self.review_one(id, decider, &mut report, true).is_break() {
                break;
            }
        }
        tracing::info!(
            session = %self.id,
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            ignored = report.ignored.len(),
            errors = report.errors.len(),
            aborted = report.aborted,
            "pixelcheck.review.batch_finished"
        );
        report
    }
}
