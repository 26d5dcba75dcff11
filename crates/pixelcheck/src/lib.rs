//! PixelCheck: screenshot comparison for GUI test replay
//!
//! A captured screenshot is compared against one or more recorded images
//! through a chain of prioritised checks. Screenshots no candidate
//! accepts become failures in a review queue, where a human accepts the
//! new image as an alternative, rejects it or puts it off for later.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    PIXELCHECK Architecture                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Captured   │    │ Check      │    │ Failure    │            │
//! │   │ Screenshot │───►│ Registry   │───►│ Queue      │            │
//! │   │            │    │ (per alt)  │    │            │            │
//! │   └────────────┘    └────────────┘    └─────┬──────┘            │
//! │                                             │                    │
//! │   ┌────────────┐    ┌────────────┐    ┌─────▼──────┐            │
//! │   │ Repository │◄───│ Review     │◄───│ DiffBundle │            │
//! │   │ (accept)   │    │ Session    │    │ (once)     │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pixelcheck::{Comparator, MemoryImageStore, PixelCheckConfig, ScreenshotCheck};
//! use std::sync::Arc;
//!
//! # fn main() -> pixelcheck::PixelCheckResult<()> {
//! let store = Arc::new(MemoryImageStore::new());
//! let comparator = Comparator::new(PixelCheckConfig::default().with_tolerance(8), store)?;
//! let recorded = ScreenshotCheck::new("login", "suite", "login.png", "ab12...");
//! let outcome = comparator.compare(None, &recorded)?;
//! assert!(!outcome.is_passed());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

/// Comparison checks, their registry and per-alternative state
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc
)]
pub mod check;

/// Orchestrator: comparison, failure recording and diff generation
#[allow(clippy::cast_precision_loss)]
pub mod comparator;

/// Configuration sections and loading
pub mod config;

/// Review output for failed comparisons
pub mod diff;

/// Failure records and identifiers
pub mod failure;

/// Hint and mask overlays
pub mod hint_mask;

/// Failure review queue
pub mod queue;

/// Raster images, shaded regions and content hashing
pub mod raster;

mod result;

/// Reviewer decisions and review sessions
pub mod review;

/// Recorded screenshot expectations
pub mod screenshot;

/// Image stores and the recorded-test repository
pub mod store;

/// Sparse failed-pixel index
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub mod summary;

/// Tracing subscriber setup
pub mod telemetry;

pub use check::{
    Check, CheckRegistry, CheckResult, CheckStatus, CheckType, ClusterCheck, Comparison,
    ConfidenceCheck, DimensionCheck, FuzzyCheck, HashCheck, LoadRecordedCheck, StrictCheck,
};
pub use comparator::{Comparator, ComparisonOutcome};
pub use config::{
    ClusterConfig, ClusterSource, ConfidenceConfig, FailureConfig, FuzzyConfig, HintConfig,
    PixelCheckConfig, ShadingConfig,
};
pub use diff::{AlternativeDiff, DiffBundle, DiffReport, PropertyValue};
pub use failure::{Failure, FailureId};
pub use hint_mask::{HintMask, HintMaskHelper};
pub use queue::FailureQueue;
pub use raster::{image_hash, HashAlgorithm, RasterImage, ShadedRegion};
pub use result::{PixelCheckError, PixelCheckResult};
pub use review::{Decision, ReviewDecider, ReviewReport, ReviewSession};
pub use screenshot::{Alternative, ScreenshotCheck};
pub use store::{FsImageStore, ImageStore, MemoryImageStore, MemoryRepository, Repository};
pub use summary::PixelSummary;
pub use telemetry::{init_json_tracing, init_tracing};
