//! Unresolved screenshot disagreements.

use crate::raster::RasterImage;
use crate::screenshot::ScreenshotCheck;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Identifies one failure: the test, its scope and the main saved image
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FailureId {
    /// Owning test
    pub test_id: String,
    /// Scope the saved image lives in
    pub scope: String,
    /// Path of the main saved image
    pub saved_path: String,
}

impl FailureId {
    /// Create a failure id
    #[must_use]
    pub fn new(
        test_id: impl Into<String>,
        scope: impl Into<String>,
        saved_path: impl Into<String>,
    ) -> Self {
        Self {
            test_id: test_id.into(),
            scope: scope.into(),
            saved_path: saved_path.into(),
        }
    }
}

impl fmt::Display for FailureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.scope, self.test_id, self.saved_path)
    }
}

/// Everything needed to rebuild a diff after the comparison is gone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    /// The recorded expectation that failed
    pub screenshot: ScreenshotCheck,
    /// Where the current image was persisted, if it was
    pub current_path: Option<PathBuf>,
    /// Format the current image was persisted in
    pub current_format: Option<String>,
    /// Hash of the current image with the recorded algorithm
    pub current_hash: Option<String>,
    /// When the failure was recorded
    pub created_at: DateTime<Utc>,
    /// Decoded current image, kept when persistence is disabled
    #[serde(skip)]
    pub current_image: Option<Arc<RasterImage>>,
}

impl Failure {
    /// Failure for `screenshot` with nothing persisted yet
    #[must_use]
    pub fn new(screenshot: ScreenshotCheck) -> Self {
        Self {
            screenshot,
            current_path: None,
            current_format: None,
            current_hash: None,
            created_at: Utc::now(),
            current_image: None,
        }
    }

    /// Record where the current image was saved
    #[must_use]
    pub fn with_current_path(mut self, path: PathBuf, format: impl Into<String>) -> Self {
        self.current_path = Some(path);
        self.current_format = Some(format.into());
        self
    }

    /// Record the current image hash
    #[must_use]
    pub fn with_current_hash(mut self, hash: Option<String>) -> Self {
        self.current_hash = hash;
        self
    }

    /// Keep the decoded current image in memory
    #[must_use]
    pub fn with_current_image(mut self, image: Arc<RasterImage>) -> Self {
        self.current_image = Some(image);
        self
    }

    /// Identity of this failure
    #[must_use]
    pub fn id(&self) -> FailureId {
        FailureId::new(
            &self.screenshot.test_id,
            &self.screenshot.scope,
            &self.screenshot.main.path,
        )
    }

    /// Human-readable test name
    #[must_use]
    pub fn test_name(&self) -> &str {
        &self.screenshot.test_name
    }
}
