//! Configuration schema for the PixelCheck pipeline.
//!
//! Every section uses `#[serde(default)]`, so a config file only needs to
//! name the values it overrides. Supports JSON and YAML.

use crate::result::{PixelCheckError, PixelCheckResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest accepted hint or shading margin
pub const MAX_MARGIN: u32 = u16::MAX as u32;

/// Root configuration for screenshot comparison and review
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelCheckConfig {
    /// Global confidence floor
    pub confidence: ConfidenceConfig,
    /// Fuzzy channel tolerance
    pub fuzzy: FuzzyConfig,
    /// Cluster neighbourhood limits
    pub cluster: ClusterConfig,
    /// Shaded (excluded) region handling
    pub shading: ShadingConfig,
    /// Hint and mask rendering
    pub hints: HintConfig,
    /// Failure persistence
    pub failures: FailureConfig,
}

/// Confidence configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Minimum strict-match ratio applied to every test (0.0 - 1.0)
    pub min_confidence: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
        }
    }
}

/// Fuzzy comparison configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// Per-channel difference that is still considered equal (0-255)
    pub tolerance: u8,
}

/// Which summary the cluster check scans
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterSource {
    /// Pixels still failing after fuzzy tolerance
    #[default]
    Fuzzy,
    /// Pixels failing the strict comparison
    Strict,
}

/// Cluster detection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Maximum failing pixels tolerated in a 3x3 neighbourhood
    pub max_cluster_9: u32,
    /// Maximum failing pixels tolerated in a 5x5 neighbourhood
    pub max_cluster_25: u32,
    /// Summary the cluster check consumes
    pub source: ClusterSource,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_cluster_9: 2,
            max_cluster_25: 4,
            source: ClusterSource::Fuzzy,
        }
    }
}

/// Shaded region configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingConfig {
    /// Compare pixels inside shaded regions anyway
    pub check_shaded: bool,
    /// Pixels added around every shaded region
    pub margin: u32,
}

/// Hint and mask rendering configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HintConfig {
    /// Draw one bounding box instead of per-pixel outlines
    pub fast: bool,
    /// Render translucent masks alongside hints
    pub generate_masks: bool,
    /// Pixels added around each failure in hints and masks
    pub margin: u32,
}

impl Default for HintConfig {
    fn default() -> Self {
        Self {
            fast: false,
            generate_masks: true,
            margin: 2,
        }
    }
}

/// Failure persistence configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureConfig {
    /// Save the captured image of every failed comparison
    pub persist: bool,
    /// Directory captured images are saved under
    pub directory: PathBuf,
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            persist: true,
            directory: PathBuf::from("pixelcheck-failures"),
        }
    }
}

impl PixelCheckConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from JSON string
    ///
    /// # Errors
    /// Returns error if JSON parsing fails
    pub fn from_json(json: &str) -> PixelCheckResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from YAML string
    ///
    /// # Errors
    /// Returns error if YAML parsing fails
    pub fn from_yaml(yaml: &str) -> PixelCheckResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load and validate a config file, picking the format from its extension
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed, or fails validation
    pub fn load(path: &Path) -> PixelCheckResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text)?,
            Some("yaml" | "yml") => Self::from_yaml(&text)?,
            other => {
                return Err(PixelCheckError::InvalidConfig {
                    message: format!(
                        "unsupported config extension {:?} for {}",
                        other.unwrap_or(""),
                        path.display()
                    ),
                })
            }
        };
        config.validate()?;
        tracing::debug!(path = %path.display(), "pixelcheck.config.loaded");
        Ok(config)
    }

    /// Serialize to JSON
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> PixelCheckResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> PixelCheckResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Validate configuration values
    ///
    /// # Errors
    /// Returns the first out-of-range field
    pub fn validate(&self) -> PixelCheckResult<()> {
        let min = self.confidence.min_confidence;
        if !(0.0..=1.0).contains(&min) {
            return Err(PixelCheckError::InvalidConfig {
                message: format!("confidence.min_confidence must be between 0 and 1, got {min}"),
            });
        }
        let margins = [
            ("hints.margin", self.hints.margin),
            ("shading.margin", self.shading.margin),
        ];
        for (field, margin) in margins {
            if margin > MAX_MARGIN {
                return Err(PixelCheckError::InvalidConfig {
                    message: format!("{field} must be at most {MAX_MARGIN}, got {margin}"),
                });
            }
        }
        if self.failures.persist && self.failures.directory.as_os_str().is_empty() {
            return Err(PixelCheckError::InvalidConfig {
                message: "failures.directory must be set when failures.persist is on".to_string(),
            });
        }
        Ok(())
    }

    /// Set the global minimum confidence
    #[must_use]
    pub const fn with_min_confidence(mut self, min: f64) -> Self {
        self.confidence.min_confidence = min;
        self
    }

    /// Set the fuzzy channel tolerance
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: u8) -> Self {
        self.fuzzy.tolerance = tolerance;
        self
    }

    /// Set the 3x3 and 5x5 cluster limits
    #[must_use]
    pub const fn with_cluster_limits(mut self, max_9: u32, max_25: u32) -> Self {
        self.cluster.max_cluster_9 = max_9;
        self.cluster.max_cluster_25 = max_25;
        self
    }

    /// Set the summary the cluster check consumes
    #[must_use]
    pub const fn with_cluster_source(mut self, source: ClusterSource) -> Self {
        self.cluster.source = source;
        self
    }

    /// Compare shaded regions too
    #[must_use]
    pub const fn with_check_shaded(mut self, check: bool) -> Self {
        self.shading.check_shaded = check;
        self
    }

    /// Set the margin around shaded regions
    #[must_use]
    pub const fn with_shading_margin(mut self, margin: u32) -> Self {
        self.shading.margin = margin;
        self
    }

    /// Use bounding-box hints
    #[must_use]
    pub const fn with_fast_hints(mut self, fast: bool) -> Self {
        self.hints.fast = fast;
        self
    }

    /// Enable or disable mask rendering
    #[must_use]
    pub const fn with_masks(mut self, generate: bool) -> Self {
        self.hints.generate_masks = generate;
        self
    }

    /// Enable or disable failure persistence
    #[must_use]
    pub const fn with_persist_failures(mut self, persist: bool) -> Self {
        self.failures.persist = persist;
        self
    }

    /// Set the failure directory
    #[must_use]
    pub fn with_failure_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.failures.directory = dir.into();
        self
    }
}
