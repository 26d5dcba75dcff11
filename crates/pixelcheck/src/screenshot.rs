//! Recorded screenshot expectations.

use crate::raster::ShadedRegion;
use serde::{Deserialize, Serialize};

/// One acceptable recorded image
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alternative {
    /// Path of the saved image, relative to the test scope
    pub path: String,
    /// Content hash of the saved image
    pub hash: String,
}

impl Alternative {
    /// Create a new alternative
    #[must_use]
    pub fn new(path: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
        }
    }
}

/// A recorded expectation: the main image plus any accepted alternatives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotCheck {
    /// Identifier of the owning test
    pub test_id: String,
    /// Human-readable test name
    pub test_name: String,
    /// Scope the image paths are resolved against
    pub scope: String,
    /// Main recorded image
    pub main: Alternative,
    /// Further images accepted as equivalent
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
    /// Algorithm the hashes were recorded with
    pub hash_algorithm: String,
    /// Test-specific minimum confidence (0.0 - 1.0)
    #[serde(default)]
    pub confidence: f64,
    /// Regions excluded from pixel comparison
    #[serde(default)]
    pub shaded: Vec<ShadedRegion>,
}

impl ScreenshotCheck {
    /// Create a check with a single recorded image
    #[must_use]
    pub fn new(
        test_id: impl Into<String>,
        scope: impl Into<String>,
        path: impl Into<String>,
        hash: impl Into<String>,
    ) -> Self {
        let test_id = test_id.into();
        Self {
            test_name: test_id.clone(),
            test_id,
            scope: scope.into(),
            main: Alternative::new(path, hash),
            alternatives: Vec::new(),
            hash_algorithm: "SHA-256".to_string(),
            confidence: 0.0,
            shaded: Vec::new(),
        }
    }

    /// Set the test name
    #[must_use]
    pub fn with_test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = name.into();
        self
    }

    /// Add an alternative image
    #[must_use]
    pub fn with_alternative(mut self, path: impl Into<String>, hash: impl Into<String>) -> Self {
        self.alternatives.push(Alternative::new(path, hash));
        self
    }

    /// Set the hash algorithm name
    #[must_use]
    pub fn with_hash_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.hash_algorithm = algorithm.into();
        self
    }

    /// Set the test-specific confidence minimum
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Exclude a region from comparison
    #[must_use]
    pub fn with_shaded(mut self, region: ShadedRegion) -> Self {
        self.shaded.push(region);
        self
    }

    /// Main image followed by alternatives, in recorded order
    pub fn candidates(&self) -> impl Iterator<Item = &Alternative> {
        std::iter::once(&self.main).chain(self.alternatives.iter())
    }

    /// Whether `hash` matches the main image or any alternative
    #[must_use]
    pub fn knows_hash(&self, hash: &str) -> bool {
        self.candidates().any(|alt| alt.hash == hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_order() {
        let check = ScreenshotCheck::new("t1", "scope", "main.png", "h0")
            .with_alternative("alt1.png", "h1")
            .with_alternative("alt2.png", "h2");
        let paths: Vec<_> = check.candidates().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["main.png", "alt1.png", "alt2.png"]);
        assert!(check.knows_hash("h2"));
        assert!(!check.knows_hash("h3"));
    }

    #[test]
    fn test_defaults() {
        let check = ScreenshotCheck::new("t1", "scope", "main.png", "h0");
        assert_eq!(check.test_name, "t1");
        assert_eq!(check.hash_algorithm, "SHA-256");
        assert!(check.shaded.is_empty());
    }
}
