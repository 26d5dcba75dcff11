//! Image storage and the recorded-test repository.
//!
//! The comparison core only needs to load saved images, persist the
//! current image of a failure and register an accepted alternative. Both
//! traits are object-safe so the comparator can hold them behind `Arc`.

use crate::raster::RasterImage;
use crate::result::{PixelCheckError, PixelCheckResult};
use crate::screenshot::ScreenshotCheck;
use image::ImageFormat;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Format name reported for images saved as PNG
pub const PNG_FORMAT: &str = "png";

/// Source and sink of raster images
pub trait ImageStore: Send + Sync + fmt::Debug {
    /// Load `path` relative to `scope`
    fn load(&self, scope: &str, path: &str) -> Option<Arc<RasterImage>>;

    /// Load an image by absolute path
    fn load_absolute(&self, path: &Path) -> Option<Arc<RasterImage>>;

    /// Save an image at an absolute path, returning the format name and
    /// the path actually written
    ///
    /// # Errors
    /// Returns error if the image cannot be encoded or written
    fn save_absolute(&self, path: &Path, image: &RasterImage) -> PixelCheckResult<(String, PathBuf)>;
}

/// Registry of recorded screenshot checks
pub trait Repository: Send + Sync + fmt::Debug {
    /// Register `alt_path`/`alt_hash` as an accepted alternative of the
    /// check identified by `test_id`, `scope` and `saved_path`. Returns
    /// false if the check is unknown or its saved hash differs.
    fn add_alternative(
        &self,
        test_id: &str,
        scope: &str,
        saved_path: &str,
        saved_hash: &str,
        alt_path: &str,
        alt_hash: &str,
    ) -> bool;
}

fn scoped_key(scope: &str, path: &str) -> String {
    format!("{scope}/{path}")
}

/// Thread-safe in-memory image store
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    scoped: RwLock<HashMap<String, Arc<RasterImage>>>,
    absolute: RwLock<HashMap<PathBuf, Arc<RasterImage>>>,
}

impl MemoryImageStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image under `scope`/`path`
    pub fn insert(&self, scope: &str, path: &str, image: RasterImage) {
        self.scoped
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scoped_key(scope, path), Arc::new(image));
    }

    /// Number of images saved by absolute path
    #[must_use]
    pub fn saved_count(&self) -> usize {
        self.absolute.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl ImageStore for MemoryImageStore {
    fn load(&self, scope: &str, path: &str) -> Option<Arc<RasterImage>> {
        let scoped = self
            .scoped
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&scoped_key(scope, path))
            .cloned();
        scoped.or_else(|| self.load_absolute(Path::new(path)))
    }

    fn load_absolute(&self, path: &Path) -> Option<Arc<RasterImage>> {
        self.absolute
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    fn save_absolute(&self, path: &Path, image: &RasterImage) -> PixelCheckResult<(String, PathBuf)> {
        self.absolute
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), Arc::new(image.clone()));
        Ok((PNG_FORMAT.to_string(), path.to_path_buf()))
    }
}

/// PNG files under a root directory; a scope is a subdirectory
#[derive(Debug, Clone)]
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    /// Store rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of `path` within `scope`
    #[must_use]
    pub fn resolve(&self, scope: &str, path: &str) -> PathBuf {
        self.root.join(scope).join(path)
    }

    fn open(path: &Path) -> PixelCheckResult<RasterImage> {
        if !path.exists() {
            return Err(PixelCheckError::ImageNotFound {
                path: path.display().to_string(),
            });
        }
        Ok(image::open(path)?.to_rgba8())
    }

    fn open_logged(path: &Path) -> Option<Arc<RasterImage>> {
        match Self::open(path) {
            Ok(image) => Some(Arc::new(image)),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "pixelcheck.store.load_failed");
                None
            }
        }
    }
}

impl ImageStore for FsImageStore {
    fn load(&self, scope: &str, path: &str) -> Option<Arc<RasterImage>> {
        Self::open_logged(&self.resolve(scope, path))
    }

    fn load_absolute(&self, path: &Path) -> Option<Arc<RasterImage>> {
        Self::open_logged(path)
    }

    fn save_absolute(&self, path: &Path, image: &RasterImage) -> PixelCheckResult<(String, PathBuf)> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        image.save_with_format(path, ImageFormat::Png)?;
        tracing::debug!(path = %path.display(), "pixelcheck.store.saved");
        Ok((PNG_FORMAT.to_string(), path.to_path_buf()))
    }
}

type CheckKey = (String, String, String);

/// In-memory repository of screenshot checks keyed by test, scope and
/// main image path
#[derive(Debug, Default)]
pub struct MemoryRepository {
    checks: RwLock<HashMap<CheckKey, ScreenshotCheck>>,
}

impl MemoryRepository {
    /// Empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recorded check
    pub fn insert(&self, check: ScreenshotCheck) {
        let key = (check.test_id.clone(), check.scope.clone(), check.main.path.clone());
        self.checks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, check);
    }

    /// Stored check
    #[must_use]
    pub fn get(&self, test_id: &str, scope: &str, saved_path: &str) -> Option<ScreenshotCheck> {
        let key = (test_id.to_string(), scope.to_string(), saved_path.to_string());
        self.checks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }
}

impl Repository for MemoryRepository {
    fn add_alternative(
        &self,
        test_id: &str,
        scope: &str,
        saved_path: &str,
        saved_hash: &str,
        alt_path: &str,
        alt_hash: &str,
    ) -> bool {
        let key = (test_id.to_string(), scope.to_string(), saved_path.to_string());
        let mut checks = self.checks.write().unwrap_or_else(PoisonError::into_inner);
        let Some(check) = checks.get_mut(&key) else {
            tracing::warn!(test_id, scope, saved_path, "pixelcheck.repository.unknown_check");
            return false;
        };
        if check.main.hash != saved_hash {
            tracing::warn!(
                test_id,
                expected = %check.main.hash,
                actual = saved_hash,
                "pixelcheck.repository.hash_mismatch"
            );
            return false;
        }
        if !check.knows_hash(alt_hash) {
            check.alternatives.push(crate::screenshot::Alternative::new(alt_path, alt_hash));
        }
        true
    }
}
