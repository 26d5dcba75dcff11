//! Result and error types for PixelCheck.

use thiserror::Error;

/// Result type for PixelCheck operations
pub type PixelCheckResult<T> = Result<T, PixelCheckError>;

/// Errors that can occur in PixelCheck
#[derive(Debug, Error)]
pub enum PixelCheckError {
    /// The recorded hash algorithm is not one we can compute
    #[error("Unsupported hash algorithm: {algorithm}")]
    UnsupportedHashAlgorithm {
        /// Algorithm name as recorded
        algorithm: String,
    },

    /// A recorded or captured image could not be found
    #[error("Image not found: {path}")]
    ImageNotFound {
        /// Path that was requested
        path: String,
    },

    /// Image processing error (rendering, encoding, etc.)
    #[error("Image processing failed: {message}")]
    ImageProcessing {
        /// Error message
        message: String,
    },

    /// Configuration is out of range or malformed
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// Accepting a failure could not be persisted to the repository
    #[error("Failed to persist {id}: {message}")]
    PersistFailed {
        /// Failure identifier (display form)
        id: String,
        /// Error message
        message: String,
    },

    /// Diff generation failed for a bundle
    #[error("Diff generation failed: {message}")]
    DiffGeneration {
        /// Error message
        message: String,
    },

    /// Review of a single failure failed
    #[error("Review of {id} failed: {message}")]
    Review {
        /// Failure identifier (display form)
        id: String,
        /// Error message
        message: String,
    },

    /// Tracing subscriber could not be installed
    #[error("Logging setup failed: {message}")]
    Logging {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Image codec error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
