//! Error types for Canopy Core
//!
//! Each module owns its error enum; [`CanopyCoreError`] gathers them for
//! callers that mix configuration and workspace access.

use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::path::PathError;

/// Top-level error type for Canopy Core operations
#[derive(Error, Debug)]
pub enum CanopyCoreError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Path resolution error
    #[error("{0}")]
    Path(#[from] PathError),
}

/// Result type for Canopy Core operations
pub type Result<T> = std::result::Result<T, CanopyCoreError>;
