//! Error types for skipconv
//!
//! This module defines the error hierarchy for the skipconv crate. Errors
//! carry enough detail to debug a misconfigured operator, and each variant
//! maps onto the integer status code the surrounding framework expects.

use thiserror::Error;

/// Result type alias for skipconv operations
pub type Result<T> = std::result::Result<T, SkipConvError>;

/// Main error type for skipconv
#[derive(Error, Debug)]
pub enum SkipConvError {
    /// Operator parameters are inconsistent or unsupported
    #[error("Configuration error: {0}")]
    Config(String),

    /// A tensor or cache buffer could not be sized as requested
    #[error("Allocation error: {0}")]
    Allocation(String),

    /// The weight source ran out of data
    #[error("Model data error: {0}")]
    ModelData(String),

    /// Input tensor shape does not match the loaded parameters
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// IO errors from reader-backed weight sources
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SkipConvError {
    /// The negative status code used by the framework boundary.
    ///
    /// Allocation failures report -100, everything else -1, mirroring the
    /// layer contract of the enclosing inference framework.
    pub fn status_code(&self) -> i32 {
        match self {
            SkipConvError::Allocation(_) => -100,
            _ => -1,
        }
    }
}
