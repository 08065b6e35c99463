//! Utility types for trait definitions.

/// Errors raised by decomposition, buffering and I/O entry points.
///
/// Configuration errors are always detected before any communication takes place, so a
/// caller receiving one may assume that no rank has been left mid-exchange.
#[derive(thiserror::Error, Debug)]
pub enum SlabError {
    /// Inconsistent dimensions, mismatched decompositions or communicators.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed or invalid run configuration.
    #[error("Invalid run configuration: {0}")]
    Config(String),

    /// Failure reading or writing a particle chunk.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result Type
pub type Result<T> = std::result::Result<T, SlabError>;

/// Indices of the Cartesian components of a particle position.
pub const IDX_X: usize = 0;
/// Index of the y component of a particle position.
pub const IDX_Y: usize = 1;
/// Index of the z component of a particle position, the distributed axis.
pub const IDX_Z: usize = 2;
