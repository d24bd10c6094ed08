//! Error types for Delve.
//!
//! Only I/O and decoding boundaries return errors. Gameplay queries report
//! failure through sentinels (empty paths, invalid tiles, `false`).

use thiserror::Error;

/// Top-level error type for Delve operations.
#[derive(Debug, Error)]
pub enum DelveError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Level image errors
    #[error("Level error: {0}")]
    Level(#[from] LevelError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

/// Level and heightmap image errors.
#[derive(Debug, Error)]
pub enum LevelError {
    /// The image could not be decoded
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Pixel buffer does not match the declared dimensions
    #[error("Unsupported dimensions {width}x{height} for {len} bytes")]
    Dimensions {
        /// Declared width
        width: u32,
        /// Declared height
        height: u32,
        /// Actual buffer length
        len: usize,
    },

    /// No player spawn pixel was found in a level that requires one
    #[error("Level has no player spawn")]
    MissingPlayerSpawn,
}

/// Result type alias for Delve operations.
pub type DelveResult<T> = Result<T, DelveError>;
