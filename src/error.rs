//! Contract violations (misaligned offsets, double raw allocation, …) are not
//! errors: they are debug assertions plus a log line.  Only conditions a
//! caller can meaningfully react to get a variant here.

use thiserror::Error;

/// Invalid or unparsable [`SurfaceConfig`](crate::config::SurfaceConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse surface config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("indexed surfaces need a non-empty color table")]
    MissingColorTable,

    #[error("color table has {0} entries, at most 256 are addressable")]
    ColorTableTooLarge(usize),
}

/// Failure of a [`RenderEntity`](crate::render::RenderEntity) draw.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("the surface behind this render entity has been dropped")]
    SurfaceDropped,
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type RenderResult<T> = Result<T, RenderError>;
