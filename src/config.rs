use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::format::{ColorTable, PixelFormat};
use crate::grid::GrowthPolicy;

/// Construction parameters of a [`RasterSurface`](crate::RasterSurface).
///
/// Every field has a default, so a config file only needs the keys it
/// changes:
///
/// ```toml
/// format = "indexed8"
/// growth = "exact"
/// color_table = [[0, 0, 0, 255], [255, 255, 255, 255]]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub format: PixelFormat,
    /// RGBA entries, only meaningful for indexed formats.
    pub color_table: Vec<[u8; 4]>,
    pub growth: GrowthPolicy,
}

impl SurfaceConfig {
    pub fn new(format: PixelFormat) -> Self {
        Self { format, ..Self::default() }
    }

    pub fn with_color_table(mut self, table: impl IntoIterator<Item = Rgba<u8>>) -> Self {
        self.color_table = table.into_iter().map(|c| c.0).collect();
        self
    }

    pub fn with_growth(mut self, growth: GrowthPolicy) -> Self {
        self.growth = growth;
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SurfaceConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.color_table.len() > 256 {
            return Err(ConfigError::ColorTableTooLarge(self.color_table.len()));
        }
        if self.format.is_indexed() && self.color_table.is_empty() {
            return Err(ConfigError::MissingColorTable);
        }
        if !self.format.is_indexed() && !self.color_table.is_empty() {
            log_warn!(
                "SurfaceConfig: color table ignored for non-indexed format {:?}",
                self.format
            );
        }
        Ok(())
    }

    pub(crate) fn color_table_arc(&self) -> ColorTable {
        self.color_table.iter().map(|&c| Rgba(c)).collect::<Vec<_>>().into()
    }
}
