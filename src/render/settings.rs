use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    foundation::error::{StampError, StampResult},
    geometry::scale::PreviewBox,
};

/// Environment variable holding the preview bounding box as `"WxH"`.
pub const ENV_PREVIEW_BOX: &str = "CERTSTAMP_PREVIEW_BOX";
/// Environment variable naming one extra font directory.
pub const ENV_FONT_DIR: &str = "CERTSTAMP_FONT_DIR";
/// Environment variable selecting stored (uncompressed) archive entries when set to `1`.
pub const ENV_ARCHIVE_STORE: &str = "CERTSTAMP_ARCHIVE_STORE";

/// How PNG entries are packed into the output archive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveCompression {
    /// Deflate-compressed entries.
    #[default]
    Deflate,
    /// Entries stored as-is.
    Stored,
}

/// Knobs shared by preview and batch rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Bounding box the editor fits templates into.
    pub preview_box: PreviewBox,
    /// Extra directories scanned for font files on top of system fonts.
    #[serde(default)]
    pub font_dirs: Vec<PathBuf>,
    /// Archive entry packing.
    #[serde(default)]
    pub archive_compression: ArchiveCompression,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            preview_box: PreviewBox::default(),
            font_dirs: Vec::new(),
            archive_compression: ArchiveCompression::Deflate,
        }
    }
}

impl RenderSettings {
    /// Defaults overridden by `CERTSTAMP_*` environment variables.
    pub fn from_env() -> StampResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RenderSettings::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StampResult<Self> {
        let mut settings = Self::default();

        if let Some(raw) = lookup(ENV_PREVIEW_BOX) {
            settings.preview_box = PreviewBox::parse(&raw).ok_or_else(|| {
                StampError::validation(format!(
                    "{ENV_PREVIEW_BOX} must look like 800x600, got '{raw}'"
                ))
            })?;
        }
        if let Some(dir) = lookup(ENV_FONT_DIR).filter(|d| !d.trim().is_empty()) {
            settings.font_dirs.push(PathBuf::from(dir));
        }
        if lookup(ENV_ARCHIVE_STORE).is_some_and(|v| v.trim() == "1") {
            settings.archive_compression = ArchiveCompression::Stored;
        }

        Ok(settings)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/settings.rs"]
mod tests;
