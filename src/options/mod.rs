//! Render options with TOML preset support.
//!
//! Every tweakable setting of the renderer (display, lighting, playback,
//! quality) lives here. Options serialize to and from TOML, and every
//! section uses `#[serde(default)]` so a partial file only overrides what
//! it names.

mod display;
mod lighting;
mod playback;
mod quality;

use std::{fmt, path::Path};

pub use display::DisplayOptions;
pub use lighting::LightingOptions;
pub use playback::PlaybackOptions;
pub use quality::{QualityOptions, UpscalingMode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Why options could not be loaded or saved.
#[derive(Debug)]
pub enum OptionsError {
    /// Reading or writing the file failed.
    Io(std::io::Error),
    /// The file is not valid options TOML.
    Parse(String),
    /// The options could not be written as TOML.
    Serialize(String),
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "options I/O: {e}"),
            Self::Parse(msg) => write!(f, "invalid options: {msg}"),
            Self::Serialize(msg) => write!(f, "cannot serialize options: {msg}"),
        }
    }
}

impl std::error::Error for OptionsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(_) | Self::Serialize(_) => None,
        }
    }
}

impl From<std::io::Error> for OptionsError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Top-level options container.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[serde(default)]
pub struct RenderOptions {
    /// What is drawn and how it is coloured.
    pub display: DisplayOptions,
    /// Shadows, depth cueing and sun direction.
    pub lighting: LightingOptions,
    /// Configuration playback.
    pub playback: PlaybackOptions,
    /// Resolution, pacing and photo sizes.
    pub quality: QualityOptions,
}

impl RenderOptions {
    /// Generate JSON Schema describing the UI-exposed options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(RenderOptions)
    }

    /// Parse options from TOML text. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::Parse`] on malformed TOML or wrongly typed
    /// fields.
    pub fn from_toml(text: &str) -> Result<Self, OptionsError> {
        toml::from_str(text).map_err(|e| OptionsError::Parse(e.to_string()))
    }

    /// Pretty-printed TOML.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::Serialize`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, OptionsError> {
        toml::to_string_pretty(self)
            .map_err(|e| OptionsError::Serialize(e.to_string()))
    }

    /// Load options from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path)?;
        let options = Self::from_toml(&content)?;
        log::info!("loaded render options from {}", path.display());
        Ok(options)
    }

    /// Save options to a TOML file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError`] if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), OptionsError> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{geometry::Visualization, scene::ColorBy};

    #[test]
    fn default_round_trips_through_toml() {
        let opts = RenderOptions::default();
        let parsed = RenderOptions::from_toml(&opts.to_toml().unwrap()).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[display]
visualization = "ball_and_stick"
color_by = "subunit"

[quality]
upscaling = "spatial"
"#;
        let opts = RenderOptions::from_toml(toml_str).unwrap();
        assert_eq!(opts.display.visualization, Visualization::BallAndStick);
        assert_eq!(opts.display.color_by, ColorBy::Subunit);
        assert!(opts.display.render_bonds);
        assert_eq!(opts.quality.upscaling, UpscalingMode::Spatial);
        assert_eq!(opts.quality.frames_in_flight, 3);
        assert_eq!(opts.lighting, LightingOptions::default());
    }

    #[test]
    fn bad_values_are_parse_errors() {
        let err = RenderOptions::from_toml("[lighting]\nshadows = 3\n").unwrap_err();
        assert!(matches!(err, OptionsError::Parse(_)));
        assert!(err.to_string().starts_with("invalid options"));
    }

    #[test]
    fn render_scale_only_applies_when_upscaling() {
        let mut quality = QualityOptions::default();
        assert_eq!(quality.effective_render_scale(), 1.0);
        quality.upscaling = UpscalingMode::Spatial;
        quality.render_scale = 0.1;
        assert_eq!(quality.effective_render_scale(), 0.25);
    }

    #[test]
    fn photo_uses_print_sizes() {
        let photo = QualityOptions::default().photo();
        assert_eq!(photo.final_texture_size, 2048);
        assert_eq!(photo.shadow_texture_size, 8192);
    }

    #[test]
    fn save_then_load_from_disk() {
        let dir = std::env::temp_dir().join(format!(
            "spheron-options-{}",
            std::process::id()
        ));
        let path = dir.join("preset.toml");
        let mut opts = RenderOptions::default();
        opts.playback.fps = 12.0;
        opts.save(&path).unwrap();
        assert_eq!(RenderOptions::load(&path).unwrap(), opts);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RenderOptions::load(Path::new("/nonexistent/spheron.toml"))
            .unwrap_err();
        assert!(matches!(err, OptionsError::Io(_)));
    }

    #[test]
    fn schema_has_expected_properties() {
        let schema_value =
            serde_json::to_value(RenderOptions::json_schema()).unwrap();
        let props = schema_value["properties"].as_object().unwrap();
        for section in ["display", "lighting", "playback", "quality"] {
            assert!(props.contains_key(section), "missing {section}");
        }

        let display = &props["display"]["properties"];
        assert!(display.get("visualization").is_some());
        assert!(display.get("background").is_none());

        let quality = &props["quality"]["properties"];
        assert!(quality.get("render_scale").is_some());
        assert!(quality.get("shadow_map_size").is_none());
    }
}
