use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::capture::PhotoConfig;

/// How the scene is brought to output resolution.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum UpscalingMode {
    /// Render at output resolution.
    #[default]
    Off,
    /// Render at `render_scale` and upscale with the compute kernel.
    Spatial,
}

/// Resolution, pacing and photo sizes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Quality", inline)]
#[serde(default)]
pub struct QualityOptions {
    /// Upscaling mode.
    #[schemars(title = "Upscaling")]
    pub upscaling: UpscalingMode,
    /// Fraction of the output resolution rendered when upscaling.
    #[schemars(title = "Render Scale", range(min = 0.25, max = 1.0), extend("step" = 0.05))]
    pub render_scale: f32,
    /// Frames the CPU may run ahead of the GPU.
    #[schemars(title = "Frames In Flight", range(min = 2, max = 3))]
    pub frames_in_flight: usize,
    /// Edge of the interactive shadow map.
    #[schemars(skip)]
    pub shadow_map_size: u32,
    /// Edge of a photo.
    #[schemars(title = "Photo Size", range(min = 256, max = 8192))]
    pub photo_size: u32,
    /// Edge of the photo shadow map.
    #[schemars(skip)]
    pub photo_shadow_size: u32,
}

impl Default for QualityOptions {
    fn default() -> Self {
        Self {
            upscaling: UpscalingMode::Off,
            render_scale: 0.5,
            frames_in_flight: 3,
            shadow_map_size: 2048,
            photo_size: 2048,
            photo_shadow_size: 8192,
        }
    }
}

impl QualityOptions {
    /// Render scale in effect: 1 unless spatial upscaling is on.
    pub fn effective_render_scale(&self) -> f32 {
        match self.upscaling {
            UpscalingMode::Off => 1.0,
            UpscalingMode::Spatial => self.render_scale.clamp(0.25, 1.0),
        }
    }

    /// Photo settings over the viewer background.
    pub fn photo(&self) -> PhotoConfig {
        PhotoConfig {
            final_texture_size: self.photo_size,
            shadow_texture_size: self.photo_shadow_size,
            clear_background: false,
        }
    }
}
