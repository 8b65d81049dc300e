use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Shadows, depth cueing and the key light direction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Lighting", inline)]
#[serde(default)]
pub struct LightingOptions {
    /// Shadow mapping on or off.
    #[schemars(title = "Shadows")]
    pub shadows: bool,
    /// How dark shadowed areas get.
    #[schemars(title = "Shadow Strength", range(min = 0.0, max = 1.0), extend("step" = 0.05))]
    pub shadow_strength: f32,
    /// Darken atoms with distance from the camera.
    #[schemars(title = "Depth Cueing")]
    pub depth_cueing: bool,
    /// Darkening at the far end of the structure.
    #[schemars(title = "Depth Cueing Strength", range(min = 0.0, max = 1.0), extend("step" = 0.05))]
    pub depth_cueing_strength: f32,
    /// Sun azimuth in degrees.
    #[schemars(title = "Sun Azimuth", range(min = -180.0, max = 180.0), extend("step" = 1.0))]
    pub sun_theta: f32,
    /// Sun elevation in degrees.
    #[schemars(title = "Sun Elevation", range(min = -90.0, max = 90.0), extend("step" = 1.0))]
    pub sun_phi: f32,
}

impl Default for LightingOptions {
    fn default() -> Self {
        Self {
            shadows: true,
            shadow_strength: 0.4,
            depth_cueing: true,
            depth_cueing_strength: 0.3,
            sun_theta: 30.0,
            sun_phi: 30.0,
        }
    }
}
