use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Multi-configuration playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Playback", inline)]
#[serde(default)]
pub struct PlaybackOptions {
    /// Configurations advanced per second.
    #[schemars(title = "Speed", range(min = 1.0, max = 120.0), extend("step" = 1.0))]
    pub fps: f32,
    /// Wrap to the first configuration after the last.
    #[schemars(title = "Loop")]
    pub looping: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            fps: 30.0,
            looping: true,
        }
    }
}
