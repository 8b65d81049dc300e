use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{geometry::Visualization, scene::ColorBy};

/// What is drawn and how it is coloured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Display", inline)]
#[serde(default)]
pub struct DisplayOptions {
    /// Atom radii and whether bonds are drawn.
    #[schemars(title = "Visualization")]
    pub visualization: Visualization,
    /// Draw bond cylinders in ball-and-stick mode.
    #[schemars(title = "Render Bonds")]
    pub render_bonds: bool,
    /// Colour table the fill pass indexes.
    #[schemars(title = "Color By")]
    pub color_by: ColorBy,
    /// One point per atom on top of the impostors. Debug builds only.
    #[schemars(title = "Debug Points")]
    pub debug_points: bool,
    /// Linear RGB background.
    #[schemars(skip)]
    pub background: [f32; 3],
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            visualization: Visualization::SolidSpheres,
            render_bonds: true,
            color_by: ColorBy::Element,
            debug_points: false,
            background: [0.0, 0.0, 0.0],
        }
    }
}

impl DisplayOptions {
    /// The background as a clear colour.
    pub fn clear_color(&self) -> wgpu::Color {
        let [r, g, b] = self.background;
        wgpu::Color {
            r: f64::from(r),
            g: f64::from(g),
            b: f64::from(b),
            a: 1.0,
        }
    }
}
