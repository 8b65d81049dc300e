//! Plain-old-data payloads copied byte-for-byte into device buffers.
//!
//! Field order and sizes mirror `assets/shaders/modules/frame.wgsl`; the
//! size tests below catch drift between the two.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::geometry::Element;

/// Number of colour slots in the fill and frame colour tables.
pub const MAX_ATOM_COLORS: usize = 64;

/// Per-frame uniform block shared by every render pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Camera translation (view matrix).
    pub model_view: [[f32; 4]; 4],
    /// Perspective projection.
    pub projection: [[f32; 4]; 4],
    /// Model rotation about the structure centre.
    pub rotation: [[f32; 4]; 4],
    /// Inverse of the user rotation, without the centring translation.
    pub inverse_rotation: [[f32; 4]; 4],
    /// Model space to sun view space (sun rotation * model rotation).
    pub sun_rotation: [[f32; 4]; 4],
    /// Orthographic projection of the shadow map.
    pub shadow_projection: [[f32; 4]; 4],
    /// Camera view space to shadow clip space.
    pub camera_to_shadow: [[f32; 4]; 4],
    /// RGBA colour of bond cylinders.
    pub bond_color: [f32; 4],
    /// Radius per [`Element`] class, packed four to a vector.
    pub atom_radii: [[f32; 4]; 2],
    /// Latest by-element colour table; bond halves take their atom's colour.
    pub atom_colors: [[f32; 4]; MAX_ATOM_COLORS],
    /// Non-zero when shadows are sampled.
    pub has_shadows: u32,
    /// Darkening of shadowed fragments, 0 to 1.
    pub shadow_strength: f32,
    /// Non-zero when depth cueing is applied.
    pub has_depth_cueing: u32,
    /// Fog amount at the far end of the cue range, 0 to 1.
    pub depth_cueing_strength: f32,
    /// Shadow comparison bias in shadow depth units.
    pub depth_bias: f32,
    /// Atoms in a single configuration.
    pub atoms_per_configuration: u32,
    /// Configuration currently drawn.
    pub configuration_index: u32,
    /// Bond cylinder radius.
    pub bond_radius: f32,
    /// Render target size in pixels.
    pub viewport: [f32; 2],
    /// View-space distance range over which depth cueing ramps up.
    pub cue_range: [f32; 2],
}

impl Default for FrameUniforms {
    fn default() -> Self {
        let identity = Mat4::IDENTITY.to_cols_array_2d();
        Self {
            model_view: identity,
            projection: identity,
            rotation: identity,
            inverse_rotation: identity,
            sun_rotation: identity,
            shadow_projection: identity,
            camera_to_shadow: identity,
            bond_color: [0.6, 0.6, 0.6, 1.0],
            atom_radii: pack_radii(&[0.0; Element::COUNT]),
            atom_colors: [[1.0; 4]; MAX_ATOM_COLORS],
            has_shadows: 0,
            shadow_strength: 0.0,
            has_depth_cueing: 0,
            depth_cueing_strength: 0.0,
            depth_bias: 0.0,
            atoms_per_configuration: 0,
            configuration_index: 0,
            bond_radius: 0.0,
            viewport: [1.0, 1.0],
            cue_range: [1.0, 2.0],
        }
    }
}

/// Pack the six element radii into two `vec4`s.
#[must_use]
pub fn pack_radii(radii: &[f32; Element::COUNT]) -> [[f32; 4]; 2] {
    [
        [radii[0], radii[1], radii[2], radii[3]],
        [radii[4], radii[5], 0.0, 0.0],
    ]
}

/// What the fill-colour compute pass colours atoms by.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ColorBy {
    /// Element class colour table.
    #[default]
    Element,
    /// Subunit (chain) colour table.
    Subunit,
}

/// Uniform input to the fill-colour compute pass.
///
/// Both tables are always carried. An atom's colour is
/// `element_weight * element_colors[element] + subunit_weight *
/// subunit_colors[subunit]`, so a transition between modes blends each
/// atom between its own before and after colours.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FillColorInput {
    /// Weight of the element table.
    pub element_weight: f32,
    /// Weight of the subunit table.
    pub subunit_weight: f32,
    /// Number of atoms to colour; threads past it return early.
    pub atom_count: u32,
    /// Padding to the 16-byte array alignment.
    pub _pad: u32,
    /// Colour per [`Element`] class.
    pub element_colors: [[f32; 4]; MAX_ATOM_COLORS],
    /// Colour per subunit.
    pub subunit_colors: [[f32; 4]; MAX_ATOM_COLORS],
}

impl Default for FillColorInput {
    fn default() -> Self {
        Self::by_element(&default_element_colors())
    }
}

impl FillColorInput {
    /// Colour atoms by element class.
    #[must_use]
    pub fn by_element(colors: &[[f32; 4]]) -> Self {
        Self {
            element_weight: 1.0,
            subunit_weight: 0.0,
            atom_count: 0,
            _pad: 0,
            element_colors: table(colors),
            subunit_colors: table(&[]),
        }
    }

    /// Colour atoms by subunit.
    #[must_use]
    pub fn by_subunit(colors: &[[f32; 4]]) -> Self {
        Self {
            element_weight: 0.0,
            subunit_weight: 1.0,
            atom_count: 0,
            _pad: 0,
            element_colors: table(&[]),
            subunit_colors: table(colors),
        }
    }

    /// Dominant mode of this input.
    pub fn color_by(&self) -> ColorBy {
        if self.subunit_weight > self.element_weight {
            ColorBy::Subunit
        } else {
            ColorBy::Element
        }
    }

    /// Colour of one atom.
    pub fn color_of(&self, element: u32, subunit: u32) -> [f32; 4] {
        let e = self.element_colors[slot(element)];
        let s = self.subunit_colors[slot(subunit)];
        std::array::from_fn(|c| {
            self.element_weight * e[c] + self.subunit_weight * s[c]
        })
    }

    /// Host-side equivalent of the fill-colour kernel, for devices
    /// without compute shaders. Colours at most `atom_count` atoms.
    pub fn colors_for(&self, elements: &[u32], subunits: &[u32]) -> Vec<[f32; 4]> {
        elements
            .iter()
            .zip(subunits)
            .take(self.atom_count as usize)
            .map(|(&element, &subunit)| self.color_of(element, subunit))
            .collect()
    }

    /// Blend towards `target` by `t` in `[0, 1]` so that every atom's
    /// colour moves linearly from its colour under `self` to its colour
    /// under `target`. The atom count is taken from `target`.
    #[must_use]
    pub fn lerp(&self, target: &Self, t: f32) -> Self {
        let mut out = *target;
        let from_e = self.element_weight * (1.0 - t);
        let to_e = target.element_weight * t;
        let from_s = self.subunit_weight * (1.0 - t);
        let to_s = target.subunit_weight * t;
        out.element_weight = from_e + to_e;
        out.subunit_weight = from_s + to_s;
        blend_tables(
            &mut out.element_colors,
            (&self.element_colors, from_e),
            (&target.element_colors, to_e),
        );
        blend_tables(
            &mut out.subunit_colors,
            (&self.subunit_colors, from_s),
            (&target.subunit_colors, to_s),
        );
        out
    }
}

fn slot(index: u32) -> usize {
    (index as usize).min(MAX_ATOM_COLORS - 1)
}

fn table(colors: &[[f32; 4]]) -> [[f32; 4]; MAX_ATOM_COLORS] {
    let mut table = [[1.0; 4]; MAX_ATOM_COLORS];
    for (slot, color) in table.iter_mut().zip(colors) {
        *slot = *color;
    }
    table
}

/// Weighted average of two tables. With zero total weight `out` keeps its
/// contents.
fn blend_tables(
    out: &mut [[f32; 4]; MAX_ATOM_COLORS],
    (a, wa): (&[[f32; 4]; MAX_ATOM_COLORS], f32),
    (b, wb): (&[[f32; 4]; MAX_ATOM_COLORS], f32),
) {
    let total = wa + wb;
    if total <= f32::EPSILON {
        return;
    }
    for ((o, a), b) in out.iter_mut().zip(a).zip(b) {
        *o = std::array::from_fn(|c| (a[c] * wa + b[c] * wb) / total);
    }
}

/// CPK-style colours for the six element classes.
#[must_use]
pub fn default_element_colors() -> Vec<[f32; 4]> {
    vec![
        [0.423, 0.457, 0.494, 1.0],
        [0.95, 0.95, 0.95, 1.0],
        [0.188, 0.313, 0.972, 1.0],
        [1.0, 0.051, 0.051, 1.0],
        [1.0, 0.784, 0.196, 1.0],
        [0.866, 0.466, 1.0, 1.0],
    ]
}

/// Evenly spaced hues for up to [`MAX_ATOM_COLORS`] subunits.
#[must_use]
pub fn subunit_palette(count: usize) -> Vec<[f32; 4]> {
    let count = count.clamp(1, MAX_ATOM_COLORS);
    (0..count)
        .map(|i| {
            let hue = i as f32 / count as f32;
            let [r, g, b] = hsv_to_rgb(hue, 0.55, 0.9);
            [r, g, b, 1.0]
        })
        .collect()
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    match sector as i32 % 6 {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_uniforms_match_shader_layout() {
        assert_eq!(size_of::<FrameUniforms>(), 1568);
        assert_eq!(size_of::<FrameUniforms>() % 16, 0);
    }

    #[test]
    fn host_fill_follows_mode_and_count() {
        let red = [1.0, 0.0, 0.0, 1.0];
        let blue = [0.0, 0.0, 1.0, 1.0];
        let mut input = FillColorInput::by_element(&[red, blue]);
        input.atom_count = 2;
        let elements = [1, 0, 1];
        let subunits = [0, 0, 200];
        assert_eq!(input.colors_for(&elements, &subunits), vec![blue, red]);

        let mut input = FillColorInput::by_subunit(&[red, blue]);
        input.atom_count = 3;
        let colors = input.colors_for(&elements, &subunits);
        assert_eq!(colors[0], red);
        // Out-of-table subunits clamp to the last slot
        assert_eq!(colors[2], [1.0; 4]);
        assert_eq!(input.color_by(), ColorBy::Subunit);
    }

    #[test]
    fn fill_input_matches_shader_layout() {
        assert_eq!(size_of::<FillColorInput>(), 16 + 2 * 16 * 64);
    }

    #[test]
    fn radii_pack_in_element_order() {
        let packed = pack_radii(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(packed[0][2], 3.0);
        assert_eq!(packed[1][1], 6.0);
    }

    #[test]
    fn lerp_endpoints() {
        let a = FillColorInput::by_element(&[[0.0, 0.0, 0.0, 1.0]]);
        let b = FillColorInput::by_subunit(&[[1.0, 0.5, 0.0, 1.0]]);
        assert_eq!(a.lerp(&b, 0.0).color_of(0, 0), a.color_of(0, 0));
        assert_eq!(a.lerp(&b, 1.0).color_of(0, 0), b.color_of(0, 0));
        assert_eq!(a.lerp(&b, 0.5).color_of(0, 0)[1], 0.25);
        assert_eq!(a.lerp(&b, 0.75).color_by(), ColorBy::Subunit);
    }

    #[test]
    fn mode_switch_blends_each_atom_between_its_own_colors() {
        let by_element = FillColorInput::by_element(&default_element_colors());
        let by_subunit = FillColorInput::by_subunit(&subunit_palette(3));
        // Carbon in subunit 2: slot 2 means nitrogen in the element table
        let (element, subunit) = (0, 2);
        let before = by_element.color_of(element, subunit);
        let after = by_subunit.color_of(element, subunit);

        for t in [0.25, 0.5, 0.9] {
            let mid = by_element.lerp(&by_subunit, t).color_of(element, subunit);
            for c in 0..4 {
                let expected = before[c] + (after[c] - before[c]) * t;
                assert!(
                    (mid[c] - expected).abs() < 1e-5,
                    "t={t} channel {c}: {} vs {expected}",
                    mid[c]
                );
            }
        }
    }

    #[test]
    fn interrupted_transition_stays_linear_per_atom() {
        let by_element = FillColorInput::by_element(&default_element_colors());
        let by_subunit = FillColorInput::by_subunit(&subunit_palette(4));
        let partway = by_element.lerp(&by_subunit, 0.4);
        let back = partway.lerp(&by_element, 0.5);
        for (element, subunit) in [(0, 3), (2, 1), (5, 0)] {
            let start = partway.color_of(element, subunit);
            let end = by_element.color_of(element, subunit);
            let got = back.color_of(element, subunit);
            for c in 0..4 {
                assert!((got[c] - (start[c] + end[c]) * 0.5).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn palette_is_clamped() {
        assert_eq!(subunit_palette(0).len(), 1);
        assert_eq!(subunit_palette(500).len(), MAX_ATOM_COLORS);
    }
}
