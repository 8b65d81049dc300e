//! Scene state: camera, model rotation, lighting and colour.
//!
//! Every setter of a tracked property raises [`Scene::needs_redraw`]. The
//! frame loop only asks for a new frame while the scene is dirty or
//! playing, and [`Scene::update_scene`] recomputes the uniform payload only
//! in that case; otherwise it just counts the skipped frame.

pub mod color_fill;
pub mod configuration;
pub mod uniforms;

use glam::{Mat4, Vec3};

pub use self::configuration::{
    ConfigurationSelector, ConfigurationWindow, PlaybackClock,
};
pub use self::uniforms::{
    ColorBy, FillColorInput, FrameUniforms, MAX_ATOM_COLORS,
};
use crate::{
    camera::Camera,
    geometry::{bonds::BOND_RADIUS, Visualization},
    math::{self, BoundingSphere},
};

/// Rotation applied per frame while autorotating, in radians.
const AUTOROTATION_STEP: f32 = -0.001;
/// Shadow frustum slack around the bounding sphere, in Ångström.
const SHADOW_MARGIN: f32 = 3.3;

// ---------------------------------------------------------------------------
// Sun direction
// ---------------------------------------------------------------------------

/// Direction of the key light in spherical angles, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunDirection {
    /// Azimuth around the view-space Y axis.
    pub theta: f32,
    /// Elevation above the view-space XZ plane.
    pub phi: f32,
}

impl Default for SunDirection {
    fn default() -> Self {
        Self {
            theta: 30.0,
            phi: 30.0,
        }
    }
}

impl SunDirection {
    /// Unit vector pointing from the scene towards the sun.
    pub fn vector(&self) -> Vec3 {
        let (theta, phi) = (self.theta.to_radians(), self.phi.to_radians());
        Vec3::new(phi.cos() * theta.sin(), phi.sin(), phi.cos() * theta.cos())
            .normalize()
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// Camera, lighting and colour state plus the derived per-frame uniforms.
pub struct Scene {
    camera: Camera,
    camera_position: Vec3,
    aspect_ratio: f32,
    viewport: [f32; 2],
    bounding_sphere: BoundingSphere,
    user_rotation: Mat4,
    autorotating: bool,
    /// User rotation including the autorotation step of the last update,
    /// until a submitted frame commits it.
    pending_rotation: Option<Mat4>,

    has_shadows: bool,
    shadow_strength: f32,
    has_depth_cueing: bool,
    depth_cueing_strength: f32,
    sun: SunDirection,
    shadow_projection: Mat4,
    depth_bias: f32,

    visualization: Visualization,
    bond_color: [f32; 4],
    fill: FillColorInput,
    element_colors: [[f32; 4]; MAX_ATOM_COLORS],
    fill_requested: bool,

    atoms_per_configuration: u32,
    configuration_index: u32,

    needs_redraw: bool,
    is_playing: bool,
    frame: u64,
    uniforms: FrameUniforms,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Scene with the default lens, camera 1000 Å from the origin, shadows
    /// and depth cueing enabled.
    #[must_use]
    pub fn new() -> Self {
        let mut scene = Self {
            camera: Camera::default(),
            camera_position: Vec3::new(0.0, 0.0, 1000.0),
            aspect_ratio: 1.0,
            viewport: [1.0, 1.0],
            bounding_sphere: BoundingSphere::default(),
            user_rotation: Mat4::IDENTITY,
            autorotating: false,
            pending_rotation: None,
            has_shadows: true,
            shadow_strength: 0.4,
            has_depth_cueing: true,
            depth_cueing_strength: 0.3,
            sun: SunDirection::default(),
            shadow_projection: Mat4::IDENTITY,
            depth_bias: 0.0,
            visualization: Visualization::default(),
            bond_color: [0.6, 0.6, 0.6, 1.0],
            fill: FillColorInput::default(),
            element_colors: FillColorInput::default().element_colors,
            fill_requested: true,
            atoms_per_configuration: 0,
            configuration_index: 0,
            needs_redraw: true,
            is_playing: false,
            frame: 0,
            uniforms: FrameUniforms::default(),
        };
        scene.fit_to(BoundingSphere::default());
        scene
    }

    // -- Frame update -------------------------------------------------------

    /// Recompute the uniform payload if the scene is dirty or playing.
    ///
    /// Returns `true` if anything was recomputed. A clean, paused scene only
    /// advances the frame counter.
    pub fn update_scene(&mut self) -> bool {
        if !self.needs_redraw && !self.is_playing {
            self.frame += 1;
            return false;
        }

        // Committed by `acknowledge_frame` once a frame is submitted
        let user_rotation = if self.autorotating {
            let axis = self.user_rotation.inverse().transform_vector3(Vec3::Y);
            let turned = self.user_rotation
                * math::rotation_about(AUTOROTATION_STEP, axis, Vec3::ZERO);
            self.pending_rotation = Some(turned);
            turned
        } else {
            self.pending_rotation = None;
            self.user_rotation
        };

        self.camera.update_projection(self.aspect_ratio);
        let model_view = math::translation(-self.camera_position);
        let rotation =
            user_rotation * math::translation(-self.bounding_sphere.center);
        let sun = math::look_along(-self.sun.vector());

        let u = &mut self.uniforms;
        u.model_view = model_view.to_cols_array_2d();
        u.projection = self.camera.projection().to_cols_array_2d();
        u.rotation = rotation.to_cols_array_2d();
        u.inverse_rotation = user_rotation.inverse().to_cols_array_2d();
        u.sun_rotation = (sun * rotation).to_cols_array_2d();
        u.shadow_projection = self.shadow_projection.to_cols_array_2d();
        u.camera_to_shadow = (self.shadow_projection * sun * model_view.inverse())
            .to_cols_array_2d();

        u.has_shadows = u32::from(self.has_shadows);
        u.shadow_strength = self.shadow_strength;
        u.has_depth_cueing = u32::from(self.has_depth_cueing);
        u.depth_cueing_strength = self.depth_cueing_strength;
        u.depth_bias = self.depth_bias;

        u.atom_radii = uniforms::pack_radii(&self.visualization.radii());
        u.atom_colors = self.element_colors;
        u.bond_color = self.bond_color;
        u.bond_radius = BOND_RADIUS;
        u.atoms_per_configuration = self.atoms_per_configuration;
        u.configuration_index = self.configuration_index;
        u.viewport = self.viewport;
        let distance = self.camera_position.z;
        let radius = self.bounding_sphere.radius;
        u.cue_range = [(distance - radius).max(0.0), distance + radius];

        self.frame += 1;
        // Autorotation keeps the scene dirty
        self.needs_redraw = self.autorotating;
        true
    }

    /// Uniform payload from the last [`Scene::update_scene`].
    pub fn uniforms(&self) -> &FrameUniforms {
        &self.uniforms
    }

    /// Whether a tracked property changed since the last update.
    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    /// Whether configuration playback is running.
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Whether the frame loop should draw this tick.
    pub fn wants_frame(&self) -> bool {
        self.needs_redraw || self.is_playing
    }

    /// Frames seen so far, drawn or skipped.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Force the next update to recompute, e.g. after a dropped frame.
    pub fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }

    // -- Camera -------------------------------------------------------------

    /// Move the camera so `bounding_sphere` fills the view and fit the clip
    /// planes, depth bias and shadow frustum around it.
    pub fn fit_to(&mut self, bounding_sphere: BoundingSphere) {
        self.bounding_sphere = bounding_sphere;
        let radius = bounding_sphere.radius;
        let distance = self.camera.distance_to_fit(radius, self.aspect_ratio);
        self.camera_position = Vec3::new(0.0, 0.0, distance);
        self.camera.set_clip_planes(distance - radius, distance + radius);
        self.depth_bias = 2.0 / (self.camera.far - self.camera.near);

        let half = (radius - SHADOW_MARGIN).max(1.0);
        let depth = radius + SHADOW_MARGIN;
        self.shadow_projection =
            math::orthographic(-half, half, -half, half, -depth, depth);
        self.needs_redraw = true;
    }

    /// Pan the camera in view space.
    pub fn translate_camera(&mut self, x: f32, y: f32) {
        self.camera_position.x += x;
        self.camera_position.y += y;
        self.needs_redraw = true;
    }

    /// Undo panning and user rotation.
    pub fn reset_camera(&mut self) {
        self.camera_position.x = 0.0;
        self.camera_position.y = 0.0;
        self.user_rotation = Mat4::IDENTITY;
        self.pending_rotation = None;
        self.needs_redraw = true;
    }

    /// Rotate the model about the screen axes by the given angles in
    /// radians.
    pub fn rotate(&mut self, yaw: f32, pitch: f32) {
        let screen = math::rotation_about(yaw, Vec3::Y, Vec3::ZERO)
            * math::rotation_about(pitch, Vec3::X, Vec3::ZERO);
        self.user_rotation = screen * self.user_rotation;
        self.pending_rotation = None;
        self.needs_redraw = true;
    }

    /// Replace the user rotation.
    pub fn set_user_rotation(&mut self, rotation: Mat4) {
        self.user_rotation = rotation;
        self.pending_rotation = None;
        self.needs_redraw = true;
    }

    /// Aspect ratio of the drawable.
    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    /// Set the drawable aspect ratio without changing the viewport size.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio.max(f32::EPSILON);
        self.needs_redraw = true;
    }

    /// Render target size in pixels; also updates the aspect ratio.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        self.viewport = [w, h];
        self.set_aspect_ratio(w / h);
    }

    /// Render target size in pixels.
    pub fn viewport(&self) -> [f32; 2] {
        self.viewport
    }

    /// Enable slow continuous rotation about the model's vertical axis.
    pub fn set_autorotating(&mut self, autorotating: bool) {
        self.autorotating = autorotating;
        self.needs_redraw = true;
    }

    /// The camera.
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    // -- Lighting -----------------------------------------------------------

    /// Toggle shadow mapping.
    pub fn set_shadows(&mut self, enabled: bool) {
        self.has_shadows = enabled;
        self.needs_redraw = true;
    }

    /// Whether shadows are enabled in the scene.
    pub fn has_shadows(&self) -> bool {
        self.has_shadows
    }

    /// Shadow darkening, clamped to `[0, 1]`.
    pub fn set_shadow_strength(&mut self, strength: f32) {
        self.shadow_strength = strength.clamp(0.0, 1.0);
        self.needs_redraw = true;
    }

    /// Toggle depth cueing.
    pub fn set_depth_cueing(&mut self, enabled: bool) {
        self.has_depth_cueing = enabled;
        self.needs_redraw = true;
    }

    /// Depth cueing amount, clamped to `[0, 1]`.
    pub fn set_depth_cueing_strength(&mut self, strength: f32) {
        self.depth_cueing_strength = strength.clamp(0.0, 1.0);
        self.needs_redraw = true;
    }

    /// Point the sun at the given spherical angles, in degrees.
    pub fn set_sun_direction(&mut self, theta: f32, phi: f32) {
        self.sun = SunDirection { theta, phi };
        self.needs_redraw = true;
    }

    // -- Appearance ---------------------------------------------------------

    /// Switch between solid spheres and ball-and-stick.
    pub fn set_visualization(&mut self, visualization: Visualization) {
        self.visualization = visualization;
        self.needs_redraw = true;
    }

    /// Current visualization mode.
    pub fn visualization(&self) -> Visualization {
        self.visualization
    }

    /// Colour of bond cylinders.
    pub fn set_bond_color(&mut self, color: [f32; 4]) {
        self.bond_color = color;
        self.needs_redraw = true;
    }

    /// Replace the fill-colour table and request a fill-colour pass.
    pub fn set_fill_color(&mut self, fill: FillColorInput) {
        // Bond halves keep the last element table shown
        if fill.element_weight > 0.0 {
            self.element_colors = fill.element_colors;
        }
        self.fill = fill;
        self.fill_requested = true;
        self.needs_redraw = true;
    }

    /// Current fill-colour table.
    pub fn fill_color(&self) -> &FillColorInput {
        &self.fill
    }

    /// Whether the colour buffer must be refilled this frame.
    pub fn fill_color_requested(&self) -> bool {
        self.fill_requested
    }

    /// Commit what a submitted frame showed: the autorotation step taken
    /// by the last update, and the fill-colour pass it carried.
    pub fn acknowledge_frame(&mut self) {
        if let Some(rotation) = self.pending_rotation.take() {
            self.user_rotation = rotation;
        }
        self.fill_requested = false;
    }

    // -- Playback -----------------------------------------------------------

    /// Start or stop configuration playback.
    pub fn set_playing(&mut self, playing: bool) {
        self.is_playing = playing;
        self.needs_redraw = true;
    }

    /// Describe the structure being drawn.
    pub fn set_structure(&mut self, atoms_per_configuration: usize) {
        self.atoms_per_configuration = atoms_per_configuration as u32;
        self.configuration_index = 0;
        self.fill.atom_count = atoms_per_configuration as u32;
        self.fill_requested = true;
        self.needs_redraw = true;
    }

    /// Configuration currently drawn.
    pub fn set_configuration_index(&mut self, index: usize) {
        self.configuration_index = index as u32;
        self.needs_redraw = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(scene: &Scene) -> Vec<u8> {
        bytemuck::bytes_of(scene.uniforms()).to_vec()
    }

    #[test]
    fn clean_update_only_counts_frames() {
        let mut scene = Scene::new();
        assert!(scene.update_scene());
        let before = bytes(&scene);
        let frame = scene.frame();

        assert!(!scene.needs_redraw());
        assert!(!scene.update_scene());
        assert_eq!(bytes(&scene), before);
        assert_eq!(scene.frame(), frame + 1);
    }

    #[test]
    fn setters_mark_scene_dirty() {
        let mut scene = Scene::new();
        let _ = scene.update_scene();
        let before = bytes(&scene);

        scene.set_shadow_strength(0.9);
        assert!(scene.needs_redraw());
        assert!(scene.update_scene());
        assert_eq!(scene.uniforms().shadow_strength, 0.9);
        assert_ne!(bytes(&scene), before);

        let setters: [fn(&mut Scene); 8] = [
            |s| s.set_shadows(false),
            |s| s.set_depth_cueing(false),
            |s| s.set_depth_cueing_strength(0.1),
            |s| s.set_sun_direction(10.0, 80.0),
            |s| s.set_visualization(Visualization::BallAndStick),
            |s| s.translate_camera(1.0, 0.0),
            |s| s.set_viewport(800, 600),
            |s| s.set_fill_color(FillColorInput::default()),
        ];
        for set in setters {
            let _ = scene.update_scene();
            assert!(!scene.needs_redraw());
            set(&mut scene);
            assert!(scene.needs_redraw());
        }
    }

    #[test]
    fn playing_scene_always_updates() {
        let mut scene = Scene::new();
        scene.set_playing(true);
        assert!(scene.update_scene());
        assert!(scene.update_scene());
    }

    #[test]
    fn autorotation_keeps_scene_dirty_and_turns() {
        let mut scene = Scene::new();
        scene.set_autorotating(true);
        let _ = scene.update_scene();
        let first = scene.uniforms().rotation;
        assert!(scene.needs_redraw());
        scene.acknowledge_frame();
        let _ = scene.update_scene();
        assert_ne!(scene.uniforms().rotation, first);
    }

    #[test]
    fn unacknowledged_updates_do_not_accumulate_rotation() {
        let mut scene = Scene::new();
        scene.set_autorotating(true);
        let _ = scene.update_scene();
        let first = scene.uniforms().rotation;
        for _ in 0..10 {
            let _ = scene.update_scene();
            assert_eq!(scene.uniforms().rotation, first);
        }
        scene.acknowledge_frame();
        let _ = scene.update_scene();
        assert_ne!(scene.uniforms().rotation, first);
    }

    #[test]
    fn fit_places_camera_outside_sphere() {
        let mut scene = Scene::new();
        scene.fit_to(BoundingSphere {
            center: Vec3::new(5.0, 5.0, 5.0),
            radius: 40.0,
        });
        assert!(scene.camera().near >= 1.0);
        assert!(scene.camera().far > 40.0);
        let _ = scene.update_scene();
        let cue = scene.uniforms().cue_range;
        assert!(cue[1] - cue[0] > 79.0);
        let bias = scene.uniforms().depth_bias;
        assert!((bias - 2.0 / (scene.camera().far - scene.camera().near)).abs() < 1e-6);
    }

    #[test]
    fn structure_centre_maps_to_camera_axis() {
        let mut scene = Scene::new();
        let center = Vec3::new(10.0, -4.0, 3.0);
        scene.fit_to(BoundingSphere {
            center,
            radius: 20.0,
        });
        let _ = scene.update_scene();
        let u = scene.uniforms();
        let view = Mat4::from_cols_array_2d(&u.model_view)
            * Mat4::from_cols_array_2d(&u.rotation);
        let p = view.transform_point3(center);
        assert!(p.x.abs() < 1e-3 && p.y.abs() < 1e-3);
        assert!(p.z < 0.0);
    }

    #[test]
    fn shadow_transform_agrees_with_camera_path() {
        let mut scene = Scene::new();
        scene.fit_to(BoundingSphere {
            center: Vec3::ZERO,
            radius: 30.0,
        });
        scene.rotate(0.3, -0.2);
        let _ = scene.update_scene();
        let u = scene.uniforms();
        let p = Vec3::new(3.0, 1.0, -2.0);
        let view = Mat4::from_cols_array_2d(&u.model_view)
            * Mat4::from_cols_array_2d(&u.rotation);
        let via_camera =
            Mat4::from_cols_array_2d(&u.camera_to_shadow).transform_point3(view.transform_point3(p));
        let direct = (Mat4::from_cols_array_2d(&u.shadow_projection)
            * Mat4::from_cols_array_2d(&u.sun_rotation))
        .transform_point3(p);
        assert!((via_camera - direct).length() < 1e-3);
    }

    #[test]
    fn fill_request_is_acknowledged() {
        let mut scene = Scene::new();
        assert!(scene.fill_color_requested());
        scene.acknowledge_frame();
        assert!(!scene.fill_color_requested());
        scene.set_structure(10);
        assert!(scene.fill_color_requested());
        assert_eq!(scene.fill_color().atom_count, 10);
    }
}
