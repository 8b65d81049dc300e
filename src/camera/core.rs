use glam::Mat4;

use crate::math;

/// Diagonal of a 36x24 mm full-frame sensor, in millimetres.
const FULL_FRAME_DIAGONAL: f32 = 43.3;

/// Perspective camera defined by clipping planes and lens focal length.
///
/// The field of view is derived from the focal length assuming a full-frame
/// sensor, and is applied as the vertical field of view.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Near clipping plane distance.
    pub near: f32,
    /// Far clipping plane distance.
    pub far: f32,
    /// Lens focal length in millimetres.
    focal_length: f32,
    /// Field of view in degrees, derived from the focal length.
    field_of_view: f32,
    /// Viewport aspect ratio (width / height).
    aspect: f32,
    projection: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_focal_length(1.0, 10_000.0, 200.0)
    }
}

impl Camera {
    /// Camera with the given lens focal length in millimetres.
    #[must_use]
    pub fn from_focal_length(near: f32, far: f32, focal_length: f32) -> Self {
        let field_of_view =
            (2.0 * (FULL_FRAME_DIAGONAL / (2.0 * focal_length)).atan())
                .to_degrees();
        let mut camera = Self {
            near,
            far,
            focal_length,
            field_of_view,
            aspect: 1.0,
            projection: Mat4::IDENTITY,
        };
        camera.rebuild_projection();
        camera
    }

    /// Camera with the given field of view in degrees.
    #[must_use]
    pub fn from_field_of_view(near: f32, far: f32, field_of_view: f32) -> Self {
        let focal_length = FULL_FRAME_DIAGONAL
            / (2.0 * (field_of_view.to_radians() / 2.0).tan());
        Self::from_focal_length(near, far, focal_length)
    }

    /// Lens focal length in millimetres.
    pub fn focal_length(&self) -> f32 {
        self.focal_length
    }

    /// Field of view in degrees.
    pub fn field_of_view(&self) -> f32 {
        self.field_of_view
    }

    /// Current aspect ratio.
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Projection matrix for the current aspect ratio and clip planes.
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Rebuild the projection for a new viewport aspect ratio.
    pub fn update_projection(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.rebuild_projection();
    }

    /// Move the clipping planes, keeping `near >= 1`.
    pub fn set_clip_planes(&mut self, near: f32, far: f32) {
        self.near = near.max(1.0);
        self.far = far.max(self.near + 1.0);
        self.rebuild_projection();
    }

    /// Camera distance at which a sphere of `radius` fills the narrower
    /// side of the view frustum.
    pub fn distance_to_fit(&self, radius: f32, aspect: f32) -> f32 {
        let half_vertical = self.field_of_view.to_radians() / 2.0;
        let half_horizontal = (half_vertical.tan() * aspect).atan();
        let half_min = half_vertical.min(half_horizontal);
        radius / half_min.sin()
    }

    fn rebuild_projection(&mut self) {
        self.projection = math::perspective(
            self.field_of_view.to_radians(),
            self.aspect,
            self.near,
            self.far,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focal_length_round_trips_through_field_of_view() {
        let a = Camera::from_focal_length(1.0, 100.0, 200.0);
        let b = Camera::from_field_of_view(1.0, 100.0, a.field_of_view());
        assert!((b.focal_length() - 200.0).abs() < 1e-2);
    }

    #[test]
    fn long_lens_has_narrow_field_of_view() {
        let wide = Camera::from_focal_length(1.0, 100.0, 24.0);
        let tele = Camera::default();
        assert!(tele.field_of_view() < wide.field_of_view());
        assert!((tele.field_of_view() - 12.36).abs() < 0.05);
    }

    #[test]
    fn fitting_distance_grows_in_portrait() {
        let camera = Camera::default();
        let landscape = camera.distance_to_fit(50.0, 1.5);
        let portrait = camera.distance_to_fit(50.0, 0.5);
        assert!(portrait > landscape);
        assert!(landscape > 50.0);
    }

    #[test]
    fn clip_planes_stay_ordered() {
        let mut camera = Camera::default();
        camera.set_clip_planes(-5.0, 0.0);
        assert_eq!(camera.near, 1.0);
        assert!(camera.far > camera.near);
    }
}
