//! Matrix and bounding-volume helpers.
//!
//! Thin wrappers over `glam` that fix the conventions used by the shaders:
//! right-handed view space looking down `-Z`, and `[0, 1]` clip depth.

use glam::{DQuat, Mat3, Mat4, Vec3};

/// Translation by `offset`.
#[must_use]
pub fn translation(offset: Vec3) -> Mat4 {
    Mat4::from_translation(offset)
}

/// Rotation of `radians` about `axis`, pivoting around `pivot`.
///
/// A zero-length axis yields the identity.
#[must_use]
pub fn rotation_about(radians: f32, axis: Vec3, pivot: Vec3) -> Mat4 {
    let Some(axis) = axis.try_normalize() else {
        return Mat4::IDENTITY;
    };
    translation(pivot)
        * Mat4::from_axis_angle(axis, radians)
        * translation(-pivot)
}

/// Rotation matrix from a double-precision quaternion (trackball input is
/// accumulated in `f64` to avoid drift).
#[must_use]
pub fn rotation_from_quaternion(q: DQuat) -> Mat4 {
    Mat4::from_quat(q.normalize().as_quat())
}

/// Uniform or non-uniform scale.
#[must_use]
pub fn scale(factors: Vec3) -> Mat4 {
    Mat4::from_scale(factors)
}

/// Inverse-transpose of the upper 3x3, for transforming normals.
#[must_use]
pub fn normal_matrix(model: Mat4) -> Mat3 {
    Mat3::from_mat4(model).inverse().transpose()
}

/// Orthographic projection mapping view-space `z = -near` to depth 0 and
/// `z = -far` to depth 1.
#[must_use]
pub fn orthographic(
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
) -> Mat4 {
    Mat4::orthographic_rh(left, right, bottom, top, near, far)
}

/// Perspective projection with a vertical field of view in radians.
#[must_use]
pub fn perspective(fovy: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh(fovy, aspect.max(f32::EPSILON), near, far)
}

/// View matrix looking from `eye` towards `target`.
#[must_use]
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    Mat4::look_at_rh(eye, target, up)
}

/// Pure rotation that maps `direction` onto view-space `-Z`, i.e. the view
/// of an observer at infinity looking along `direction`.
#[must_use]
pub fn look_along(direction: Vec3) -> Mat4 {
    let dir = direction.try_normalize().unwrap_or(Vec3::NEG_Z);
    let up = if dir.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };
    Mat4::look_to_rh(Vec3::ZERO, dir, up)
}

/// Sphere enclosing a set of points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Centre in model space.
    pub center: Vec3,
    /// Radius in Ångström.
    pub radius: f32,
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            radius: 1.0,
        }
    }
}

impl BoundingSphere {
    /// Margin added around the atom centres so that atom radii fit.
    pub const DEFAULT_MARGIN: f32 = 5.0;

    /// Sphere around the axis-aligned bounding box of `points`, grown by
    /// `margin`. An empty slice gives a sphere of radius `margin` at the
    /// origin.
    #[must_use]
    pub fn from_points(points: &[Vec3], margin: f32) -> Self {
        if points.len() <= 1 {
            return Self {
                center: points.first().copied().unwrap_or(Vec3::ZERO),
                radius: margin,
            };
        }
        let (min, max) = points.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(lo, hi), &p| (lo.min(p), hi.max(p)),
        );
        Self {
            center: (min + max) * 0.5,
            radius: (max - min).length() * 0.5 + margin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn rotation_keeps_pivot_fixed() {
        let pivot = Vec3::new(3.0, -2.0, 5.0);
        let m = rotation_about(1.1, Vec3::new(0.3, 1.0, 0.2), pivot);
        assert!(approx(m.transform_point3(pivot), pivot));
    }

    #[test]
    fn rotation_with_zero_axis_is_identity() {
        assert_eq!(rotation_about(0.5, Vec3::ZERO, Vec3::ONE), Mat4::IDENTITY);
    }

    #[test]
    fn perspective_maps_near_and_far_to_unit_depth() {
        let p = perspective(0.5, 1.5, 1.0, 100.0);
        let near = p.project_point3(Vec3::new(0.0, 0.0, -1.0));
        let far = p.project_point3(Vec3::new(0.0, 0.0, -100.0));
        assert!(near.z.abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn orthographic_maps_box_corners() {
        let o = orthographic(-2.0, 2.0, -1.0, 1.0, -4.0, 4.0);
        let corner = o.transform_point3(Vec3::new(2.0, 1.0, 4.0));
        assert!(approx(corner, Vec3::new(1.0, 1.0, 0.0)));
        let back = o.transform_point3(Vec3::new(-2.0, -1.0, -4.0));
        assert!(approx(back, Vec3::new(-1.0, -1.0, 1.0)));
    }

    #[test]
    fn look_along_points_direction_down_negative_z() {
        let dir = Vec3::new(1.0, -1.0, 0.5).normalize();
        let view = look_along(dir);
        assert!(approx(view.transform_vector3(dir), Vec3::NEG_Z));
        let vertical = look_along(Vec3::Y);
        assert!(approx(vertical.transform_vector3(Vec3::Y), Vec3::NEG_Z));
    }

    #[test]
    fn quaternion_rotation_matches_axis_angle() {
        let q = DQuat::from_axis_angle(glam::DVec3::Y, 0.7);
        let a = rotation_from_quaternion(q);
        let b = rotation_about(0.7, Vec3::Y, Vec3::ZERO);
        assert!(a.abs_diff_eq(b, 1e-5));
    }

    #[test]
    fn bounding_sphere_of_single_point_is_margin() {
        let s = BoundingSphere::from_points(&[Vec3::ONE], 5.0);
        assert_eq!(s.center, Vec3::ONE);
        assert_eq!(s.radius, 5.0);
    }

    #[test]
    fn bounding_sphere_covers_box_diagonal() {
        let pts = [Vec3::ZERO, Vec3::new(2.0, 2.0, 1.0)];
        let s = BoundingSphere::from_points(&pts, 0.0);
        assert!(approx(s.center, Vec3::new(1.0, 1.0, 0.5)));
        assert!((s.radius - 1.5).abs() < 1e-6);
    }

    #[test]
    fn normal_matrix_of_rotation_is_rotation() {
        let r = rotation_about(0.4, Vec3::X, Vec3::ZERO);
        assert!(normal_matrix(r).abs_diff_eq(Mat3::from_mat4(r), 1e-5));
    }
}
