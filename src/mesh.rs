//! Placed meshes: a transform plus the geometry, shader and material it draws with.
//!
//! Instances only hold handles, so many of them can share one uploaded
//! [`Geometry`](crate::Geometry) and one [`Material`](crate::Material).
//!
//! # Transforms
//!
//! [`Transform`] uses a builder pattern for ergonomic positioning:
//!
//! ```
//! use lumen::{Transform, Vec3, Quat};
//!
//! let transform = Transform::new()
//!     .position(Vec3::new(0.0, 2.0, -5.0))
//!     .rotation(Quat::from_rotation_y(0.5))
//!     .uniform_scale(2.0);
//! ```

use glam::{Mat3, Mat4, Quat, Vec3};

use crate::assets::{GeometryId, MaterialId, ShaderId};

/// Position, rotation and non-uniform scale of an instance.
///
/// The model matrix applies scale first, then rotation, then translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// World-space position (translation).
    pub position: Vec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
    /// Scale factors for each axis.
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    /// Rotate further by `rotation`, applied after the current one.
    pub fn rotate(&mut self, rotation: Quat) {
        self.rotation = (rotation * self.rotation).normalize();
    }

    /// Translate × rotate × scale.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Matrix that carries surface normals through a translate-rotate-scale
/// `model`: its upper 3x3 with each column divided by its squared length.
///
/// Same computation as the G-Buffer vertex shader.
pub fn normal_matrix(model: Mat4) -> Mat3 {
    let upper = Mat3::from_mat4(model);
    let column = |c: Vec3| c / c.length_squared().max(1e-12);
    Mat3::from_cols(column(upper.x_axis), column(upper.y_axis), column(upper.z_axis))
}

/// One drawable object in a scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshInstance {
    pub geometry: GeometryId,
    pub shader: ShaderId,
    pub material: MaterialId,
    pub transform: Transform,
    /// Hidden instances produce no draw work at all.
    pub visible: bool,
}

impl MeshInstance {
    pub fn new(geometry: GeometryId, shader: ShaderId, material: MaterialId) -> Self {
        Self {
            geometry,
            shader,
            material,
            transform: Transform::default(),
            visible: true,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn model(&self) -> Mat4 {
        self.transform.to_matrix()
    }

    /// `view × model`.
    pub fn model_view(&self, view: Mat4) -> Mat4 {
        view * self.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_is_translate_rotate_scale() {
        let t = Transform::new()
            .position(Vec3::new(1.0, 2.0, 3.0))
            .rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2))
            .scale(Vec3::new(2.0, 1.0, 1.0));
        // x is scaled to 2, rotated onto +y, then translated.
        let p = t.to_matrix().transform_point3(Vec3::X);
        assert!((p - Vec3::new(1.0, 4.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn normals_stay_perpendicular_under_stretch() {
        let model = Transform::new()
            .rotation(Quat::from_rotation_z(0.3))
            .scale(Vec3::new(4.0, 1.0, 1.0))
            .to_matrix();
        let normal = Vec3::new(1.0, 1.0, 0.0).normalize();
        let tangent = Vec3::new(1.0, -1.0, 0.0).normalize();

        let world_tangent = model.transform_vector3(tangent);
        let world_normal = normal_matrix(model) * normal;
        assert!(world_normal.normalize().dot(world_tangent.normalize()).abs() < 1e-5);

        let skewed = model.transform_vector3(normal);
        assert!(skewed.normalize().dot(world_tangent.normalize()).abs() > 0.1);
    }

    #[test]
    fn normal_matrix_is_rotation_for_uniform_scale() {
        let rotation = Quat::from_rotation_y(1.1);
        let model = Transform::new().rotation(rotation).uniform_scale(3.0).to_matrix();
        let n = normal_matrix(model) * Vec3::X;
        assert!(n.normalize().abs_diff_eq(rotation * Vec3::X, 1e-5));
    }

    #[test]
    fn identity_by_default() {
        assert_eq!(Transform::new().to_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn model_view_applies_view_last() {
        let instance = MeshInstance::new(GeometryId(0), ShaderId(0), MaterialId(0))
            .with_transform(Transform::from_position(Vec3::X));
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let p = instance.model_view(view).transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(1.0, 0.0, -5.0)).length() < 1e-6);
    }

    #[test]
    fn rotate_accumulates() {
        let mut t = Transform::new();
        t.rotate(Quat::from_rotation_y(0.25));
        t.rotate(Quat::from_rotation_y(0.25));
        assert!(t.rotation.abs_diff_eq(Quat::from_rotation_y(0.5), 1e-6));
    }
}
