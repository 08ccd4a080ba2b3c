use glam::{Mat4, Vec3};

use crate::input::OrbitInput;

/// Limits and sensitivities for [`OrbitController`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitConfig {
    /// Largest pitch magnitude in radians.
    pub max_pitch: f32,
    pub min_boom: f32,
    pub max_boom: f32,
    /// Radians per pixel of drag.
    pub rotate_sensitivity: f32,
    /// World units per scroll line.
    pub zoom_sensitivity: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            max_pitch: 89f32.to_radians(),
            min_boom: 1.0,
            max_boom: 500.0,
            rotate_sensitivity: 0.005,
            zoom_sensitivity: 2.0,
        }
    }
}

impl OrbitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_pitch_degrees(mut self, degrees: f32) -> Self {
        self.max_pitch = degrees.abs().to_radians();
        self
    }

    pub fn boom_limits(mut self, min: f32, max: f32) -> Self {
        self.min_boom = min;
        self.max_boom = max.max(min);
        self
    }

    pub fn sensitivity(mut self, rotate: f32, zoom: f32) -> Self {
        self.rotate_sensitivity = rotate;
        self.zoom_sensitivity = zoom;
        self
    }
}

/// Derives a view matrix from yaw and pitch around a center at a boom length.
///
/// At zero yaw and pitch the camera sits on +Z looking back at the center.
///
/// # Example
/// ```
/// use lumen::{OrbitConfig, OrbitController, OrbitInput, Vec3};
///
/// let mut orbit = OrbitController::new(OrbitConfig::default())
///     .center(Vec3::ZERO)
///     .boom(100.0);
/// orbit.apply(OrbitInput::Zoom(1.0));
/// assert!(orbit.boom < 100.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct OrbitController {
    pub center: Vec3,
    /// Radians around +Y.
    pub yaw: f32,
    /// Radians above the horizon, clamped to the configured limit.
    pub pitch: f32,
    pub boom: f32,
    config: OrbitConfig,
}

impl OrbitController {
    pub fn new(config: OrbitConfig) -> Self {
        Self {
            center: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            boom: config.min_boom.max(10.0).min(config.max_boom),
            config,
        }
    }

    pub fn center(mut self, center: Vec3) -> Self {
        self.center = center;
        self
    }

    pub fn boom(mut self, boom: f32) -> Self {
        self.boom = boom.clamp(self.config.min_boom, self.config.max_boom);
        self
    }

    pub fn yaw(mut self, yaw: f32) -> Self {
        self.yaw = yaw;
        self
    }

    pub fn pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch.clamp(-self.config.max_pitch, self.config.max_pitch);
        self
    }

    pub fn config(&self) -> &OrbitConfig {
        &self.config
    }

    /// Apply one queued gesture.
    pub fn apply(&mut self, input: OrbitInput) {
        match input {
            OrbitInput::Rotate { dx, dy } => {
                self.yaw -= dx * self.config.rotate_sensitivity;
                self.pitch = (self.pitch + dy * self.config.rotate_sensitivity)
                    .clamp(-self.config.max_pitch, self.config.max_pitch);
            }
            OrbitInput::Zoom(lines) => {
                self.boom = (self.boom - lines * self.config.zoom_sensitivity)
                    .clamp(self.config.min_boom, self.config.max_boom);
            }
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, 0.0, -self.boom))
            * Mat4::from_rotation_x(self.pitch)
            * Mat4::from_rotation_y(-self.yaw)
            * Mat4::from_translation(-self.center)
    }

    /// World position of the eye.
    pub fn position(&self) -> Vec3 {
        self.view().inverse().w_axis.truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn rest_pose_sits_on_positive_z() {
        let orbit = OrbitController::new(OrbitConfig::default())
            .center(Vec3::new(1.0, 2.0, 3.0))
            .boom(10.0);
        assert!(approx(orbit.position(), Vec3::new(1.0, 2.0, 13.0)));
    }

    #[test]
    fn boom_is_distance_to_center() {
        let orbit = OrbitController::new(OrbitConfig::default())
            .center(Vec3::new(0.0, 5.0, 0.0))
            .boom(40.0)
            .yaw(1.2)
            .pitch(0.4);
        assert!((orbit.position().distance(orbit.center) - 40.0).abs() < 1e-3);
    }

    #[test]
    fn positive_pitch_raises_the_eye() {
        let orbit = OrbitController::new(OrbitConfig::default()).boom(10.0).pitch(0.5);
        assert!(orbit.position().y > 0.0);
    }

    #[test]
    fn pitch_clamps_at_configured_max() {
        let config = OrbitConfig::default().max_pitch_degrees(60.0);
        let mut orbit = OrbitController::new(config);
        for _ in 0..100 {
            orbit.apply(OrbitInput::Rotate { dx: 0.0, dy: 500.0 });
        }
        assert!((orbit.pitch - 60f32.to_radians()).abs() < 1e-6);

        for _ in 0..100 {
            orbit.apply(OrbitInput::Rotate { dx: 0.0, dy: -500.0 });
        }
        assert!((orbit.pitch + 60f32.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn default_pitch_limit_is_89_degrees() {
        let mut orbit = OrbitController::new(OrbitConfig::default());
        orbit.apply(OrbitInput::Rotate { dx: 0.0, dy: 1e6 });
        assert!((orbit.pitch.to_degrees() - 89.0).abs() < 1e-3);
    }

    #[test]
    fn zoom_clamps_boom() {
        let config = OrbitConfig::default().boom_limits(5.0, 20.0);
        let mut orbit = OrbitController::new(config).boom(10.0);
        orbit.apply(OrbitInput::Zoom(100.0));
        assert_eq!(orbit.boom, 5.0);
        orbit.apply(OrbitInput::Zoom(-100.0));
        assert_eq!(orbit.boom, 20.0);
    }

    #[test]
    fn horizontal_drag_changes_yaw_only() {
        let mut orbit = OrbitController::new(OrbitConfig::default());
        orbit.apply(OrbitInput::Rotate { dx: 100.0, dy: 0.0 });
        assert!((orbit.yaw + 0.5).abs() < 1e-6);
        assert_eq!(orbit.pitch, 0.0);
    }
}
