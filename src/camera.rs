//! Perspective and orthographic cameras.
//!
//! A camera's only job each frame is [`Camera::update`]: derive its view and
//! projection and publish them into the [`FrameContext`] that the draw
//! commands read from.

use glam::{Mat4, Vec2, Vec3};

use crate::orbit_camera::OrbitController;

/// Matrices and eye position published by a camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewProjection {
    pub projection: Mat4,
    pub view: Mat4,
    /// Inverse of `view`.
    pub camera_matrix: Mat4,
    pub position: Vec3,
}

impl Default for ViewProjection {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            camera_matrix: Mat4::IDENTITY,
            position: Vec3::ZERO,
        }
    }
}

impl ViewProjection {
    fn from_view(projection: Mat4, view: Mat4) -> Self {
        let camera_matrix = view.inverse();
        Self {
            projection,
            view,
            camera_matrix,
            position: camera_matrix.w_axis.truncate(),
        }
    }
}

/// Per-frame state shared by everything that draws.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameContext {
    /// Viewport size in pixels.
    pub viewport: Vec2,
    /// Seconds since start.
    pub time: f32,
    pub dt: f32,
    /// Whatever camera updated last.
    pub camera: ViewProjection,
}

impl FrameContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Vec2::new(width as f32, height as f32),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub look_at: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
    /// When set, replaces `position`/`look_at` as the source of the view.
    pub orbit: Option<OrbitController>,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 10.0),
            look_at: Vec3::ZERO,
            fov: 45f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            aspect: 1.0,
            orbit: None,
        }
    }
}

impl PerspectiveCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn looking_at(mut self, target: Vec3) -> Self {
        self.look_at = target;
        self
    }

    pub fn with_fov(mut self, fov_degrees: f32) -> Self {
        self.fov = fov_degrees.to_radians();
        self
    }

    pub fn clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn with_orbit(mut self, orbit: OrbitController) -> Self {
        self.orbit = Some(orbit);
        self
    }

    fn view(&self) -> Mat4 {
        match &self.orbit {
            Some(orbit) => orbit.view(),
            None => Mat4::look_at_rh(self.position, self.look_at, Vec3::Y),
        }
    }

    fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }
}

/// Axis-aligned camera whose frustum keeps a requested size on screen.
#[derive(Clone, Debug, PartialEq)]
pub struct OrthographicCamera {
    pub look_at: Vec3,
    /// Requested visible width and height in world units.
    pub target: Vec2,
    /// Distance from the look-at plane along +Z.
    pub depth: f32,
    pub near: f32,
    pub far: f32,
    half_extents: Vec2,
}

impl OrthographicCamera {
    pub fn new(target_width: f32, target_height: f32) -> Self {
        let target = Vec2::new(target_width, target_height);
        Self {
            look_at: Vec3::ZERO,
            target,
            depth: 10.0,
            near: 0.1,
            far: 100.0,
            half_extents: target / 2.0,
        }
    }

    pub fn looking_at(mut self, target: Vec3) -> Self {
        self.look_at = target;
        self
    }

    pub fn depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }

    /// Visible half width and half height at the current viewport aspect.
    pub fn half_extents(&self) -> Vec2 {
        self.half_extents
    }

    /// Fit the frustum to a viewport aspect. The shorter screen dimension
    /// shows exactly its requested size; the other grows to match.
    pub fn fit(&mut self, aspect: f32) {
        let (width, height) = if aspect >= 1.0 {
            (self.target.y * aspect, self.target.y)
        } else {
            (self.target.x, self.target.x / aspect)
        };
        self.half_extents = Vec2::new(width, height) / 2.0;
    }

    fn position(&self) -> Vec3 {
        self.look_at + Vec3::new(0.0, 0.0, self.depth)
    }

    fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.look_at, Vec3::Y)
    }

    fn projection(&self) -> Mat4 {
        let h = self.half_extents;
        Mat4::orthographic_rh(-h.x, h.x, -h.y, h.y, self.near, self.far)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Camera {
    Perspective(PerspectiveCamera),
    Orthographic(OrthographicCamera),
}

impl Camera {
    /// Derive view and projection and publish them into `ctx`.
    pub fn update(&mut self, ctx: &mut FrameContext) -> ViewProjection {
        let vp = self.view_projection();
        ctx.camera = vp;
        vp
    }

    /// Current matrices without touching any frame state.
    pub fn view_projection(&self) -> ViewProjection {
        match self {
            Camera::Perspective(camera) => ViewProjection::from_view(camera.projection(), camera.view()),
            Camera::Orthographic(camera) => ViewProjection::from_view(camera.projection(), camera.view()),
        }
    }

    /// Follow a viewport size change. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let aspect = width as f32 / height as f32;
        match self {
            Camera::Perspective(camera) => camera.aspect = aspect,
            Camera::Orthographic(camera) => camera.fit(aspect),
        }
    }

    pub fn orbit_mut(&mut self) -> Option<&mut OrbitController> {
        match self {
            Camera::Perspective(camera) => camera.orbit.as_mut(),
            Camera::Orthographic(_) => None,
        }
    }
}

impl From<PerspectiveCamera> for Camera {
    fn from(camera: PerspectiveCamera) -> Self {
        Camera::Perspective(camera)
    }
}

impl From<OrthographicCamera> for Camera {
    fn from(camera: OrthographicCamera) -> Self {
        Camera::Orthographic(camera)
    }
}
