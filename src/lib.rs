//! # Lumen
//!
//! **A small deferred-shading renderer on wgpu.**
//!
//! Meshes are drawn once into a four-channel G-Buffer (world position,
//! albedo, normal, packed metallic/roughness/AO). A single full-screen pass
//! then resolves every point light with a Cook-Torrance BRDF. A debug overlay
//! can show the raw channels down the left edge of the window.
//!
//! ## Quick Start
//!
//! ```no_run
//! use lumen::*;
//!
//! fn main() -> Result<(), AppError> {
//!     init_logging(LoggingConfig::default());
//!
//!     run(|ctx| {
//!         let shader = ctx.geometry_shader();
//!         let cube = ctx.geometry(&VertexData::cube(), "Cube")?;
//!
//!         let albedo = ctx.texture(Texture::solid(ctx.gpu, [200, 60, 60, 255], "Red"));
//!         let normal = ctx.texture(Texture::solid(ctx.gpu, FLAT_NORMAL_PIXEL, "Flat"));
//!         let packed = ctx.texture(Texture::solid(ctx.gpu, material_pixel(0.0, 0.8, 1.0), "Rough"));
//!         let material = ctx.material(Material::new(albedo, normal, packed));
//!
//!         let key = ctx.add_mesh(
//!             MeshInstance::new(cube, shader, material)
//!                 .with_transform(Transform::new().uniform_scale(20.0)),
//!         );
//!         ctx.add_light(PointLight::new(Vec3::new(0.0, 50.0, 100.0), Vec3::splat(255.0)));
//!
//!         Ok(move |frame: &mut Frame| {
//!             if let Some(cube) = frame.scene.mesh_mut(key) {
//!                 cube.transform.rotate(Quat::from_rotation_y(frame.dt));
//!             }
//!         })
//!     })
//! }
//! ```
//!
//! ## Layout
//!
//! - Resources live in [`Assets`] behind typed handles ([`GeometryId`],
//!   [`TextureId`], [`MaterialId`], [`ShaderId`]).
//! - A [`Scene`] holds mesh instances and point lights in insertion order.
//! - [`plan_frame`] decides every draw without a device; [`DeferredRenderer`]
//!   encodes the plan.
//! - [`shading`] is a CPU copy of the lighting shader, handy for checking
//!   what a pixel should look like.

mod app;
mod assets;
mod camera;
mod gbuffer;
mod geometry;
mod gpu;
mod input;
mod light;
mod logging;
mod material;
mod mesh;
mod obj;
mod orbit_camera;
pub mod plan;
mod renderer;
pub mod scene;
mod settings;
mod shader;
pub mod shaders;
pub mod shading;
mod texture;

pub use app::{AppConfig, AppError, Frame, SetupContext, run, run_with_config};
pub use assets::{Assets, GeometryId, MaterialId, ShaderId, TextureId};
pub use camera::{Camera, FrameContext, OrthographicCamera, PerspectiveCamera, ViewProjection};
pub use gbuffer::{ATTACHMENTS, DEPTH_FORMAT, GBuffer, attachment_format};
pub use geometry::{
    Attribute, Geometry, GeometryError, VertexBuffer, VertexData, VertexLayoutKey, VertexRole,
    triangle_tangent,
};
pub use gpu::{GpuContext, GpuError, HEADLESS_FORMAT};
pub use input::{InputEvent, InputQueue, OrbitInput};
pub use light::{LIGHT_ARRAY_LEN, LightArray, MAX_LIGHTS, PointLight, ambience_term, intensity_term};
pub use logging::{LoggingConfig, init_logging};
pub use material::{Material, MaterialView, TextureRole};
pub use mesh::{MeshInstance, Transform, normal_matrix};
pub use obj::{ObjError, ObjMesh, load_obj, parse_obj};
pub use orbit_camera::{OrbitConfig, OrbitController};
pub use plan::{DrawCommand, FramePlan, FrameStats, MaterialSource, PostPrograms, debug_strip, plan_frame};
pub use renderer::DeferredRenderer;
pub use scene::{LightKey, MeshKey, Scene};
pub use settings::RenderSettings;
pub use shader::{
    PipelineOptions, Reflection, SamplerBinding, ShaderError, ShaderProgram, ShaderSource, Stage,
    UniformLocation, UniformValues,
};
pub use texture::{
    BUFFER_FORMAT, FLAT_NORMAL_PIXEL, PLACEHOLDER_PIXEL, Texture, TextureError, TextureKind, checkerboard,
    decode_image, material_pixel, mip_chain, mip_level_count,
};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

// Re-export commonly used winit types for convenience
pub use winit::keyboard::KeyCode;
