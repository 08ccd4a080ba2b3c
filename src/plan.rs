//! Frame planning: everything the renderer decides before touching the GPU.
//!
//! [`plan_frame`] turns a scene, its cameras and the settings snapshot into
//! three ordered lists of [`DrawCommand`]s, one per pass. Encoding those
//! commands is [`DeferredRenderer`](crate::DeferredRenderer)'s job; keeping the
//! decisions here means visibility, uniform values, light packing and the
//! debug-strip layout are all testable without a device.

use glam::{Mat4, Vec2, Vec3};

use crate::assets::{GeometryId, MaterialId, ShaderId};
use crate::camera::{Camera, FrameContext};
use crate::gbuffer::ATTACHMENTS;
use crate::light::LightArray;
use crate::material::TextureRole;
use crate::scene::Scene;
use crate::settings::RenderSettings;
use crate::shader::UniformValues;

/// Where a draw's textures come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaterialSource {
    Asset(MaterialId),
    /// Every G-Buffer attachment in its material slot.
    GBuffer,
    /// One attachment bound as the `base` slot.
    GBufferChannel(TextureRole),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawCommand {
    pub shader: ShaderId,
    pub geometry: GeometryId,
    pub material: MaterialSource,
    pub uniforms: UniformValues,
}

/// Programs and geometry the screen-space passes draw with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostPrograms {
    pub lighting: ShaderId,
    pub passthrough: ShaderId,
    pub quad: GeometryId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FramePlan {
    pub geometry: Vec<DrawCommand>,
    pub lighting: DrawCommand,
    pub debug: Vec<DrawCommand>,
    pub lights: LightArray,
}

impl FramePlan {
    pub fn draw_count(&self) -> usize {
        self.geometry.len() + 1 + self.debug.len()
    }
}

/// Counts for one encoded frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub geometry_draws: usize,
    pub lighting_draws: usize,
    pub debug_draws: usize,
    /// Commands dropped because their shader or geometry was unusable.
    pub skipped: usize,
    pub visible_lights: usize,
}

impl FrameStats {
    pub fn draws(&self) -> usize {
        self.geometry_draws + self.lighting_draws + self.debug_draws
    }
}

/// Build the draw lists for one frame.
///
/// Updates `main` into `ctx` for the geometry pass, then `post` for the
/// screen-space passes, so `ctx.camera` ends up holding the post camera.
pub fn plan_frame(
    scene: &Scene,
    settings: &RenderSettings,
    ctx: &mut FrameContext,
    main: &mut Camera,
    post: &mut Camera,
    programs: PostPrograms,
) -> FramePlan {
    let eye = main.update(ctx);
    let geometry = scene
        .visible_meshes()
        .map(|instance| DrawCommand {
            shader: instance.shader,
            geometry: instance.geometry,
            material: MaterialSource::Asset(instance.material),
            uniforms: UniformValues {
                projection: eye.projection,
                model: instance.model(),
                model_view: instance.model_view(eye.view),
                camera_position: eye.position,
                lights: None,
            },
        })
        .collect();

    let screen = post.update(ctx);
    let lights = scene.light_array(settings.ambience, settings.intensity);
    let screen_quad = |model: Mat4| UniformValues {
        projection: screen.projection,
        model,
        model_view: screen.view * model,
        camera_position: eye.position,
        lights: None,
    };

    let lighting = DrawCommand {
        shader: programs.lighting,
        geometry: programs.quad,
        material: MaterialSource::GBuffer,
        uniforms: UniformValues {
            lights: Some(lights.clone()),
            ..screen_quad(Mat4::from_scale(ctx.viewport.extend(1.0)))
        },
    };

    let debug = if settings.debug {
        debug_strip(ctx.viewport)
            .into_iter()
            .map(|(role, model)| DrawCommand {
                shader: programs.passthrough,
                geometry: programs.quad,
                material: MaterialSource::GBufferChannel(role),
                uniforms: screen_quad(model),
            })
            .collect()
    } else {
        Vec::new()
    };

    FramePlan {
        geometry,
        lighting,
        debug,
        lights,
    }
}

/// Model matrices for the debug quads, one per G-Buffer channel except
/// albedo, stacked down the left edge from the top.
///
/// Each quad is a quarter of the viewport high with the viewport's aspect.
pub fn debug_strip(viewport: Vec2) -> Vec<(TextureRole, Mat4)> {
    let size = viewport / 4.0;
    let left = -viewport.x / 2.0 + size.x / 2.0;
    let top = viewport.y / 2.0 - size.y / 2.0;

    ATTACHMENTS
        .into_iter()
        .filter(|role| *role != TextureRole::Base)
        .enumerate()
        .map(|(i, role)| {
            let center = Vec3::new(left, top - i as f32 * size.y, 0.0);
            (role, Mat4::from_scale_rotation_translation(size.extend(1.0), glam::Quat::IDENTITY, center))
        })
        .collect()
}
