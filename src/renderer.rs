//! The deferred renderer: G-Buffer pass, lighting resolve, debug overlay.
//!
//! Each frame goes through two stages:
//!
//! 1. [`plan_frame`] decides what to draw (pure CPU, see [`crate::plan`]).
//! 2. [`DeferredRenderer::render_to`] makes sure every command has a
//!    pipeline, packs all uniform blocks into one buffer, and records three
//!    render passes into a single submission.
//!
//! Commands whose shader failed to build, or whose geometry lacks an
//! attribute the shader reads, are dropped and counted in
//! [`FrameStats::skipped`].

use std::collections::HashMap;

use glam::Vec2;

use crate::assets::{Assets, ShaderId};
use crate::camera::{Camera, FrameContext, OrthographicCamera};
use crate::gbuffer::{DEPTH_FORMAT, GBuffer};
use crate::geometry::{GeometryError, VertexData};
use crate::gpu::{GpuContext, GpuError};
use crate::material::{MaterialView, TextureRole};
use crate::plan::{DrawCommand, FrameStats, MaterialSource, PostPrograms, plan_frame};
use crate::scene::Scene;
use crate::settings::RenderSettings;
use crate::shader::{PipelineOptions, ShaderSource};
use crate::shaders;

pub struct DeferredRenderer {
    gbuffer: GBuffer,
    /// What gets drawn. Mutate freely between frames.
    pub scene: Scene,
    /// Perspective camera for the geometry pass.
    pub camera: Camera,
    post_camera: Camera,
    programs: PostPrograms,
    context: FrameContext,
    uniforms: UniformRing,
    material_groups: MaterialGroups,
}

impl DeferredRenderer {
    /// Allocate the G-Buffer at the surface size and build the screen-space
    /// programs. Geometry-pass programs come from [`Self::geometry_options`].
    pub fn new(gpu: &GpuContext, assets: &mut Assets, mut camera: Camera) -> Result<Self, GeometryError> {
        let (width, height) = (gpu.width(), gpu.height());
        let gbuffer = GBuffer::new(gpu, width, height);

        let screen = PipelineOptions {
            color_targets: vec![gpu.format()],
            depth_format: None,
            cull_mode: None,
            filterable: false,
        };
        let lighting = assets.add_shader(
            gpu,
            &ShaderSource::new("Lighting", shaders::SCREEN_QUAD_VERTEX, shaders::LIGHTING_FRAGMENT),
            screen.clone(),
        );
        if let Some(program) = assets.shader_mut(lighting) {
            program.register_uniform("lights");
        }
        let passthrough = assets.add_shader(
            gpu,
            &ShaderSource::new("Passthrough", shaders::SCREEN_QUAD_VERTEX, shaders::PASSTHROUGH_FRAGMENT),
            screen,
        );
        let quad = assets.upload_geometry(gpu, &VertexData::quad(), "Screen Quad")?;

        let mut post_camera = Camera::from(OrthographicCamera::new(width as f32, height as f32));
        camera.resize(width, height);
        post_camera.resize(width, height);

        log::info!("deferred renderer ready at {width}x{height}, G-Buffer {:?}", gbuffer.format());

        Ok(Self {
            gbuffer,
            scene: Scene::new(),
            camera,
            post_camera,
            programs: PostPrograms {
                lighting,
                passthrough,
                quad,
            },
            context: FrameContext::new(width, height),
            uniforms: UniformRing::new(gpu),
            material_groups: MaterialGroups::default(),
        })
    }

    /// Fixed-function state for programs that write the G-Buffer.
    pub fn geometry_options(&self) -> PipelineOptions {
        PipelineOptions {
            color_targets: self.gbuffer.color_formats(),
            depth_format: Some(DEPTH_FORMAT),
            cull_mode: Some(wgpu::Face::Back),
            filterable: true,
        }
    }

    /// Compile the built-in G-Buffer program.
    pub fn geometry_shader(&self, gpu: &GpuContext, assets: &mut Assets) -> ShaderId {
        assets.add_shader(
            gpu,
            &ShaderSource::new("GBuffer", shaders::GBUFFER_VERTEX, shaders::GBUFFER_FRAGMENT),
            self.geometry_options(),
        )
    }

    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    pub fn programs(&self) -> PostPrograms {
        self.programs
    }

    pub fn context(&self) -> &FrameContext {
        &self.context
    }

    /// Material bind groups kept from earlier frames.
    pub fn cached_material_groups(&self) -> usize {
        self.material_groups.groups.len()
    }

    /// Follow a window resize: surface, cameras, depth and every G-Buffer
    /// attachment. Zero sizes are ignored.
    pub fn resize(&mut self, gpu: &mut GpuContext, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        gpu.resize(width, height);
        if let Err(e) = self.gbuffer.resize(gpu, width, height) {
            log::error!("G-Buffer resize failed: {e}");
        }
        self.material_groups.groups.clear();
        self.camera.resize(width, height);
        if let Camera::Orthographic(post) = &mut self.post_camera {
            post.target = Vec2::new(width as f32, height as f32);
        }
        self.post_camera.resize(width, height);
        self.context.viewport = Vec2::new(width as f32, height as f32);
        log::info!("resized to {width}x{height}");
    }

    /// Render one frame to the window surface and present it.
    ///
    /// A lost or outdated surface skips the frame and returns empty stats.
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        assets: &mut Assets,
        settings: &RenderSettings,
        time: f32,
        dt: f32,
    ) -> Result<FrameStats, GpuError> {
        let Some(frame) = gpu.acquire_frame()? else {
            return Ok(FrameStats::default());
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let stats = self.render_to(gpu, assets, settings, &view, time, dt);
        frame.present();
        Ok(stats)
    }

    /// Render one frame into `target`, which must have `gpu.format()`.
    pub fn render_to(
        &mut self,
        gpu: &GpuContext,
        assets: &mut Assets,
        settings: &RenderSettings,
        target: &wgpu::TextureView,
        time: f32,
        dt: f32,
    ) -> FrameStats {
        self.context.time = time;
        self.context.dt = dt;
        self.material_groups.sync(assets.revision());
        let plan = plan_frame(
            &self.scene,
            settings,
            &mut self.context,
            &mut self.camera,
            &mut self.post_camera,
            self.programs,
        );

        let mut stats = FrameStats {
            visible_lights: plan.lights.visible_count(),
            ..Default::default()
        };

        let geometry = retain_prepared(gpu, assets, &plan.geometry, &mut stats.skipped);
        let lighting = retain_prepared(gpu, assets, std::slice::from_ref(&plan.lighting), &mut stats.skipped);
        let debug = retain_prepared(gpu, assets, &plan.debug, &mut stats.skipped);
        let assets = &*assets;

        let blocks: Vec<Vec<u8>> = geometry
            .iter()
            .chain(&lighting)
            .chain(&debug)
            .map(|c| {
                assets
                    .shader(c.shader)
                    .map(|program| program.write_uniforms(&c.uniforms))
                    .unwrap_or_default()
            })
            .collect();
        let (data, offsets) = pack_blocks(&blocks, self.uniforms.alignment);
        self.uniforms.upload(gpu, &data);

        let mut uniform_groups: HashMap<ShaderId, wgpu::BindGroup> = HashMap::new();
        let mut encoded = Vec::with_capacity(blocks.len());
        for (command, offset) in geometry.iter().chain(&lighting).chain(&debug).zip(&offsets) {
            let Some(program) = assets.shader(command.shader) else {
                continue;
            };
            uniform_groups
                .entry(command.shader)
                .or_insert_with(|| program.uniform_bind_group(gpu, &self.uniforms.buffer));
            let gbuffer = &self.gbuffer;
            self.material_groups
                .groups
                .entry((command.shader, command.material))
                .or_insert_with(|| {
                    let material = resolve_material(gbuffer, assets, command.material);
                    program.material_bind_group(gpu, &material, assets.fallback())
                });
            encoded.push(EncodedDraw {
                command: *command,
                offset: *offset,
                has_uniforms: program.uniform_size() > 0,
            });
        }

        let (geometry_draws, rest) = encoded.split_at(geometry.len().min(encoded.len()));
        let (lighting_draws, debug_draws) = rest.split_at(lighting.len().min(rest.len()));

        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Deferred Encoder"),
        });

        {
            let attachments = self.gbuffer.color_attachments();
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Geometry Pass"),
                color_attachments: &attachments,
                depth_stencil_attachment: Some(self.gbuffer.depth_attachment()),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            stats.geometry_draws = draw_all(&mut pass, assets, &uniform_groups, &self.material_groups, geometry_draws);
        }

        {
            let mut pass = begin_screen_pass(&mut encoder, target, "Lighting Pass", Some(settings.clear_color));
            stats.lighting_draws = draw_all(&mut pass, assets, &uniform_groups, &self.material_groups, lighting_draws);
        }

        if !debug_draws.is_empty() {
            let mut pass = begin_screen_pass(&mut encoder, target, "Debug Pass", None);
            stats.debug_draws = draw_all(&mut pass, assets, &uniform_groups, &self.material_groups, debug_draws);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));

        if stats.skipped > 0 {
            log::debug!("skipped {} draws this frame", stats.skipped);
        }
        stats
    }

}

fn resolve_material<'a>(gbuffer: &'a GBuffer, assets: &'a Assets, source: MaterialSource) -> MaterialView<'a> {
    match source {
        MaterialSource::Asset(id) => assets
            .material(id)
            .map(|material| material.view(assets))
            .unwrap_or_default(),
        MaterialSource::GBuffer => gbuffer.material_view(),
        MaterialSource::GBufferChannel(role) => match gbuffer.channel(role) {
            Some(texture) => MaterialView::new().with(TextureRole::Base, texture),
            None => MaterialView::new(),
        },
    }
}

/// Material bind groups per program and material source. Dropped when the
/// G-Buffer is reallocated or the assets report a new revision.
#[derive(Default)]
struct MaterialGroups {
    groups: HashMap<(ShaderId, MaterialSource), wgpu::BindGroup>,
    revision: u64,
}

impl MaterialGroups {
    fn sync(&mut self, revision: u64) {
        if revision != self.revision {
            self.groups.clear();
            self.revision = revision;
        }
    }

    fn get(&self, shader: ShaderId, source: MaterialSource) -> Option<&wgpu::BindGroup> {
        self.groups.get(&(shader, source))
    }
}

/// Commands whose pipeline exists, in plan order.
fn retain_prepared<'p>(
    gpu: &GpuContext,
    assets: &mut Assets,
    commands: &'p [DrawCommand],
    skipped: &mut usize,
) -> Vec<&'p DrawCommand> {
    let kept: Vec<&DrawCommand> = commands
        .iter()
        .filter(|c| assets.prepare(gpu, c.shader, c.geometry))
        .collect();
    *skipped += commands.len() - kept.len();
    kept
}

struct EncodedDraw<'a> {
    command: &'a DrawCommand,
    offset: u32,
    has_uniforms: bool,
}

fn draw_all(
    pass: &mut wgpu::RenderPass<'_>,
    assets: &Assets,
    uniform_groups: &HashMap<ShaderId, wgpu::BindGroup>,
    material_groups: &MaterialGroups,
    draws: &[EncodedDraw<'_>],
) -> usize {
    let mut drawn = 0;
    for draw in draws {
        let (Some(program), Some(geometry), Some(uniforms), Some(material)) = (
            assets.shader(draw.command.shader),
            assets.geometry(draw.command.geometry),
            uniform_groups.get(&draw.command.shader),
            material_groups.get(draw.command.shader, draw.command.material),
        ) else {
            continue;
        };
        if !program.bind(pass, geometry) {
            continue;
        }
        let offsets: &[u32] = if draw.has_uniforms {
            std::slice::from_ref(&draw.offset)
        } else {
            &[]
        };
        pass.set_bind_group(0, uniforms, offsets);
        pass.set_bind_group(1, material, &[]);
        geometry.draw(pass);
        drawn += 1;
    }
    drawn
}

fn begin_screen_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    target: &wgpu::TextureView,
    label: &str,
    clear: Option<wgpu::Color>,
) -> wgpu::RenderPass<'e> {
    let load = match clear {
        Some(color) => wgpu::LoadOp::Clear(color),
        None => wgpu::LoadOp::Load,
    };
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

/// One growable uniform buffer holding every draw's block for a frame.
struct UniformRing {
    buffer: wgpu::Buffer,
    capacity: u64,
    alignment: u32,
}

impl UniformRing {
    const INITIAL_CAPACITY: u64 = 16 * 1024;

    fn new(gpu: &GpuContext) -> Self {
        Self {
            buffer: create_uniform_buffer(gpu, Self::INITIAL_CAPACITY),
            capacity: Self::INITIAL_CAPACITY,
            alignment: gpu.device.limits().min_uniform_buffer_offset_alignment,
        }
    }

    fn upload(&mut self, gpu: &GpuContext, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let needed = data.len() as u64;
        if needed > self.capacity {
            self.capacity = needed.next_power_of_two();
            self.buffer = create_uniform_buffer(gpu, self.capacity);
            log::debug!("uniform buffer grown to {} bytes", self.capacity);
        }
        gpu.queue.write_buffer(&self.buffer, 0, data);
    }
}

fn create_uniform_buffer(gpu: &GpuContext, size: u64) -> wgpu::Buffer {
    gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Uniform Ring"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Lay blocks out back to back at `alignment`-byte offsets. Returns the
/// packed bytes and each block's offset. The total is padded to `alignment`.
fn pack_blocks(blocks: &[Vec<u8>], alignment: u32) -> (Vec<u8>, Vec<u32>) {
    let align = alignment.max(4) as usize;
    let mut data = Vec::new();
    let mut offsets = Vec::with_capacity(blocks.len());
    for block in blocks {
        offsets.push(data.len() as u32);
        data.extend_from_slice(block);
        data.resize(data.len().next_multiple_of(align), 0);
    }
    (data, offsets)
}
