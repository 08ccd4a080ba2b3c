//! Shader programs built from paired vertex and fragment WGSL sources.
//!
//! Both stages are parsed and validated with `naga` before anything touches
//! the device, and the resulting modules are reflected to discover:
//!
//! - vertex attribute locations, matched by input name (`position`, `normal`,
//!   `tangent`, `uv`, `colour`),
//! - the uniform block at `@group(0) @binding(0)` and the byte range of each
//!   member,
//! - material textures in `@group(1)`, named `t_<role>` / `s_<role>`,
//! - the number of color outputs written by the fragment stage.
//!
//! Anything a shader does not declare resolves to `None` and is skipped when
//! binding. Pipelines are created lazily, one per geometry layout.

use std::collections::HashMap;
use std::num::NonZeroU64;

use glam::{Mat4, Vec3};
use thiserror::Error;

use crate::geometry::{Geometry, VertexLayoutKey, VertexRole, vertex_format};
use crate::gpu::GpuContext;
use crate::light::LightArray;
use crate::material::{MaterialView, TextureRole};
use crate::texture::{Texture, nearest_sampler};

pub const VERTEX_ENTRY: &str = "vs";
pub const FRAGMENT_ENTRY: &str = "fs";
pub const UNIFORM_GROUP: u32 = 0;
pub const MATERIAL_GROUP: u32 = 1;

/// Uniforms resolved at link time. Anything else must be registered.
pub const WELL_KNOWN_UNIFORMS: [&str; 4] = ["projection", "model", "model_view", "camera_position"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    fn entry(self) -> &'static str {
        match self {
            Stage::Vertex => VERTEX_ENTRY,
            Stage::Fragment => FRAGMENT_ENTRY,
        }
    }

    fn naga(self) -> naga::ShaderStage {
        match self {
            Stage::Vertex => naga::ShaderStage::Vertex,
            Stage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShaderError {
    #[error("{stage} stage of `{label}` failed to parse:\n{message}")]
    Parse {
        label: String,
        stage: Stage,
        message: String,
    },
    #[error("{stage} stage of `{label}` failed validation: {message}")]
    Validation {
        label: String,
        stage: Stage,
        message: String,
    },
    #[error("{stage} stage of `{label}` has no `{entry}` entry point")]
    MissingEntryPoint {
        label: String,
        stage: Stage,
        entry: &'static str,
    },
    #[error("uniform `{member}` of `{label}` has a different layout in each stage")]
    UniformMismatch { label: String, member: String },
    #[error("`{label}` writes {found} color outputs but has {expected} targets")]
    OutputMismatch {
        label: String,
        expected: usize,
        found: usize,
    },
    #[error("device rejected `{label}`: {message}")]
    Device { label: String, message: String },
}

/// Vertex and fragment source text for one program.
#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub label: String,
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSource {
    pub fn new(label: impl Into<String>, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

/// Byte range of a member inside the uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation {
    pub offset: u32,
    pub size: u32,
}

/// Material group bindings for one texture role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerBinding {
    pub texture: u32,
    pub sampler: u32,
}

/// What a program's two stages declare.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reflection {
    attributes: [Option<u32>; VertexRole::COUNT],
    uniform_size: u32,
    members: Vec<(String, UniformLocation)>,
    samplers: [Option<SamplerBinding>; TextureRole::COUNT],
    color_outputs: usize,
}

impl Reflection {
    /// Parse, validate and reflect both stages.
    pub fn from_source(source: &ShaderSource) -> Result<Self, ShaderError> {
        let vertex = parse_stage(&source.label, Stage::Vertex, &source.vertex)?;
        let fragment = parse_stage(&source.label, Stage::Fragment, &source.fragment)?;

        let mut reflection = Reflection {
            attributes: reflect_attributes(&vertex),
            color_outputs: reflect_color_outputs(&fragment),
            ..Default::default()
        };

        for module in [&vertex, &fragment] {
            if let Some((size, members)) = reflect_uniform_block(module) {
                reflection.uniform_size = reflection.uniform_size.max(size);
                for (name, location) in members {
                    match reflection.member(&name) {
                        Some(existing) if existing != location => {
                            return Err(ShaderError::UniformMismatch {
                                label: source.label.clone(),
                                member: name,
                            });
                        }
                        Some(_) => {}
                        None => reflection.members.push((name, location)),
                    }
                }
            }
        }

        let mut textures = [None; TextureRole::COUNT];
        let mut samplers = [None; TextureRole::COUNT];
        for module in [&vertex, &fragment] {
            for (_, var) in module.global_variables.iter() {
                let (Some(binding), Some(name)) = (&var.binding, &var.name) else {
                    continue;
                };
                if binding.group != MATERIAL_GROUP {
                    continue;
                }
                if let Some(role) = name.strip_prefix("t_").and_then(TextureRole::from_name) {
                    textures[role.slot()] = Some(binding.binding);
                } else if let Some(role) = name.strip_prefix("s_").and_then(TextureRole::from_name) {
                    samplers[role.slot()] = Some(binding.binding);
                }
            }
        }
        for role in TextureRole::ALL {
            match (textures[role.slot()], samplers[role.slot()]) {
                (Some(texture), Some(sampler)) => {
                    reflection.samplers[role.slot()] = Some(SamplerBinding { texture, sampler });
                }
                (None, None) => {}
                _ => log::warn!(
                    "`{}` declares only half of the {role} texture/sampler pair; ignoring it",
                    source.label
                ),
            }
        }

        Ok(reflection)
    }

    pub fn attribute(&self, role: VertexRole) -> Option<u32> {
        self.attributes[role.index()]
    }

    /// Size of the uniform block in bytes; zero when there is none.
    pub fn uniform_size(&self) -> u32 {
        self.uniform_size
    }

    pub fn member(&self, name: &str) -> Option<UniformLocation> {
        self.members
            .iter()
            .find(|(member, _)| member == name)
            .map(|(_, location)| *location)
    }

    pub fn sampler(&self, role: TextureRole) -> Option<SamplerBinding> {
        self.samplers[role.slot()]
    }

    pub fn color_outputs(&self) -> usize {
        self.color_outputs
    }
}

fn parse_stage(label: &str, stage: Stage, source: &str) -> Result<naga::Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
        label: label.to_string(),
        stage,
        message: e.emit_to_string(source),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| ShaderError::Validation {
        label: label.to_string(),
        stage,
        message: e.to_string(),
    })?;

    let has_entry = module
        .entry_points
        .iter()
        .any(|ep| ep.name == stage.entry() && ep.stage == stage.naga());
    if !has_entry {
        return Err(ShaderError::MissingEntryPoint {
            label: label.to_string(),
            stage,
            entry: stage.entry(),
        });
    }

    Ok(module)
}

fn entry_point<'a>(module: &'a naga::Module, stage: Stage) -> Option<&'a naga::EntryPoint> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.name == stage.entry() && ep.stage == stage.naga())
}

fn reflect_attributes(module: &naga::Module) -> [Option<u32>; VertexRole::COUNT] {
    let mut attributes = [None; VertexRole::COUNT];
    let Some(ep) = entry_point(module, Stage::Vertex) else {
        return attributes;
    };

    let mut record = |name: Option<&str>, binding: &Option<naga::Binding>| {
        if let (Some(role), Some(naga::Binding::Location { location, .. })) =
            (name.and_then(VertexRole::from_name), binding)
        {
            attributes[role.index()] = Some(*location);
        }
    };

    for argument in &ep.function.arguments {
        match &module.types[argument.ty].inner {
            naga::TypeInner::Struct { members, .. } if argument.binding.is_none() => {
                for member in members {
                    record(member.name.as_deref(), &member.binding);
                }
            }
            _ => record(argument.name.as_deref(), &argument.binding),
        }
    }
    attributes
}

fn reflect_uniform_block(module: &naga::Module) -> Option<(u32, Vec<(String, UniformLocation)>)> {
    module.global_variables.iter().find_map(|(_, var)| {
        let bound = var
            .binding
            .as_ref()
            .is_some_and(|b| b.group == UNIFORM_GROUP && b.binding == 0);
        if var.space != naga::AddressSpace::Uniform || !bound {
            return None;
        }
        match &module.types[var.ty].inner {
            naga::TypeInner::Struct { members, span } => {
                let members = members
                    .iter()
                    .filter_map(|member| {
                        let name = member.name.clone()?;
                        let size = module.types[member.ty].inner.size(module.to_ctx());
                        Some((
                            name,
                            UniformLocation {
                                offset: member.offset,
                                size,
                            },
                        ))
                    })
                    .collect();
                Some((*span, members))
            }
            _ => None,
        }
    })
}

fn reflect_color_outputs(module: &naga::Module) -> usize {
    let Some(result) = entry_point(module, Stage::Fragment).and_then(|ep| ep.function.result.as_ref())
    else {
        return 0;
    };
    match (&result.binding, &module.types[result.ty].inner) {
        (Some(naga::Binding::Location { .. }), _) => 1,
        (None, naga::TypeInner::Struct { members, .. }) => members
            .iter()
            .filter(|m| matches!(m.binding, Some(naga::Binding::Location { .. })))
            .count(),
        _ => 0,
    }
}

/// Per-draw uniform values, written into a program's block by name.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformValues {
    pub projection: Mat4,
    pub model: Mat4,
    pub model_view: Mat4,
    pub camera_position: Vec3,
    pub lights: Option<LightArray>,
}

impl Default for UniformValues {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            model: Mat4::IDENTITY,
            model_view: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            lights: None,
        }
    }
}

/// Fixed-function state a program is built for.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub color_targets: Vec<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub cull_mode: Option<wgpu::Face>,
    /// Whether material textures are sampled with filtering. Float render
    /// targets must be read unfiltered.
    pub filterable: bool,
}

/// A compiled program plus its layouts and per-geometry pipelines.
pub struct ShaderProgram {
    label: String,
    reflection: Reflection,
    options: PipelineOptions,
    resolved: HashMap<String, UniformLocation>,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    uniform_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    pipelines: HashMap<VertexLayoutKey, Option<wgpu::RenderPipeline>>,
}

impl ShaderProgram {
    /// Validate, reflect and compile a program.
    ///
    /// A failure here makes the program unusable; nothing else is affected.
    pub fn new(gpu: &GpuContext, source: &ShaderSource, options: PipelineOptions) -> Result<Self, ShaderError> {
        let label = source.label.clone();
        let reflection = Reflection::from_source(source)?;

        if reflection.color_outputs() != options.color_targets.len() {
            return Err(ShaderError::OutputMismatch {
                label,
                expected: options.color_targets.len(),
                found: reflection.color_outputs(),
            });
        }

        let device = &gpu.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} Vertex")),
            source: wgpu::ShaderSource::Wgsl(source.vertex.as_str().into()),
        });
        let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} Fragment")),
            source: wgpu::ShaderSource::Wgsl(source.fragment.as_str().into()),
        });

        let uniform_entries: Vec<wgpu::BindGroupLayoutEntry> = NonZeroU64::new(reflection.uniform_size() as u64)
            .map(|size| wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: Some(size),
                },
                count: None,
            })
            .into_iter()
            .collect();
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label} Uniform Layout")),
            entries: &uniform_entries,
        });

        let sample_type = wgpu::TextureSampleType::Float {
            filterable: options.filterable,
        };
        let sampler_type = if options.filterable {
            wgpu::SamplerBindingType::Filtering
        } else {
            wgpu::SamplerBindingType::NonFiltering
        };
        let material_entries: Vec<wgpu::BindGroupLayoutEntry> = TextureRole::ALL
            .into_iter()
            .filter_map(|role| reflection.sampler(role))
            .flat_map(|binding| {
                [
                    wgpu::BindGroupLayoutEntry {
                        binding: binding.texture,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: binding.sampler,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(sampler_type),
                        count: None,
                    },
                ]
            })
            .collect();
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label} Material Layout")),
            entries: &material_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} Pipeline Layout")),
            bind_group_layouts: &[&uniform_layout, &material_layout],
            push_constant_ranges: &[],
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ShaderError::Device {
                label,
                message: error.to_string(),
            });
        }

        let resolved = WELL_KNOWN_UNIFORMS
            .iter()
            .filter_map(|name| reflection.member(name).map(|loc| (name.to_string(), loc)))
            .collect();

        log::info!(
            "compiled shader `{label}`: {} byte uniform block, {} color outputs",
            reflection.uniform_size(),
            reflection.color_outputs()
        );
        for role in VertexRole::ALL {
            if let Some(location) = reflection.attribute(role) {
                log::debug!("`{label}` attribute {role} at location {location}");
            }
        }

        Ok(Self {
            sampler: nearest_sampler(gpu, &label),
            label,
            reflection,
            options,
            resolved,
            vertex,
            fragment,
            uniform_layout,
            material_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn reflection(&self) -> &Reflection {
        &self.reflection
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn attribute_location(&self, role: VertexRole) -> Option<u32> {
        self.reflection.attribute(role)
    }

    /// A resolved or registered uniform; `None` when the program lacks it.
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.resolved.get(name).copied()
    }

    /// Resolve an extra uniform after link so `set_uniform` can write it.
    pub fn register_uniform(&mut self, name: &str) -> Option<UniformLocation> {
        let location = self.reflection.member(name);
        match location {
            Some(location) => {
                self.resolved.insert(name.to_string(), location);
            }
            None => log::warn!("`{}` has no uniform named `{name}`", self.label),
        }
        location
    }

    pub fn uniform_size(&self) -> u32 {
        self.reflection.uniform_size()
    }

    /// Copy `bytes` into `block` at the uniform's offset, truncated to its
    /// size. Returns false when the uniform is absent.
    pub fn set_uniform(&self, block: &mut [u8], name: &str, bytes: &[u8]) -> bool {
        write_member(self.uniform_location(name), block, bytes)
    }

    /// Build this program's uniform block for one draw.
    pub fn write_uniforms(&self, values: &UniformValues) -> Vec<u8> {
        let mut block = vec![0u8; self.uniform_size() as usize];
        self.set_uniform(&mut block, "projection", bytemuck::bytes_of(&values.projection.to_cols_array()));
        self.set_uniform(&mut block, "model", bytemuck::bytes_of(&values.model.to_cols_array()));
        self.set_uniform(&mut block, "model_view", bytemuck::bytes_of(&values.model_view.to_cols_array()));
        self.set_uniform(
            &mut block,
            "camera_position",
            bytemuck::bytes_of(&values.camera_position.to_array()),
        );
        if let Some(lights) = &values.lights {
            self.set_uniform(&mut block, "lights", bytemuck::cast_slice(&lights.to_uniform()));
        }
        block
    }

    /// Whether `geometry` supplies every attribute this program reads.
    pub fn accepts(&self, geometry: &Geometry) -> bool {
        VertexRole::ALL
            .into_iter()
            .filter(|role| self.attribute_location(*role).is_some())
            .all(|role| geometry.buffer(role).is_some())
    }

    /// Make sure a pipeline exists for `geometry`'s layout. Returns false when
    /// the geometry cannot be drawn with this program.
    pub fn prepare(&mut self, gpu: &GpuContext, geometry: &Geometry) -> bool {
        if !self.accepts(geometry) {
            return false;
        }
        let key = geometry.layout_key();
        if !self.pipelines.contains_key(&key) {
            let pipeline = self.create_pipeline(gpu, &key);
            self.pipelines.insert(key.clone(), pipeline);
        }
        self.pipelines.get(&key).is_some_and(Option::is_some)
    }

    fn create_pipeline(&self, gpu: &GpuContext, key: &VertexLayoutKey) -> Option<wgpu::RenderPipeline> {
        let attributes: Vec<[wgpu::VertexAttribute; 1]> = key
            .iter()
            .filter_map(|(role, components)| {
                self.attribute_location(*role).map(|location| {
                    [wgpu::VertexAttribute {
                        format: vertex_format(*components),
                        offset: 0,
                        shader_location: location,
                    }]
                })
            })
            .collect();
        let strides = key
            .iter()
            .filter(|(role, _)| self.attribute_location(*role).is_some())
            .map(|(_, components)| *components as u64 * 4);
        let buffers: Vec<wgpu::VertexBufferLayout> = strides
            .zip(&attributes)
            .map(|(array_stride, attributes)| wgpu::VertexBufferLayout {
                array_stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        let targets: Vec<Option<wgpu::ColorTargetState>> = self
            .options
            .color_targets
            .iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format: *format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = gpu.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{} Pipeline", self.label)),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.vertex,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.fragment,
                entry_point: Some(FRAGMENT_ENTRY),
                targets: &targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: self.options.cull_mode,
                front_face: wgpu::FrontFace::Ccw,
                ..Default::default()
            },
            depth_stencil: self.options.depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        match pollster::block_on(gpu.device.pop_error_scope()) {
            Some(error) => {
                log::error!("`{}` pipeline for {key:?} rejected: {error}", self.label);
                None
            }
            None => {
                log::debug!("`{}` pipeline created for {key:?}", self.label);
                Some(pipeline)
            }
        }
    }

    /// Bind group for this program's uniform block inside `buffer`, used with
    /// a dynamic offset per draw.
    pub fn uniform_bind_group(&self, gpu: &GpuContext, buffer: &wgpu::Buffer) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry> = NonZeroU64::new(self.uniform_size() as u64)
            .map(|size| wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: Some(size),
                }),
            })
            .into_iter()
            .collect();
        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Uniforms", self.label)),
            layout: &self.uniform_layout,
            entries: &entries,
        })
    }

    /// Bind group for the material slots this program samples. Slots the
    /// material leaves empty get `fallback`.
    pub fn material_bind_group(
        &self,
        gpu: &GpuContext,
        material: &MaterialView<'_>,
        fallback: &Texture,
    ) -> wgpu::BindGroup {
        let mut entries = Vec::new();
        for role in TextureRole::ALL {
            let Some(binding) = self.reflection.sampler(role) else {
                continue;
            };
            let texture = material.get(role).unwrap_or_else(|| {
                log::debug!("`{}` has no {role} texture, using fallback", self.label);
                fallback
            });
            let sampler = if self.options.filterable {
                texture.sampler()
            } else {
                &self.sampler
            };
            entries.push(wgpu::BindGroupEntry {
                binding: binding.texture,
                resource: wgpu::BindingResource::TextureView(texture.view()),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: binding.sampler,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Material", self.label)),
            layout: &self.material_layout,
            entries: &entries,
        })
    }

    /// Activate the pipeline for `geometry` and bind its vertex buffers at the
    /// reflected locations. Roles the program does not read are skipped.
    ///
    /// Returns false if [`prepare`](Self::prepare) has not produced a pipeline.
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>, geometry: &Geometry) -> bool {
        let Some(Some(pipeline)) = self.pipelines.get(&geometry.layout_key()) else {
            return false;
        };
        pass.set_pipeline(pipeline);
        let used = geometry
            .buffers()
            .iter()
            .filter(|b| self.attribute_location(b.role).is_some());
        for (slot, buffer) in used.enumerate() {
            pass.set_vertex_buffer(slot as u32, buffer.buffer.slice(..));
        }
        true
    }
}

fn write_member(location: Option<UniformLocation>, block: &mut [u8], bytes: &[u8]) -> bool {
    let Some(location) = location else {
        return false;
    };
    let start = location.offset as usize;
    let len = bytes.len().min(location.size as usize);
    match block.get_mut(start..start + len) {
        Some(dst) => {
            dst.copy_from_slice(&bytes[..len]);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"
struct Uniforms {
    projection: mat4x4<f32>,
    model: mat4x4<f32>,
    model_view: mat4x4<f32>,
    camera_position: vec3<f32>,
}
@group(0) @binding(0) var<uniform> u: Uniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(3) uv: vec2<f32>,
}
struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip = u.projection * u.model_view * vec4<f32>(in.position, 1.0);
    out.uv = in.uv;
    return out;
}
"#;

    const FRAGMENT: &str = r#"
struct Uniforms {
    projection: mat4x4<f32>,
    model: mat4x4<f32>,
    model_view: mat4x4<f32>,
    camera_position: vec3<f32>,
    lights: array<vec4<f32>, 4>,
}
@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(6) var t_base: texture_2d<f32>;
@group(1) @binding(7) var s_base: sampler;

@fragment
fn fs(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(t_base, s_base, uv) * u.lights[0];
}
"#;

    fn reflect(vertex: &str, fragment: &str) -> Result<Reflection, ShaderError> {
        Reflection::from_source(&ShaderSource::new("test", vertex, fragment))
    }

    #[test]
    fn resolves_declared_attributes_only() {
        let reflection = reflect(VERTEX, FRAGMENT).unwrap();
        assert_eq!(reflection.attribute(VertexRole::Position), Some(0));
        assert_eq!(reflection.attribute(VertexRole::Uv), Some(3));
        assert_eq!(reflection.attribute(VertexRole::Normal), None);
        assert_eq!(reflection.attribute(VertexRole::Tangent), None);
    }

    #[test]
    fn merges_uniform_members_across_stages() {
        let reflection = reflect(VERTEX, FRAGMENT).unwrap();
        assert_eq!(
            reflection.member("model_view"),
            Some(UniformLocation { offset: 128, size: 64 })
        );
        assert_eq!(
            reflection.member("camera_position"),
            Some(UniformLocation { offset: 192, size: 12 })
        );
        assert_eq!(
            reflection.member("lights"),
            Some(UniformLocation { offset: 208, size: 64 })
        );
        assert_eq!(reflection.uniform_size(), 272);
    }

    #[test]
    fn finds_material_slots_by_name() {
        let reflection = reflect(VERTEX, FRAGMENT).unwrap();
        assert_eq!(
            reflection.sampler(TextureRole::Base),
            Some(SamplerBinding { texture: 6, sampler: 7 })
        );
        assert_eq!(reflection.sampler(TextureRole::Albedo), None);
        assert_eq!(reflection.color_outputs(), 1);
    }

    #[test]
    fn counts_struct_color_outputs() {
        let fragment = r#"
struct Out {
    @location(0) a: vec4<f32>,
    @location(1) b: vec4<f32>,
    @location(2) c: vec4<f32>,
    @location(3) d: vec4<f32>,
}
@fragment
fn fs(@location(0) uv: vec2<f32>) -> Out {
    var out: Out;
    out.a = vec4<f32>(uv, 0.0, 1.0);
    return out;
}
"#;
        assert_eq!(reflect(VERTEX, fragment).unwrap().color_outputs(), 4);
    }

    #[test]
    fn parse_error_names_stage() {
        let err = reflect(VERTEX, "@fragment fn fs( -> {").unwrap_err();
        assert!(matches!(err, ShaderError::Parse { stage: Stage::Fragment, .. }));
        assert!(err.to_string().contains("fragment stage of `test`"));
    }

    #[test]
    fn validation_error_is_reported() {
        let fragment = r#"
@fragment
fn fs() -> @location(0) vec4<f32> {
    let x: f32 = 1.0;
    return x;
}
"#;
        let err = reflect(VERTEX, fragment).unwrap_err();
        assert!(
            matches!(err, ShaderError::Validation { .. } | ShaderError::Parse { .. }),
            "{err}"
        );
    }

    #[test]
    fn missing_entry_point_is_reported() {
        let fragment = "@fragment fn main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let err = reflect(VERTEX, fragment).unwrap_err();
        assert_eq!(
            err,
            ShaderError::MissingEntryPoint {
                label: "test".into(),
                stage: Stage::Fragment,
                entry: "fs"
            }
        );
    }

    #[test]
    fn conflicting_member_offsets_are_rejected() {
        let fragment = r#"
struct Uniforms {
    model_view: mat4x4<f32>,
}
@group(0) @binding(0) var<uniform> u: Uniforms;
@fragment
fn fs() -> @location(0) vec4<f32> {
    return u.model_view[0];
}
"#;
        let err = reflect(VERTEX, fragment).unwrap_err();
        assert!(matches!(err, ShaderError::UniformMismatch { ref member, .. } if member == "model_view"));
    }

    #[test]
    fn built_in_programs_reflect() {
        let programs = [
            (crate::shaders::GBUFFER_VERTEX, crate::shaders::GBUFFER_FRAGMENT, 4),
            (crate::shaders::SCREEN_QUAD_VERTEX, crate::shaders::LIGHTING_FRAGMENT, 1),
            (crate::shaders::SCREEN_QUAD_VERTEX, crate::shaders::PASSTHROUGH_FRAGMENT, 1),
        ];
        for (vertex, fragment, outputs) in programs {
            let reflection = reflect(vertex, fragment).unwrap();
            assert_eq!(reflection.color_outputs(), outputs);
            assert!(reflection.member("projection").is_some());
        }
    }

    #[test]
    fn lighting_program_has_full_light_array() {
        let reflection = reflect(crate::shaders::SCREEN_QUAD_VERTEX, crate::shaders::LIGHTING_FRAGMENT).unwrap();
        let lights = reflection.member("lights").unwrap();
        assert_eq!(lights.size as usize, crate::light::LIGHT_ARRAY_LEN * 16);
        for role in [TextureRole::Position, TextureRole::Base, TextureRole::Normal, TextureRole::Material] {
            assert!(reflection.sampler(role).is_some(), "missing {role}");
        }
    }

    #[test]
    fn write_member_truncates_to_size() {
        let mut block = vec![0u8; 16];
        let location = UniformLocation { offset: 4, size: 8 };
        assert!(write_member(Some(location), &mut block, &[1u8; 12]));
        assert_eq!(&block[..4], &[0; 4]);
        assert_eq!(&block[4..12], &[1; 8]);
        assert_eq!(&block[12..], &[0; 4]);
    }

    #[test]
    fn write_member_skips_absent_uniform() {
        let mut block = vec![0u8; 4];
        assert!(!write_member(None, &mut block, &[1, 2, 3, 4]));
        assert_eq!(block, vec![0; 4]);
    }
}
