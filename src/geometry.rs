//! Role-keyed vertex data and its GPU upload.
//!
//! Geometry is stored non-interleaved: one tightly packed `f32` buffer per
//! attribute role plus an optional `u32` index buffer. Shaders pick the roles
//! they declare; roles a shader does not use are simply not bound.
//!
//! ```ignore
//! let data = VertexData::sphere(32, 16);
//! let geometry = Geometry::upload(&gpu, &data, "Sphere")?;
//! ```
//!
//! Built-in primitives use counter-clockwise winding for front faces and
//! carry tangents so normal mapping works out of the box.

use glam::{Quat, Vec2, Vec3};
use thiserror::Error;

use crate::gpu::GpuContext;

/// Errors raised while assembling or uploading geometry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("geometry has no vertices to draw")]
    Empty,
    #[error("{role} buffer holds {len} floats, not a multiple of {components}")]
    Ragged {
        role: VertexRole,
        len: usize,
        components: u32,
    },
    #[error("{role} buffer holds {found} vertices but {expected} were expected")]
    CountMismatch {
        role: VertexRole,
        expected: usize,
        found: usize,
    },
    #[error("{role} buffer declares {components} components; only 1 to 4 are supported")]
    Components { role: VertexRole, components: u32 },
    #[error("index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
}

/// Semantic role of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexRole {
    Position,
    Normal,
    Tangent,
    Uv,
    Colour,
}

impl VertexRole {
    pub const COUNT: usize = 5;

    pub const ALL: [VertexRole; Self::COUNT] = [
        VertexRole::Position,
        VertexRole::Normal,
        VertexRole::Tangent,
        VertexRole::Uv,
        VertexRole::Colour,
    ];

    /// Name a shader uses for this attribute.
    pub fn name(self) -> &'static str {
        match self {
            VertexRole::Position => "position",
            VertexRole::Normal => "normal",
            VertexRole::Tangent => "tangent",
            VertexRole::Uv => "uv",
            VertexRole::Colour => "colour",
        }
    }

    /// Resolve a shader attribute name. Both spellings of colour are accepted.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "position" => Some(VertexRole::Position),
            "normal" => Some(VertexRole::Normal),
            "tangent" => Some(VertexRole::Tangent),
            "uv" => Some(VertexRole::Uv),
            "colour" | "color" => Some(VertexRole::Colour),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for VertexRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One attribute stream on the CPU.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub role: VertexRole,
    pub components: u32,
    pub data: Vec<f32>,
}

/// Vertex data before upload.
///
/// Transformations (centering, scaling, rotation) are applied here before the
/// GPU sees the data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexData {
    attributes: Vec<Attribute>,
    indices: Option<Vec<u32>>,
}

impl VertexData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the stream for `role`.
    pub fn with(mut self, role: VertexRole, components: u32, data: Vec<f32>) -> Self {
        self.set(role, components, data);
        self
    }

    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    pub fn set(&mut self, role: VertexRole, components: u32, data: Vec<f32>) {
        let attribute = Attribute {
            role,
            components,
            data,
        };
        match self.attributes.iter_mut().find(|a| a.role == role) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }

    pub fn attribute(&self, role: VertexRole) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.role == role)
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    /// Check that every stream describes the same number of vertices and that
    /// indices stay in range. Returns the vertex count.
    pub fn validate(&self) -> Result<usize, GeometryError> {
        if self.attributes.is_empty() {
            return Err(GeometryError::Empty);
        }
        let mut expected = None;

        for attribute in &self.attributes {
            if !(1..=4).contains(&attribute.components) {
                return Err(GeometryError::Components {
                    role: attribute.role,
                    components: attribute.components,
                });
            }
            let len = attribute.data.len();
            let components = attribute.components as usize;
            if len % components != 0 {
                return Err(GeometryError::Ragged {
                    role: attribute.role,
                    len,
                    components: attribute.components,
                });
            }
            let count = len / components;
            match expected {
                None => expected = Some(count),
                Some(expected) if expected != count => {
                    return Err(GeometryError::CountMismatch {
                        role: attribute.role,
                        expected,
                        found: count,
                    });
                }
                Some(_) => {}
            }
        }

        let vertex_count = expected.unwrap_or_default();
        if vertex_count == 0 || self.indices.as_ref().is_some_and(|i| i.is_empty()) {
            return Err(GeometryError::Empty);
        }
        if let Some(indices) = &self.indices {
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(GeometryError::IndexOutOfRange {
                    index,
                    vertex_count,
                });
            }
        }
        Ok(vertex_count)
    }

    fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.attribute(VertexRole::Position)
            .filter(|a| a.components == 3)
            .into_iter()
            .flat_map(|a| a.data.chunks_exact(3).map(Vec3::from_slice))
    }

    fn map_vec3(&mut self, role: VertexRole, f: impl Fn(Vec3) -> Vec3) {
        if let Some(attribute) = self
            .attributes
            .iter_mut()
            .find(|a| a.role == role && a.components == 3)
        {
            for chunk in attribute.data.chunks_exact_mut(3) {
                let v = f(Vec3::from_slice(chunk));
                chunk.copy_from_slice(&v.to_array());
            }
        }
    }

    /// Axis-aligned bounds of the position stream as `(min, max)`.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.positions().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(min, max), p| (min.min(p), max.max(p)),
        )
    }

    pub fn center(&self) -> Vec3 {
        let (min, max) = self.bounds();
        (min + max) * 0.5
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.map_vec3(VertexRole::Position, |p| p + offset);
    }

    pub fn scale(&mut self, factor: f32) {
        self.map_vec3(VertexRole::Position, |p| p * factor);
    }

    /// Rotate positions and the direction streams (normal, tangent).
    pub fn rotate(&mut self, rotation: Quat) {
        self.map_vec3(VertexRole::Position, |p| rotation * p);
        self.map_vec3(VertexRole::Normal, |n| rotation * n);
        self.map_vec3(VertexRole::Tangent, |t| rotation * t);
    }

    /// Move the bounding box center to the origin.
    pub fn recenter(&mut self) {
        let center = self.center();
        self.translate(-center);
    }

    /// Scale to fit within a unit cube, preserving aspect ratio.
    pub fn normalize(&mut self) {
        let (min, max) = self.bounds();
        let size = max - min;
        let max_dim = size.x.max(size.y).max(size.z);
        if max_dim > 0.0 {
            self.scale(1.0 / max_dim);
        }
    }

    /// A unit cube centered at the origin, four vertices per face.
    pub fn cube() -> Self {
        // (normal, tangent) per face; corners wind counter-clockwise seen from outside.
        let faces: [(Vec3, Vec3); 6] = [
            (Vec3::Z, Vec3::X),
            (Vec3::NEG_Z, Vec3::NEG_X),
            (Vec3::Y, Vec3::X),
            (Vec3::NEG_Y, Vec3::X),
            (Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_X, Vec3::Z),
        ];
        let corners = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];
        let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

        let mut positions = Vec::with_capacity(72);
        let mut normals = Vec::with_capacity(72);
        let mut tangents = Vec::with_capacity(72);
        let mut uv = Vec::with_capacity(48);
        let mut indices = Vec::with_capacity(36);

        for (face, (normal, tangent)) in faces.iter().enumerate() {
            let bitangent = normal.cross(*tangent);
            for ((s, t), corner_uv) in corners.iter().zip(uvs) {
                let p = *normal * 0.5 + *tangent * *s + bitangent * *t;
                positions.extend_from_slice(&p.to_array());
                normals.extend_from_slice(&normal.to_array());
                tangents.extend_from_slice(&tangent.to_array());
                uv.extend_from_slice(&corner_uv);
            }
            let base = face as u32 * 4;
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self::new()
            .with(VertexRole::Position, 3, positions)
            .with(VertexRole::Normal, 3, normals)
            .with(VertexRole::Tangent, 3, tangents)
            .with(VertexRole::Uv, 2, uv)
            .with_indices(indices)
    }

    /// A UV sphere of radius 0.5 centered at the origin.
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut tangents = Vec::new();
        let mut uv = Vec::new();
        let mut indices = Vec::new();

        for ring in 0..=rings {
            let phi = std::f32::consts::PI * ring as f32 / rings as f32;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for seg in 0..=segments {
                let theta = 2.0 * std::f32::consts::PI * seg as f32 / segments as f32;
                let normal = Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin());

                positions.extend_from_slice(&(normal * 0.5).to_array());
                normals.extend_from_slice(&normal.to_array());
                tangents.extend_from_slice(&[-theta.sin(), 0.0, theta.cos()]);
                uv.extend_from_slice(&[seg as f32 / segments as f32, ring as f32 / rings as f32]);
            }
        }

        for ring in 0..rings {
            for seg in 0..segments {
                let current = ring * (segments + 1) + seg;
                let next = current + segments + 1;
                indices.extend_from_slice(&[current, current + 1, next]);
                indices.extend_from_slice(&[current + 1, next + 1, next]);
            }
        }

        Self::new()
            .with(VertexRole::Position, 3, positions)
            .with(VertexRole::Normal, 3, normals)
            .with(VertexRole::Tangent, 3, tangents)
            .with(VertexRole::Uv, 2, uv)
            .with_indices(indices)
    }

    /// A square on the XZ plane facing +Y.
    pub fn plane(size: f32) -> Self {
        let half = size * 0.5;
        #[rustfmt::skip]
        let positions = vec![
            -half, 0.0, -half,
            -half, 0.0,  half,
             half, 0.0,  half,
             half, 0.0, -half,
        ];
        Self::new()
            .with(VertexRole::Position, 3, positions)
            .with(VertexRole::Normal, 3, [0.0, 1.0, 0.0].repeat(4))
            .with(VertexRole::Tangent, 3, [1.0, 0.0, 0.0].repeat(4))
            .with(VertexRole::Uv, 2, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0])
            .with_indices(vec![0, 1, 2, 2, 3, 0])
    }

    /// A unit quad on the XY plane facing +Z, used for screen-space passes.
    ///
    /// Texture coordinates put (0, 0) at the top-left corner.
    pub fn quad() -> Self {
        #[rustfmt::skip]
        let positions = vec![
            -0.5, -0.5, 0.0,
             0.5, -0.5, 0.0,
             0.5,  0.5, 0.0,
            -0.5,  0.5, 0.0,
        ];
        Self::new()
            .with(VertexRole::Position, 3, positions)
            .with(VertexRole::Normal, 3, [0.0, 0.0, 1.0].repeat(4))
            .with(VertexRole::Tangent, 3, [1.0, 0.0, 0.0].repeat(4))
            .with(VertexRole::Uv, 2, vec![0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0])
            .with_indices(vec![0, 1, 2, 2, 3, 0])
    }
}

/// Tangent of a triangle in the direction of increasing `u`.
///
/// Degenerate texture mappings fall back to the first edge.
pub fn triangle_tangent(positions: [Vec3; 3], uvs: [Vec2; 3]) -> Vec3 {
    let edge1 = positions[1] - positions[0];
    let edge2 = positions[2] - positions[0];
    let duv1 = uvs[1] - uvs[0];
    let duv2 = uvs[2] - uvs[0];

    let det = duv1.x * duv2.y - duv2.x * duv1.y;
    if det.abs() <= f32::EPSILON {
        return edge1.normalize_or_zero();
    }
    let tangent = (edge1 * duv2.y - edge2 * duv1.y) / det;
    tangent.normalize_or(edge1.normalize_or_zero())
}

/// A GPU vertex stream for one role.
#[derive(Debug)]
pub struct VertexBuffer {
    pub role: VertexRole,
    pub components: u32,
    pub(crate) buffer: wgpu::Buffer,
}

/// Layout signature of a geometry: present roles and their widths.
///
/// Pipelines are cached per signature.
pub type VertexLayoutKey = Vec<(VertexRole, u32)>;

/// GPU-resident geometry: one buffer per attribute role plus optional indices.
#[derive(Debug)]
pub struct Geometry {
    buffers: Vec<VertexBuffer>,
    index: Option<(wgpu::Buffer, u32)>,
    vertex_count: u32,
}

impl Geometry {
    /// Validate `data` and upload each stream to its own buffer.
    pub fn upload(gpu: &GpuContext, data: &VertexData, label: &str) -> Result<Self, GeometryError> {
        use wgpu::util::DeviceExt;

        let vertex_count = data.validate()?;

        let buffers = data
            .attributes()
            .iter()
            .map(|attribute| VertexBuffer {
                role: attribute.role,
                components: attribute.components,
                buffer: gpu
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{label} {} Buffer", attribute.role)),
                        contents: bytemuck::cast_slice(&attribute.data),
                        usage: wgpu::BufferUsages::VERTEX,
                    }),
            })
            .collect();

        let index = data.indices().map(|indices| {
            let buffer = gpu
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{label} Index Buffer")),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
            (buffer, indices.len() as u32)
        });

        log::debug!("uploaded geometry `{label}`: {vertex_count} vertices");

        Ok(Self {
            buffers,
            index,
            vertex_count: vertex_count as u32,
        })
    }

    pub fn buffers(&self) -> &[VertexBuffer] {
        &self.buffers
    }

    pub fn buffer(&self, role: VertexRole) -> Option<&VertexBuffer> {
        self.buffers.iter().find(|b| b.role == role)
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> Option<u32> {
        self.index.as_ref().map(|(_, count)| *count)
    }

    pub fn layout_key(&self) -> VertexLayoutKey {
        self.buffers.iter().map(|b| (b.role, b.components)).collect()
    }

    /// Issue the draw: indexed when an index buffer is present.
    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        match &self.index {
            Some((buffer, count)) => {
                pass.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..*count, 0, 0..1);
            }
            None => pass.draw(0..self.vertex_count, 0..1),
        }
    }
}

pub(crate) fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> VertexData {
        VertexData::new()
            .with(
                VertexRole::Position,
                3,
                vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, -1.0, -1.0, -1.0],
            )
            .with_indices(vec![0, 1, 2])
    }

    #[test]
    fn bounds_cover_all_positions() {
        let (min, max) = triangle().bounds();
        assert_eq!(min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(max, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn recenter_moves_center_to_origin() {
        let mut data = VertexData::new().with(
            VertexRole::Position,
            3,
            vec![2.0, 2.0, 2.0, 4.0, 4.0, 4.0],
        );
        data.recenter();
        assert!(data.center().length() < 0.001);
    }

    #[test]
    fn normalize_fits_unit_cube() {
        let mut data = triangle();
        data.normalize();
        let (min, max) = data.bounds();
        let size = max - min;
        assert!((size.max_element() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn mismatched_counts_are_rejected() {
        let data = triangle().with(VertexRole::Uv, 2, vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(
            data.validate(),
            Err(GeometryError::CountMismatch {
                role: VertexRole::Uv,
                expected: 3,
                found: 2
            })
        );
    }

    #[test]
    fn ragged_stream_is_rejected() {
        let data = VertexData::new().with(VertexRole::Position, 3, vec![0.0; 7]);
        assert!(matches!(data.validate(), Err(GeometryError::Ragged { .. })));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let data = triangle().with_indices(vec![0, 1, 3]);
        assert_eq!(
            data.validate(),
            Err(GeometryError::IndexOutOfRange {
                index: 3,
                vertex_count: 3
            })
        );
    }

    #[test]
    fn empty_geometry_is_rejected() {
        assert_eq!(VertexData::new().validate(), Err(GeometryError::Empty));
    }

    #[test]
    fn zero_length_streams_are_rejected() {
        let data = VertexData::new()
            .with(VertexRole::Position, 3, Vec::new())
            .with(VertexRole::Uv, 2, Vec::new());
        assert_eq!(data.validate(), Err(GeometryError::Empty));
    }

    #[test]
    fn empty_index_list_is_rejected() {
        let data = triangle().with_indices(Vec::new());
        assert_eq!(data.validate(), Err(GeometryError::Empty));
    }

    #[test]
    fn set_replaces_existing_role() {
        let mut data = triangle();
        data.set(VertexRole::Position, 3, vec![0.0; 3]);
        assert_eq!(data.attributes().len(), 1);
        assert_eq!(data.validate(), Err(GeometryError::IndexOutOfRange { index: 1, vertex_count: 1 }));
    }

    #[test]
    fn primitives_are_consistent() {
        for data in [
            VertexData::cube(),
            VertexData::sphere(16, 8),
            VertexData::plane(4.0),
            VertexData::quad(),
        ] {
            let count = data.validate().unwrap();
            assert!(count > 0);
            for role in [VertexRole::Position, VertexRole::Normal, VertexRole::Tangent, VertexRole::Uv] {
                assert!(data.attribute(role).is_some(), "missing {role}");
            }
        }
    }

    fn assert_front_faces_point_along_normals(data: &VertexData) {
        let positions = &data.attribute(VertexRole::Position).unwrap().data;
        let normals = &data.attribute(VertexRole::Normal).unwrap().data;
        let at = |buf: &[f32], i: u32| Vec3::from_slice(&buf[i as usize * 3..i as usize * 3 + 3]);

        for tri in data.indices().unwrap().chunks_exact(3) {
            let (a, b, c) = (at(positions, tri[0]), at(positions, tri[1]), at(positions, tri[2]));
            let face = (b - a).cross(c - a);
            if face.length_squared() < 1e-10 {
                continue;
            }
            let normal = at(normals, tri[0]) + at(normals, tri[1]) + at(normals, tri[2]);
            assert!(face.dot(normal) > 0.0, "triangle {tri:?} winds clockwise");
        }
    }

    #[test]
    fn primitives_wind_counter_clockwise() {
        assert_front_faces_point_along_normals(&VertexData::cube());
        assert_front_faces_point_along_normals(&VertexData::sphere(12, 6));
        assert_front_faces_point_along_normals(&VertexData::plane(2.0));
        assert_front_faces_point_along_normals(&VertexData::quad());
    }

    #[test]
    fn cube_tangents_follow_increasing_u() {
        let data = VertexData::cube();
        let positions = &data.attribute(VertexRole::Position).unwrap().data;
        let uvs = &data.attribute(VertexRole::Uv).unwrap().data;
        let tangents = &data.attribute(VertexRole::Tangent).unwrap().data;
        for tri in data.indices().unwrap().chunks_exact(3) {
            let p = |i: u32| Vec3::from_slice(&positions[i as usize * 3..i as usize * 3 + 3]);
            let uv = |i: u32| Vec2::from_slice(&uvs[i as usize * 2..i as usize * 2 + 2]);
            let computed = triangle_tangent([p(tri[0]), p(tri[1]), p(tri[2])], [uv(tri[0]), uv(tri[1]), uv(tri[2])]);
            let stored = Vec3::from_slice(&tangents[tri[0] as usize * 3..tri[0] as usize * 3 + 3]);
            assert!(computed.dot(stored) > 0.99, "{computed} vs {stored}");
        }
    }

    #[test]
    fn triangle_tangent_matches_u_axis() {
        let tangent = triangle_tangent(
            [Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0)],
            [Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 0.0)],
        );
        assert!((tangent - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn degenerate_uvs_fall_back_to_edge() {
        let tangent = triangle_tangent(
            [Vec3::ZERO, Vec3::new(0.0, 0.0, 3.0), Vec3::Y],
            [Vec2::ZERO; 3],
        );
        assert_eq!(tangent, Vec3::Z);
    }

    #[test]
    fn colour_name_accepts_both_spellings() {
        assert_eq!(VertexRole::from_name("color"), Some(VertexRole::Colour));
        assert_eq!(VertexRole::from_name("colour"), Some(VertexRole::Colour));
        assert_eq!(VertexRole::from_name("bitangent"), None);
    }
}
