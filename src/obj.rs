//! Wavefront OBJ import for triangulated meshes.
//!
//! Supports `v`, `vn`, `vt` and `f a/b/c a/b/c a/b/c` records with 1-based
//! indices in position/uv/normal order. Other record types are ignored. The
//! output is flat (one entry per face corner) and carries a per-triangle
//! tangent duplicated on its three corners.

use std::path::Path;

use glam::{Vec2, Vec3};
use thiserror::Error;

use crate::geometry::{VertexData, VertexRole, triangle_tangent};

#[derive(Debug, Error)]
pub enum ObjError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("line {line}: {kind} index {index} is out of range (have {available})")]
    IndexOutOfRange {
        line: usize,
        kind: &'static str,
        index: i64,
        available: usize,
    },
}

/// Flattened triangle data ready to become [`VertexData`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjMesh {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub tangents: Vec<f32>,
    pub triangle_count: usize,
}

impl ObjMesh {
    pub fn vertex_count(&self) -> usize {
        self.triangle_count * 3
    }

    pub fn to_vertex_data(&self) -> VertexData {
        VertexData::new()
            .with(VertexRole::Position, 3, self.positions.clone())
            .with(VertexRole::Normal, 3, self.normals.clone())
            .with(VertexRole::Tangent, 3, self.tangents.clone())
            .with(VertexRole::Uv, 2, self.uvs.clone())
    }
}

/// Read and parse an OBJ file.
pub fn load_obj(path: impl AsRef<Path>) -> Result<ObjMesh, ObjError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| ObjError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mesh = parse_obj(&source)?;
    log::info!(
        "loaded `{}`: {} triangles",
        path.display(),
        mesh.triangle_count
    );
    Ok(mesh)
}

/// Parse OBJ text.
///
/// Texture coordinates are flipped vertically so (0, 0) is the top-left of
/// the image.
pub fn parse_obj(source: &str) -> Result<ObjMesh, ObjError> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();
    let mut uvs: Vec<Vec2> = Vec::new();
    let mut mesh = ObjMesh::default();

    for (number, raw) in source.lines().enumerate() {
        let line = number + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        let mut fields = content.split_whitespace();
        let Some(keyword) = fields.next() else {
            continue;
        };

        match keyword {
            "v" => positions.push(Vec3::from_array(parse_floats(fields, line)?)),
            "vn" => normals.push(Vec3::from_array(parse_floats(fields, line)?)),
            "vt" => {
                let [u, v] = parse_floats(fields, line)?;
                uvs.push(Vec2::new(u, 1.0 - v));
            }
            "f" => {
                let corners: Vec<&str> = fields.collect();
                if corners.len() != 3 {
                    return Err(ObjError::Malformed {
                        line,
                        message: format!("expected a triangle, found {} vertices", corners.len()),
                    });
                }

                let mut p = [Vec3::ZERO; 3];
                let mut t = [Vec2::ZERO; 3];
                let mut n = [Vec3::ZERO; 3];
                for (i, corner) in corners.iter().enumerate() {
                    let [pi, ti, ni] = parse_corner(corner, line)?;
                    p[i] = lookup(&positions, pi, "position", line)?;
                    t[i] = lookup(&uvs, ti, "uv", line)?;
                    n[i] = lookup(&normals, ni, "normal", line)?;
                }

                let tangent = triangle_tangent(p, t);
                for i in 0..3 {
                    mesh.positions.extend_from_slice(&p[i].to_array());
                    mesh.uvs.extend_from_slice(&t[i].to_array());
                    mesh.normals.extend_from_slice(&n[i].to_array());
                    mesh.tangents.extend_from_slice(&tangent.to_array());
                }
                mesh.triangle_count += 1;
            }
            _ => {}
        }
    }

    Ok(mesh)
}

fn parse_floats<'a, const N: usize>(
    fields: impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<[f32; N], ObjError> {
    let mut out = [0.0; N];
    let mut count = 0;
    for field in fields.take(N) {
        out[count] = field.parse().map_err(|_| ObjError::Malformed {
            line,
            message: format!("`{field}` is not a number"),
        })?;
        count += 1;
    }
    if count < N {
        return Err(ObjError::Malformed {
            line,
            message: format!("expected {N} components, found {count}"),
        });
    }
    Ok(out)
}

fn parse_corner(corner: &str, line: usize) -> Result<[i64; 3], ObjError> {
    let parts: Vec<&str> = corner.split('/').collect();
    if parts.len() != 3 {
        return Err(ObjError::Malformed {
            line,
            message: format!("face corner `{corner}` must be position/uv/normal"),
        });
    }
    let mut out = [0; 3];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part.parse().map_err(|_| ObjError::Malformed {
            line,
            message: format!("face corner `{corner}` has a non-integer index"),
        })?;
    }
    Ok(out)
}

fn lookup<T: Copy>(items: &[T], index: i64, kind: &'static str, line: usize) -> Result<T, ObjError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| items.get(i))
        .copied()
        .ok_or(ObjError::IndexOutOfRange {
            line,
            kind,
            index,
            available: items.len(),
        })
}
