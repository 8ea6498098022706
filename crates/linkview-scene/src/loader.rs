//! Geometry loading seam
//!
//! A [`GeometryLoader`] turns a resolved mesh handle into renderable parts.
//! Loaders may fail; the scene builder absorbs every failure by substituting
//! a placeholder, so a broken mesh never fails a model load.

use crate::material::Material;
use crate::shape::{Aabb, TriMesh};
use bevy::math::Vec3;
use bevy::transform::components::Transform;
use futures_util::future::BoxFuture;
use linkview_core::AssetHandle;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Asset '{0}' not found")]
    NotFound(String),
    #[error("No loader for extension '{0}'")]
    Unsupported(String),
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("Mesh {0} contains no triangles")]
    Empty(String),
}

/// One mesh of a decoded file with its placement inside the file
#[derive(Debug, Clone)]
pub struct MeshPart {
    pub name: String,
    pub transform: Transform,
    pub mesh: Arc<TriMesh>,
    /// Material embedded in the file, if the format carries one
    pub material: Option<Material>,
}

/// Decoded content of one mesh reference
#[derive(Debug, Clone, Default)]
pub struct RenderableSubtree {
    pub parts: Vec<MeshPart>,
}

impl RenderableSubtree {
    pub fn single(name: impl Into<String>, mesh: TriMesh) -> Self {
        Self {
            parts: vec![MeshPart {
                name: name.into(),
                transform: Transform::IDENTITY,
                mesh: Arc::new(mesh),
                material: None,
            }],
        }
    }

    /// Bounds of all parts in the subtree frame
    pub fn bounds(&self) -> Option<Aabb> {
        self.parts
            .iter()
            .map(|p| p.mesh.bounds().transformed(&p.transform.compute_affine()))
            .reduce(|a, b| a.union(&b))
    }

    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(|p| p.mesh.triangle_count()).sum()
    }
}

/// Decodes a mesh payload. Runs off the frame loop.
pub trait GeometryLoader: Send + Sync {
    fn load(
        &self,
        handle: AssetHandle,
        extension: &str,
    ) -> BoxFuture<'static, Result<RenderableSubtree, GeometryError>>;
}

/// Dispatches to a loader by lowercased file extension
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: HashMap<String, Arc<dyn GeometryLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in loaders
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("stl", Arc::new(StlLoader));
        registry
    }

    pub fn register(&mut self, extension: &str, loader: Arc<dyn GeometryLoader>) {
        self.loaders.insert(extension.to_lowercase(), loader);
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.loaders.contains_key(&extension.to_lowercase())
    }
}

impl GeometryLoader for LoaderRegistry {
    fn load(
        &self,
        handle: AssetHandle,
        extension: &str,
    ) -> BoxFuture<'static, Result<RenderableSubtree, GeometryError>> {
        match self.loaders.get(&extension.to_lowercase()) {
            Some(loader) => loader.load(handle, extension),
            None => {
                let extension = extension.to_string();
                Box::pin(async move { Err(GeometryError::Unsupported(extension)) })
            }
        }
    }
}

const STL_HEADER_SIZE: usize = 80;
const STL_TRIANGLE_SIZE: usize = 50;

/// Binary and ASCII STL
#[derive(Debug, Clone, Copy, Default)]
pub struct StlLoader;

impl GeometryLoader for StlLoader {
    fn load(
        &self,
        handle: AssetHandle,
        _extension: &str,
    ) -> BoxFuture<'static, Result<RenderableSubtree, GeometryError>> {
        Box::pin(async move {
            let mesh = decode_stl(&handle.path, &handle.bytes)?;
            if mesh.triangle_count() == 0 {
                return Err(GeometryError::Empty(handle.path));
            }
            Ok(RenderableSubtree::single(handle.path, mesh))
        })
    }
}

pub fn decode_stl(path: &str, bytes: &[u8]) -> Result<TriMesh, GeometryError> {
    let decode_error = |reason: &str| GeometryError::Decode {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if bytes.len() < 6 {
        return Err(decode_error("file too small to be valid STL"));
    }

    let header_end = bytes.len().min(STL_HEADER_SIZE);
    let header = String::from_utf8_lossy(&bytes[..header_end]);
    if header.trim_start().starts_with("solid") && !is_binary_stl(bytes) {
        return decode_stl_ascii(bytes).map_err(|reason| decode_error(&reason));
    }
    decode_stl_binary(bytes).map_err(|reason| decode_error(&reason))
}

/// Some binary files start with "solid"; a size that matches the face count
/// or a null byte in the header gives them away.
fn is_binary_stl(bytes: &[u8]) -> bool {
    if bytes.len() < STL_HEADER_SIZE + 4 {
        return false;
    }
    let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    let matches_count = body_size(count)
        .and_then(|size| size.checked_add(STL_HEADER_SIZE + 4))
        .is_some_and(|expected| expected == bytes.len());
    matches_count || bytes[..STL_HEADER_SIZE].contains(&0)
}

/// Byte size of `count` binary facets, `None` when it does not fit `usize`
fn body_size(count: usize) -> Option<usize> {
    count.checked_mul(STL_TRIANGLE_SIZE)
}

fn read_vertex(buf: &[u8]) -> Vec3 {
    let f = |i: usize| f32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
    Vec3::new(f(0), f(4), f(8))
}

fn decode_stl_binary(bytes: &[u8]) -> Result<TriMesh, String> {
    if bytes.len() < STL_HEADER_SIZE + 4 {
        return Err("truncated binary header".to_string());
    }
    let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    let body = &bytes[STL_HEADER_SIZE + 4..];
    if body_size(count).map_or(true, |size| body.len() < size) {
        return Err(format!(
            "expected {} triangles, found {}",
            count,
            body.len() / STL_TRIANGLE_SIZE
        ));
    }

    let mut positions = Vec::with_capacity(count * 3);
    let mut indices = Vec::with_capacity(count);
    for tri in body.chunks_exact(STL_TRIANGLE_SIZE).take(count) {
        // Skip the 12-byte normal
        let base = positions.len() as u32;
        positions.push(read_vertex(&tri[12..24]));
        positions.push(read_vertex(&tri[24..36]));
        positions.push(read_vertex(&tri[36..48]));
        indices.push([base, base + 1, base + 2]);
    }
    Ok(TriMesh::new(positions, indices))
}

fn decode_stl_ascii(bytes: &[u8]) -> Result<TriMesh, String> {
    let text = String::from_utf8_lossy(bytes);
    let mut positions = Vec::new();
    let mut indices = Vec::new();
    let mut face: Vec<Vec3> = Vec::with_capacity(3);

    for line in text.lines() {
        let mut parts = line.split_whitespace();
        match parts.next().map(str::to_lowercase).as_deref() {
            Some("outer") => face.clear(),
            Some("vertex") => {
                let coords: Vec<f32> = parts
                    .take(3)
                    .map(|p| p.parse::<f32>().map_err(|e| format!("bad vertex '{}': {}", line.trim(), e)))
                    .collect::<Result<_, _>>()?;
                if coords.len() == 3 {
                    face.push(Vec3::new(coords[0], coords[1], coords[2]));
                }
            }
            Some("endfacet") => {
                if face.len() == 3 {
                    let base = positions.len() as u32;
                    positions.append(&mut face);
                    indices.push([base, base + 1, base + 2]);
                }
                face.clear();
            }
            Some("endsolid") => break,
            _ => {}
        }
    }
    Ok(TriMesh::new(positions, indices))
}
