//! Scene construction for one load generation
//!
//! Mesh references are resolved and decoded concurrently, then the scene
//! graph is assembled in one synchronous pass. The generation token is
//! checked around every suspension point so an aborted load stops early.

use crate::config::LoadingConfig;
use crate::graph::{JointFrame, NodeId, NodeKind, SceneGraph, Surface};
use crate::lifecycle::{LoadError, LoadGeneration};
use crate::loader::{GeometryError, GeometryLoader, RenderableSubtree};
use crate::material::{Material, SharedMaterials, Texture};
use crate::shape::Shape;
use bevy::math::{EulerRot, Quat, Vec3};
use bevy::transform::components::Transform;
use futures_util::future::join_all;
use linkview_core::{
    AssetResolver, Geometry, GeometryCategory, GeometryShape, KinematicModel, Link, ModelError,
    Pose,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// URDF poses use fixed-axis roll, pitch, yaw
pub fn pose_to_transform(pose: &Pose) -> Transform {
    let [x, y, z] = pose.xyz;
    let [roll, pitch, yaw] = pose.rpy;
    Transform::from_xyz(x as f32, y as f32, z as f32).with_rotation(Quat::from_euler(
        EulerRot::ZYX,
        yaw as f32,
        pitch as f32,
        roll as f32,
    ))
}

/// Millimeter detection, reset for every generation.
///
/// Only meshes referenced with an identity authored scale take part. A mesh
/// that already carries a scale has had its units decided by the author.
#[derive(Debug, Clone)]
pub struct UnitScaleState {
    threshold: f32,
    enabled: bool,
    detected: Option<f32>,
}

impl UnitScaleState {
    pub fn new(config: &LoadingConfig) -> Self {
        Self {
            threshold: config.millimeter_threshold,
            enabled: config.detect_units,
            detected: None,
        }
    }

    /// Scale for unscaled meshes of this generation. The first decoded mesh
    /// with an identity authored scale decides.
    pub fn observe(&mut self, subtree: &RenderableSubtree, authored: [f64; 3]) -> f32 {
        if !self.enabled || !is_identity_scale(authored) {
            return 1.0;
        }
        if let Some(scale) = self.detected {
            return scale;
        }
        let extent = subtree.bounds().map(|b| b.size().max_element()).unwrap_or(0.0);
        let scale = if extent > self.threshold { 0.001 } else { 1.0 };
        if scale != 1.0 {
            info!(extent, "Mesh extent suggests millimeter units, scaling by 0.001");
        }
        self.detected = Some(scale);
        scale
    }

    pub fn detected(&self) -> Option<f32> {
        self.detected
    }
}

/// Everything a build needs besides the model
#[derive(Clone)]
pub struct BuildContext {
    pub resolver: Arc<dyn AssetResolver>,
    pub loader: Arc<dyn GeometryLoader>,
    pub shared: SharedMaterials,
    pub loading: LoadingConfig,
}

/// Scene produced by one generation, not yet attached
pub struct BuiltScene {
    pub model: KinematicModel,
    pub graph: SceneGraph,
    /// Node of the root link
    pub root: NodeId,
    pub unit_scale: f32,
    /// Mesh references that ended up as placeholders
    pub placeholders: Vec<String>,
}

enum MeshSource {
    Loaded(RenderableSubtree),
    Placeholder,
}

async fn load_mesh(
    ctx: &BuildContext,
    reference: String,
) -> (String, Result<RenderableSubtree, GeometryError>) {
    let Some(handle) = ctx.resolver.resolve(&reference) else {
        warn!(reference = %reference, "Mesh not found in supplied assets, using placeholder");
        let missing = GeometryError::NotFound(reference.clone());
        return (reference, Err(missing));
    };
    let extension = handle.extension().unwrap_or_default();
    let result = ctx.loader.load(handle, &extension).await;
    if let Err(e) = &result {
        warn!(reference = %reference, error = %e, "Mesh failed to load, using placeholder");
    }
    (reference, result)
}

fn is_identity_scale(scale: [f64; 3]) -> bool {
    scale == [1.0; 3]
}

/// Distinct mesh references with the authored scale of their first use
fn mesh_references(model: &KinematicModel) -> Vec<(String, [f64; 3])> {
    let mut seen: Vec<(String, [f64; 3])> = Vec::new();
    for link in &model.links {
        for geometry in link.visuals.iter().chain(&link.collisions) {
            if let GeometryShape::Mesh { filename, scale } = &geometry.shape {
                match seen.iter_mut().find(|(r, _)| r == filename) {
                    // Prefer an unscaled use so detection sees it
                    Some(entry) if is_identity_scale(*scale) => entry.1 = *scale,
                    Some(_) => {}
                    None => seen.push((filename.clone(), *scale)),
                }
            }
        }
    }
    seen
}

/// Build the scene for `model` under `generation`
pub async fn build_scene(
    ctx: BuildContext,
    model: KinematicModel,
    generation: LoadGeneration,
) -> Result<BuiltScene, LoadError> {
    generation.check()?;

    let references = mesh_references(&model);
    let authored: HashMap<String, [f64; 3]> = references.iter().cloned().collect();
    let results = join_all(references.into_iter().map(|(r, _)| load_mesh(&ctx, r))).await;
    generation.check()?;

    let mut units = UnitScaleState::new(&ctx.loading);
    let mut meshes = HashMap::new();
    let mut placeholders = Vec::new();
    for (reference, result) in results {
        match result {
            Ok(subtree) => {
                let scale = authored.get(&reference).copied().unwrap_or([1.0; 3]);
                units.observe(&subtree, scale);
                meshes.insert(reference, MeshSource::Loaded(subtree));
            }
            Err(_) => {
                placeholders.push(reference.clone());
                meshes.insert(reference, MeshSource::Placeholder);
            }
        }
    }

    let mut assembler = Assembler {
        ctx: &ctx,
        model: &model,
        meshes: &meshes,
        unit_scale: units.detected().unwrap_or(1.0),
        graph: SceneGraph::new(),
        materials: HashMap::new(),
    };
    let root_link = model
        .root_link()
        .ok_or_else(|| ModelError::ValidationError("model has no root link".to_string()))?;
    let graph_root = assembler.graph.root();
    let root = assembler.add_link(graph_root, root_link);
    let Assembler {
        graph, unit_scale, ..
    } = assembler;

    generation.check()?;
    debug!(
        generation = generation.id(),
        nodes = graph.len(),
        placeholders = placeholders.len(),
        "Scene assembled"
    );

    Ok(BuiltScene {
        model,
        graph,
        root,
        unit_scale,
        placeholders,
    })
}

struct Assembler<'a> {
    ctx: &'a BuildContext,
    model: &'a KinematicModel,
    meshes: &'a HashMap<String, MeshSource>,
    unit_scale: f32,
    graph: SceneGraph,
    /// Named materials share one allocation within a generation
    materials: HashMap<String, Arc<Material>>,
}

impl Assembler<'_> {
    fn add_link(&mut self, parent: NodeId, link: &Link) -> NodeId {
        let node = self
            .graph
            .add(parent, link.name.clone(), NodeKind::Link, Transform::IDENTITY);

        let visuals = self.graph.add(node, "visual", NodeKind::Group, Transform::IDENTITY);
        for (i, geometry) in link.visuals.iter().enumerate() {
            self.add_geometry(visuals, link, GeometryCategory::Visual, i, geometry);
        }
        let collisions = self
            .graph
            .add(node, "collision", NodeKind::CollisionGroup, Transform::IDENTITY);
        for (i, geometry) in link.collisions.iter().enumerate() {
            self.add_geometry(collisions, link, GeometryCategory::Collision, i, geometry);
        }

        let model = self.model;
        for joint in model.child_joints(&link.name) {
            let Some(child) = model.link(&joint.child) else {
                continue;
            };
            let axis = Vec3::new(joint.axis[0] as f32, joint.axis[1] as f32, joint.axis[2] as f32)
                .try_normalize()
                .unwrap_or(Vec3::X);
            let frame = JointFrame {
                joint: joint.name.clone(),
                joint_type: joint.joint_type,
                axis,
                origin: pose_to_transform(&joint.origin),
                value: joint.value,
            };
            let local = frame.local_transform();
            let joint_node = self
                .graph
                .add(node, joint.name.clone(), NodeKind::Joint(frame), local);
            self.add_link(joint_node, child);
        }
        node
    }

    fn material_for(&mut self, category: GeometryCategory, geometry: &Geometry) -> Arc<Material> {
        if category == GeometryCategory::Collision {
            return self.ctx.shared.collision.clone();
        }
        let Some(spec) = &geometry.material else {
            return self.ctx.shared.default.clone();
        };
        if let Some(name) = &spec.name {
            if let Some(existing) = self.materials.get(name) {
                return existing.clone();
            }
        }

        let mut material = Material::from_spec(spec);
        if let Some(reference) = &spec.texture {
            match self.ctx.resolver.resolve(reference) {
                Some(handle) => {
                    material.texture = Some(Arc::new(Texture {
                        path: handle.path,
                        bytes: handle.bytes,
                    }))
                }
                None => warn!(reference = %reference, "Texture not found in supplied assets"),
            }
        }
        let material = Arc::new(material);
        if let Some(name) = &spec.name {
            self.materials.insert(name.clone(), material.clone());
        }
        material
    }

    fn add_geometry(
        &mut self,
        group: NodeId,
        link: &Link,
        category: GeometryCategory,
        index: usize,
        geometry: &Geometry,
    ) {
        let name = geometry
            .name
            .clone()
            .unwrap_or_else(|| format!("{}_{}_{}", link.name, category, index));
        let origin = pose_to_transform(&geometry.origin);
        let material = self.material_for(category, geometry);

        let primitive = match &geometry.shape {
            GeometryShape::Box { size } => Some(Shape::cuboid(Vec3::new(
                size[0] as f32,
                size[1] as f32,
                size[2] as f32,
            ))),
            GeometryShape::Sphere { radius } => Some(Shape::Sphere {
                radius: *radius as f32,
            }),
            GeometryShape::Cylinder { radius, length } => Some(Shape::Cylinder {
                radius: *radius as f32,
                half_length: *length as f32 * 0.5,
            }),
            GeometryShape::Capsule { radius, length } => Some(Shape::Capsule {
                radius: *radius as f32,
                half_length: *length as f32 * 0.5,
            }),
            GeometryShape::Mesh { .. } => None,
        };
        if let Some(shape) = primitive {
            self.graph.add_surface(
                group,
                name,
                NodeKind::Surface,
                origin,
                Surface::new(shape, material),
            );
            return;
        }

        let GeometryShape::Mesh { filename, scale } = &geometry.shape else {
            return;
        };
        let units = if is_identity_scale(*scale) { self.unit_scale } else { 1.0 };
        let scale = Vec3::new(scale[0] as f32, scale[1] as f32, scale[2] as f32) * units;
        let node = self
            .graph
            .add(group, name.clone(), NodeKind::Group, origin.with_scale(scale));

        match self.meshes.get(filename) {
            Some(MeshSource::Loaded(subtree)) => {
                for part in &subtree.parts {
                    let material = match &part.material {
                        Some(embedded) if geometry.material.is_none() && category == GeometryCategory::Visual => {
                            Arc::new(embedded.clone())
                        }
                        _ => material.clone(),
                    };
                    self.graph.add_surface(
                        node,
                        part.name.clone(),
                        NodeKind::Surface,
                        part.transform,
                        Surface::new(Shape::TriMesh(part.mesh.clone()), material),
                    );
                }
            }
            _ => {
                // Placeholders keep their metric size regardless of mesh scale
                let size = self.ctx.loading.placeholder_size;
                let local = if scale.cmpne(Vec3::ZERO).all() {
                    Transform::from_scale(scale.recip())
                } else {
                    Transform::IDENTITY
                };
                let mut surface = Surface::new(
                    Shape::cuboid(Vec3::splat(size)),
                    self.ctx.shared.placeholder.clone(),
                );
                surface.placeholder = Some(filename.clone());
                self.graph
                    .add_surface(node, format!("{}_placeholder", name), NodeKind::Surface, local, surface);
            }
        }
    }
}
