//! Drawing the live scene in a bevy host
//!
//! Every surface node is mirrored by one entity carrying its world transform,
//! mesh, material and visibility. Entities are respawned when a new generation
//! attaches and patched in place whenever the graph revision moves, so
//! highlight and visibility changes reach the renderer in the same frame.

use crate::graph::{NodeId, SceneGraph};
use crate::material::Material as SurfaceMaterial;
use crate::plugin::Viewport;
use crate::shape::{Shape, TriMesh};
use bevy::asset::RenderAssetUsages;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Links a drawn entity to the surface node it mirrors
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceEntity {
    pub node: NodeId,
}

/// Render-side caches, keyed by `Arc` identity. The cached `Arc` keeps the
/// address from being reused while the key is live.
#[derive(Default)]
pub(crate) struct RenderState {
    /// (generation, graph revision) of the last sync
    synced: Option<(u64, u64)>,
    entities: HashMap<NodeId, Entity>,
    materials: HashMap<usize, (Arc<SurfaceMaterial>, Handle<StandardMaterial>)>,
    meshes: HashMap<usize, (Arc<TriMesh>, Handle<Mesh>)>,
}

impl RenderState {
    fn clear(&mut self, commands: &mut Commands) {
        for (_, entity) in self.entities.drain() {
            commands.entity(entity).despawn();
        }
        self.materials.clear();
        self.meshes.clear();
        self.synced = None;
    }

    fn material(
        &mut self,
        assets: &mut Assets<StandardMaterial>,
        material: &Arc<SurfaceMaterial>,
    ) -> Handle<StandardMaterial> {
        let key = Arc::as_ptr(material) as usize;
        self.materials
            .entry(key)
            .or_insert_with(|| (material.clone(), assets.add(standard_material(material))))
            .1
            .clone()
    }

    fn mesh(&mut self, assets: &mut Assets<Mesh>, shape: &Shape) -> Handle<Mesh> {
        let Shape::TriMesh(mesh) = shape else {
            return assets.add(primitive_mesh(shape));
        };
        let key = Arc::as_ptr(mesh) as usize;
        self.meshes
            .entry(key)
            .or_insert_with(|| (mesh.clone(), assets.add(trimesh_mesh(mesh))))
            .1
            .clone()
    }
}

pub fn standard_material(material: &SurfaceMaterial) -> StandardMaterial {
    StandardMaterial {
        base_color: material.base_color,
        emissive: material.emissive,
        unlit: material.unlit,
        alpha_mode: if material.is_transparent() {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        },
        ..default()
    }
}

/// Bevy primitives are Y-aligned; surface shapes are Z-aligned
fn primitive_mesh(shape: &Shape) -> Mesh {
    let z_up = Quat::from_rotation_x(std::f32::consts::FRAC_PI_2);
    match shape {
        Shape::Cuboid { half_extents } => Mesh::from(Cuboid::from_size(*half_extents * 2.0)),
        Shape::Sphere { radius } => Mesh::from(Sphere::new(*radius)),
        Shape::Cylinder {
            radius,
            half_length,
        } => Mesh::from(Cylinder::new(*radius, half_length * 2.0)).rotated_by(z_up),
        Shape::Capsule {
            radius,
            half_length,
        } => Mesh::from(Capsule3d::new(*radius, half_length * 2.0)).rotated_by(z_up),
        Shape::TriMesh(mesh) => trimesh_mesh(mesh),
    }
}

fn trimesh_mesh(mesh: &TriMesh) -> Mesh {
    let positions: Vec<[f32; 3]> = mesh.positions.iter().map(|p| p.to_array()).collect();
    let indices: Vec<u32> = mesh.indices.iter().flatten().copied().collect();
    Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
        .with_inserted_indices(Indices::U32(indices))
        .with_duplicated_vertices()
        .with_computed_flat_normals()
}

fn visibility(graph: &SceneGraph, id: NodeId) -> Visibility {
    if graph.is_effectively_visible(id) {
        Visibility::Visible
    } else {
        Visibility::Hidden
    }
}

/// Mirror surface nodes into entities. Hosts without render assets (headless
/// apps) skip this entirely.
pub(crate) fn sync_surfaces(
    mut commands: Commands,
    viewport: Res<Viewport>,
    meshes: Option<ResMut<Assets<Mesh>>>,
    materials: Option<ResMut<Assets<StandardMaterial>>>,
    mut state: Local<RenderState>,
    mut drawn: Query<
        (
            &mut Transform,
            &mut Visibility,
            &mut MeshMaterial3d<StandardMaterial>,
        ),
        With<SurfaceEntity>,
    >,
) {
    let (Some(mut meshes), Some(mut materials)) = (meshes, materials) else {
        return;
    };
    let engine = &viewport.0;
    let (Some(graph), Some(generation)) = (engine.graph(), engine.generation()) else {
        if state.synced.is_some() {
            state.clear(&mut commands);
        }
        return;
    };
    // Wait for the engine to refresh cached transforms
    if graph.is_dirty() {
        return;
    }
    let key = (generation, graph.revision());
    if state.synced == Some(key) {
        return;
    }
    if state.synced.map(|(g, _)| g) != Some(generation) {
        state.clear(&mut commands);
    }
    state.synced = Some(key);

    for id in graph.surfaces() {
        let Some(surface) = graph.node(id).surface.as_ref() else {
            continue;
        };
        let transform = Transform::from_matrix(Mat4::from(graph.world(id)));
        let shown = visibility(graph, id);
        let material = state.material(&mut materials, &surface.material);

        if let Some(&entity) = state.entities.get(&id) {
            if let Ok((mut t, mut v, mut m)) = drawn.get_mut(entity) {
                t.set_if_neq(transform);
                v.set_if_neq(shown);
                if m.0 != material {
                    m.0 = material;
                }
            }
            continue;
        }

        let mesh = state.mesh(&mut meshes, &surface.shape);
        let entity = commands
            .spawn((
                SurfaceEntity { node: id },
                Mesh3d(mesh),
                MeshMaterial3d(material),
                transform,
                shown,
            ))
            .id();
        state.entities.insert(id, entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::camera::primitives::MeshAabb;

    #[test]
    fn test_z_aligned_primitives() {
        let mesh = primitive_mesh(&Shape::Cylinder {
            radius: 0.1,
            half_length: 1.0,
        });
        let aabb = mesh.compute_aabb().unwrap();
        assert!((aabb.half_extents.z - 1.0).abs() < 1e-5);
        assert!((aabb.half_extents.y - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_highlight_material_is_flat() {
        let material = standard_material(&SurfaceMaterial::highlight([1.0, 0.5, 0.0, 1.0]));
        assert!(material.unlit);
        assert_eq!(material.alpha_mode, AlphaMode::Opaque);

        let glass = standard_material(&SurfaceMaterial::from_rgba([0.2, 0.2, 0.2, 0.5]));
        assert_eq!(glass.alpha_mode, AlphaMode::Blend);
    }

    #[test]
    fn test_trimesh_normals() {
        let mesh = trimesh_mesh(&TriMesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![[0, 1, 2]],
        ));
        assert_eq!(mesh.count_vertices(), 3);
        assert!(mesh.attribute(Mesh::ATTRIBUTE_NORMAL).is_some());
    }
}
