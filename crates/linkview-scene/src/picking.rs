//! Ray picking and hover gating
//!
//! Picking is two-phase: the ray is first tested against the cached model
//! bounds, and only on a hit are the eligible surfaces tested precisely.

use crate::graph::{NodeId, SceneGraph};
use crate::index::SceneIndex;
use crate::options::PointerState;
use crate::shape::Aabb;
use bevy::math::{Ray3d, Vec2, Vec3};
use linkview_core::GeometryCategory;

/// Nearest eligible surface under a ray
#[derive(Debug, Clone, PartialEq)]
pub struct PickHit {
    pub surface: NodeId,
    /// Owning link, if the surface has one
    pub link: Option<String>,
    pub category: GeometryCategory,
    /// World distance along the ray
    pub distance: f32,
    pub point: Vec3,
}

/// Pick the nearest visible, interactive surface of `category`.
///
/// `bounds` is the cached, expanded model box; a miss there skips the
/// per-surface tests entirely. Visibility is read from the graph's cache, so
/// the graph must have been refreshed since the last visibility change.
/// Gizmo surfaces never enter the index and need no check here.
pub fn pick(
    graph: &SceneGraph,
    index: &SceneIndex,
    bounds: Option<&Aabb>,
    ray: &Ray3d,
    category: GeometryCategory,
) -> Option<PickHit> {
    let origin = ray.origin;
    let dir = *ray.direction;
    bounds?.ray_distance(origin, dir)?;

    let mut best: Option<(NodeId, f32)> = None;
    for &id in index.category_surfaces(category) {
        let node = graph.node(id);
        let Some(surface) = node.surface.as_ref() else {
            continue;
        };
        if !surface.interactive || !graph.is_effectively_visible(id) {
            continue;
        }
        let Some(distance) = surface.shape.ray_distance(&graph.world(id), origin, dir) else {
            continue;
        };
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((id, distance));
        }
    }

    let (surface, distance) = best?;
    Some(PickHit {
        surface,
        link: graph.node(surface).owner.clone(),
        category,
        distance,
        point: ray.get_point(distance),
    })
}

/// Decides when hover should be recomputed
#[derive(Debug, Clone)]
pub struct HoverTracker {
    threshold: f32,
    lock_radius: f32,
    last_position: Option<Vec2>,
    /// Set after a click selection; hover stays frozen until the cursor
    /// leaves this point
    lock_origin: Option<Vec2>,
}

impl HoverTracker {
    pub fn new(threshold: f32, lock_radius: f32) -> Self {
        Self {
            threshold,
            lock_radius,
            last_position: None,
            lock_origin: None,
        }
    }

    /// True when this frame should run a hover pick
    pub fn should_update(&mut self, pointer: &PointerState, dragging: bool) -> bool {
        if dragging || pointer.camera_orbiting {
            return false;
        }
        let position = pointer.position;
        if let Some(origin) = self.lock_origin {
            if position.distance(origin) <= self.lock_radius {
                return false;
            }
            self.lock_origin = None;
        }
        if let Some(last) = self.last_position {
            if position.distance(last) <= self.threshold {
                return false;
            }
        }
        self.last_position = Some(position);
        true
    }

    /// Freeze hover right after a click-driven selection
    pub fn lock_at(&mut self, position: Vec2) {
        self.lock_origin = Some(position);
        self.last_position = Some(position);
    }

    pub fn is_locked(&self) -> bool {
        self.lock_origin.is_some()
    }

    pub fn reset(&mut self) {
        self.last_position = None;
        self.lock_origin = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GizmoKind, NodeKind, Surface};
    use crate::material::Material;
    use crate::shape::Shape;
    use bevy::math::Dir3;
    use bevy::transform::components::Transform;
    use linkview_core::{KinematicModel, Link};
    use std::sync::Arc;

    fn down_ray(x: f32, y: f32) -> Ray3d {
        Ray3d {
            origin: Vec3::new(x, y, 10.0),
            direction: Dir3::NEG_Z,
        }
    }

    fn scene() -> (SceneGraph, SceneIndex, Aabb) {
        let mut model = KinematicModel::new("m");
        model.links.push(Link::new("low"));
        model.links.push(Link::new("high"));

        let material = Arc::new(Material::default());
        let cube = || Surface::new(Shape::cuboid(Vec3::splat(1.0)), material.clone());
        let mut graph = SceneGraph::new();
        let root = graph.root();
        for (name, z) in [("low", 0.0), ("high", 2.0)] {
            let link = graph.add(root, name, NodeKind::Link, Transform::IDENTITY);
            let group = graph.add(link, "visual", NodeKind::Group, Transform::IDENTITY);
            graph.add_surface(group, name, NodeKind::Surface, Transform::from_xyz(0.0, 0.0, z), cube());
            let collision = graph.add(link, "collision", NodeKind::CollisionGroup, Transform::IDENTITY);
            graph.add_surface(collision, name, NodeKind::Surface, Transform::from_xyz(0.0, 0.0, z), cube());
        }
        // Gizmo above everything
        let gizmo = graph.add(root, "axes", NodeKind::Gizmo(GizmoKind::OriginFrame), Transform::IDENTITY);
        graph.add_surface(gizmo, "x", NodeKind::Surface, Transform::from_xyz(0.0, 0.0, 5.0), cube());

        let index = SceneIndex::build(&mut graph, root, &model, true, true);
        graph.refresh_world();
        let bounds = graph.world_bounds().unwrap().expand(0.05);
        (graph, index, bounds)
    }

    #[test]
    fn test_nearest_eligible_hit() {
        let (graph, index, bounds) = scene();
        let hit = pick(&graph, &index, Some(&bounds), &down_ray(0.0, 0.0), GeometryCategory::Visual).unwrap();
        assert_eq!(hit.link.as_deref(), Some("high"));
        assert!((hit.distance - 7.5).abs() < 1e-4);
        assert!((hit.point.z - 2.5).abs() < 1e-4);
    }

    #[test]
    fn test_bounds_pretest_and_misses() {
        let (graph, index, bounds) = scene();
        assert!(pick(&graph, &index, Some(&bounds), &down_ray(3.0, 0.0), GeometryCategory::Visual).is_none());
        assert!(pick(&graph, &index, None, &down_ray(0.0, 0.0), GeometryCategory::Visual).is_none());
    }

    #[test]
    fn test_collision_surfaces_need_interactive_flag() {
        let (mut graph, index, bounds) = scene();
        let ray = down_ray(0.0, 0.0);
        assert!(pick(&graph, &index, Some(&bounds), &ray, GeometryCategory::Collision).is_none());

        for &id in index.category_surfaces(GeometryCategory::Collision) {
            graph.node_mut(id).surface.as_mut().unwrap().interactive = true;
        }
        let hit = pick(&graph, &index, Some(&bounds), &ray, GeometryCategory::Collision).unwrap();
        assert_eq!(hit.category, GeometryCategory::Collision);
        assert_eq!(hit.link.as_deref(), Some("high"));
    }

    #[test]
    fn test_hidden_surfaces_are_skipped() {
        let (mut graph, index, bounds) = scene();
        let high = graph.find_link("high").unwrap();
        graph.set_visible(high, false);
        graph.refresh_world();
        let hit = pick(&graph, &index, Some(&bounds), &down_ray(0.0, 0.0), GeometryCategory::Visual).unwrap();
        assert_eq!(hit.link.as_deref(), Some("low"));
    }

    #[test]
    fn test_hover_gating() {
        let mut tracker = HoverTracker::new(2.0, 3.0);
        let at = |x: f32| PointerState::new(Vec2::new(x, 0.0), None);

        assert!(tracker.should_update(&at(0.0), false));
        assert!(!tracker.should_update(&at(1.0), false));
        assert!(tracker.should_update(&at(5.0), false));
        assert!(!tracker.should_update(&at(20.0), true));

        let mut orbiting = at(40.0);
        orbiting.camera_orbiting = true;
        assert!(!tracker.should_update(&orbiting, false));

        tracker.lock_at(Vec2::new(50.0, 0.0));
        assert!(tracker.is_locked());
        assert!(!tracker.should_update(&at(52.5), false));
        assert!(tracker.should_update(&at(54.0), false));
        assert!(!tracker.is_locked());
    }
}
