//! Scene index: link name and category to surfaces
//!
//! Built once per load in a single downward traversal. Each leaf surface is
//! classified as visual or collision, stamped with its owning link, and
//! appended to that link's list. Hover and selection then look surfaces up
//! by name instead of walking the graph.

use crate::graph::{NodeId, NodeKind, SceneGraph};
use linkview_core::{GeometryCategory, KinematicModel};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// Display form of an index key: `<link>:<visual|collision>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub link: String,
    pub category: GeometryCategory,
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.link, self.category)
    }
}

#[derive(Debug, Clone, Default)]
struct LinkSurfaces {
    visual: Vec<NodeId>,
    collision: Vec<NodeId>,
}

impl LinkSurfaces {
    fn list(&self, category: GeometryCategory) -> &[NodeId] {
        match category {
            GeometryCategory::Visual => &self.visual,
            GeometryCategory::Collision => &self.collision,
        }
    }

    fn list_mut(&mut self, category: GeometryCategory) -> &mut Vec<NodeId> {
        match category {
            GeometryCategory::Visual => &mut self.visual,
            GeometryCategory::Collision => &mut self.collision,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SceneIndex {
    links: HashMap<String, LinkSurfaces>,
    /// Surfaces with no owning link; only reachable by direct highlight
    unowned: Vec<NodeId>,
    collision_groups: Vec<NodeId>,
    visual_surfaces: Vec<NodeId>,
    collision_surfaces: Vec<NodeId>,
}

impl SceneIndex {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.unowned.is_empty()
    }

    /// Surfaces of `link` in `category`, in traversal order
    pub fn surfaces(&self, link: &str, category: GeometryCategory) -> &[NodeId] {
        self.links
            .get(link)
            .map(|s| s.list(category))
            .unwrap_or(&[])
    }

    pub fn contains_link(&self, link: &str) -> bool {
        self.links.contains_key(link)
    }

    /// Non-empty keys, sorted
    pub fn keys(&self) -> Vec<IndexKey> {
        let mut keys: Vec<IndexKey> = self
            .links
            .iter()
            .flat_map(|(link, surfaces)| {
                [GeometryCategory::Visual, GeometryCategory::Collision]
                    .into_iter()
                    .filter(|c| !surfaces.list(*c).is_empty())
                    .map(|category| IndexKey {
                        link: link.clone(),
                        category,
                    })
            })
            .collect();
        keys.sort_by(|a, b| {
            a.link
                .cmp(&b.link)
                .then((a.category as u8).cmp(&(b.category as u8)))
        });
        keys
    }

    pub fn unowned(&self) -> &[NodeId] {
        &self.unowned
    }

    pub fn collision_groups(&self) -> &[NodeId] {
        &self.collision_groups
    }

    pub fn visual_surfaces(&self) -> &[NodeId] {
        &self.visual_surfaces
    }

    /// Every classified surface of a category, owned or not
    pub fn category_surfaces(&self, category: GeometryCategory) -> &[NodeId] {
        match category {
            GeometryCategory::Visual => &self.visual_surfaces,
            GeometryCategory::Collision => &self.collision_surfaces,
        }
    }

    pub fn clear(&mut self) {
        self.links.clear();
        self.unowned.clear();
        self.collision_groups.clear();
        self.visual_surfaces.clear();
        self.collision_surfaces.clear();
    }

    /// Classify every surface under `root`, record owners and build the
    /// index. Group visibility is set from the current flags so nothing
    /// flashes before the first options update.
    pub fn build(
        graph: &mut SceneGraph,
        root: NodeId,
        model: &KinematicModel,
        show_visual: bool,
        show_collision: bool,
    ) -> SceneIndex {
        let link_names: HashSet<&str> = model.links.iter().map(|l| l.name.as_str()).collect();
        let mut index = SceneIndex::default();

        // (node, inside a collision group, owning link)
        let mut stack: Vec<(NodeId, bool, Option<String>)> = vec![(root, false, None)];
        while let Some((id, in_collision, owner)) = stack.pop() {
            let node = graph.node(id);
            if node.kind.is_gizmo() {
                continue;
            }

            let owner = if node.kind == NodeKind::Link && link_names.contains(node.name.as_str()) {
                Some(node.name.clone())
            } else {
                owner
            };
            let in_collision = in_collision || node.kind == NodeKind::CollisionGroup;
            let children = node.children.clone();
            let has_surface = node.surface.is_some();
            let is_collision_group = node.kind == NodeKind::CollisionGroup;

            if is_collision_group {
                graph.set_visible(id, show_collision);
                index.collision_groups.push(id);
            }

            if has_surface {
                let category = if in_collision {
                    GeometryCategory::Collision
                } else {
                    GeometryCategory::Visual
                };
                let node = graph.node_mut(id);
                node.kind = match category {
                    GeometryCategory::Visual => NodeKind::Visual,
                    GeometryCategory::Collision => NodeKind::Collision,
                };
                node.owner = owner.clone();
                if let Some(surface) = node.surface.as_mut() {
                    surface.interactive = category == GeometryCategory::Visual;
                }
                match category {
                    GeometryCategory::Visual => {
                        graph.set_visible(id, show_visual);
                        index.visual_surfaces.push(id);
                    }
                    GeometryCategory::Collision => index.collision_surfaces.push(id),
                }

                match &owner {
                    Some(link) => index
                        .links
                        .entry(link.clone())
                        .or_default()
                        .list_mut(category)
                        .push(id),
                    None => index.unowned.push(id),
                }
            }

            for child in children.into_iter().rev() {
                stack.push((child, in_collision, owner.clone()));
            }
        }

        debug!(
            links = index.links.len(),
            unowned = index.unowned.len(),
            "Scene index built"
        );
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GizmoKind, Surface};
    use crate::material::Material;
    use crate::shape::Shape;
    use bevy::transform::components::Transform;
    use linkview_core::Link;
    use std::sync::Arc;

    fn surface() -> Surface {
        Surface::new(Shape::Sphere { radius: 0.1 }, Arc::new(Material::default()))
    }

    #[test]
    fn test_index_classifies_and_owns() {
        let mut model = KinematicModel::new("m");
        model.links.push(Link::new("base"));

        let mut graph = SceneGraph::new();
        let root = graph.root();
        let base = graph.add(root, "base", NodeKind::Link, Transform::IDENTITY);
        let visual = graph.add(base, "visual", NodeKind::Group, Transform::IDENTITY);
        let collision = graph.add(base, "collision", NodeKind::CollisionGroup, Transform::IDENTITY);
        let v = graph.add_surface(visual, "v", NodeKind::Surface, Transform::IDENTITY, surface());
        // Nested below a mesh group
        let mesh = graph.add(collision, "mesh", NodeKind::Group, Transform::IDENTITY);
        let c = graph.add_surface(mesh, "c", NodeKind::Surface, Transform::IDENTITY, surface());
        let gizmo = graph.add(base, "com", NodeKind::Gizmo(GizmoKind::CenterOfMass), Transform::IDENTITY);
        graph.add_surface(gizmo, "marker", NodeKind::Surface, Transform::IDENTITY, surface());
        // Stray surface outside any link
        let stray = graph.add_surface(root, "stray", NodeKind::Surface, Transform::IDENTITY, surface());

        let index = SceneIndex::build(&mut graph, root, &model, true, false);

        assert_eq!(index.surfaces("base", GeometryCategory::Visual), &[v]);
        assert_eq!(index.surfaces("base", GeometryCategory::Collision), &[c]);
        assert!(index.surfaces("missing", GeometryCategory::Visual).is_empty());
        assert_eq!(index.unowned(), &[stray]);

        assert_eq!(graph.node(v).kind, NodeKind::Visual);
        assert_eq!(graph.node(c).kind, NodeKind::Collision);
        assert_eq!(graph.node(c).owner.as_deref(), Some("base"));
        assert!(!graph.node(c).surface.as_ref().unwrap().interactive);
        assert!(!graph.node(collision).is_visible());
        assert_eq!(index.collision_groups(), &[collision]);
        assert_eq!(index.category_surfaces(GeometryCategory::Collision), &[c]);
        assert_eq!(index.category_surfaces(GeometryCategory::Visual), &[v, stray]);

        let keys: Vec<String> = index.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["base:visual", "base:collision"]);
    }
}
