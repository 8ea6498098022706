//! Arena scene graph
//!
//! Nodes live in a flat `Vec` addressed by [`NodeId`]. A node is always
//! appended after its parent, so a single forward pass over the arena visits
//! parents before children. World transforms are cached and recomputed in that
//! pass only when a local transform changed. Effective visibility is cached
//! alongside and refreshed in the same pass when a visibility flag changed.

use crate::material::Material;
use crate::shape::{Aabb, Shape};
use bevy::math::{Affine3A, Quat, Vec3};
use bevy::transform::components::Transform;
use linkview_core::{GeometryCategory, JointType};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Helper geometry kinds. Gizmos never take part in picking or highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GizmoKind {
    InertiaBox,
    CenterOfMass,
    OriginFrame,
    JointAxis,
}

/// Articulation data carried by a joint node
#[derive(Debug, Clone, PartialEq)]
pub struct JointFrame {
    pub joint: String,
    pub joint_type: JointType,
    /// Unit axis in the joint frame
    pub axis: Vec3,
    /// Fixed offset from the parent link
    pub origin: Transform,
    pub value: f64,
}

impl JointFrame {
    /// Local transform for the current value: origin followed by the motion
    pub fn local_transform(&self) -> Transform {
        let value = self.value as f32;
        let motion = match self.joint_type {
            JointType::Revolute | JointType::Continuous => {
                Transform::from_rotation(Quat::from_axis_angle(self.axis, value))
            }
            JointType::Prismatic => Transform::from_translation(self.axis * value),
            _ => Transform::IDENTITY,
        };
        self.origin * motion
    }
}

/// What a node is. Assigned at build time and matched explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Link,
    Joint(JointFrame),
    Group,
    CollisionGroup,
    /// Leaf surface not yet classified by the index builder
    Surface,
    Visual,
    Collision,
    Gizmo(GizmoKind),
}

impl NodeKind {
    pub fn is_gizmo(&self) -> bool {
        matches!(self, NodeKind::Gizmo(_))
    }

    pub fn category(&self) -> Option<GeometryCategory> {
        match self {
            NodeKind::Visual => Some(GeometryCategory::Visual),
            NodeKind::Collision => Some(GeometryCategory::Collision),
            _ => None,
        }
    }
}

/// Renderable payload of a leaf node
#[derive(Debug, Clone)]
pub struct Surface {
    pub shape: Shape,
    pub material: Arc<Material>,
    /// Eligible for picking in the current highlight mode
    pub interactive: bool,
    /// Mesh reference this surface stands in for, when it is a placeholder
    pub placeholder: Option<String>,
}

impl Surface {
    pub fn new(shape: Shape, material: Arc<Material>) -> Self {
        Self {
            shape,
            material,
            interactive: true,
            placeholder: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub local: Transform,
    /// Own visibility flag; written through [`SceneGraph::set_visible`]
    visible: bool,
    pub surface: Option<Surface>,
    /// Owning link, stored on leaves by the index builder
    pub owner: Option<String>,
}

impl SceneNode {
    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
    world: Vec<Affine3A>,
    dirty: bool,
    /// Visible through every ancestor, valid after a refresh
    shown: Vec<bool>,
    visibility_dirty: bool,
    /// Node sits in a gizmo subtree; fixed when the node is added
    in_gizmo: Vec<bool>,
    joints: HashMap<String, NodeId>,
    links: HashMap<String, NodeId>,
    /// Bumped on every mutation so renderers can skip unchanged frames
    revision: u64,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let root = SceneNode {
            name: String::new(),
            kind: NodeKind::Root,
            parent: None,
            children: Vec::new(),
            local: Transform::IDENTITY,
            visible: true,
            surface: None,
            owner: None,
        };
        Self {
            nodes: vec![root],
            world: vec![Affine3A::IDENTITY],
            dirty: false,
            shown: vec![true],
            visibility_dirty: false,
            in_gizmo: vec![false],
            joints: HashMap::new(),
            links: HashMap::new(),
            revision: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn node(&self, id: NodeId) -> &SceneNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SceneNode {
        self.revision += 1;
        &mut self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn add(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        kind: NodeKind,
        local: Transform,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let name = name.into();
        match &kind {
            NodeKind::Joint(frame) => {
                self.joints.entry(frame.joint.clone()).or_insert(id);
            }
            NodeKind::Link => {
                self.links.entry(name.clone()).or_insert(id);
            }
            _ => {}
        }
        self.in_gizmo.push(self.in_gizmo[parent.0] || kind.is_gizmo());
        self.shown.push(self.shown[parent.0]);
        self.nodes.push(SceneNode {
            name,
            kind,
            parent: Some(parent),
            children: Vec::new(),
            local,
            visible: true,
            surface: None,
            owner: None,
        });
        self.world.push(Affine3A::IDENTITY);
        self.nodes[parent.0].children.push(id);
        self.dirty = true;
        self.revision += 1;
        id
    }

    pub fn add_surface(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        kind: NodeKind,
        local: Transform,
        surface: Surface,
    ) -> NodeId {
        let id = self.add(parent, name, kind, local);
        self.nodes[id.0].surface = Some(surface);
        id
    }

    /// Change a node's own visibility flag
    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        let node = &mut self.nodes[id.0];
        if node.visible != visible {
            node.visible = visible;
            self.visibility_dirty = true;
            self.revision += 1;
        }
    }

    pub fn set_local(&mut self, id: NodeId, local: Transform) {
        self.nodes[id.0].local = local;
        self.dirty = true;
        self.revision += 1;
    }

    /// Move a joint node to a new value. Returns false for non-joint nodes.
    pub fn set_joint_value(&mut self, id: NodeId, value: f64) -> bool {
        let node = &mut self.nodes[id.0];
        let NodeKind::Joint(frame) = &mut node.kind else {
            return false;
        };
        frame.value = value;
        node.local = frame.local_transform();
        self.dirty = true;
        self.revision += 1;
        true
    }

    pub fn joint_frame(&self, id: NodeId) -> Option<&JointFrame> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Joint(frame) => Some(frame),
            _ => None,
        }
    }

    /// Recompute cached world transforms and effective visibility if
    /// anything moved or was shown or hidden
    pub fn refresh_world(&mut self) {
        if !self.dirty && !self.visibility_dirty {
            return;
        }
        for i in 0..self.nodes.len() {
            let node = &self.nodes[i];
            match node.parent {
                Some(parent) => {
                    if self.dirty {
                        self.world[i] = self.world[parent.0] * node.local.compute_affine();
                    }
                    self.shown[i] = self.shown[parent.0] && node.visible;
                }
                None => {
                    if self.dirty {
                        self.world[i] = node.local.compute_affine();
                    }
                    self.shown[i] = node.visible;
                }
            }
        }
        self.dirty = false;
        self.visibility_dirty = false;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty || self.visibility_dirty
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Cached world transform, valid after [`refresh_world`](Self::refresh_world)
    pub fn world(&self, id: NodeId) -> Affine3A {
        self.world[id.0]
    }

    /// Node and its ancestors, nearest first
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |current| self.nodes[current.0].parent)
    }

    /// Node and all of its descendants, depth first
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current.0].children.iter().rev().copied());
        }
        out
    }

    /// Visible itself and through every ancestor, as of the last
    /// [`refresh_world`](Self::refresh_world)
    pub fn is_effectively_visible(&self, id: NodeId) -> bool {
        self.shown[id.0]
    }

    /// True when the node or any ancestor is a gizmo
    pub fn under_gizmo(&self, id: NodeId) -> bool {
        self.in_gizmo[id.0]
    }

    /// Nearest enclosing joint that can be driven by a scalar
    pub fn nearest_movable_joint(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).find(|a| {
            matches!(&self.nodes[a.0].kind, NodeKind::Joint(frame) if frame.joint_type.is_movable())
        })
    }

    pub fn find_joint(&self, name: &str) -> Option<NodeId> {
        self.joints.get(name).copied()
    }

    pub fn find_link(&self, name: &str) -> Option<NodeId> {
        self.links.get(name).copied()
    }

    /// Ids of every node carrying a surface
    pub fn surfaces(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids().filter(|id| self.nodes[id.0].surface.is_some())
    }

    /// World bounds of every visible, non-gizmo surface, as of the last
    /// refresh
    pub fn world_bounds(&self) -> Option<Aabb> {
        self.surfaces()
            .filter(|id| !self.in_gizmo[id.0] && self.shown[id.0])
            .filter_map(|id| {
                let surface = self.nodes[id.0].surface.as_ref()?;
                Some(surface.shape.local_bounds().transformed(&self.world[id.0]))
            })
            .reduce(|a, b| a.union(&b))
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        Vec3::from(self.world[id.0].translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revolute(axis: Vec3) -> NodeKind {
        NodeKind::Joint(JointFrame {
            joint: "j".to_string(),
            joint_type: JointType::Revolute,
            axis,
            origin: Transform::from_xyz(0.0, 0.0, 1.0),
            value: 0.0,
        })
    }

    #[test]
    fn test_world_transforms_follow_joint_value() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let base = graph.add(root, "base", NodeKind::Link, Transform::IDENTITY);
        let joint = graph.add(base, "j", revolute(Vec3::Z), Transform::from_xyz(0.0, 0.0, 1.0));
        let arm = graph.add(joint, "arm", NodeKind::Link, Transform::IDENTITY);
        let tip = graph.add(arm, "tip", NodeKind::Group, Transform::from_xyz(1.0, 0.0, 0.0));

        graph.refresh_world();
        assert!((graph.world_position(tip) - Vec3::new(1.0, 0.0, 1.0)).length() < 1e-5);

        assert!(graph.set_joint_value(joint, std::f64::consts::FRAC_PI_2));
        assert!(graph.is_dirty());
        graph.refresh_world();
        assert!((graph.world_position(tip) - Vec3::new(0.0, 1.0, 1.0)).length() < 1e-5);

        assert!(!graph.set_joint_value(arm, 1.0));
    }

    #[test]
    fn test_ancestry_queries() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let base = graph.add(root, "base", NodeKind::Link, Transform::IDENTITY);
        let joint = graph.add(base, "j", revolute(Vec3::X), Transform::IDENTITY);
        let arm = graph.add(joint, "arm", NodeKind::Link, Transform::IDENTITY);
        let gizmo = graph.add(arm, "com", NodeKind::Gizmo(GizmoKind::CenterOfMass), Transform::IDENTITY);
        let leaf = graph.add(gizmo, "marker", NodeKind::Surface, Transform::IDENTITY);

        assert_eq!(graph.ancestors(leaf).count(), 6);
        assert!(graph.under_gizmo(leaf));
        assert!(!graph.under_gizmo(arm));
        assert_eq!(graph.nearest_movable_joint(leaf), Some(joint));
        assert_eq!(graph.nearest_movable_joint(base), None);
        assert_eq!(graph.find_joint("j"), Some(joint));
        assert_eq!(graph.find_link("arm"), Some(arm));
        assert_eq!(graph.descendants(joint), vec![joint, arm, gizmo, leaf]);

        graph.refresh_world();
        assert!(graph.is_effectively_visible(leaf));
        graph.set_visible(arm, false);
        assert!(graph.is_dirty());
        graph.refresh_world();
        assert!(!graph.is_effectively_visible(leaf));
        assert!(graph.is_effectively_visible(joint));

        graph.set_visible(arm, true);
        graph.refresh_world();
        assert!(graph.is_effectively_visible(leaf));
    }

    #[test]
    fn test_visibility_refresh_keeps_transforms() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let base = graph.add(root, "base", NodeKind::Link, Transform::from_xyz(1.0, 0.0, 0.0));
        let group = graph.add(base, "visual", NodeKind::Group, Transform::from_xyz(0.0, 2.0, 0.0));
        graph.refresh_world();
        assert!(!graph.is_dirty());

        let before = graph.revision();
        graph.set_visible(base, false);
        graph.set_visible(base, false);
        assert_eq!(graph.revision(), before + 1);
        graph.refresh_world();
        assert!(!graph.is_effectively_visible(group));
        assert!((graph.world_position(group) - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_name_lookups_keep_first_node() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let first = graph.add(root, "base", NodeKind::Link, Transform::IDENTITY);
        graph.add(first, "base", NodeKind::Group, Transform::IDENTITY);
        let joint = graph.add(first, "hinge", revolute(Vec3::Z), Transform::IDENTITY);
        assert_eq!(graph.find_link("base"), Some(first));
        assert_eq!(graph.find_joint("j"), Some(joint));
        assert_eq!(graph.find_joint("base"), None);
        assert_eq!(graph.find_link("hinge"), None);
    }
}
