//! Helper overlays: inertia boxes, center of mass markers, link frames and
//! joint axes
//!
//! Overlay nodes are gizmos, built the first time their toggle is enabled
//! and only shown or hidden after that.

use crate::builder::pose_to_transform;
use crate::config::{InertiaConfig, OverlayConfig};
use crate::graph::{GizmoKind, NodeId, NodeKind, SceneGraph, Surface};
use crate::inertia::compute_box;
use crate::material::SharedMaterials;
use crate::options::ViewOptions;
use crate::shape::Shape;
use bevy::math::{Quat, Vec3};
use bevy::transform::components::Transform;
use linkview_core::KinematicModel;
use std::collections::HashMap;
use tracing::debug;

const KINDS: [GizmoKind; 4] = [
    GizmoKind::InertiaBox,
    GizmoKind::CenterOfMass,
    GizmoKind::OriginFrame,
    GizmoKind::JointAxis,
];

fn enabled(options: &ViewOptions, kind: GizmoKind) -> bool {
    match kind {
        GizmoKind::InertiaBox => options.show_inertia,
        GizmoKind::CenterOfMass => options.show_center_of_mass,
        GizmoKind::OriginFrame => options.show_origin_frames,
        GizmoKind::JointAxis => options.show_joint_axes,
    }
}

/// Gizmo roots per overlay kind; a kind is absent until first built
#[derive(Debug, Default)]
pub struct Overlays {
    built: HashMap<GizmoKind, Vec<NodeId>>,
}

/// Inputs needed to build overlay geometry
pub struct OverlayContext<'a> {
    pub model: &'a KinematicModel,
    pub shared: &'a SharedMaterials,
    pub overlay: &'a OverlayConfig,
    pub inertia: &'a InertiaConfig,
}

impl Overlays {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_built(&self, kind: GizmoKind) -> bool {
        self.built.contains_key(&kind)
    }

    /// Gizmo roots of a kind, empty until built
    pub fn roots(&self, kind: GizmoKind) -> &[NodeId] {
        self.built.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Build newly enabled overlays and apply every toggle
    pub fn sync(&mut self, graph: &mut SceneGraph, options: &ViewOptions, ctx: &OverlayContext<'_>) {
        for kind in KINDS {
            let show = enabled(options, kind);
            if show && !self.is_built(kind) {
                let roots = match kind {
                    GizmoKind::InertiaBox => build_inertia_boxes(graph, ctx),
                    GizmoKind::CenterOfMass => build_com_markers(graph, ctx),
                    GizmoKind::OriginFrame => build_origin_frames(graph, ctx),
                    GizmoKind::JointAxis => build_joint_axes(graph, ctx),
                };
                debug!(?kind, count = roots.len(), "Built overlay");
                self.built.insert(kind, roots);
            }
            for &root in self.roots(kind) {
                graph.set_visible(root, show);
            }
        }
    }
}

fn link_nodes(graph: &SceneGraph) -> HashMap<String, NodeId> {
    graph
        .ids()
        .filter(|id| graph.node(*id).kind == NodeKind::Link)
        .map(|id| (graph.node(id).name.clone(), id))
        .collect()
}

fn gizmo_surface(
    graph: &mut SceneGraph,
    parent: NodeId,
    name: &str,
    local: Transform,
    surface: Surface,
) -> NodeId {
    let mut surface = surface;
    surface.interactive = false;
    graph.add_surface(parent, name, NodeKind::Surface, local, surface)
}

fn build_inertia_boxes(graph: &mut SceneGraph, ctx: &OverlayContext<'_>) -> Vec<NodeId> {
    let links = link_nodes(graph);
    let mut roots = Vec::new();
    for link in &ctx.model.links {
        let (Some(inertial), Some(&node)) = (&link.inertial, links.get(&link.name)) else {
            continue;
        };
        let Some(inertia_box) = compute_box(&inertial.inertia, inertial.mass, ctx.inertia) else {
            debug!(link = %link.name, "Inertial data implausible, no inertia box");
            continue;
        };
        let origin = pose_to_transform(&inertial.origin);
        let rotation = inertia_box.rotation.as_quat();
        let root = graph.add(
            node,
            format!("{}_inertia", link.name),
            NodeKind::Gizmo(GizmoKind::InertiaBox),
            origin.with_rotation(origin.rotation * rotation),
        );
        gizmo_surface(
            graph,
            root,
            "box",
            Transform::IDENTITY,
            Surface::new(
                Shape::cuboid(inertia_box.size().as_vec3()),
                ctx.shared.inertia.clone(),
            ),
        );
        roots.push(root);
    }
    roots
}

fn build_com_markers(graph: &mut SceneGraph, ctx: &OverlayContext<'_>) -> Vec<NodeId> {
    let links = link_nodes(graph);
    let mut roots = Vec::new();
    for link in &ctx.model.links {
        let (Some(inertial), Some(&node)) = (&link.inertial, links.get(&link.name)) else {
            continue;
        };
        if inertial.mass <= 0.0 {
            continue;
        }
        let [x, y, z] = inertial.origin.xyz;
        let root = graph.add(
            node,
            format!("{}_com", link.name),
            NodeKind::Gizmo(GizmoKind::CenterOfMass),
            Transform::from_xyz(x as f32, y as f32, z as f32),
        );
        gizmo_surface(
            graph,
            root,
            "marker",
            Transform::IDENTITY,
            Surface::new(
                Shape::Sphere {
                    radius: ctx.overlay.com_radius,
                },
                ctx.shared.center_of_mass.clone(),
            ),
        );
        roots.push(root);
    }
    roots
}

fn build_origin_frames(graph: &mut SceneGraph, ctx: &OverlayContext<'_>) -> Vec<NodeId> {
    let length = ctx.overlay.axis_length;
    let thickness = ctx.overlay.axis_thickness;
    let mut links: Vec<(String, NodeId)> = link_nodes(graph).into_iter().collect();
    links.sort_by_key(|(_, id)| *id);

    let mut roots = Vec::new();
    for (name, node) in links {
        let root = graph.add(
            node,
            format!("{}_frame", name),
            NodeKind::Gizmo(GizmoKind::OriginFrame),
            Transform::IDENTITY,
        );
        let axes = [
            (Vec3::X, &ctx.shared.axis_x, "x"),
            (Vec3::Y, &ctx.shared.axis_y, "y"),
            (Vec3::Z, &ctx.shared.axis_z, "z"),
        ];
        for (axis, material, label) in axes {
            let size = Vec3::splat(thickness) + axis * (length - thickness);
            gizmo_surface(
                graph,
                root,
                label,
                Transform::from_translation(axis * length * 0.5),
                Surface::new(Shape::cuboid(size), (*material).clone()),
            );
        }
        roots.push(root);
    }
    roots
}

fn build_joint_axes(graph: &mut SceneGraph, ctx: &OverlayContext<'_>) -> Vec<NodeId> {
    let length = ctx.overlay.axis_length * 1.5;
    let joints: Vec<(NodeId, String, Vec3)> = graph
        .ids()
        .filter_map(|id| {
            let frame = graph.joint_frame(id)?;
            frame
                .joint_type
                .is_movable()
                .then(|| (id, frame.joint.clone(), frame.axis))
        })
        .collect();

    let mut roots = Vec::new();
    for (node, name, axis) in joints {
        let root = graph.add(
            node,
            format!("{}_axis", name),
            NodeKind::Gizmo(GizmoKind::JointAxis),
            Transform::IDENTITY,
        );
        // Cylinders run along local Z
        let local = Transform::from_translation(axis * length * 0.5)
            .with_rotation(Quat::from_rotation_arc(Vec3::Z, axis));
        gizmo_surface(
            graph,
            root,
            "arrow",
            local,
            Surface::new(
                Shape::Cylinder {
                    radius: ctx.overlay.axis_thickness,
                    half_length: length * 0.5,
                },
                ctx.shared.axis_z.clone(),
            ),
        );
        roots.push(root);
    }
    roots
}
