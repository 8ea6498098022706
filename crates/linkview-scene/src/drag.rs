//! Joint manipulation by dragging
//!
//! A drag session pins the distance along the ray where the surface was
//! grabbed. Each pointer move compares the points at that distance on the
//! previous and current rays: rotational joints turn by the signed angle
//! between them around the joint axis, prismatic joints slide by their
//! displacement along it.

use crate::graph::{NodeId, SceneGraph};
use bevy::math::{Ray3d, Vec2, Vec3};
use linkview_core::{JointType, KinematicModel};

const MIN_LEVER: f32 = 1e-6;

/// State of an active drag
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub joint: String,
    pub node: NodeId,
    pub joint_type: JointType,
    /// Ray distance of the grab point
    pub distance: f32,
    pub last_ray: Ray3d,
    pub press_position: Vec2,
    /// Cursor left the click radius; deltas are applied from here on
    pub moved: bool,
}

/// Joint origin and unit axis in world space
pub fn joint_world_axis(graph: &SceneGraph, node: NodeId) -> Option<(Vec3, Vec3)> {
    let frame = graph.joint_frame(node)?;
    let world = graph.world(node);
    let axis = world.transform_vector3(frame.axis).try_normalize()?;
    Some((Vec3::from(world.translation), axis))
}

/// Incremental value change between two rays
pub fn drag_delta(
    joint_type: JointType,
    pivot: Vec3,
    axis: Vec3,
    previous: &Ray3d,
    current: &Ray3d,
    distance: f32,
) -> f64 {
    let p1 = previous.get_point(distance);
    let p2 = current.get_point(distance);

    match joint_type {
        JointType::Revolute | JointType::Continuous => {
            let project = |p: Vec3| {
                let v = p - pivot;
                v - axis * v.dot(axis)
            };
            let v1 = project(p1);
            let v2 = project(p2);
            if v1.length() < MIN_LEVER || v2.length() < MIN_LEVER {
                return 0.0;
            }
            let angle = v1.cross(v2).dot(axis).atan2(v1.dot(v2));
            angle as f64
        }
        JointType::Prismatic => (p2 - p1).dot(axis) as f64,
        _ => 0.0,
    }
}

/// Idle or dragging; at most one session at a time
#[derive(Debug, Default)]
pub struct DragController {
    session: Option<DragSession>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// Start dragging the nearest movable joint above `surface`. Returns
    /// false when there is none.
    pub fn begin(
        &mut self,
        graph: &SceneGraph,
        surface: NodeId,
        distance: f32,
        ray: Ray3d,
        press_position: Vec2,
    ) -> bool {
        let Some(node) = graph.nearest_movable_joint(surface) else {
            return false;
        };
        let Some(frame) = graph.joint_frame(node) else {
            return false;
        };
        self.session = Some(DragSession {
            joint: frame.joint.clone(),
            node,
            joint_type: frame.joint_type,
            distance,
            last_ray: ray,
            press_position,
            moved: false,
        });
        true
    }

    /// Mark the session as a real drag once the cursor leaves the click radius
    pub fn note_cursor(&mut self, position: Vec2, click_radius: f32) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.moved && position.distance(session.press_position) > click_radius {
            session.moved = true;
        }
        session.moved
    }

    /// Value for the next step of the drag, before the model's own policy.
    /// Revolute joints are clamped into their limits here; other types are
    /// left to [`KinematicModel::set_joint_value`].
    pub fn update(
        &mut self,
        graph: &SceneGraph,
        model: &KinematicModel,
        ray: Ray3d,
    ) -> Option<(String, f64)> {
        let session = self.session.as_mut()?;
        let (pivot, axis) = joint_world_axis(graph, session.node)?;
        let joint = model.joint(&session.joint)?;

        let delta = drag_delta(
            session.joint_type,
            pivot,
            axis,
            &session.last_ray,
            &ray,
            session.distance,
        );
        session.last_ray = ray;

        let mut value = joint.value + delta;
        if joint.joint_type == JointType::Revolute {
            if let Some(limit) = &joint.limit {
                value = limit.clamp(value);
            }
        }
        Some((session.joint.clone(), value))
    }

    pub fn end(&mut self) -> Option<DragSession> {
        self.session.take()
    }
}
