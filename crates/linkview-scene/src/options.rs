//! View options, selection state and pointer input

use bevy::math::{Ray3d, Vec2};
use linkview_core::GeometryCategory;
use serde::{Deserialize, Serialize};

/// Which geometry list hover and click operate on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightMode {
    #[default]
    Link,
    Collision,
}

impl HighlightMode {
    pub fn category(self) -> GeometryCategory {
        match self {
            HighlightMode::Link => GeometryCategory::Visual,
            HighlightMode::Collision => GeometryCategory::Collision,
        }
    }
}

/// Exclusive editing tool. Only `Select` allows clicking and dragging joints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolMode {
    #[default]
    Select,
    Translate,
    Rotate,
    Face,
    Measure,
}

/// Display toggles driven by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewOptions {
    #[serde(default = "default_true")]
    pub show_visual: bool,
    #[serde(default)]
    pub show_collision: bool,
    #[serde(default)]
    pub show_inertia: bool,
    #[serde(default)]
    pub show_center_of_mass: bool,
    #[serde(default)]
    pub show_origin_frames: bool,
    #[serde(default)]
    pub show_joint_axes: bool,
    #[serde(default)]
    pub highlight_mode: HighlightMode,
    #[serde(default)]
    pub tool_mode: ToolMode,
}

fn default_true() -> bool {
    true
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            show_visual: true,
            show_collision: false,
            show_inertia: false,
            show_center_of_mass: false,
            show_origin_frames: false,
            show_joint_axes: false,
            highlight_mode: HighlightMode::default(),
            tool_mode: ToolMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionKind {
    Link,
    Joint,
}

/// Explicit selection or externally supplied hover target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub kind: SelectionKind,
    pub id: String,
    #[serde(default)]
    pub sub_type: Option<GeometryCategory>,
}

impl Selection {
    pub fn link(id: impl Into<String>, sub_type: Option<GeometryCategory>) -> Self {
        Self {
            kind: SelectionKind::Link,
            id: id.into(),
            sub_type,
        }
    }

    pub fn joint(id: impl Into<String>) -> Self {
        Self {
            kind: SelectionKind::Joint,
            id: id.into(),
            sub_type: None,
        }
    }
}

/// One frame of pointer input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    /// Cursor position in logical pixels
    pub position: Vec2,
    /// World ray under the cursor, if the camera could produce one
    pub ray: Option<Ray3d>,
    /// Host camera controller is currently orbiting
    pub camera_orbiting: bool,
}

impl PointerState {
    pub fn new(position: Vec2, ray: Option<Ray3d>) -> Self {
        Self {
            position,
            ray,
            camera_orbiting: false,
        }
    }
}
