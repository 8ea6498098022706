//! Linkview Scene - Interactive robot viewport engine
//!
//! This crate turns a parsed kinematic model into an interactive scene:
//! - Arena scene graph with primitive and mesh surfaces
//! - Scene index from link name and category to surfaces
//! - Ray picking, hover and selection highlighting
//! - Joint manipulation by dragging
//! - Inertia box, center of mass, frame and axis overlays
//! - Load generations with cancellation of superseded loads
//! - A bevy plugin hosting the engine and drawing its surfaces

pub mod builder;
pub mod config;
pub mod drag;
pub mod events;
pub mod graph;
pub mod highlight;
pub mod index;
pub mod inertia;
pub mod lifecycle;
pub mod loader;
pub mod material;
pub mod options;
pub mod overlays;
pub mod picking;
pub mod plugin;
pub mod render;
pub mod shape;
pub mod viewport;

// Re-export commonly used types
pub use config::ViewportConfig;
pub use events::ViewportEvent;
pub use graph::{NodeId, NodeKind, SceneGraph};
pub use highlight::{HighlightSet, HighlightTarget};
pub use index::{IndexKey, SceneIndex};
pub use inertia::{compute_box, InertiaBox};
pub use lifecycle::{LoadGeneration, LoadJob, LoadOutcome, LoadStatus};
pub use loader::{GeometryError, GeometryLoader, LoaderRegistry, RenderableSubtree};
pub use material::{Material, SharedMaterials};
pub use options::{HighlightMode, PointerState, Selection, SelectionKind, ToolMode, ViewOptions};
pub use picking::PickHit;
pub use plugin::{
    CameraOrbiting, JointDragActive, LinkviewPlugin, LinkviewSystems, LoadModelRequest, Viewport,
    ViewportCamera,
};
pub use render::SurfaceEntity;
pub use viewport::{RobotViewport, ViewportError};
