//! Notifications emitted by the viewport

use crate::graph::NodeId;
use crate::options::Selection;
use bevy::prelude::Message;

#[derive(Message, Debug, Clone, PartialEq)]
pub enum ViewportEvent {
    /// Fired once per successful load generation
    ModelLoaded { root: NodeId, generation: u64 },
    /// A click hit a link
    Selected(Selection),
    /// A click hit empty space
    Deselected,
    /// Hovered link changed; `None` when nothing is hovered
    HoverChanged { link: Option<String> },
    /// Live value during a drag, not a history entry
    JointChanged { joint: String, value: f64 },
    /// Final value on release
    JointCommitted { joint: String, value: f64 },
    /// Hosts suspend camera orbit while true
    DraggingChanged(bool),
    /// The whole model failed to parse or build
    LoadFailed(String),
}
