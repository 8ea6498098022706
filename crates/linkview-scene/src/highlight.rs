//! Highlight tracking
//!
//! A surface is in the [`HighlightSet`] exactly while it shows something
//! other than its authored material. The stored `Arc` is the authored one,
//! so reverting puts back the very same allocation.

use crate::graph::{NodeId, SceneGraph};
use crate::index::SceneIndex;
use crate::material::Material;
use linkview_core::GeometryCategory;
use std::collections::HashMap;
use std::sync::Arc;

/// What a hover or selection paints
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HighlightTarget {
    /// Every indexed surface of a link in one category
    Link {
        name: String,
        category: GeometryCategory,
    },
    /// A single surface with no owning link
    Surface(NodeId),
}

impl HighlightTarget {
    pub fn link(name: impl Into<String>, category: GeometryCategory) -> Self {
        HighlightTarget::Link {
            name: name.into(),
            category,
        }
    }

    pub fn link_name(&self) -> Option<&str> {
        match self {
            HighlightTarget::Link { name, .. } => Some(name),
            HighlightTarget::Surface(_) => None,
        }
    }

    pub fn surfaces<'a>(&'a self, index: &'a SceneIndex) -> &'a [NodeId] {
        match self {
            HighlightTarget::Link { name, category } => index.surfaces(name, *category),
            HighlightTarget::Surface(id) => std::slice::from_ref(id),
        }
    }
}

#[derive(Debug, Default)]
pub struct HighlightSet {
    originals: HashMap<NodeId, Arc<Material>>,
}

impl HighlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.originals.contains_key(&id)
    }

    /// Authored material of a highlighted surface
    pub fn original(&self, id: NodeId) -> Option<&Arc<Material>> {
        self.originals.get(&id)
    }

    /// Show `material` on a surface, remembering the authored one the first
    /// time. Returns false for nodes without a surface.
    pub fn apply(&mut self, graph: &mut SceneGraph, id: NodeId, material: &Arc<Material>) -> bool {
        let Some(surface) = graph.node_mut(id).surface.as_mut() else {
            return false;
        };
        let restoring = self
            .originals
            .get(&id)
            .is_some_and(|original| Arc::ptr_eq(original, material));
        if restoring {
            // Highlighting back to the authored look is a revert
            if let Some(original) = self.originals.remove(&id) {
                surface.material = original;
            }
        } else if self.originals.contains_key(&id) {
            surface.material = material.clone();
        } else if !Arc::ptr_eq(&surface.material, material) {
            let original = std::mem::replace(&mut surface.material, material.clone());
            self.originals.insert(id, original);
        }
        true
    }

    /// Restore the authored material. Returns false if the surface was not
    /// highlighted.
    pub fn revert(&mut self, graph: &mut SceneGraph, id: NodeId) -> bool {
        let Some(original) = self.originals.remove(&id) else {
            return false;
        };
        if let Some(surface) = graph.node_mut(id).surface.as_mut() {
            surface.material = original;
        }
        true
    }

    pub fn revert_all(&mut self, graph: &mut SceneGraph) {
        for (id, original) in self.originals.drain() {
            if let Some(surface) = graph.node_mut(id).surface.as_mut() {
                surface.material = original;
            }
        }
    }

    /// Paint every surface of a target. Returns how many surfaces changed.
    pub fn apply_target(
        &mut self,
        graph: &mut SceneGraph,
        index: &SceneIndex,
        target: &HighlightTarget,
        material: &Arc<Material>,
    ) -> usize {
        target
            .surfaces(index)
            .iter()
            .filter(|id| self.apply(graph, **id, material))
            .count()
    }

    pub fn revert_target(
        &mut self,
        graph: &mut SceneGraph,
        index: &SceneIndex,
        target: &HighlightTarget,
    ) -> usize {
        target
            .surfaces(index)
            .iter()
            .filter(|id| self.revert(graph, **id))
            .count()
    }

    /// Forget every entry without touching the graph, used when the graph
    /// itself is discarded
    pub fn clear(&mut self) {
        self.originals.clear();
    }
}
