//! Load generations and cancellation
//!
//! Every load attempt gets a [`LoadGeneration`]. Starting a new load or
//! tearing the viewport down aborts the previous token; an aborted
//! generation's result is disposed without touching the live scene.

use crate::builder::BuiltScene;
use crate::graph::SceneGraph;
use crate::material::SharedMaterials;
use futures_util::future::BoxFuture;
use linkview_core::ModelError;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Load generation {0} was aborted")]
    Aborted(u64),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Cancellation token for one load attempt
#[derive(Debug, Clone)]
pub struct LoadGeneration {
    id: u64,
    aborted: Arc<AtomicBool>,
}

impl LoadGeneration {
    fn new(id: u64) -> Self {
        Self {
            id,
            aborted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mark this generation aborted. Returns true only for the call that
    /// actually flipped the flag.
    pub fn abort(&self) -> bool {
        !self.aborted.swap(true, Ordering::AcqRel)
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Bail out of a pending step once aborted
    pub fn check(&self) -> Result<(), LoadError> {
        if self.is_aborted() {
            Err(LoadError::Aborted(self.id))
        } else {
            Ok(())
        }
    }
}

/// Hands out generations and remembers which one is live
#[derive(Debug, Default)]
pub struct LoadManager {
    next_id: u64,
    current: Option<LoadGeneration>,
    completed: bool,
}

impl LoadManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort whatever is in flight and start a new generation
    pub fn begin(&mut self) -> LoadGeneration {
        self.abort_current();
        self.next_id += 1;
        let generation = LoadGeneration::new(self.next_id);
        self.current = Some(generation.clone());
        self.completed = false;
        generation
    }

    pub fn abort_current(&mut self) {
        if let Some(current) = &self.current {
            if current.abort() {
                debug!(generation = current.id(), "Aborted load generation");
            }
        }
    }

    pub fn current(&self) -> Option<&LoadGeneration> {
        self.current.as_ref()
    }

    /// True while `generation` is the live, unaborted, uncompleted one
    pub fn accepts(&self, generation: &LoadGeneration) -> bool {
        !self.completed
            && !generation.is_aborted()
            && self.current.as_ref().is_some_and(|c| c.id == generation.id)
    }

    /// Mark the live generation as delivered; later outcomes for it are ignored
    pub fn complete(&mut self, generation: &LoadGeneration) -> bool {
        if !self.accepts(generation) {
            return false;
        }
        self.completed = true;
        true
    }
}

/// Result of running a load job
pub struct LoadOutcome {
    pub generation: LoadGeneration,
    pub result: Result<BuiltScene, LoadError>,
}

/// Pending load for one generation. Drive [`run`](Self::run) on any executor
/// and hand the outcome back to the viewport.
pub struct LoadJob {
    pub generation: LoadGeneration,
    pub(crate) future: BoxFuture<'static, Result<BuiltScene, LoadError>>,
}

impl LoadJob {
    pub fn generation(&self) -> &LoadGeneration {
        &self.generation
    }

    pub async fn run(self) -> LoadOutcome {
        let result = self.future.await;
        LoadOutcome {
            generation: self.generation,
            result,
        }
    }
}

/// What a finished outcome did to the viewport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Ready,
    /// Stale or aborted; nothing was applied
    Discarded,
    Failed(String),
}

/// Resources released when a scene is dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisposeReport {
    pub surfaces: usize,
    pub materials: usize,
    pub textures: usize,
}

/// Release a scene's surfaces, materials and textures. Shared singleton
/// materials are left alone since other live surfaces still use them.
pub fn dispose_scene(graph: SceneGraph, shared: &SharedMaterials) -> DisposeReport {
    let mut materials = HashSet::new();
    let mut textures = HashSet::new();
    let mut report = DisposeReport::default();

    for id in graph.ids() {
        let Some(surface) = graph.node(id).surface.as_ref() else {
            continue;
        };
        report.surfaces += 1;
        if shared.is_shared(&surface.material) {
            continue;
        }
        materials.insert(Arc::as_ptr(&surface.material) as usize);
        if let Some(texture) = &surface.material.texture {
            textures.insert(Arc::as_ptr(texture) as usize);
        }
    }

    report.materials = materials.len();
    report.textures = textures.len();
    drop(graph);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, Surface};
    use crate::material::Material;
    use crate::shape::Shape;
    use bevy::transform::components::Transform;

    #[test]
    fn test_abort_is_idempotent() {
        let mut manager = LoadManager::new();
        let first = manager.begin();
        assert!(manager.accepts(&first));
        assert!(first.abort());
        assert!(!first.abort());
        assert!(first.is_aborted());
        assert!(matches!(first.check(), Err(LoadError::Aborted(1))));
        assert!(!manager.accepts(&first));
    }

    #[test]
    fn test_new_generation_aborts_previous() {
        let mut manager = LoadManager::new();
        let first = manager.begin();
        let second = manager.begin();
        assert!(first.is_aborted());
        assert!(!second.is_aborted());
        assert!(!manager.accepts(&first));
        assert!(manager.complete(&second));
        // Delivered once
        assert!(!manager.complete(&second));
        assert_eq!(manager.current().map(|g| g.id()), Some(2));
    }

    #[test]
    fn test_dispose_skips_shared_materials() {
        let shared = SharedMaterials::default();
        let own = Arc::new(Material::default());
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let shape = Shape::Sphere { radius: 1.0 };
        for material in [own.clone(), own.clone(), shared.collision.clone()] {
            graph.add_surface(
                root,
                "s",
                NodeKind::Surface,
                Transform::IDENTITY,
                Surface::new(shape.clone(), material),
            );
        }

        let report = dispose_scene(graph, &shared);
        assert_eq!(report.surfaces, 3);
        assert_eq!(report.materials, 1);
        assert_eq!(report.textures, 0);
        assert_eq!(Arc::strong_count(&own), 1);
    }
}
