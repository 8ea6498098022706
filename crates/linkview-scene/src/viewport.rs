//! Robot viewport engine
//!
//! [`RobotViewport`] owns the live scene of the latest load generation and
//! drives hover, selection, joint dragging and overlays from host input.
//! Notifications are queued as [`ViewportEvent`]s and drained by the host.

use crate::builder::{build_scene, BuildContext};
use crate::config::ViewportConfig;
use crate::drag::DragController;
use crate::events::ViewportEvent;
use crate::graph::{NodeId, SceneGraph};
use crate::highlight::{HighlightSet, HighlightTarget};
use crate::index::SceneIndex;
use crate::inertia::{compute_box, InertiaBox};
use crate::lifecycle::{
    dispose_scene, LoadError, LoadJob, LoadManager, LoadOutcome, LoadStatus,
};
use crate::loader::{GeometryLoader, LoaderRegistry};
use crate::material::{Material, SharedMaterials};
use crate::options::{HighlightMode, PointerState, Selection, SelectionKind, ToolMode, ViewOptions};
use crate::overlays::{OverlayContext, Overlays};
use crate::picking::{pick, HoverTracker, PickHit};
use crate::shape::Aabb;
use bevy::math::{Ray3d, Vec2};
use futures_util::FutureExt;
use linkview_core::{parse_model, AssetResolver, GeometryCategory, KinematicModel};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewportError {
    #[error("No model is loaded")]
    NoModel,
    #[error("Unknown joint '{0}'")]
    UnknownJoint(String),
}

/// Scene attached from the latest successful generation
struct LiveScene {
    generation: u64,
    model: KinematicModel,
    graph: SceneGraph,
    root: NodeId,
    index: SceneIndex,
    highlights: HighlightSet,
    overlays: Overlays,
    /// Expanded bounds used for the picking pre-test
    bounds: Option<Aabb>,
    unit_scale: f32,
    placeholders: Vec<String>,
}

/// Pointer-down record used to tell clicks from drags and orbits
#[derive(Debug, Clone)]
struct Press {
    position: Vec2,
    hit: Option<PickHit>,
}

pub struct RobotViewport {
    config: ViewportConfig,
    shared: SharedMaterials,
    loader: Arc<dyn GeometryLoader>,
    options: ViewOptions,
    loads: LoadManager,
    scene: Option<LiveScene>,
    hover: HoverTracker,
    hovered: Option<HighlightTarget>,
    selection: Option<Selection>,
    drag: DragController,
    press: Option<Press>,
    events: VecDeque<ViewportEvent>,
}

impl Default for RobotViewport {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

impl RobotViewport {
    pub fn new(config: ViewportConfig) -> Self {
        Self::with_loader(config, Arc::new(LoaderRegistry::with_defaults()))
    }

    pub fn with_loader(config: ViewportConfig, loader: Arc<dyn GeometryLoader>) -> Self {
        let shared = SharedMaterials::new(&config.colors);
        let hover = HoverTracker::new(
            config.interaction.hover_threshold_px,
            config.interaction.click_threshold_px,
        );
        Self {
            config,
            shared,
            loader,
            options: ViewOptions::default(),
            loads: LoadManager::new(),
            scene: None,
            hover,
            hovered: None,
            selection: None,
            drag: DragController::new(),
            press: None,
            events: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn shared_materials(&self) -> &SharedMaterials {
        &self.shared
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn hovered(&self) -> Option<&HighlightTarget> {
        self.hovered.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_active()
    }

    pub fn is_loaded(&self) -> bool {
        self.scene.is_some()
    }

    pub fn model(&self) -> Option<&KinematicModel> {
        self.scene.as_ref().map(|s| &s.model)
    }

    pub fn graph(&self) -> Option<&SceneGraph> {
        self.scene.as_ref().map(|s| &s.graph)
    }

    pub fn index(&self) -> Option<&SceneIndex> {
        self.scene.as_ref().map(|s| &s.index)
    }

    pub fn highlights(&self) -> Option<&HighlightSet> {
        self.scene.as_ref().map(|s| &s.highlights)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.scene.as_ref().map(|s| s.root)
    }

    pub fn generation(&self) -> Option<u64> {
        self.scene.as_ref().map(|s| s.generation)
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.scene.as_ref().and_then(|s| s.bounds)
    }

    pub fn unit_scale(&self) -> Option<f32> {
        self.scene.as_ref().map(|s| s.unit_scale)
    }

    /// Mesh references shown as placeholders in the live scene
    pub fn placeholders(&self) -> &[String] {
        self.scene
            .as_ref()
            .map(|s| s.placeholders.as_slice())
            .unwrap_or(&[])
    }

    /// Material currently shown on a surface
    pub fn surface_material(&self, id: NodeId) -> Option<&Arc<Material>> {
        let scene = self.scene.as_ref()?;
        Some(&scene.graph.get(id)?.surface.as_ref()?.material)
    }

    pub fn drain_events(&mut self) -> Vec<ViewportEvent> {
        self.events.drain(..).collect()
    }

    fn emit(&mut self, event: ViewportEvent) {
        self.events.push_back(event);
    }

    // ---- loading -------------------------------------------------------

    /// Start loading `text` as the new live model.
    ///
    /// The previous generation is aborted and the previous scene disposed
    /// right away. The returned job parses and builds the new scene; run it
    /// on any executor and pass the outcome to [`finish_load`](Self::finish_load).
    pub fn begin_load(&mut self, text: impl Into<String>, resolver: Arc<dyn AssetResolver>) -> LoadJob {
        let generation = self.loads.begin();
        self.discard_scene();
        info!(generation = generation.id(), "Loading model");

        let ctx = BuildContext {
            resolver,
            loader: self.loader.clone(),
            shared: self.shared.clone(),
            loading: self.config.loading.clone(),
        };
        let text = text.into();
        let token = generation.clone();
        let future = async move {
            token.check()?;
            let model = parse_model(&text)?;
            build_scene(ctx, model, token).await
        }
        .boxed();

        LoadJob { generation, future }
    }

    /// Apply a finished job. Outcomes of superseded generations are disposed
    /// without touching the live scene.
    pub fn finish_load(&mut self, outcome: LoadOutcome) -> LoadStatus {
        let LoadOutcome { generation, result } = outcome;
        if !self.loads.accepts(&generation) {
            if let Ok(built) = result {
                let report = dispose_scene(built.graph, &self.shared);
                debug!(
                    generation = generation.id(),
                    surfaces = report.surfaces,
                    "Discarded stale load result"
                );
            } else {
                debug!(generation = generation.id(), "Stale load ended without a scene");
            }
            return LoadStatus::Discarded;
        }

        let built = match result {
            Ok(built) => built,
            Err(LoadError::Aborted(_)) => return LoadStatus::Discarded,
            Err(LoadError::Model(e)) => {
                self.loads.complete(&generation);
                let message = e.to_string();
                warn!(generation = generation.id(), error = %message, "Model failed to load");
                self.emit(ViewportEvent::LoadFailed(message.clone()));
                return LoadStatus::Failed(message);
            }
        };

        let mut graph = built.graph;
        let index = SceneIndex::build(
            &mut graph,
            built.root,
            &built.model,
            self.options.show_visual,
            self.options.show_collision,
        );
        apply_interactivity(&mut graph, &index, self.options.highlight_mode);
        graph.refresh_world();

        let mut scene = LiveScene {
            generation: generation.id(),
            model: built.model,
            graph,
            root: built.root,
            index,
            highlights: HighlightSet::new(),
            overlays: Overlays::new(),
            bounds: None,
            unit_scale: built.unit_scale,
            placeholders: built.placeholders,
        };
        self.sync_overlays(&mut scene);
        scene.bounds = compute_bounds(&mut scene.graph, self.config.interaction.bounds_epsilon);

        info!(
            generation = generation.id(),
            links = scene.model.links.len(),
            joints = scene.model.joints.len(),
            placeholders = scene.placeholders.len(),
            "Model ready"
        );
        let root = scene.root;
        self.scene = Some(scene);
        self.loads.complete(&generation);
        self.emit(ViewportEvent::ModelLoaded {
            root,
            generation: generation.id(),
        });

        // A selection made before the load carries over if it still resolves
        if let Some(target) = self.selection.as_ref().and_then(|s| self.selection_target(s)) {
            let material = self.shared.selected.clone();
            if let Some(scene) = self.scene.as_mut() {
                scene.highlights.apply_target(&mut scene.graph, &scene.index, &target, &material);
            }
        }
        LoadStatus::Ready
    }

    /// Begin, run and finish a load on the caller's executor
    pub async fn load(&mut self, text: impl Into<String>, resolver: Arc<dyn AssetResolver>) -> LoadStatus {
        let job = self.begin_load(text, resolver);
        let outcome = job.run().await;
        self.finish_load(outcome)
    }

    /// Abort any in-flight load and drop the live scene
    pub fn teardown(&mut self) {
        self.loads.abort_current();
        self.discard_scene();
    }

    fn discard_scene(&mut self) {
        if self.drag.end().is_some() {
            self.emit(ViewportEvent::DraggingChanged(false));
        }
        self.press = None;
        self.hovered = None;
        self.hover.reset();
        if let Some(scene) = self.scene.take() {
            let report = dispose_scene(scene.graph, &self.shared);
            debug!(
                generation = scene.generation,
                surfaces = report.surfaces,
                materials = report.materials,
                textures = report.textures,
                "Disposed previous scene"
            );
        }
    }

    // ---- options and host-driven state ---------------------------------

    pub fn set_options(&mut self, options: ViewOptions) {
        let previous = self.options;
        self.options = options;

        if options.tool_mode != ToolMode::Select && self.drag.is_active() {
            self.finish_drag();
        }
        if self.scene.is_none() {
            return;
        }

        let mode_changed = previous.highlight_mode != options.highlight_mode;
        if mode_changed {
            // Highlight targets are bound to a category; rebuild them
            self.set_hover_target(None);
            if let Some(scene) = self.scene.as_mut() {
                scene.highlights.revert_all(&mut scene.graph);
            }
            self.hover.reset();
        }

        let epsilon = self.config.interaction.bounds_epsilon;
        let mut scene = match self.scene.take() {
            Some(scene) => scene,
            None => return,
        };
        for &id in scene.index.visual_surfaces() {
            scene.graph.set_visible(id, options.show_visual);
        }
        for &id in scene.index.collision_groups() {
            scene.graph.set_visible(id, options.show_collision);
        }
        apply_interactivity(&mut scene.graph, &scene.index, options.highlight_mode);
        self.sync_overlays(&mut scene);
        scene.bounds = compute_bounds(&mut scene.graph, epsilon);
        self.scene = Some(scene);

        if mode_changed {
            if let Some(target) = self.selection.as_ref().and_then(|s| self.selection_target(s)) {
                let material = self.shared.selected.clone();
                if let Some(scene) = self.scene.as_mut() {
                    scene.highlights.apply_target(&mut scene.graph, &scene.index, &target, &material);
                }
            }
        }
    }

    fn sync_overlays(&self, scene: &mut LiveScene) {
        let ctx = OverlayContext {
            model: &scene.model,
            shared: &self.shared,
            overlay: &self.config.overlays,
            inertia: &self.config.inertia,
        };
        scene.overlays.sync(&mut scene.graph, &self.options, &ctx);
        scene.graph.refresh_world();
    }

    /// Replace the explicit selection. Selection highlight always wins over
    /// hover; no event is emitted for host-driven changes.
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        let old = self.selection.as_ref().and_then(|s| self.selection_target(s));
        let new = selection.as_ref().and_then(|s| self.selection_target(s));
        self.selection = selection;
        if old == new {
            return;
        }

        let selected = self.shared.selected.clone();
        let hover_material = self.hover_material();
        let hovered = self.hovered.clone();
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        if let Some(old) = &old {
            scene.highlights.revert_target(&mut scene.graph, &scene.index, old);
            if hovered.as_ref() == Some(old) {
                scene.highlights.apply_target(&mut scene.graph, &scene.index, old, &hover_material);
            }
        }
        if let Some(new) = &new {
            scene.highlights.apply_target(&mut scene.graph, &scene.index, new, &selected);
        }
    }

    /// Hover driven from outside the viewport, e.g. a tree view
    pub fn set_hover(&mut self, hover: Option<Selection>) {
        let target = hover.as_ref().and_then(|s| self.selection_target(s));
        self.set_hover_target(target);
    }

    /// Set a joint from the host. Returns the value stored after the joint's
    /// value policy.
    pub fn set_joint_value(&mut self, joint: &str, value: f64) -> Result<f64, ViewportError> {
        let epsilon = self.config.interaction.bounds_epsilon;
        let scene = self.scene.as_mut().ok_or(ViewportError::NoModel)?;
        let stored = scene
            .model
            .set_joint_value(joint, value)
            .ok_or_else(|| ViewportError::UnknownJoint(joint.to_string()))?;
        if let Some(node) = scene.graph.find_joint(joint) {
            scene.graph.set_joint_value(node, stored);
        }
        scene.bounds = compute_bounds(&mut scene.graph, epsilon);
        Ok(stored)
    }

    // ---- pointer input -------------------------------------------------

    /// Pick the nearest eligible surface for the current highlight mode
    pub fn pick(&self, ray: &Ray3d) -> Option<PickHit> {
        let scene = self.scene.as_ref()?;
        pick(
            &scene.graph,
            &scene.index,
            scene.bounds.as_ref(),
            ray,
            self.options.highlight_mode.category(),
        )
    }

    pub fn pointer_down(&mut self, pointer: &PointerState) {
        self.press = None;
        if self.options.tool_mode != ToolMode::Select || self.scene.is_none() {
            return;
        }
        let hit = pointer.ray.as_ref().and_then(|ray| self.pick(ray));
        if let (Some(hit), Some(ray), Some(scene)) = (&hit, pointer.ray, self.scene.as_ref()) {
            if self
                .drag
                .begin(&scene.graph, hit.surface, hit.distance, ray, pointer.position)
            {
                debug!(surface = hit.surface.index(), "Joint drag started");
                self.emit(ViewportEvent::DraggingChanged(true));
            }
        }
        self.press = Some(Press {
            position: pointer.position,
            hit,
        });
    }

    pub fn pointer_moved(&mut self, pointer: &PointerState) {
        if self.drag.is_active() {
            let radius = self.config.interaction.click_threshold_px;
            if self.drag.note_cursor(pointer.position, radius) {
                if let Some(ray) = pointer.ray {
                    self.drag_to(ray);
                }
            }
            return;
        }
        if self.hover.should_update(pointer, false) {
            self.update_hover(pointer.ray);
        }
    }

    pub fn pointer_up(&mut self, pointer: &PointerState) {
        let press = self.press.take();
        if let Some(session) = self.drag.session() {
            if session.moved {
                self.finish_drag();
                return;
            }
            self.drag.end();
            self.emit(ViewportEvent::DraggingChanged(false));
        }

        let Some(press) = press else {
            return;
        };
        if self.options.tool_mode != ToolMode::Select {
            return;
        }
        // Travel beyond the click radius was a camera gesture
        if pointer.position.distance(press.position) > self.config.interaction.click_threshold_px {
            return;
        }
        self.click(press.hit, pointer.position);
    }

    fn click(&mut self, hit: Option<PickHit>, position: Vec2) {
        match hit {
            Some(hit) => {
                let Some(link) = hit.link else {
                    return;
                };
                let selection = Selection::link(link, Some(hit.category));
                self.set_selection(Some(selection.clone()));
                self.hover.lock_at(position);
                self.emit(ViewportEvent::Selected(selection));
            }
            None => {
                self.set_selection(None);
                self.emit(ViewportEvent::Deselected);
            }
        }
    }

    fn drag_to(&mut self, ray: Ray3d) {
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        let Some((joint, value)) = self.drag.update(&scene.graph, &scene.model, ray) else {
            return;
        };
        let Some(stored) = scene.model.set_joint_value(&joint, value) else {
            return;
        };
        if let Some(node) = self.drag.session().map(|s| s.node) {
            scene.graph.set_joint_value(node, stored);
            scene.graph.refresh_world();
        }
        self.emit(ViewportEvent::JointChanged {
            joint,
            value: stored,
        });
    }

    /// End the session, committing its final value if it moved
    fn finish_drag(&mut self) {
        let Some(session) = self.drag.end() else {
            return;
        };
        self.emit(ViewportEvent::DraggingChanged(false));
        if !session.moved {
            return;
        }
        let epsilon = self.config.interaction.bounds_epsilon;
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        let value = scene.model.joint(&session.joint).map(|j| j.value).unwrap_or_default();
        scene.bounds = compute_bounds(&mut scene.graph, epsilon);
        debug!(joint = %session.joint, value, "Joint drag committed");
        self.emit(ViewportEvent::JointCommitted {
            joint: session.joint,
            value,
        });
    }

    // ---- hover ---------------------------------------------------------

    fn update_hover(&mut self, ray: Option<Ray3d>) {
        let target = ray.as_ref().and_then(|ray| self.pick(ray)).map(|hit| match hit.link {
            Some(link) => HighlightTarget::link(link, hit.category),
            None => HighlightTarget::Surface(hit.surface),
        });
        self.set_hover_target(target);
    }

    fn hover_material(&self) -> Arc<Material> {
        match self.options.highlight_mode {
            HighlightMode::Link => self.shared.hover.clone(),
            HighlightMode::Collision => self.shared.collision_hover.clone(),
        }
    }

    fn set_hover_target(&mut self, target: Option<HighlightTarget>) {
        if self.hovered == target {
            return;
        }
        let selected = self.selection.as_ref().and_then(|s| self.selection_target(s));
        let material = self.hover_material();
        let previous = std::mem::replace(&mut self.hovered, target.clone());

        if let Some(scene) = self.scene.as_mut() {
            if let Some(previous) = previous.as_ref().filter(|p| Some(*p) != selected.as_ref()) {
                scene.highlights.revert_target(&mut scene.graph, &scene.index, previous);
            }
            if let Some(target) = target.as_ref().filter(|t| Some(*t) != selected.as_ref()) {
                scene.highlights.apply_target(&mut scene.graph, &scene.index, target, &material);
            }
        }

        let before = previous.as_ref().and_then(|t| t.link_name());
        let after = target.as_ref().and_then(|t| t.link_name());
        if before != after {
            debug!(link = ?after, "Hover changed");
            self.emit(ViewportEvent::HoverChanged {
                link: after.map(str::to_string),
            });
        }
    }

    /// Surfaces a selection or external hover paints. Joints resolve to
    /// their child link.
    fn selection_target(&self, selection: &Selection) -> Option<HighlightTarget> {
        let category = selection
            .sub_type
            .unwrap_or_else(|| self.options.highlight_mode.category());
        match selection.kind {
            SelectionKind::Link => Some(HighlightTarget::link(selection.id.clone(), category)),
            SelectionKind::Joint => {
                let joint = self.scene.as_ref()?.model.joint(&selection.id)?;
                Some(HighlightTarget::link(joint.child.clone(), category))
            }
        }
    }

    // ---- queries -------------------------------------------------------

    /// Equivalent inertia box of every link with plausible inertial data
    pub fn inertia_boxes(&self) -> Vec<(String, InertiaBox)> {
        let Some(scene) = self.scene.as_ref() else {
            return Vec::new();
        };
        scene
            .model
            .links
            .iter()
            .filter_map(|link| {
                let inertial = link.inertial.as_ref()?;
                let b = compute_box(&inertial.inertia, inertial.mass, &self.config.inertia)?;
                Some((link.name.clone(), b))
            })
            .collect()
    }
}

impl Drop for RobotViewport {
    fn drop(&mut self) {
        self.loads.abort_current();
    }
}

/// Collision surfaces are only pickable in collision mode
fn apply_interactivity(graph: &mut SceneGraph, index: &SceneIndex, mode: HighlightMode) {
    for &id in index.category_surfaces(GeometryCategory::Collision) {
        if let Some(surface) = graph.node_mut(id).surface.as_mut() {
            surface.interactive = mode == HighlightMode::Collision;
        }
    }
}

fn compute_bounds(graph: &mut SceneGraph, epsilon: f32) -> Option<Aabb> {
    graph.refresh_world();
    graph.world_bounds().map(|b| b.expand(epsilon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::{Dir3, Vec3};
    use futures_util::FutureExt;
    use linkview_core::AssetSet;

    const TWO_BOXES: &str = r#"{
        "name": "pair",
        "links": [
            {"name": "base", "visuals": [{"shape": {"type": "box", "size": [1, 1, 1]}}],
             "collisions": [{"shape": {"type": "box", "size": [1, 1, 1]}}]},
            {"name": "top", "visuals": [{"shape": {"type": "box", "size": [1, 1, 1]}}]}
        ],
        "joints": [
            {"name": "lift", "type": "fixed", "parent": "base", "child": "top",
             "origin": {"xyz": [0, 0, 2]}}
        ]
    }"#;

    fn loaded() -> RobotViewport {
        let mut viewport = RobotViewport::default();
        let status = viewport
            .load(TWO_BOXES, Arc::new(AssetSet::new()))
            .now_or_never()
            .unwrap();
        assert_eq!(status, LoadStatus::Ready);
        viewport
    }

    fn pointer(x: f32, y: f32) -> PointerState {
        let ray = Ray3d {
            origin: Vec3::new(x, y, 10.0),
            direction: Dir3::NEG_Z,
        };
        PointerState::new(Vec2::new(x * 100.0, y * 100.0), Some(ray))
    }

    #[test]
    fn test_load_emits_model_loaded_once() {
        let mut viewport = loaded();
        let events = viewport.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ViewportEvent::ModelLoaded { generation: 1, .. }));
        assert!(viewport.bounds().is_some());
    }

    #[test]
    fn test_parse_failure_reports_message() {
        let mut viewport = RobotViewport::default();
        let status = viewport
            .load("not a model", Arc::new(AssetSet::new()))
            .now_or_never()
            .unwrap();
        assert!(matches!(status, LoadStatus::Failed(_)));
        assert!(!viewport.is_loaded());
        assert!(matches!(viewport.drain_events()[..], [ViewportEvent::LoadFailed(_)]));
    }

    #[test]
    fn test_hover_highlights_and_clears() {
        let mut viewport = loaded();
        viewport.drain_events();

        viewport.pointer_moved(&pointer(0.0, 0.0));
        assert_eq!(
            viewport.hovered(),
            Some(&HighlightTarget::link("top", GeometryCategory::Visual))
        );
        assert_eq!(viewport.highlights().unwrap().len(), 1);

        viewport.pointer_moved(&pointer(5.0, 0.0));
        assert!(viewport.hovered().is_none());
        assert!(viewport.highlights().unwrap().is_empty());

        let events = viewport.drain_events();
        assert_eq!(
            events,
            vec![
                ViewportEvent::HoverChanged { link: Some("top".to_string()) },
                ViewportEvent::HoverChanged { link: None },
            ]
        );
    }

    #[test]
    fn test_click_selects_and_empty_click_deselects() {
        let mut viewport = loaded();
        viewport.drain_events();

        let at = pointer(0.0, 0.0);
        viewport.pointer_down(&at);
        viewport.pointer_up(&at);
        assert_eq!(viewport.selection(), Some(&Selection::link("top", Some(GeometryCategory::Visual))));

        let miss = pointer(5.0, 5.0);
        viewport.pointer_down(&miss);
        viewport.pointer_up(&miss);
        assert!(viewport.selection().is_none());

        let events = viewport.drain_events();
        assert!(events.contains(&ViewportEvent::Selected(Selection::link(
            "top",
            Some(GeometryCategory::Visual)
        ))));
        assert_eq!(events.last(), Some(&ViewportEvent::Deselected));
    }

    #[test]
    fn test_collision_mode_picks_collision_surfaces() {
        let mut viewport = loaded();
        let mut options = ViewOptions::default();
        options.show_collision = true;
        options.highlight_mode = HighlightMode::Collision;
        viewport.set_options(options);

        let hit = viewport.pick(&pointer(0.0, 0.0).ray.unwrap()).unwrap();
        assert_eq!(hit.category, GeometryCategory::Collision);
        assert_eq!(hit.link.as_deref(), Some("base"));
    }

    #[test]
    fn test_other_tools_do_not_select() {
        let mut viewport = loaded();
        let mut options = ViewOptions::default();
        options.tool_mode = ToolMode::Measure;
        viewport.set_options(options);
        viewport.drain_events();

        let at = pointer(0.0, 0.0);
        viewport.pointer_down(&at);
        viewport.pointer_up(&at);
        assert!(viewport.selection().is_none());
        assert!(viewport.drain_events().is_empty());
    }

    #[test]
    fn test_set_joint_value_errors() {
        let mut viewport = RobotViewport::default();
        assert_eq!(viewport.set_joint_value("lift", 1.0), Err(ViewportError::NoModel));
        let mut viewport = loaded();
        assert_eq!(
            viewport.set_joint_value("nope", 1.0),
            Err(ViewportError::UnknownJoint("nope".to_string()))
        );
        // Fixed joints stay at zero
        assert_eq!(viewport.set_joint_value("lift", 1.0), Ok(0.0));
    }

    #[test]
    fn test_teardown_disposes_scene() {
        let mut viewport = loaded();
        viewport.teardown();
        assert!(!viewport.is_loaded());
        assert!(viewport.pick(&pointer(0.0, 0.0).ray.unwrap()).is_none());
    }
}
