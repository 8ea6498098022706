//! Bevy integration
//!
//! [`LinkviewPlugin`] keeps a [`RobotViewport`] in a resource, runs loads on
//! the IO task pool, feeds it primary window pointer input through the
//! [`ViewportCamera`], republishes its notifications as messages and mirrors
//! the scene into mesh entities when the host renders.
//!
//! Systems run in [`LinkviewSystems`] order. Hosts that drive selection from
//! their own UI schedule it before [`LinkviewSystems::Input`] so selection
//! highlight lands before hover in the same frame.

use crate::config::ViewportConfig;
use crate::events::ViewportEvent;
use crate::lifecycle::{LoadOutcome, LoadStatus};
use crate::options::PointerState;
use crate::render::sync_surfaces;
use crate::viewport::RobotViewport;
use bevy::prelude::*;
use bevy::tasks::futures_lite::future;
use bevy::tasks::{IoTaskPool, Task};
use bevy::window::PrimaryWindow;
use linkview_core::AssetResolver;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The engine, shared with host systems
#[derive(Resource)]
pub struct Viewport(pub RobotViewport);

/// True while a joint drag owns the pointer; hosts pause camera orbit on it
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JointDragActive(pub bool);

/// Set by the host camera controller while it orbits
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CameraOrbiting(pub bool);

/// Marker for the camera whose rays drive picking
#[derive(Component)]
pub struct ViewportCamera;

/// Ask the viewport to load a model
#[derive(Message, Clone)]
pub struct LoadModelRequest {
    pub text: String,
    pub resolver: Arc<dyn AssetResolver>,
}

/// Ordered stages of the plugin's `Update` work
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkviewSystems {
    /// Start requested loads and attach finished ones
    Load,
    /// Pointer hover, click and drag
    Input,
    /// Publish engine events as messages
    Publish,
    /// Mirror the scene into drawn entities
    Render,
}

#[derive(Resource, Default)]
struct PendingLoads(Vec<Task<LoadOutcome>>);

#[derive(Default)]
pub struct LinkviewPlugin {
    pub config: ViewportConfig,
}

impl Plugin for LinkviewPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Viewport(RobotViewport::new(self.config.clone())))
            .init_resource::<JointDragActive>()
            .init_resource::<CameraOrbiting>()
            .init_resource::<PendingLoads>()
            .init_resource::<ButtonInput<MouseButton>>()
            .add_message::<LoadModelRequest>()
            .add_message::<ViewportEvent>()
            .configure_sets(
                Update,
                (
                    LinkviewSystems::Load,
                    LinkviewSystems::Input,
                    LinkviewSystems::Publish,
                    LinkviewSystems::Render,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    (start_loads, poll_loads).chain().in_set(LinkviewSystems::Load),
                    forward_pointer.in_set(LinkviewSystems::Input),
                    publish_events.in_set(LinkviewSystems::Publish),
                    sync_surfaces.in_set(LinkviewSystems::Render),
                ),
            );
    }
}

fn start_loads(
    mut requests: MessageReader<LoadModelRequest>,
    mut viewport: ResMut<Viewport>,
    mut pending: ResMut<PendingLoads>,
) {
    for request in requests.read() {
        let job = viewport.0.begin_load(request.text.clone(), request.resolver.clone());
        pending.0.push(IoTaskPool::get().spawn(job.run()));
    }
}

fn poll_loads(mut viewport: ResMut<Viewport>, mut pending: ResMut<PendingLoads>) {
    pending.0.retain_mut(|task| {
        let Some(outcome) = future::block_on(future::poll_once(task)) else {
            return true;
        };
        let generation = outcome.generation.id();
        match viewport.0.finish_load(outcome) {
            LoadStatus::Ready => info!(generation, "Model attached"),
            LoadStatus::Discarded => debug!(generation, "Load result discarded"),
            LoadStatus::Failed(e) => warn!(generation, error = %e, "Load failed"),
        }
        false
    });
}

fn forward_pointer(
    mut viewport: ResMut<Viewport>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<ViewportCamera>>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    orbiting: Res<CameraOrbiting>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let Some(position) = window.cursor_position() else {
        return;
    };
    let ray = cameras
        .single()
        .ok()
        .and_then(|(camera, transform)| camera.viewport_to_world(transform, position).ok());

    let mut pointer = PointerState::new(position, ray);
    pointer.camera_orbiting = orbiting.0;

    let engine = &mut viewport.0;
    if mouse_button.just_pressed(MouseButton::Left) {
        engine.pointer_down(&pointer);
    }
    engine.pointer_moved(&pointer);
    if mouse_button.just_released(MouseButton::Left) {
        engine.pointer_up(&pointer);
    }
}

fn publish_events(
    mut viewport: ResMut<Viewport>,
    mut drag_active: ResMut<JointDragActive>,
    mut writer: MessageWriter<ViewportEvent>,
) {
    for event in viewport.0.drain_events() {
        if let ViewportEvent::DraggingChanged(active) = event {
            drag_active.0 = active;
        }
        writer.write(event);
    }
}
