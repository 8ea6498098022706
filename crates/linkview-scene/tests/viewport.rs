//! End-to-end viewport behavior: loading, indexing, highlighting, selection
//! and joint dragging through the public engine API.

use bevy::math::{Dir3, Ray3d, Vec2, Vec3};
use linkview_core::{AssetSet, GeometryCategory};
use linkview_scene::{
    HighlightMode, HighlightTarget, LoadStatus, PointerState, RobotViewport, Selection,
    ViewOptions, ViewportEvent,
};
use std::collections::HashSet;
use std::sync::Arc;

const ARM: &str = r#"<?xml version="1.0"?>
<robot name="arm">
  <material name="steel"><color rgba="0.6 0.6 0.65 1"/></material>
  <link name="base">
    <inertial>
      <mass value="1"/>
      <inertia ixx="0.1667" ixy="0" ixz="0" iyy="0.1667" iyz="0" izz="0.1667"/>
    </inertial>
    <visual><geometry><box size="0.2 0.2 0.2"/></geometry><material name="steel"/></visual>
    <collision><geometry><box size="0.2 0.2 0.2"/></geometry></collision>
  </link>
  <link name="arm">
    <visual>
      <origin xyz="1 0 0"/>
      <geometry><box size="0.2 0.2 0.2"/></geometry>
    </visual>
    <collision>
      <origin xyz="1 0 0"/>
      <geometry><box size="0.2 0.2 0.2"/></geometry>
    </collision>
  </link>
  <joint name="joint" type="revolute">
    <parent link="base"/>
    <child link="arm"/>
    <axis xyz="0 0 1"/>
    <limit lower="-1.0" upper="1.0" effort="10" velocity="1"/>
  </joint>
</robot>
"#;

const MESHES: &str = r#"{
    "name": "meshy",
    "links": [
        {"name": "body",
         "visuals": [
            {"shape": {"type": "mesh", "filename": "package://meshy/meshes/plate.stl"}},
            {"shape": {"type": "mesh", "filename": "package://meshy/meshes/missing.stl"}}
         ],
         "collisions": [{"shape": {"type": "cylinder", "radius": 0.1, "length": 0.4}}]},
        {"name": "wheel",
         "visuals": [{"shape": {"type": "sphere", "radius": 0.1}}],
         "collisions": [{"shape": {"type": "sphere", "radius": 0.1}}]}
    ],
    "joints": [
        {"name": "spin", "type": "continuous", "parent": "body", "child": "wheel",
         "origin": {"xyz": [0.3, 0, 0]}, "axis": [0, 1, 0]}
    ]
}"#;

const PLATE_STL: &str = "solid plate
facet normal 0 0 1
  outer loop
    vertex 0 0 0
    vertex 0.1 0 0
    vertex 0 0.1 0
  endloop
endfacet
endsolid plate
";

fn down_ray(x: f32, y: f32) -> Ray3d {
    Ray3d {
        origin: Vec3::new(x, y, 10.0),
        direction: Dir3::NEG_Z,
    }
}

fn pointer_at(pixel: Vec2, ray: Ray3d) -> PointerState {
    PointerState::new(pixel, Some(ray))
}

async fn load_arm() -> RobotViewport {
    let mut viewport = RobotViewport::default();
    let status = viewport.load(ARM, Arc::new(AssetSet::new())).await;
    assert_eq!(status, LoadStatus::Ready);
    viewport
}

#[tokio::test]
async fn test_index_covers_every_surface_once() {
    let mut assets = AssetSet::new();
    assets.insert("meshes/plate.stl", PLATE_STL.as_bytes().to_vec());

    let mut viewport = RobotViewport::default();
    let status = viewport.load(MESHES, Arc::new(assets)).await;
    assert_eq!(status, LoadStatus::Ready);
    assert_eq!(viewport.placeholders(), ["package://meshy/meshes/missing.stl"]);

    let graph = viewport.graph().unwrap();
    let index = viewport.index().unwrap();
    let keys: Vec<String> = index.keys().iter().map(ToString::to_string).collect();
    assert_eq!(
        keys,
        ["body:visual", "body:collision", "wheel:visual", "wheel:collision"]
    );

    let mut seen = HashSet::new();
    for key in index.keys() {
        for &id in index.surfaces(&key.link, key.category) {
            assert!(seen.insert(id), "surface listed twice");
            let node = graph.node(id);
            assert_eq!(node.owner.as_deref(), Some(key.link.as_str()));
            assert_eq!(node.kind.category(), Some(key.category));
        }
    }
    let surfaces: HashSet<_> = graph.surfaces().filter(|id| !graph.under_gizmo(*id)).collect();
    assert_eq!(seen, surfaces);

    // Decoded mesh, placeholder cube, collision cylinder
    assert_eq!(index.surfaces("body", GeometryCategory::Visual).len(), 2);
    let placeholder = index
        .surfaces("body", GeometryCategory::Visual)
        .iter()
        .filter_map(|id| graph.node(*id).surface.as_ref())
        .find_map(|s| s.placeholder.clone());
    assert_eq!(placeholder.as_deref(), Some("package://meshy/meshes/missing.stl"));
}

#[tokio::test]
async fn test_highlight_reverts_to_identical_material() {
    let mut viewport = load_arm().await;
    let surface = viewport.index().unwrap().surfaces("base", GeometryCategory::Visual)[0];
    let authored = viewport.surface_material(surface).unwrap().clone();

    viewport.set_hover(Some(Selection::link("base", None)));
    assert!(viewport.highlights().unwrap().contains(surface));
    assert!(Arc::ptr_eq(
        viewport.surface_material(surface).unwrap(),
        &viewport.shared_materials().hover
    ));

    viewport.set_hover(None);
    assert!(!viewport.highlights().unwrap().contains(surface));
    assert!(Arc::ptr_eq(viewport.surface_material(surface).unwrap(), &authored));
}

#[tokio::test]
async fn test_selection_wins_over_hover() {
    let mut viewport = load_arm().await;
    let surface = viewport.index().unwrap().surfaces("arm", GeometryCategory::Visual)[0];
    let authored = viewport.surface_material(surface).unwrap().clone();
    let shared = viewport.shared_materials().clone();
    let material = |v: &RobotViewport| v.surface_material(surface).unwrap().clone();

    viewport.set_selection(Some(Selection::link("arm", None)));
    assert!(Arc::ptr_eq(&material(&viewport), &shared.selected));

    // Hovering in and out of the selected link leaves the selection color
    viewport.pointer_moved(&pointer_at(Vec2::new(100.0, 0.0), down_ray(1.0, 0.0)));
    assert_eq!(
        viewport.hovered(),
        Some(&HighlightTarget::link("arm", GeometryCategory::Visual))
    );
    assert!(Arc::ptr_eq(&material(&viewport), &shared.selected));
    viewport.pointer_moved(&pointer_at(Vec2::new(500.0, 0.0), down_ray(5.0, 5.0)));
    assert!(Arc::ptr_eq(&material(&viewport), &shared.selected));

    // Deselecting while hovered falls back to the hover color
    viewport.pointer_moved(&pointer_at(Vec2::new(100.0, 0.0), down_ray(1.0, 0.0)));
    viewport.set_selection(None);
    assert!(Arc::ptr_eq(&material(&viewport), &shared.hover));

    viewport.pointer_moved(&pointer_at(Vec2::new(500.0, 0.0), down_ray(5.0, 5.0)));
    assert!(Arc::ptr_eq(&material(&viewport), &authored));
    assert!(viewport.highlights().unwrap().is_empty());
}

#[tokio::test]
async fn test_joint_selection_highlights_child_link() {
    let mut viewport = load_arm().await;
    viewport.set_selection(Some(Selection::joint("joint")));
    let index = viewport.index().unwrap();
    let arm = index.surfaces("arm", GeometryCategory::Visual)[0];
    let base = index.surfaces("base", GeometryCategory::Visual)[0];
    let highlights = viewport.highlights().unwrap();
    assert!(highlights.contains(arm));
    assert!(!highlights.contains(base));
}

#[tokio::test]
async fn test_collision_mode_hover_uses_collision_color() {
    let mut viewport = load_arm().await;
    viewport.set_options(ViewOptions {
        show_collision: true,
        highlight_mode: HighlightMode::Collision,
        ..ViewOptions::default()
    });
    viewport.pointer_moved(&pointer_at(Vec2::new(100.0, 0.0), down_ray(1.0, 0.0)));

    let surface = viewport.index().unwrap().surfaces("arm", GeometryCategory::Collision)[0];
    assert!(Arc::ptr_eq(
        viewport.surface_material(surface).unwrap(),
        &viewport.shared_materials().collision_hover
    ));
}

#[tokio::test]
async fn test_revolute_values_are_clamped() {
    let mut viewport = load_arm().await;
    assert_eq!(viewport.set_joint_value("joint", 2.5), Ok(1.0));
    assert_eq!(viewport.set_joint_value("joint", -7.0), Ok(-1.0));
    assert_eq!(viewport.model().unwrap().joint("joint").unwrap().value, -1.0);

    // Dragging a half turn still stops at the limit
    viewport.set_joint_value("joint", 0.0).unwrap();
    viewport.drain_events();
    viewport.pointer_down(&pointer_at(Vec2::new(0.0, 0.0), down_ray(1.0, 0.0)));
    for i in 1..=30 {
        let a = i as f32 * 0.1;
        viewport.pointer_moved(&pointer_at(Vec2::new(i as f32 * 10.0, 0.0), down_ray(a.cos(), a.sin())));
    }
    viewport.pointer_up(&pointer_at(Vec2::new(300.0, 0.0), down_ray(3.0f32.cos(), 3.0f32.sin())));

    for event in viewport.drain_events() {
        if let ViewportEvent::JointChanged { value, .. } | ViewportEvent::JointCommitted { value, .. } = event {
            assert!((-1.0..=1.0).contains(&value), "{}", value);
        }
    }
    assert_eq!(viewport.model().unwrap().joint("joint").unwrap().value, 1.0);
}

#[tokio::test]
async fn test_superseded_load_is_discarded() {
    let mut viewport = RobotViewport::default();
    let assets = Arc::new(AssetSet::new());

    // First generation finishes its work before it is superseded
    let first = viewport.begin_load(MESHES, assets.clone());
    let first_outcome = first.run().await;
    assert!(first_outcome.result.is_ok());

    let second = viewport.begin_load(ARM, assets.clone());
    let second_status = viewport.finish_load(second.run().await);
    assert_eq!(second_status, LoadStatus::Ready);

    let generation = viewport.generation();
    let nodes = viewport.graph().unwrap().len();
    assert_eq!(viewport.finish_load(first_outcome), LoadStatus::Discarded);
    assert_eq!(viewport.generation(), generation);
    assert_eq!(viewport.graph().unwrap().len(), nodes);
    assert_eq!(viewport.model().unwrap().name, "arm");

    // A generation aborted before running never produces a scene
    let third = viewport.begin_load(MESHES, assets.clone());
    let fourth = viewport.begin_load(ARM, assets);
    let fourth_status = viewport.finish_load(fourth.run().await);
    assert_eq!(viewport.finish_load(third.run().await), LoadStatus::Discarded);
    assert_eq!(fourth_status, LoadStatus::Ready);

    let loaded: Vec<u64> = viewport
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            ViewportEvent::ModelLoaded { generation, .. } => Some(generation),
            _ => None,
        })
        .collect();
    assert_eq!(loaded, [2, 4]);
}

#[tokio::test]
async fn test_teardown_aborts_live_generation() {
    let mut viewport = RobotViewport::default();
    let job = viewport.begin_load(ARM, Arc::new(AssetSet::new()));
    let generation = job.generation().clone();
    assert_eq!(viewport.finish_load(job.run().await), LoadStatus::Ready);
    assert!(!generation.is_aborted());

    viewport.teardown();
    assert!(generation.is_aborted());
    assert!(!viewport.is_loaded());
}

#[tokio::test]
async fn test_select_then_drag_two_link_arm() {
    let mut viewport = load_arm().await;
    viewport.drain_events();

    // Click the arm
    let grab = pointer_at(Vec2::new(100.0, 100.0), down_ray(1.0, 0.0));
    viewport.pointer_down(&grab);
    viewport.pointer_up(&grab);
    assert_eq!(
        viewport.selection(),
        Some(&Selection::link("arm", Some(GeometryCategory::Visual)))
    );

    // Drag it a fifth of a radian around the joint
    viewport.pointer_down(&grab);
    assert!(viewport.is_dragging());
    for (i, a) in [0.05f32, 0.10, 0.15, 0.20].into_iter().enumerate() {
        let pixel = Vec2::new(100.0 + 20.0 * (i + 1) as f32, 100.0);
        viewport.pointer_moved(&pointer_at(pixel, down_ray(a.cos(), a.sin())));
    }
    viewport.pointer_up(&pointer_at(Vec2::new(180.0, 100.0), down_ray(0.2f32.cos(), 0.2f32.sin())));
    assert!(!viewport.is_dragging());

    let value = viewport.model().unwrap().joint("joint").unwrap().value;
    assert!((value - 0.2).abs() < 1e-4, "{}", value);

    let events = viewport.drain_events();
    assert!(events.contains(&ViewportEvent::Selected(Selection::link(
        "arm",
        Some(GeometryCategory::Visual)
    ))));
    let commits: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ViewportEvent::JointCommitted { joint, value } => Some((joint.clone(), *value)),
            _ => None,
        })
        .collect();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].0, "joint");
    assert!((commits[0].1 - 0.2).abs() < 1e-4);
    let live = events
        .iter()
        .filter(|e| matches!(e, ViewportEvent::JointChanged { .. }))
        .count();
    assert_eq!(live, 4);
    assert_eq!(events.last(), Some(&ViewportEvent::JointCommitted {
        joint: "joint".to_string(),
        value: commits[0].1,
    }));

    // The arm moved with the joint
    let graph = viewport.graph().unwrap();
    let tip = viewport.index().unwrap().surfaces("arm", GeometryCategory::Visual)[0];
    let position = graph.world_position(tip);
    assert!((position.y - 0.2f32.sin()).abs() < 1e-3);
}

const SCALED_MESH: &str = r#"<?xml version="1.0"?>
<robot name="scaled">
  <link name="plate">
    <visual>
      <geometry><mesh filename="package://scaled/meshes/plate_mm.stl" scale="0.001 0.001 0.001"/></geometry>
    </visual>
  </link>
</robot>
"#;

const PLATE_MM_STL: &str = "solid plate
facet normal 0 0 1
  outer loop
    vertex 0 0 0
    vertex 500 0 0
    vertex 0 500 0
  endloop
endfacet
endsolid plate
";

#[tokio::test]
async fn test_authored_millimeter_scale_applies_once() {
    let mut assets = AssetSet::new();
    assets.insert("meshes/plate_mm.stl", PLATE_MM_STL.as_bytes().to_vec());

    let mut viewport = RobotViewport::default();
    let status = viewport.load(SCALED_MESH, Arc::new(assets)).await;
    assert_eq!(status, LoadStatus::Ready);
    assert_eq!(viewport.unit_scale(), Some(1.0));

    let epsilon = viewport.config().interaction.bounds_epsilon;
    let bounds = viewport.bounds().unwrap();
    assert!((bounds.size().x - (0.5 + 2.0 * epsilon)).abs() < 1e-4);

    let hit = viewport.pick(&down_ray(0.1, 0.1)).unwrap();
    assert_eq!(hit.link.as_deref(), Some("plate"));
}
