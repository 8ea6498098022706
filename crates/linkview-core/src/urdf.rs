//! URDF (Unified Robot Description Format) parsing
//!
//! The XML is deserialized into thin serde mirrors of the URDF elements and then
//! converted into a [`KinematicModel`]. Elements the viewport has no use for
//! (`gazebo`, `transmission`, `mimic`, ...) are skipped by serde.

use quick_xml::de::from_str;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::model::{
    Geometry, GeometryShape, Inertial, InertiaTensor, Joint, JointLimit, JointType,
    KinematicModel, Link, MaterialSpec, ModelError, Pose,
};

#[derive(Debug, Deserialize)]
#[serde(rename = "robot")]
struct UrdfRobot {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(default)]
    link: Vec<UrdfLink>,
    #[serde(default)]
    joint: Vec<UrdfJoint>,
    #[serde(default)]
    material: Vec<UrdfMaterial>,
}

#[derive(Debug, Deserialize)]
struct UrdfLink {
    #[serde(rename = "@name")]
    name: String,
    #[serde(default)]
    inertial: Option<UrdfInertial>,
    #[serde(default)]
    visual: Vec<UrdfGeometryEntry>,
    #[serde(default)]
    collision: Vec<UrdfGeometryEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct UrdfOrigin {
    #[serde(rename = "@xyz", default)]
    xyz: Option<String>,
    #[serde(rename = "@rpy", default)]
    rpy: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UrdfValue {
    #[serde(rename = "@value")]
    value: f64,
}

#[derive(Debug, Deserialize)]
struct UrdfInertia {
    #[serde(rename = "@ixx", default)]
    ixx: f64,
    #[serde(rename = "@ixy", default)]
    ixy: f64,
    #[serde(rename = "@ixz", default)]
    ixz: f64,
    #[serde(rename = "@iyy", default)]
    iyy: f64,
    #[serde(rename = "@iyz", default)]
    iyz: f64,
    #[serde(rename = "@izz", default)]
    izz: f64,
}

#[derive(Debug, Deserialize)]
struct UrdfInertial {
    #[serde(default)]
    origin: Option<UrdfOrigin>,
    #[serde(default)]
    mass: Option<UrdfValue>,
    #[serde(default)]
    inertia: Option<UrdfInertia>,
}

#[derive(Debug, Deserialize)]
struct UrdfGeometryEntry {
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(default)]
    origin: Option<UrdfOrigin>,
    geometry: UrdfGeometry,
    #[serde(default)]
    material: Option<UrdfMaterial>,
}

/// `<geometry>` holds exactly one shape child
#[derive(Debug, Default, Deserialize)]
struct UrdfGeometry {
    #[serde(rename = "box", default)]
    cuboid: Option<UrdfBox>,
    #[serde(default)]
    cylinder: Option<UrdfRadiusLength>,
    #[serde(default)]
    capsule: Option<UrdfRadiusLength>,
    #[serde(default)]
    sphere: Option<UrdfSphere>,
    #[serde(default)]
    mesh: Option<UrdfMesh>,
}

#[derive(Debug, Deserialize)]
struct UrdfBox {
    #[serde(rename = "@size")]
    size: String,
}

#[derive(Debug, Deserialize)]
struct UrdfRadiusLength {
    #[serde(rename = "@radius")]
    radius: f64,
    #[serde(rename = "@length")]
    length: f64,
}

#[derive(Debug, Deserialize)]
struct UrdfSphere {
    #[serde(rename = "@radius")]
    radius: f64,
}

#[derive(Debug, Deserialize)]
struct UrdfMesh {
    #[serde(rename = "@filename")]
    filename: String,
    #[serde(rename = "@scale", default)]
    scale: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct UrdfMaterial {
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(default)]
    color: Option<UrdfColor>,
    #[serde(default)]
    texture: Option<UrdfTexture>,
}

#[derive(Debug, Clone, Deserialize)]
struct UrdfColor {
    #[serde(rename = "@rgba")]
    rgba: String,
}

#[derive(Debug, Clone, Deserialize)]
struct UrdfTexture {
    #[serde(rename = "@filename")]
    filename: String,
}

#[derive(Debug, Deserialize)]
struct UrdfLinkRef {
    #[serde(rename = "@link")]
    link: String,
}

#[derive(Debug, Deserialize)]
struct UrdfAxis {
    #[serde(rename = "@xyz")]
    xyz: String,
}

#[derive(Debug, Deserialize)]
struct UrdfLimit {
    #[serde(rename = "@lower", default)]
    lower: f64,
    #[serde(rename = "@upper", default)]
    upper: f64,
    #[serde(rename = "@effort", default)]
    effort: f64,
    #[serde(rename = "@velocity", default)]
    velocity: f64,
}

#[derive(Debug, Deserialize)]
struct UrdfJoint {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@type")]
    joint_type: String,
    #[serde(default)]
    origin: Option<UrdfOrigin>,
    parent: UrdfLinkRef,
    child: UrdfLinkRef,
    #[serde(default)]
    axis: Option<UrdfAxis>,
    #[serde(default)]
    limit: Option<UrdfLimit>,
}

/// Parse a whitespace separated vector of exactly `N` numbers
pub fn parse_vector<const N: usize>(s: &str) -> Option<[f64; N]> {
    let parts: Vec<f64> = s
        .split_whitespace()
        .filter_map(|p| p.parse().ok())
        .collect();
    parts.try_into().ok()
}

fn parse_origin(origin: Option<&UrdfOrigin>) -> Pose {
    let Some(origin) = origin else {
        return Pose::default();
    };
    Pose {
        xyz: origin
            .xyz
            .as_deref()
            .and_then(parse_vector::<3>)
            .unwrap_or_default(),
        rpy: origin
            .rpy
            .as_deref()
            .and_then(parse_vector::<3>)
            .unwrap_or_default(),
    }
}

fn convert_material(
    material: &UrdfMaterial,
    named: &HashMap<String, UrdfMaterial>,
) -> MaterialSpec {
    // A bare <material name="x"/> refers to a robot-level definition
    let resolved = match (&material.color, &material.texture, &material.name) {
        (None, None, Some(name)) => named.get(name).unwrap_or(material),
        _ => material,
    };
    MaterialSpec {
        name: material.name.clone(),
        rgba: resolved
            .color
            .as_ref()
            .and_then(|c| parse_vector::<4>(&c.rgba)),
        texture: resolved.texture.as_ref().map(|t| t.filename.clone()),
    }
}

fn convert_geometry(
    link: &str,
    entry: &UrdfGeometryEntry,
    named: &HashMap<String, UrdfMaterial>,
) -> Result<Geometry, ModelError> {
    let g = &entry.geometry;
    let shape = if let Some(cuboid) = &g.cuboid {
        let size = parse_vector::<3>(&cuboid.size).ok_or_else(|| {
            ModelError::ParseError(format!("link '{}': bad box size '{}'", link, cuboid.size))
        })?;
        GeometryShape::Box { size }
    } else if let Some(cylinder) = &g.cylinder {
        GeometryShape::Cylinder {
            radius: cylinder.radius,
            length: cylinder.length,
        }
    } else if let Some(capsule) = &g.capsule {
        GeometryShape::Capsule {
            radius: capsule.radius,
            length: capsule.length,
        }
    } else if let Some(sphere) = &g.sphere {
        GeometryShape::Sphere {
            radius: sphere.radius,
        }
    } else if let Some(mesh) = &g.mesh {
        GeometryShape::Mesh {
            filename: mesh.filename.clone(),
            scale: mesh
                .scale
                .as_deref()
                .and_then(parse_vector::<3>)
                .unwrap_or([1.0; 3]),
        }
    } else {
        return Err(ModelError::ParseError(format!(
            "link '{}': geometry has no shape",
            link
        )));
    };

    Ok(Geometry {
        name: entry.name.clone(),
        origin: parse_origin(entry.origin.as_ref()),
        shape,
        material: entry.material.as_ref().map(|m| convert_material(m, named)),
    })
}

fn convert_link(link: &UrdfLink, named: &HashMap<String, UrdfMaterial>) -> Result<Link, ModelError> {
    let inertial = link.inertial.as_ref().map(|inertial| {
        let inertia = inertial
            .inertia
            .as_ref()
            .map(|i| InertiaTensor {
                ixx: i.ixx,
                ixy: i.ixy,
                ixz: i.ixz,
                iyy: i.iyy,
                iyz: i.iyz,
                izz: i.izz,
            })
            .unwrap_or_default();
        Inertial {
            origin: parse_origin(inertial.origin.as_ref()),
            mass: inertial.mass.as_ref().map(|m| m.value).unwrap_or(0.0),
            inertia,
        }
    });

    Ok(Link {
        name: link.name.clone(),
        inertial,
        visuals: link
            .visual
            .iter()
            .map(|v| convert_geometry(&link.name, v, named))
            .collect::<Result<_, _>>()?,
        collisions: link
            .collision
            .iter()
            .map(|c| convert_geometry(&link.name, c, named))
            .collect::<Result<_, _>>()?,
    })
}

fn convert_joint(joint: &UrdfJoint) -> Result<Joint, ModelError> {
    let joint_type: JointType = joint.joint_type.parse()?;
    let axis = joint
        .axis
        .as_ref()
        .and_then(|a| parse_vector::<3>(&a.xyz))
        .unwrap_or([1.0, 0.0, 0.0]);
    Ok(Joint {
        name: joint.name.clone(),
        joint_type,
        parent: joint.parent.link.clone(),
        child: joint.child.link.clone(),
        origin: parse_origin(joint.origin.as_ref()),
        axis,
        limit: joint.limit.as_ref().map(|l| JointLimit {
            lower: l.lower,
            upper: l.upper,
            effort: l.effort,
            velocity: l.velocity,
        }),
        value: 0.0,
    })
}

/// Parse URDF XML into a validated kinematic model
pub fn from_urdf_str(xml: &str) -> Result<KinematicModel, ModelError> {
    let robot: UrdfRobot = from_str(xml).map_err(|e| ModelError::ParseError(e.to_string()))?;

    let named: HashMap<String, UrdfMaterial> = robot
        .material
        .iter()
        .filter_map(|m| m.name.clone().map(|n| (n, m.clone())))
        .collect();

    let model = KinematicModel {
        name: robot.name.clone(),
        links: robot
            .link
            .iter()
            .map(|l| convert_link(l, &named))
            .collect::<Result<_, _>>()?,
        joints: robot
            .joint
            .iter()
            .map(convert_joint)
            .collect::<Result<_, _>>()?,
    };
    model.validate()?;
    Ok(model)
}

/// Parse a URDF file
pub fn from_urdf_file(path: &Path) -> Result<KinematicModel, ModelError> {
    let content = std::fs::read_to_string(path)?;
    from_urdf_str(&content)
}
