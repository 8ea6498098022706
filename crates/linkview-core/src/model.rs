//! Kinematic model types
//!
//! A [`KinematicModel`] is a tree of [`Link`]s connected by [`Joint`]s. Links
//! carry optional inertial data and visual/collision geometry; joints carry a
//! type, an axis, limits, and the current scalar value.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to parse model: {0}")]
    ParseError(String),
    #[error("Unknown model format (expected URDF XML or JSON)")]
    UnknownFormat,
    #[error("Invalid model structure: {0}")]
    ValidationError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Pose in 3D space: translation (meters) and roll/pitch/yaw (radians)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    #[serde(default)]
    pub xyz: [f64; 3],
    #[serde(default)]
    pub rpy: [f64; 3],
}

impl Pose {
    pub fn new(xyz: [f64; 3], rpy: [f64; 3]) -> Self {
        Self { xyz, rpy }
    }

    pub fn from_xyz(xyz: [f64; 3]) -> Self {
        Self { xyz, rpy: [0.0; 3] }
    }

    pub fn is_identity(&self) -> bool {
        self.xyz == [0.0; 3] && self.rpy == [0.0; 3]
    }
}

/// Symmetric 3x3 inertia tensor, upper triangle
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InertiaTensor {
    pub ixx: f64,
    #[serde(default)]
    pub ixy: f64,
    #[serde(default)]
    pub ixz: f64,
    pub iyy: f64,
    #[serde(default)]
    pub iyz: f64,
    pub izz: f64,
}

impl InertiaTensor {
    pub fn diagonal(ixx: f64, iyy: f64, izz: f64) -> Self {
        Self {
            ixx,
            iyy,
            izz,
            ..Default::default()
        }
    }

    /// Row-major full matrix
    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        [
            [self.ixx, self.ixy, self.ixz],
            [self.ixy, self.iyy, self.iyz],
            [self.ixz, self.iyz, self.izz],
        ]
    }
}

/// Mass properties of a link
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Inertial {
    /// Center of mass offset and inertia frame orientation
    #[serde(default)]
    pub origin: Pose,
    pub mass: f64,
    pub inertia: InertiaTensor,
}

/// Which geometry list a geometry entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryCategory {
    Visual,
    Collision,
}

impl GeometryCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            GeometryCategory::Visual => "visual",
            GeometryCategory::Collision => "collision",
        }
    }
}

impl std::fmt::Display for GeometryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geometry primitive or mesh reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeometryShape {
    Box { size: [f64; 3] },
    Cylinder { radius: f64, length: f64 },
    Sphere { radius: f64 },
    Capsule { radius: f64, length: f64 },
    Mesh {
        filename: String,
        #[serde(default = "unit_scale")]
        scale: [f64; 3],
    },
}

fn unit_scale() -> [f64; 3] {
    [1.0; 3]
}

/// Authored appearance of a visual
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    #[serde(default)]
    pub name: Option<String>,
    /// RGBA in 0.0-1.0
    #[serde(default)]
    pub rgba: Option<[f64; 4]>,
    #[serde(default)]
    pub texture: Option<String>,
}

/// A single visual or collision entry of a link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub origin: Pose,
    pub shape: GeometryShape,
    #[serde(default)]
    pub material: Option<MaterialSpec>,
}

/// Rigid body segment of the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    #[serde(default)]
    pub inertial: Option<Inertial>,
    #[serde(default)]
    pub visuals: Vec<Geometry>,
    #[serde(default)]
    pub collisions: Vec<Geometry>,
}

impl Link {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn geometries(&self, category: GeometryCategory) -> &[Geometry] {
        match category {
            GeometryCategory::Visual => &self.visuals,
            GeometryCategory::Collision => &self.collisions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JointType {
    #[default]
    Fixed,
    Revolute,
    Continuous,
    Prismatic,
    Floating,
    Planar,
}

impl JointType {
    /// Joint types the viewport can drive with a single scalar
    pub fn is_movable(self) -> bool {
        matches!(
            self,
            JointType::Revolute | JointType::Continuous | JointType::Prismatic
        )
    }

    pub fn is_rotational(self) -> bool {
        matches!(self, JointType::Revolute | JointType::Continuous)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JointType::Fixed => "fixed",
            JointType::Revolute => "revolute",
            JointType::Continuous => "continuous",
            JointType::Prismatic => "prismatic",
            JointType::Floating => "floating",
            JointType::Planar => "planar",
        }
    }
}

impl std::str::FromStr for JointType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(JointType::Fixed),
            "revolute" => Ok(JointType::Revolute),
            "continuous" => Ok(JointType::Continuous),
            "prismatic" => Ok(JointType::Prismatic),
            "floating" => Ok(JointType::Floating),
            "planar" => Ok(JointType::Planar),
            other => Err(ModelError::ParseError(format!("unknown joint type '{}'", other))),
        }
    }
}

/// Joint value limits. Velocity and effort are informational.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JointLimit {
    #[serde(default)]
    pub lower: f64,
    #[serde(default)]
    pub upper: f64,
    #[serde(default)]
    pub effort: f64,
    #[serde(default)]
    pub velocity: f64,
}

impl JointLimit {
    pub fn clamp(&self, value: f64) -> f64 {
        if self.lower <= self.upper {
            value.clamp(self.lower, self.upper)
        } else {
            value
        }
    }
}

/// Kinematic connector between a parent and a child link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub name: String,
    #[serde(rename = "type")]
    pub joint_type: JointType,
    pub parent: String,
    pub child: String,
    #[serde(default)]
    pub origin: Pose,
    #[serde(default = "default_axis")]
    pub axis: [f64; 3],
    #[serde(default)]
    pub limit: Option<JointLimit>,
    /// Current angle (radians) or displacement (meters)
    #[serde(default)]
    pub value: f64,
}

fn default_axis() -> [f64; 3] {
    [1.0, 0.0, 0.0]
}

impl Joint {
    pub fn new(
        name: impl Into<String>,
        joint_type: JointType,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            joint_type,
            parent: parent.into(),
            child: child.into(),
            origin: Pose::default(),
            axis: default_axis(),
            limit: None,
            value: 0.0,
        }
    }

    /// Apply the value policy for this joint type.
    ///
    /// Revolute and prismatic joints are clamped into their limit range when one
    /// is authored. Continuous joints are unbounded; fixed joints stay at zero.
    pub fn constrain(&self, value: f64) -> f64 {
        match self.joint_type {
            JointType::Revolute | JointType::Prismatic => match &self.limit {
                Some(limit) => limit.clamp(value),
                None => value,
            },
            JointType::Continuous => value,
            _ => 0.0,
        }
    }
}

/// Parsed articulated model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KinematicModel {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub joints: Vec<Joint>,
}

impl KinematicModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            links: Vec::new(),
            joints: Vec::new(),
        }
    }

    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.name == name)
    }

    pub fn has_link(&self, name: &str) -> bool {
        self.link(name).is_some()
    }

    pub fn joint(&self, name: &str) -> Option<&Joint> {
        self.joints.iter().find(|j| j.name == name)
    }

    pub fn joint_mut(&mut self, name: &str) -> Option<&mut Joint> {
        self.joints.iter_mut().find(|j| j.name == name)
    }

    /// Joint whose child is the given link
    pub fn parent_joint(&self, link: &str) -> Option<&Joint> {
        self.joints.iter().find(|j| j.child == link)
    }

    /// Joints whose parent is the given link, in authored order
    pub fn child_joints<'a>(&'a self, link: &'a str) -> impl Iterator<Item = &'a Joint> + 'a {
        self.joints.iter().filter(move |j| j.parent == link)
    }

    /// The link that is nobody's child
    pub fn root_link(&self) -> Option<&Link> {
        let children: HashSet<&str> = self.joints.iter().map(|j| j.child.as_str()).collect();
        self.links.iter().find(|l| !children.contains(l.name.as_str()))
    }

    /// Set a joint value through the joint's value policy.
    ///
    /// Returns the value actually stored, or `None` for an unknown joint.
    pub fn set_joint_value(&mut self, name: &str, value: f64) -> Option<f64> {
        let joint = self.joint_mut(name)?;
        let constrained = joint.constrain(value);
        joint.value = constrained;
        Some(constrained)
    }

    /// Check the tree structure: unique names, resolvable joint endpoints,
    /// one parent per link, a single root, no cycles.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.links.is_empty() {
            return Err(ModelError::ValidationError("model has no links".to_string()));
        }

        let mut link_names = HashSet::new();
        for link in &self.links {
            if !link_names.insert(link.name.as_str()) {
                return Err(ModelError::ValidationError(format!(
                    "duplicate link name '{}'",
                    link.name
                )));
            }
        }

        let mut joint_names = HashSet::new();
        let mut parent_of: HashMap<&str, &str> = HashMap::new();
        for joint in &self.joints {
            if !joint_names.insert(joint.name.as_str()) {
                return Err(ModelError::ValidationError(format!(
                    "duplicate joint name '{}'",
                    joint.name
                )));
            }
            for end in [&joint.parent, &joint.child] {
                if !link_names.contains(end.as_str()) {
                    return Err(ModelError::ValidationError(format!(
                        "joint '{}' references unknown link '{}'",
                        joint.name, end
                    )));
                }
            }
            if parent_of.insert(joint.child.as_str(), joint.parent.as_str()).is_some() {
                return Err(ModelError::ValidationError(format!(
                    "link '{}' has more than one parent joint",
                    joint.child
                )));
            }
        }

        let roots: Vec<&str> = self
            .links
            .iter()
            .map(|l| l.name.as_str())
            .filter(|name| !parent_of.contains_key(name))
            .collect();
        match roots.len() {
            0 => {
                return Err(ModelError::ValidationError(
                    "model has no root link (joint cycle)".to_string(),
                ))
            }
            1 => {}
            _ => {
                return Err(ModelError::ValidationError(format!(
                    "model has multiple root links: {}",
                    roots.join(", ")
                )))
            }
        }

        // Every link must reach the root by following parents
        for link in &self.links {
            let mut current = link.name.as_str();
            let mut steps = 0;
            while let Some(parent) = parent_of.get(current) {
                current = parent;
                steps += 1;
                if steps > self.links.len() {
                    return Err(ModelError::ValidationError(format!(
                        "joint cycle through link '{}'",
                        link.name
                    )));
                }
            }
        }

        Ok(())
    }
}
