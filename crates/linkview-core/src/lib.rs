//! Linkview Core - Kinematic model types, parsing, and asset resolution
//!
//! This crate provides the inputs of the Linkview viewport engine:
//! - Kinematic model types (links, joints, geometry, inertial data)
//! - URDF and JSON model parsing with structural validation
//! - Asset resolution from mesh references to supplied files

pub mod assets;
pub mod format;
pub mod model;
pub mod urdf;

pub use assets::{AssetHandle, AssetResolver, AssetSet};
pub use format::{parse_model, ModelFormat};
pub use model::{
    Geometry, GeometryCategory, GeometryShape, Inertial, InertiaTensor, Joint, JointLimit,
    JointType, KinematicModel, Link, MaterialSpec, ModelError, Pose,
};
