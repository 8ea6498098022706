//! Text and JSON reports

use crate::config::OutputConfig;
use anyhow::Result;
use linkview_core::GeometryCategory;
use linkview_scene::{PickHit, RobotViewport};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize)]
pub struct LinkReport {
    pub name: String,
    pub visuals: usize,
    pub collisions: usize,
    pub has_inertial: bool,
}

#[derive(Debug, Serialize)]
pub struct JointReport {
    pub name: String,
    #[serde(rename = "type")]
    pub joint_type: String,
    pub parent: String,
    pub child: String,
    pub limits: Option<[f64; 2]>,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct IndexEntry {
    pub key: String,
    pub surfaces: usize,
}

#[derive(Debug, Serialize)]
pub struct BoxReport {
    pub link: String,
    pub size: [f64; 3],
    /// Quaternion x, y, z, w
    pub rotation: [f64; 4],
}

#[derive(Debug, Serialize)]
pub struct Inspection {
    pub name: String,
    pub unit_scale: f32,
    pub links: Vec<LinkReport>,
    pub joints: Vec<JointReport>,
    pub index: Vec<IndexEntry>,
    pub unowned_surfaces: usize,
    pub placeholders: Vec<String>,
    pub inertia_boxes: Vec<BoxReport>,
    pub bounds: Option<[[f32; 3]; 2]>,
}

impl Inspection {
    pub fn from_viewport(viewport: &RobotViewport) -> Self {
        let mut inspection = Inspection {
            name: String::new(),
            unit_scale: viewport.unit_scale().unwrap_or(1.0),
            links: Vec::new(),
            joints: Vec::new(),
            index: Vec::new(),
            unowned_surfaces: 0,
            placeholders: viewport.placeholders().to_vec(),
            inertia_boxes: Vec::new(),
            bounds: viewport.bounds().map(|b| [b.min.to_array(), b.max.to_array()]),
        };

        if let Some(model) = viewport.model() {
            inspection.name = model.name.clone();
            inspection.links = model
                .links
                .iter()
                .map(|l| LinkReport {
                    name: l.name.clone(),
                    visuals: l.visuals.len(),
                    collisions: l.collisions.len(),
                    has_inertial: l.inertial.is_some(),
                })
                .collect();
            inspection.joints = model
                .joints
                .iter()
                .map(|j| JointReport {
                    name: j.name.clone(),
                    joint_type: j.joint_type.as_str().to_string(),
                    parent: j.parent.clone(),
                    child: j.child.clone(),
                    limits: j.limit.map(|l| [l.lower, l.upper]),
                    value: j.value,
                })
                .collect();
        }

        if let Some(index) = viewport.index() {
            inspection.index = index
                .keys()
                .into_iter()
                .map(|key| IndexEntry {
                    surfaces: index.surfaces(&key.link, key.category).len(),
                    key: key.to_string(),
                })
                .collect();
            inspection.unowned_surfaces = index.unowned().len();
        }

        inspection.inertia_boxes = viewport
            .inertia_boxes()
            .into_iter()
            .map(|(link, b)| BoxReport {
                link,
                size: b.size().to_array(),
                rotation: b.rotation.to_array(),
            })
            .collect();
        inspection
    }
}

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = f.precision().unwrap_or(4);
        writeln!(f, "Model '{}' (unit scale {})", self.name, self.unit_scale)?;

        writeln!(f, "Links ({}):", self.links.len())?;
        for link in &self.links {
            writeln!(
                f,
                "  - {} [{} visual, {} collision{}]",
                link.name,
                link.visuals,
                link.collisions,
                if link.has_inertial { ", inertial" } else { "" }
            )?;
        }

        writeln!(f, "Joints ({}):", self.joints.len())?;
        for joint in &self.joints {
            write!(
                f,
                "  - {} ({}) {} -> {} value {:.p$}",
                joint.name, joint.joint_type, joint.parent, joint.child, joint.value
            )?;
            if let Some([lower, upper]) = joint.limits {
                write!(f, " limits [{:.p$}, {:.p$}]", lower, upper)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Index ({} entries):", self.index.len())?;
        for entry in &self.index {
            writeln!(f, "  {} -> {} surface(s)", entry.key, entry.surfaces)?;
        }
        if self.unowned_surfaces > 0 {
            writeln!(f, "  {} surface(s) without an owning link", self.unowned_surfaces)?;
        }

        if !self.placeholders.is_empty() {
            writeln!(f, "Placeholders ({}):", self.placeholders.len())?;
            for reference in &self.placeholders {
                writeln!(f, "  - {}", reference)?;
            }
        }

        writeln!(f, "Inertia boxes ({}):", self.inertia_boxes.len())?;
        for b in &self.inertia_boxes {
            let [w, h, d] = b.size;
            writeln!(f, "  - {}: {:.p$} x {:.p$} x {:.p$}", b.link, w, h, d)?;
        }

        if let Some([min, max]) = self.bounds {
            write!(
                f,
                "Bounds: [{:.p$}, {:.p$}, {:.p$}] .. [{:.p$}, {:.p$}, {:.p$}]",
                min[0], min[1], min[2], max[0], max[1], max[2]
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct PickReport {
    pub hit: bool,
    pub link: Option<String>,
    pub category: Option<GeometryCategory>,
    pub distance: Option<f32>,
    pub point: Option<[f32; 3]>,
}

impl PickReport {
    pub fn from_hit(hit: Option<&PickHit>) -> Self {
        match hit {
            Some(hit) => PickReport {
                hit: true,
                link: hit.link.clone(),
                category: Some(hit.category),
                distance: Some(hit.distance),
                point: Some(hit.point.to_array()),
            },
            None => PickReport {
                hit: false,
                link: None,
                category: None,
                distance: None,
                point: None,
            },
        }
    }
}

impl fmt::Display for PickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = f.precision().unwrap_or(4);
        let (Some(category), Some(distance), Some([x, y, z])) = (self.category, self.distance, self.point)
        else {
            return write!(f, "No hit");
        };
        write!(
            f,
            "Hit {} ({}) at distance {:.p$}, point [{:.p$}, {:.p$}, {:.p$}]",
            self.link.as_deref().unwrap_or("<unowned surface>"),
            category,
            distance,
            x,
            y,
            z
        )
    }
}

pub fn print<T: Serialize + fmt::Display>(value: &T, output: &OutputConfig) -> Result<()> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{:.*}", output.precision, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use linkview_core::AssetSet;
    use std::sync::Arc;

    const MODEL: &str = r#"{
        "name": "pendulum",
        "links": [
            {"name": "pivot",
             "inertial": {"mass": 1.0, "inertia": {"ixx": 0.1667, "iyy": 0.1667, "izz": 0.1667}},
             "visuals": [{"shape": {"type": "box", "size": [1, 1, 1]}}]},
            {"name": "bob", "visuals": [{"shape": {"type": "mesh", "filename": "bob.stl"}}]}
        ],
        "joints": [
            {"name": "swing", "type": "revolute", "parent": "pivot", "child": "bob",
             "limit": {"lower": -1.5, "upper": 1.5}}
        ]
    }"#;

    fn viewport() -> RobotViewport {
        let mut viewport = RobotViewport::default();
        viewport
            .load(MODEL, Arc::new(AssetSet::new()))
            .now_or_never()
            .unwrap();
        viewport
    }

    #[test]
    fn test_inspection_contents() {
        let inspection = Inspection::from_viewport(&viewport());
        assert_eq!(inspection.name, "pendulum");
        assert_eq!(inspection.links.len(), 2);
        assert_eq!(inspection.joints[0].limits, Some([-1.5, 1.5]));
        assert_eq!(inspection.placeholders, ["bob.stl"]);
        assert_eq!(inspection.inertia_boxes.len(), 1);
        assert_eq!(inspection.inertia_boxes[0].link, "pivot");

        let text = format!("{:.2}", inspection);
        assert!(text.contains("pivot:visual -> 1 surface(s)"));
        assert!(text.contains("swing (revolute) pivot -> bob value 0.00 limits [-1.50, 1.50]"));
        assert!(text.contains("- bob.stl"));
    }

    #[test]
    fn test_pick_report() {
        let none = PickReport::from_hit(None);
        assert!(!none.hit);
        assert_eq!(none.to_string(), "No hit");

        let json = serde_json::to_value(&none).unwrap();
        assert_eq!(json["hit"], serde_json::Value::Bool(false));
    }
}
