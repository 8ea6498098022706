//! Model text format detection

use crate::model::{KinematicModel, ModelError};
use crate::urdf;

/// Supported model text formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Urdf,
    Json,
}

/// Guess the format from the leading characters of the text
pub fn detect_format(content: &str) -> Option<ModelFormat> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('{') {
        Some(ModelFormat::Json)
    } else if trimmed.starts_with("<?xml") || trimmed.starts_with("<robot") || trimmed.starts_with("<!--") {
        Some(ModelFormat::Urdf)
    } else {
        None
    }
}

/// Parse model text in any supported format and validate it
pub fn parse_model(content: &str) -> Result<KinematicModel, ModelError> {
    match detect_format(content) {
        Some(ModelFormat::Urdf) => urdf::from_urdf_str(content),
        Some(ModelFormat::Json) => {
            let model: KinematicModel = serde_json::from_str(content)
                .map_err(|e| ModelError::ParseError(format!("JSON parse error: {}", e)))?;
            model.validate()?;
            Ok(model)
        }
        None => Err(ModelError::UnknownFormat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeometryShape, JointType};

    #[test]
    fn test_parse_json_model() {
        let json = r#"{
            "name": "slider",
            "links": [
                {"name": "rail", "visuals": [{"shape": {"type": "box", "size": [1, 0.1, 0.1]}}]},
                {"name": "cart"}
            ],
            "joints": [
                {"name": "slide", "type": "prismatic", "parent": "rail", "child": "cart",
                 "axis": [1, 0, 0], "limit": {"lower": 0, "upper": 0.8}}
            ]
        }"#;
        let model = parse_model(json).unwrap();
        assert_eq!(model.links.len(), 2);
        assert_eq!(model.joints[0].joint_type, JointType::Prismatic);
        assert!(matches!(model.links[0].visuals[0].shape, GeometryShape::Box { .. }));
    }

    #[test]
    fn test_unknown_and_invalid_input() {
        assert!(matches!(parse_model("solid ascii"), Err(ModelError::UnknownFormat)));
        assert!(matches!(parse_model("{\"links\": []}"), Err(ModelError::ValidationError(_))));
        assert!(matches!(parse_model("<robot"), Err(ModelError::ParseError(_))));
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format("  <?xml version='1.0'?>"), Some(ModelFormat::Urdf));
        assert_eq!(detect_format("<robot name='x'/>"), Some(ModelFormat::Urdf));
        assert_eq!(detect_format("\n{}"), Some(ModelFormat::Json));
        assert_eq!(detect_format("[]"), None);
    }
}
