//! Surface appearance
//!
//! Materials are immutable and shared through `Arc`. Highlighting swaps the
//! `Arc` on a surface and puts the original one back, so identity comparison
//! with [`Arc::ptr_eq`] tells whether a surface shows its authored appearance.

use crate::config::HighlightColors;
use bevy::color::{Alpha, Color, LinearRgba};
use linkview_core::MaterialSpec;
use std::sync::Arc;

/// Texture bytes resolved through the asset resolver
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub path: String,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub base_color: Color,
    pub emissive: LinearRgba,
    pub unlit: bool,
    pub texture: Option<Arc<Texture>>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            base_color: Color::srgb(0.7, 0.7, 0.7),
            emissive: LinearRgba::BLACK,
            unlit: false,
            texture: None,
        }
    }
}

impl Material {
    pub fn from_rgba(rgba: [f32; 4]) -> Self {
        Self {
            base_color: Color::srgba(rgba[0], rgba[1], rgba[2], rgba[3]),
            ..Default::default()
        }
    }

    /// Flat, self-lit material used by highlight and helper geometry
    pub fn highlight(rgba: [f32; 4]) -> Self {
        let color = Color::srgba(rgba[0], rgba[1], rgba[2], rgba[3]);
        Self {
            base_color: color,
            emissive: LinearRgba::from(color) * 0.4,
            unlit: true,
            ..Default::default()
        }
    }

    /// Material for an authored spec; the texture is attached by the caller
    pub fn from_spec(spec: &MaterialSpec) -> Self {
        let base_color = spec
            .rgba
            .map(|c| Color::srgba(c[0] as f32, c[1] as f32, c[2] as f32, c[3] as f32))
            .unwrap_or(Material::default().base_color);
        Self {
            name: spec.name.clone(),
            base_color,
            ..Default::default()
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.base_color.alpha() < 1.0
    }
}

/// Process-wide singleton materials shared by every surface that uses them.
/// These are never disposed with a model.
#[derive(Debug, Clone)]
pub struct SharedMaterials {
    pub default: Arc<Material>,
    pub hover: Arc<Material>,
    pub selected: Arc<Material>,
    pub collision: Arc<Material>,
    pub collision_hover: Arc<Material>,
    pub placeholder: Arc<Material>,
    pub inertia: Arc<Material>,
    pub center_of_mass: Arc<Material>,
    pub axis_x: Arc<Material>,
    pub axis_y: Arc<Material>,
    pub axis_z: Arc<Material>,
}

impl SharedMaterials {
    pub fn new(colors: &HighlightColors) -> Self {
        Self {
            default: Arc::new(Material::default()),
            hover: Arc::new(Material::highlight(colors.hover)),
            selected: Arc::new(Material::highlight(colors.selected)),
            collision: Arc::new(Material::from_rgba(colors.collision)),
            collision_hover: Arc::new(Material::highlight(colors.collision_hover)),
            placeholder: Arc::new(Material::highlight(colors.placeholder)),
            inertia: Arc::new(Material::from_rgba(colors.inertia)),
            center_of_mass: Arc::new(Material::highlight(colors.center_of_mass)),
            axis_x: Arc::new(Material::highlight([0.9, 0.2, 0.2, 1.0])),
            axis_y: Arc::new(Material::highlight([0.2, 0.9, 0.2, 1.0])),
            axis_z: Arc::new(Material::highlight([0.2, 0.3, 0.95, 1.0])),
        }
    }

    fn all(&self) -> [&Arc<Material>; 11] {
        [
            &self.default,
            &self.hover,
            &self.selected,
            &self.collision,
            &self.collision_hover,
            &self.placeholder,
            &self.inertia,
            &self.center_of_mass,
            &self.axis_x,
            &self.axis_y,
            &self.axis_z,
        ]
    }

    pub fn is_shared(&self, material: &Arc<Material>) -> bool {
        self.all().into_iter().any(|m| Arc::ptr_eq(m, material))
    }
}

impl Default for SharedMaterials {
    fn default() -> Self {
        Self::new(&HighlightColors::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_identity() {
        let shared = SharedMaterials::default();
        assert!(shared.is_shared(&shared.hover));
        assert!(shared.is_shared(&shared.clone().selected));

        // Equal content, different allocation
        let lookalike = Arc::new((*shared.hover).clone());
        assert_eq!(*lookalike, *shared.hover);
        assert!(!shared.is_shared(&lookalike));
    }

    #[test]
    fn test_from_spec() {
        let spec = MaterialSpec {
            name: Some("blue".to_string()),
            rgba: Some([0.0, 0.0, 1.0, 0.5]),
            texture: None,
        };
        let material = Material::from_spec(&spec);
        assert_eq!(material.name.as_deref(), Some("blue"));
        assert!(material.is_transparent());

        let plain = Material::from_spec(&MaterialSpec::default());
        assert_eq!(plain.base_color, Material::default().base_color);
    }
}
