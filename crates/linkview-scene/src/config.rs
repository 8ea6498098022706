//! Viewport configuration
//!
//! Every field has a serde default, so hosts can embed this in their own
//! configuration files and only spell out what they change.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewportConfig {
    #[serde(default)]
    pub interaction: InteractionConfig,
    #[serde(default)]
    pub colors: HighlightColors,
    #[serde(default)]
    pub overlays: OverlayConfig,
    #[serde(default)]
    pub inertia: InertiaConfig,
    #[serde(default)]
    pub loading: LoadingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionConfig {
    /// Cursor travel (pixels) before hover is recomputed
    #[serde(default = "default_hover_threshold")]
    pub hover_threshold_px: f32,
    /// Cursor travel (pixels) that turns a click into a drag, and that
    /// releases the hover lock after a click selection
    #[serde(default = "default_click_threshold")]
    pub click_threshold_px: f32,
    /// Margin (meters) added to the cached model bounds so moving joints
    /// stay inside the pre-test box
    #[serde(default = "default_bounds_epsilon")]
    pub bounds_epsilon: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            hover_threshold_px: default_hover_threshold(),
            click_threshold_px: default_click_threshold(),
            bounds_epsilon: default_bounds_epsilon(),
        }
    }
}

fn default_hover_threshold() -> f32 {
    2.0
}

fn default_click_threshold() -> f32 {
    3.0
}

fn default_bounds_epsilon() -> f32 {
    0.05
}

/// RGBA colors (0.0-1.0) of the shared highlight and helper materials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightColors {
    #[serde(default = "default_hover_color")]
    pub hover: [f32; 4],
    #[serde(default = "default_selected_color")]
    pub selected: [f32; 4],
    #[serde(default = "default_collision_color")]
    pub collision: [f32; 4],
    #[serde(default = "default_collision_hover_color")]
    pub collision_hover: [f32; 4],
    #[serde(default = "default_placeholder_color")]
    pub placeholder: [f32; 4],
    #[serde(default = "default_inertia_color")]
    pub inertia: [f32; 4],
    #[serde(default = "default_com_color")]
    pub center_of_mass: [f32; 4],
}

impl Default for HighlightColors {
    fn default() -> Self {
        Self {
            hover: default_hover_color(),
            selected: default_selected_color(),
            collision: default_collision_color(),
            collision_hover: default_collision_hover_color(),
            placeholder: default_placeholder_color(),
            inertia: default_inertia_color(),
            center_of_mass: default_com_color(),
        }
    }
}

fn default_hover_color() -> [f32; 4] {
    [0.4, 0.7, 1.0, 1.0]
}

fn default_selected_color() -> [f32; 4] {
    [1.0, 0.6, 0.1, 1.0]
}

fn default_collision_color() -> [f32; 4] {
    [0.8, 0.3, 0.8, 0.35]
}

fn default_collision_hover_color() -> [f32; 4] {
    [1.0, 0.3, 1.0, 0.6]
}

fn default_placeholder_color() -> [f32; 4] {
    [1.0, 0.0, 1.0, 0.8]
}

fn default_inertia_color() -> [f32; 4] {
    [0.2, 0.8, 0.9, 0.35]
}

fn default_com_color() -> [f32; 4] {
    [0.95, 0.95, 0.2, 1.0]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Length (meters) of origin frame and joint axis arrows
    #[serde(default = "default_axis_length")]
    pub axis_length: f32,
    /// Thickness (meters) of axis arrows
    #[serde(default = "default_axis_thickness")]
    pub axis_thickness: f32,
    /// Radius (meters) of center of mass markers
    #[serde(default = "default_com_radius")]
    pub com_radius: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            axis_length: default_axis_length(),
            axis_thickness: default_axis_thickness(),
            com_radius: default_com_radius(),
        }
    }
}

fn default_axis_length() -> f32 {
    0.1
}

fn default_axis_thickness() -> f32 {
    0.004
}

fn default_com_radius() -> f32 {
    0.01
}

/// Plausibility thresholds for inertia boxes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InertiaConfig {
    /// Masses below this (kg) are treated as placeholders
    #[serde(default = "default_min_mass")]
    pub min_mass: f64,
    /// Densities below this (kg/m^3) are rejected
    #[serde(default = "default_min_density")]
    pub min_density: f64,
    /// Smallest drawn box edge (meters)
    #[serde(default = "default_min_visual_size")]
    pub min_visual_size: f64,
}

impl Default for InertiaConfig {
    fn default() -> Self {
        Self {
            min_mass: default_min_mass(),
            min_density: default_min_density(),
            min_visual_size: default_min_visual_size(),
        }
    }
}

fn default_min_mass() -> f64 {
    1e-4
}

fn default_min_density() -> f64 {
    0.1
}

fn default_min_visual_size() -> f64 {
    1e-3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadingConfig {
    /// Edge length (meters) of the cube standing in for a missing mesh
    #[serde(default = "default_placeholder_size")]
    pub placeholder_size: f32,
    /// A mesh whose largest extent exceeds this (meters) is assumed to be
    /// authored in millimeters
    #[serde(default = "default_millimeter_threshold")]
    pub millimeter_threshold: f32,
    /// Whether to apply millimeter detection at all
    #[serde(default = "default_true")]
    pub detect_units: bool,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            placeholder_size: default_placeholder_size(),
            millimeter_threshold: default_millimeter_threshold(),
            detect_units: true,
        }
    }
}

fn default_placeholder_size() -> f32 {
    0.05
}

fn default_millimeter_threshold() -> f32 {
    10.0
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: ViewportConfig = toml::from_str(
            r#"
            [interaction]
            hover_threshold_px = 5.0

            [colors]
            hover = [0.0, 1.0, 0.0, 1.0]
            "#,
        )
        .unwrap();
        assert_eq!(config.interaction.hover_threshold_px, 5.0);
        assert_eq!(config.interaction.click_threshold_px, 3.0);
        assert_eq!(config.colors.hover, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(config.colors.selected, default_selected_color());
        assert_eq!(config.inertia, InertiaConfig::default());
    }

    #[test]
    fn test_default_config_serializes() {
        let text = toml::to_string_pretty(&ViewportConfig::default()).unwrap();
        let back: ViewportConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, ViewportConfig::default());
    }
}
