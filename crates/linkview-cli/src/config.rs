//! Configuration loading

use anyhow::Result;
use linkview_scene::ViewportConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    /// Engine settings, laid out as in a standalone viewport config
    #[serde(default)]
    pub viewport: ViewportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Print JSON instead of text
    #[serde(default)]
    pub json: bool,
    /// Decimal places for printed lengths and angles
    #[serde(default = "default_precision")]
    pub precision: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json: false,
            precision: default_precision(),
        }
    }
}

fn default_precision() -> usize {
    4
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_table_is_nested() {
        let config: Config = toml::from_str(
            r#"
            [output]
            json = true

            [viewport.interaction]
            click_threshold_px = 6.0
            "#,
        )
        .unwrap();
        assert!(config.output.json);
        assert_eq!(config.output.precision, 4);
        assert_eq!(config.viewport.interaction.click_threshold_px, 6.0);
        assert_eq!(config.viewport.interaction.hover_threshold_px, 2.0);
    }

    #[test]
    fn test_default_config_round_trips_through_file() {
        let dir = std::env::temp_dir().join(format!("linkview-cli-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("linkview.toml");

        save_default_config(&path).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.viewport, ViewportConfig::default());
        assert!(!loaded.output.json);

        std::fs::remove_dir_all(&dir).unwrap();
        let missing = load_config(&path).unwrap();
        assert_eq!(missing.output.precision, 4);
    }
}
