//! Linkview - Headless robot model inspection
//!
//! Loads a model through the viewport engine and reports what it built, or
//! answers a single ray pick against it.

mod config;
mod report;

use anyhow::{bail, Context, Result};
use bevy::math::{Dir3, Ray3d, Vec3};
use clap::{Parser, Subcommand};
use linkview_core::AssetSet;
use linkview_scene::{HighlightMode, LoadStatus, RobotViewport, ViewOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "linkview")]
#[command(about = "Inspect robot models and query them headlessly")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "linkview.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a model and print its links, joints, index and inertia boxes
    Inspect {
        /// URDF or JSON model file
        model: PathBuf,
        /// Directory holding meshes and textures (defaults to the model's directory)
        #[arg(short, long)]
        assets: Option<PathBuf>,
    },
    /// Cast one ray into the loaded model and print the hit
    Pick {
        model: PathBuf,
        #[arg(short, long)]
        assets: Option<PathBuf>,
        /// Ray origin as x,y,z
        #[arg(long, value_parser = parse_vec3)]
        origin: Vec3,
        /// Ray direction as x,y,z
        #[arg(long, value_parser = parse_vec3, default_value = "0,0,-1")]
        dir: Vec3,
        /// Pick collision geometry instead of visuals
        #[arg(long)]
        collision: bool,
    },
    /// Write a configuration file with every default filled in
    InitConfig,
}

fn parse_vec3(s: &str) -> Result<Vec3, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("'{}': {}", p, e)))
        .collect::<Result<_, _>>()?;
    match parts[..] {
        [x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => Err(format!("expected x,y,z, got '{}'", s)),
    }
}

fn asset_set(model: &Path, assets: Option<&Path>) -> Result<AssetSet> {
    let root = match assets {
        Some(dir) => dir.to_path_buf(),
        None => model
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    AssetSet::from_dir(&root).with_context(|| format!("reading assets from {}", root.display()))
}

async fn load_viewport(
    config: &config::Config,
    model: &Path,
    assets: Option<&Path>,
    options: ViewOptions,
) -> Result<RobotViewport> {
    let text = std::fs::read_to_string(model)
        .with_context(|| format!("reading model {}", model.display()))?;
    let assets = asset_set(model, assets)?;
    info!(model = %model.display(), assets = assets.len(), "Loading model");

    let mut viewport = RobotViewport::new(config.viewport.clone());
    viewport.set_options(options);
    match viewport.load(text, Arc::new(assets)).await {
        LoadStatus::Ready => Ok(viewport),
        LoadStatus::Failed(e) => bail!("{}", e),
        LoadStatus::Discarded => bail!("load was superseded"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Linkview v{}", env!("CARGO_PKG_VERSION"));

    if let Command::InitConfig = args.command {
        config::save_default_config(&args.config)?;
        println!("Wrote {}", args.config.display());
        return Ok(());
    }

    let mut config = config::load_config(&args.config)?;
    if args.json {
        config.output.json = true;
    }

    match args.command {
        Command::Inspect { model, assets } => {
            let options = ViewOptions {
                show_collision: true,
                ..ViewOptions::default()
            };
            let viewport = load_viewport(&config, &model, assets.as_deref(), options).await?;
            let inspection = report::Inspection::from_viewport(&viewport);
            report::print(&inspection, &config.output)?;
        }
        Command::Pick {
            model,
            assets,
            origin,
            dir,
            collision,
        } => {
            let direction = Dir3::new(dir).map_err(|e| anyhow::anyhow!("invalid direction: {}", e))?;
            let mut options = ViewOptions::default();
            if collision {
                options.show_collision = true;
                options.highlight_mode = HighlightMode::Collision;
            }
            let viewport = load_viewport(&config, &model, assets.as_deref(), options).await?;
            let hit = viewport.pick(&Ray3d { origin, direction });
            report::print(&report::PickReport::from_hit(hit.as_ref()), &config.output)?;
        }
        Command::InitConfig => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vec3() {
        assert_eq!(parse_vec3("1, 2.5,-3").unwrap(), Vec3::new(1.0, 2.5, -3.0));
        assert!(parse_vec3("1,2").is_err());
        assert!(parse_vec3("a,b,c").is_err());
    }

    #[test]
    fn test_args_parse_pick() {
        let args = Args::try_parse_from([
            "linkview", "--json", "pick", "robot.urdf", "--origin", "0,0,5",
        ])
        .unwrap();
        assert!(args.json);
        match args.command {
            Command::Pick { origin, dir, collision, .. } => {
                assert_eq!(origin, Vec3::new(0.0, 0.0, 5.0));
                assert_eq!(dir, Vec3::NEG_Z);
                assert!(!collision);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
