use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use log::{LevelFilter, info};
use std::path::PathBuf;

mod common;
mod control;
mod simulation;

use control::{SimulatorConfig, runner};

/// Simulate file transfers between ground devices and satellites around Jupiter.
#[derive(Parser, Debug)]
#[command(name = "blackout-simulator", version, about, long_about = None)]
struct Cli {
    /// Scene JSON file
    scene: String,

    /// Number of ticks to run, overriding the scene's `ticks`
    #[arg(long)]
    ticks: Option<u64>,

    /// Runner configuration; defaults to config.toml next to the scene
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = SimulatorConfig::resolve(cli.config.as_deref(), &cli.scene)
        .map_err(anyhow::Error::msg)
        .context("Failed to load runner configuration")?;
    let level = config.level_filter().map_err(anyhow::Error::msg)?;

    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter(Some("blackout_simulator"), level)
        .parse_default_env()
        .init();

    info!("Starting up");

    let scene = common::scene::load_scene(&cli.scene).with_context(|| format!("Failed to load scene {}", cli.scene))?;
    let ticks = cli.ticks.or(scene.ticks).unwrap_or(0);

    let report = runner::run(&scene, ticks, &config);
    println!("{}", report.to_json(config.pretty).context("Failed to render report")?);
    Ok(())
}
