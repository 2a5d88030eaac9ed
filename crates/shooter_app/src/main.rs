//! # shooter_app: frame driver
//!
//! Owns the registry and runs the demo scene at a fixed rate.
//!
//! ## Startup sequence
//!
//! 1. Load [`FrameConfig`] from `--config` (JSON) or defaults.
//! 2. Apply command-line overrides.
//! 3. Register systems: spawner, spinner, reporter.
//! 4. Enter the frame loop; the registry is cleaned up on exit.

mod config;
mod frame;
mod systems;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::FrameConfig;
use frame::FrameLoop;
use systems::{Reporter, Spawner, Spinner};

#[derive(Parser)]
#[command(name = "shooter_app", about = "Runs the shooter core frame loop")]
struct Cli {
    /// Path to a JSON frame config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target frames per second
    #[arg(long)]
    tick_rate: Option<f64>,

    /// Stop after this many frames (0 = run forever)
    #[arg(long)]
    max_frames: Option<u64>,

    /// Number of hierarchies to keep alive
    #[arg(long)]
    spawn_count: Option<usize>,

    /// Frames between registry reports
    #[arg(long, default_value_t = 60)]
    report_every: u64,
}

impl Cli {
    fn frame_config(&self) -> Result<FrameConfig> {
        let mut config = match &self.config {
            Some(path) => FrameConfig::load(path)?,
            None => FrameConfig::default(),
        };
        if let Some(tick_rate) = self.tick_rate {
            config.tick_rate = tick_rate;
        }
        if let Some(max_frames) = self.max_frames {
            config.max_frames = max_frames;
        }
        if let Some(spawn_count) = self.spawn_count {
            config.spawn_count = spawn_count;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("shooter_app=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = cli.frame_config()?;
    info!(?config, "shooter core starting");

    let mut frames = FrameLoop::new(config.clone());
    frames.add_system(Spawner::new(&config));
    frames.add_system(Spinner);
    frames.add_system(Reporter::new(cli.report_every));
    frames.run()?;

    info!(frames = frames.frame_id(), "shooter core shut down");
    Ok(())
}
