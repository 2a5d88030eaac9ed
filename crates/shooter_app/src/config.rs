//! Frame driver configuration.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

/// Slowest accepted frame rate: one frame every 1000 seconds.
pub const MIN_TICK_RATE: f64 = 1e-3;

/// Configuration for the frame loop and the demo scene.
///
/// Every field is optional in a JSON config file; missing fields take their
/// default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameConfig {
    /// Target frames per second.
    pub tick_rate: f64,
    /// Maximum number of frames to run (0 = unlimited).
    pub max_frames: u64,
    /// Hierarchies the spawner creates on its first frame.
    pub spawn_count: usize,
    /// Nodes per spawned hierarchy, root included.
    pub hierarchy_depth: usize,
    /// Frames a spawned hierarchy lives before it is destroyed (0 = forever).
    pub lifetime_frames: u64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_frames: 0,
            spawn_count: 4,
            hierarchy_depth: 3,
            lifetime_frames: 0,
        }
    }
}

impl FrameConfig {
    /// Reads a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.tick_rate.is_finite() && self.tick_rate >= MIN_TICK_RATE,
            "tick_rate must be a finite number of at least {MIN_TICK_RATE}, got {}",
            self.tick_rate
        );
        ensure!(self.hierarchy_depth > 0, "hierarchy_depth must be at least 1");
        Ok(())
    }

    /// Wall-clock length of one frame.
    pub fn frame_duration(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(1.0 / self.tick_rate)
            .with_context(|| format!("tick_rate {} has no representable frame period", self.tick_rate))
    }
}
