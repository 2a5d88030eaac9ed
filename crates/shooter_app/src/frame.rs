//! Fixed-rate frame loop.
//!
//! Each frame:
//!
//! 1. Advance the frame counter.
//! 2. Flush the registry's pending mutations.
//! 3. Run every system in registration order.
//!
//! The flush is the only point where structural changes become visible, so
//! all systems in one frame see the same component set.

use std::time::Instant;

use anyhow::Result;
use shooter_ecs::Registry;
use tracing::{debug, info, warn};

use crate::config::FrameConfig;
use crate::systems::System;

/// The frame loop: a registry plus the systems that run against it.
pub struct FrameLoop {
    frame_id: u64,
    config: FrameConfig,
    registry: Registry,
    systems: Vec<Box<dyn System>>,
}

impl FrameLoop {
    #[must_use]
    pub fn new(config: FrameConfig) -> Self {
        Self {
            frame_id: 0,
            config,
            registry: Registry::new(),
            systems: Vec::new(),
        }
    }

    /// Appends a system; systems run in the order they were added.
    pub fn add_system(&mut self, system: impl System + 'static) {
        info!(system = system.name(), "system registered");
        self.systems.push(Box::new(system));
    }

    #[must_use]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Runs one frame with timestep `dt` seconds.
    pub fn frame(&mut self, dt: f32) {
        self.frame_id += 1;
        let applied = self.registry.process_pending_operations();
        debug!(frame_id = self.frame_id, dt, applied, "frame start");

        for system in &mut self.systems {
            system.update(&mut self.registry, dt);
        }
    }

    /// Runs frames at the configured rate until `max_frames` is reached,
    /// then tears the registry down.
    ///
    /// Fails without running a frame if the tick rate has no representable
    /// frame period.
    pub fn run(&mut self) -> Result<()> {
        let frame_duration = self.config.frame_duration()?;
        let dt = frame_duration.as_secs_f32();
        let mut frame_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_frames = self.config.max_frames,
            systems = self.systems.len(),
            "starting frame loop"
        );

        loop {
            let start = Instant::now();
            self.frame(dt);

            frame_count += 1;
            if self.config.max_frames > 0 && frame_count >= self.config.max_frames {
                info!(frames = frame_count, "frame loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            } else {
                warn!(
                    frame_id = self.frame_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = frame_duration.as_millis() as u64,
                    "frame exceeded time budget"
                );
            }
        }

        self.registry.cleanup();
        Ok(())
    }
}
