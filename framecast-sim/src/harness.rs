//! Tick driver and test pattern source.
//!
//! Stands in for the compositor host: calls the filter's render hook
//! at a fixed tick rate, feeds it a procedural color-cycle pattern,
//! and applies the scripted resize/rename events mid-run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use framecast_core::{
    FilterHooks, FrameSource, PipelineStats, RelayError, RelayFilter, SoftwareDevice, Transport,
};
use tracing::info;

use crate::config::SimConfig;

// ── TestPattern ──────────────────────────────────────────────────

/// Solid-color source that steps through a channel ramp each tick, so
/// consecutive published frames are always distinguishable.
pub struct TestPattern {
    tick: u64,
}

impl TestPattern {
    pub fn new() -> Self {
        Self { tick: 0 }
    }

    /// Color rendered on a given tick. Alpha stays opaque; the color
    /// channels ramp at staggered rates.
    fn color_at(tick: u64) -> [u8; 4] {
        let phase = (tick % 256) as u8;
        [phase, phase.wrapping_mul(3), phase.wrapping_mul(7), 255]
    }
}

impl FrameSource<SoftwareDevice> for TestPattern {
    fn render(&mut self, device: &mut SoftwareDevice, _width: u32, _height: u32) {
        device.fill_target(Self::color_at(self.tick));
        self.tick += 1;
    }
}

// ── SimHarness ───────────────────────────────────────────────────

/// Drives one relay filter over the software graphics device.
///
/// # Lifetime
///
/// Call [`run`](Self::run) to start the tick loop. It runs for the
/// configured tick count, or until the [`stop_handle`](Self::stop_handle)
/// flag is cleared.
pub struct SimHarness<T: Transport> {
    config: SimConfig,
    filter: RelayFilter<T>,
    device: SoftwareDevice,
    pattern: TestPattern,
    running: Arc<AtomicBool>,
}

impl<T: Transport> SimHarness<T> {
    /// Create a harness around a filter built from the config.
    pub fn new(config: SimConfig, transport: T) -> Result<Self, RelayError> {
        let payload = serde_json::to_string(&config.to_filter_settings())?;
        let filter = RelayFilter::new(transport, &payload);
        Ok(Self {
            config,
            filter,
            device: SoftwareDevice::new(),
            pattern: TestPattern::new(),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// A cloneable handle that can be used to stop the run from
    /// another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run the tick loop, then tear the filter down and report totals.
    pub async fn run(mut self) -> Result<PipelineStats, RelayError> {
        self.running.store(true, Ordering::SeqCst);
        let tick_rate = self.config.timing.tick_rate.max(1);
        let tick_interval = Duration::from_secs_f64(1.0 / f64::from(tick_rate));
        let total = self.config.timing.ticks;
        let mut tick: u64 = 0;
        let mut last_report = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            if total != 0 && tick >= total {
                break;
            }
            let loop_start = Instant::now();
            tick += 1;

            self.step(tick)?;

            // Progress line every few seconds on long runs.
            if last_report.elapsed() > Duration::from_secs(5) {
                let stats = self.filter.pipeline().stats();
                info!(
                    "tick {tick}: {} published, {} failed maps",
                    stats.published, stats.failed_maps
                );
                last_report = Instant::now();
            }

            Self::pace(loop_start, tick_interval).await;
        }

        let stats = self.filter.pipeline().stats();
        self.filter.teardown(&mut self.device);
        info!(
            "run complete: {} ticks, {} published, {} idle, {} failed maps, {} resizes, {} reconnects",
            stats.ticks,
            stats.published,
            stats.skipped_idle,
            stats.failed_maps,
            stats.resizes,
            stats.reconnects
        );
        Ok(stats)
    }

    /// One host tick: apply scripted events, render, advance GPU time.
    fn step(&mut self, tick: u64) -> Result<(), RelayError> {
        if self.config.script.rename_at_tick != 0 && tick == self.config.script.rename_at_tick {
            let mut settings = self.config.to_filter_settings();
            settings.sender_name = self.config.script.rename_to.clone();
            info!("tick {tick}: scripted rename to {:?}", settings.sender_name);
            let payload = serde_json::to_string(&settings)?;
            self.filter.update_settings(&payload)?;
        }

        let (width, height) = self.target_dimensions(tick);
        self.filter
            .render_tick(&mut self.device, &mut self.pattern, width, height);
        self.device.end_frame();
        Ok(())
    }

    /// Output dimensions for a tick, honoring the scripted resize.
    fn target_dimensions(&self, tick: u64) -> (u32, u32) {
        let script = &self.config.script;
        if script.resize_at_tick != 0 && tick >= script.resize_at_tick {
            (script.resize_width, script.resize_height)
        } else {
            (self.config.pattern.width, self.config.pattern.height)
        }
    }

    /// Sleep for the remainder of the tick interval.
    async fn pace(loop_start: Instant, interval: Duration) {
        let elapsed = loop_start.elapsed();
        if elapsed < interval {
            tokio::time::sleep(interval - elapsed).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use framecast_core::MemoryTransport;

    #[test]
    fn pattern_colors_change_every_tick() {
        let a = TestPattern::color_at(0);
        let b = TestPattern::color_at(1);
        assert_ne!(a, b);
        assert_eq!(a[3], 255);
        assert_eq!(b[3], 255);
    }

    #[test]
    fn scripted_resize_switches_dimensions() {
        let mut config = SimConfig::default();
        config.script.resize_at_tick = 10;
        config.script.resize_width = 640;
        config.script.resize_height = 360;
        let harness = SimHarness::new(config, MemoryTransport::new()).unwrap();
        assert_eq!(harness.target_dimensions(9), (1280, 720));
        assert_eq!(harness.target_dimensions(10), (640, 360));
        assert_eq!(harness.target_dimensions(11), (640, 360));
    }

    #[tokio::test]
    async fn bounded_dry_run_completes() {
        let mut config = SimConfig::default();
        config.timing.ticks = 5;
        config.timing.tick_rate = 1000;
        config.pattern.width = 16;
        config.pattern.height = 9;
        let harness = SimHarness::new(config, MemoryTransport::new()).unwrap();
        let stats = harness.run().await.unwrap();
        assert_eq!(stats.ticks, 5);
        assert_eq!(stats.published, 5);
        assert_eq!(stats.failed_maps, 0);
    }

    #[tokio::test]
    async fn scripted_run_resizes_and_renames() {
        let mut config = SimConfig::default();
        config.timing.ticks = 8;
        config.timing.tick_rate = 1000;
        config.pattern.width = 16;
        config.pattern.height = 9;
        config.script.resize_at_tick = 4;
        config.script.resize_width = 8;
        config.script.resize_height = 5;
        config.script.rename_at_tick = 6;
        config.script.rename_to = "Sim Renamed".into();
        let harness = SimHarness::new(config, MemoryTransport::new()).unwrap();
        let stats = harness.run().await.unwrap();
        assert_eq!(stats.ticks, 8);
        assert_eq!(stats.resizes, 1);
        // Initial connect, resize reconnect, rename reconnect.
        assert_eq!(stats.reconnects, 3);
        assert_eq!(stats.published, 8);
    }
}
