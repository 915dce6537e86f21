//! Host adapter: the filter as the compositor sees it.
//!
//! [`FilterHooks`] is the narrow surface a host plugin framework drives:
//! render callback, settings-changed callback, destroy callback. The
//! [`RelayFilter`] implementation is a thin shell over [`RelayPipeline`]
//! that keeps host-ABI concerns (tolerate bad settings documents, stay
//! alive through tick errors, survive double destroy) out of the
//! pipeline core.

use tracing::{debug, error, warn};

use crate::error::RelayError;
use crate::gfx::{FrameSource, GraphicsDevice};
use crate::pipeline::RelayPipeline;
use crate::settings::FilterSettings;
use crate::transport::Transport;

// ── FilterHooks ──────────────────────────────────────────────────

/// The callbacks a host invokes on a video filter.
pub trait FilterHooks {
    /// One host render tick. `width`/`height` are the dimensions of the
    /// source being filtered, zero when the source is inactive.
    fn render_tick<D, S>(&mut self, device: &mut D, source: &mut S, width: u32, height: u32)
    where
        D: GraphicsDevice + ?Sized,
        S: FrameSource<D> + ?Sized;

    /// The host's settings document changed.
    fn update_settings(&mut self, payload: &str) -> Result<(), RelayError>;

    /// The filter is being destroyed.
    fn teardown<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D);

    /// `true` when the filter replaces the host's own video output for
    /// this source instead of adding to it.
    fn skips_host_output(&self) -> bool;
}

// ── RelayFilter ──────────────────────────────────────────────────

/// The publish filter: relays whatever the host renders to a transport
/// sender, bypassing the host's own output path.
pub struct RelayFilter<T: Transport> {
    pipeline: RelayPipeline<T>,
    torn_down: bool,
    tick_error_streak: u64,
}

impl<T: Transport> RelayFilter<T> {
    /// Create the filter from the host's settings document. A document
    /// that does not parse falls back to defaults rather than failing
    /// creation; a sender that cannot be created leaves the filter
    /// running unpublished.
    pub fn new(transport: T, payload: &str) -> Self {
        let settings = FilterSettings::from_json(payload).unwrap_or_else(|e| {
            warn!("settings document unusable ({e}), using defaults");
            FilterSettings::default()
        });

        let mut pipeline = RelayPipeline::new(transport, &settings);
        if let Err(e) = pipeline.connect_sender() {
            error!("sender '{}' not created: {e}", settings.sender_name);
        }

        Self {
            pipeline,
            torn_down: false,
            tick_error_streak: 0,
        }
    }

    pub fn pipeline(&self) -> &RelayPipeline<T> {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut RelayPipeline<T> {
        &mut self.pipeline
    }
}

impl<T: Transport> FilterHooks for RelayFilter<T> {
    fn render_tick<D, S>(&mut self, device: &mut D, source: &mut S, width: u32, height: u32)
    where
        D: GraphicsDevice + ?Sized,
        S: FrameSource<D> + ?Sized,
    {
        if self.torn_down {
            return;
        }
        match self.pipeline.tick(device, source, width, height) {
            Ok(_) => {
                if self.tick_error_streak > 0 {
                    debug!("tick recovered after {} failures", self.tick_error_streak);
                    self.tick_error_streak = 0;
                }
            }
            // The host render loop must keep running; log and try again
            // next tick.
            Err(e) => {
                self.tick_error_streak += 1;
                if self.tick_error_streak == 1 {
                    error!("tick failed: {e}");
                }
            }
        }
    }

    fn update_settings(&mut self, payload: &str) -> Result<(), RelayError> {
        if self.torn_down {
            return Ok(());
        }
        let settings = FilterSettings::from_json(payload)?;

        if settings.clamped_ring_depth() != self.pipeline.ring_depth() {
            warn!(
                "ring depth is fixed at creation ({}); re-create the filter to change it",
                self.pipeline.ring_depth()
            );
        }

        // Takes effect on the next tick's reconnect.
        self.pipeline.request_rename(&settings.sender_name);
        Ok(())
    }

    fn teardown<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        if self.torn_down {
            return;
        }
        self.pipeline.teardown(device);
        self.torn_down = true;
    }

    fn skips_host_output(&self) -> bool {
        true
    }
}

// ── Tests ────────────────────────────────────────────────────────
