//! The relay pipeline: GPU frames in, transport frames out.
//!
//! One pipeline owns the surface ring, the frame ring and the publish
//! endpoint, and advances them together once per host render tick.
//!
//! ## Ring schedule
//!
//! With ring depth `N` and cursor `i`, a tick performs:
//!
//! ```text
//! 1. render the source into texture[i]
//! 2. map staging[(i + N - 1) % N] into buffer[i]
//! 3. publish the freshest complete buffer
//! 4. queue the copy texture[i] -> staging[i]
//! 5. advance i
//! ```
//!
//! Step 2 reads the copy queued one tick earlier, so the GPU gets a full
//! tick to complete it and the map does not stall. Step 3 publishes the
//! slot most recently filled, which the ring will not rewrite for
//! another `N` ticks; that window is what lets an async transport keep
//! reading a published buffer after the handoff.
//!
//! The first frame out of a fresh ring is the zero-initialized buffer;
//! rendered content follows one tick later. A failed map republishes
//! the previous frame unchanged rather than tearing the stream.

use tracing::{debug, error, info, warn};

use crate::error::RelayError;
use crate::frame::FrameInfo;
use crate::gfx::{BlendFactor, ClearFlags, ColorSpace, FrameSource, GraphicsDevice, GraphicsScope};
use crate::pool::{FramePool, SurfacePool};
use crate::publish::PublishEndpoint;
use crate::resize::ResizePhase;
use crate::settings::FilterSettings;
use crate::transport::{Transport, VideoFrame};

const CLEAR_TRANSPARENT: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

// ── Outcome and counters ─────────────────────────────────────────

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Source reported zero dimensions; nothing rendered or published.
    Idle,
    /// The ring advanced and a frame was handed to the endpoint.
    /// `fresh` is `false` when a failed map republished the previous
    /// frame instead of new content.
    Published { fresh: bool },
}

/// Running totals since pipeline creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub ticks: u64,
    pub published: u64,
    pub skipped_idle: u64,
    pub failed_maps: u64,
    pub resizes: u64,
    /// Sender (re)connections, the initial one included.
    pub reconnects: u64,
}

// ── RelayPipeline ────────────────────────────────────────────────

/// Double-buffered (or deeper) GPU-to-transport frame relay.
pub struct RelayPipeline<T: Transport> {
    endpoint: PublishEndpoint<T>,
    surfaces: SurfacePool,
    frames: FramePool,
    info: FrameInfo,
    ring_depth: usize,
    /// Ring cursor; the slot rendered and staged this tick.
    index: usize,
    /// Slot holding the freshest complete CPU frame.
    ready: usize,
    phase: ResizePhase,
    pending_rename: bool,
    map_fail_streak: u64,
    stats: PipelineStats,
}

impl<T: Transport> RelayPipeline<T> {
    /// Build an idle pipeline. Nothing is allocated and no sender exists
    /// until [`connect_sender`](Self::connect_sender) and the first tick.
    pub fn new(transport: T, settings: &FilterSettings) -> Self {
        Self {
            endpoint: PublishEndpoint::new(transport, &settings.sender_name),
            surfaces: SurfacePool::new(),
            frames: FramePool::new(),
            info: FrameInfo::default(),
            ring_depth: settings.clamped_ring_depth(),
            index: 0,
            ready: 0,
            phase: ResizePhase::default(),
            pending_rename: false,
            map_fail_streak: 0,
            stats: PipelineStats::default(),
        }
    }

    /// Create the sender under the configured name. Failure is worth
    /// surfacing to the caller but leaves the pipeline usable; ticks
    /// simply run unpublished until a rename or resize reconnects.
    pub fn connect_sender(&mut self) -> Result<(), RelayError> {
        self.endpoint.connect()?;
        self.stats.reconnects += 1;
        Ok(())
    }

    /// Ask for the sender to be recreated under `name` on the next tick.
    /// The same name is not a rename; empty names are ignored.
    pub fn request_rename(&mut self, name: &str) {
        if name.is_empty() || name == self.endpoint.name() {
            return;
        }
        self.endpoint.set_name(name);
        self.pending_rename = true;
    }

    /// Advance the relay by one host render tick.
    ///
    /// `width`/`height` are the source's current dimensions; zero in
    /// either means the source is idle and the tick is skipped. A
    /// dimension change reconfigures before rendering.
    pub fn tick<D, S>(
        &mut self,
        device: &mut D,
        source: &mut S,
        width: u32,
        height: u32,
    ) -> Result<TickOutcome, RelayError>
    where
        D: GraphicsDevice + ?Sized,
        S: FrameSource<D> + ?Sized,
    {
        debug_assert!(self.phase.is_stable());
        self.stats.ticks += 1;

        if width == 0 || height == 0 {
            self.stats.skipped_idle += 1;
            return Ok(TickOutcome::Idle);
        }

        if (width, height) != (self.info.width, self.info.height) || !self.is_allocated() {
            self.reconfigure(&mut *device, width, height)?;
        } else if self.pending_rename {
            self.reconnect();
        }

        let mut scope = GraphicsScope::enter(&mut *device);

        // Render the source into this tick's texture, then put the
        // host's render state back exactly as found.
        let (saved_target, saved_space) = scope.render_target();
        scope.set_render_target(Some(self.surfaces.texture(self.index)), ColorSpace::Srgb);
        scope.set_viewport(0, 0, width as i32, height as i32);
        scope.clear(ClearFlags::COLOR, CLEAR_TRANSPARENT);
        scope.set_ortho(0.0, width as f32, 0.0, height as f32, -100.0, 100.0);
        scope.push_blend_state(BlendFactor::One, BlendFactor::Zero);
        source.render(&mut *scope, width, height);
        scope.pop_blend_state();
        scope.set_render_target(saved_target, saved_space);

        // Map the copy queued one tick ago.
        let prev = (self.index + self.ring_depth - 1) % self.ring_depth;
        let fresh = match scope.read_staging(
            self.surfaces.staging(prev),
            self.frames.buffer_mut(self.index),
        ) {
            Ok(()) => {
                if self.map_fail_streak > 0 {
                    debug!("staging map recovered after {} misses", self.map_fail_streak);
                    self.map_fail_streak = 0;
                }
                self.ready = self.index;
                true
            }
            Err(e) => {
                self.stats.failed_maps += 1;
                self.map_fail_streak += 1;
                if self.map_fail_streak == 1 {
                    warn!("staging map failed, republishing last frame: {e}");
                }
                false
            }
        };

        let frame = VideoFrame {
            info: *self.frames.info(),
            data: self.frames.buffer(self.ready),
        };
        if self.endpoint.publish(&frame) {
            self.stats.published += 1;
        }

        scope.stage_texture(self.surfaces.staging(self.index), self.surfaces.texture(self.index));
        self.index = (self.index + 1) % self.ring_depth;

        Ok(TickOutcome::Published { fresh })
    }

    /// Tear everything down: flush the sender, then free surfaces and
    /// buffers. The pipeline returns to its just-created state (minus
    /// the sender, which is destroyed).
    pub fn teardown<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        {
            let mut scope = GraphicsScope::enter(&mut *device);
            self.surfaces.release(&mut scope);
        }
        // Disconnect flushes before destroying, so no buffer is still
        // referenced when the frame pool goes away.
        self.endpoint.disconnect();
        self.frames.release();
        self.info = FrameInfo::default();
        self.index = 0;
        self.ready = 0;
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn endpoint(&self) -> &PublishEndpoint<T> {
        &self.endpoint
    }

    pub fn endpoint_mut(&mut self) -> &mut PublishEndpoint<T> {
        &mut self.endpoint
    }

    pub fn is_allocated(&self) -> bool {
        self.surfaces.is_allocated() && self.frames.is_allocated()
    }

    pub fn ring_depth(&self) -> usize {
        self.ring_depth
    }

    /// Current frame geometry (zero until the first tick allocates).
    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    pub fn phase(&self) -> ResizePhase {
        self.phase
    }

    // ── Reconfiguration ──────────────────────────────────────────

    /// Walk a full teardown/reallocate/reconnect cycle at the new
    /// dimensions. On allocation failure the pipeline is left empty and
    /// the error propagates; the next tick retries from scratch.
    fn reconfigure<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        width: u32,
        height: u32,
    ) -> Result<(), RelayError> {
        let first = self.info.is_empty() && !self.surfaces.is_allocated();
        if first {
            debug!("allocating {}x{} ring of {}", width, height, self.ring_depth);
        } else {
            info!(
                "resolution change {}x{} -> {}x{}",
                self.info.width, self.info.height, width, height
            );
            self.stats.resizes += 1;
        }

        self.phase.begin_teardown()?;
        {
            let mut scope = GraphicsScope::enter(&mut *device);
            self.surfaces.release(&mut scope);
        }
        // Fence the transport before the buffers it may be reading go
        // away with the frame pool. Before the first allocation there
        // is nothing to fence.
        if self.frames.is_allocated() {
            self.endpoint.flush();
        }
        self.frames.release();

        self.phase.begin_reallocate()?;
        self.info.set_resolution(width, height);
        let allocated = {
            let mut scope = GraphicsScope::enter(&mut *device);
            self.surfaces.allocate(&mut scope, &self.info, self.ring_depth)
        };
        if let Err(e) = allocated {
            error!("surface allocation failed: {e}");
            self.info = FrameInfo::default();
            self.phase.force_stable();
            return Err(e);
        }
        self.frames.allocate(self.info, self.ring_depth);
        self.index = 0;
        self.ready = 0;

        self.phase.begin_reconnect()?;
        // The sender from filter creation has seen no frames yet; keep
        // it unless a rename arrived before this first allocation.
        let keep_birth_sender = first && self.endpoint.is_connected() && !self.pending_rename;
        if !keep_birth_sender {
            self.connect_current();
        }
        self.phase.settle()?;
        Ok(())
    }

    /// Recreate the sender in place; pools and ring state stay as they
    /// are. Used for renames, and by `reconfigure` for its final phase.
    fn reconnect(&mut self) {
        // Transition failures cannot happen from Stable/Reallocate, but
        // the phase machine keeps the walk honest.
        if self.phase.begin_reconnect().is_err() {
            return;
        }
        self.connect_current();
        let _ = self.phase.settle();
    }

    fn connect_current(&mut self) {
        match self.endpoint.connect() {
            Ok(()) => {
                self.stats.reconnects += 1;
                self.pending_rename = false;
            }
            // Not fatal: ticks continue unpublished, and the rename
            // stays pending so a later tick retries.
            Err(e) => error!("sender connect failed: {e}"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
