//! Deterministic in-memory graphics device.
//!
//! Backs the simulator and every test that needs a GPU-shaped collaborator
//! without a GPU. Command-queue asynchrony is modeled with a frame counter:
//! a staged copy snapshots the texture at submission and becomes mappable
//! once [`end_frame`](SoftwareDevice::end_frame) has been called
//! `readback_latency` times. Until then [`read_staging`] reports
//! [`RelayError::StagingNotReady`], exactly like a real device mid-copy.
//!
//! [`read_staging`]: crate::gfx::GraphicsDevice::read_staging

use std::collections::HashMap;

use tracing::warn;

use crate::error::RelayError;
use crate::frame::PixelFormat;
use crate::gfx::{BlendFactor, ClearFlags, ColorSpace, GraphicsDevice, StagingId, TextureId};

struct SoftTexture {
    width: u32,
    height: u32,
    format: PixelFormat,
    /// Tightly packed rows, `width * bpp * height` bytes.
    data: Vec<u8>,
}

struct PendingCopy {
    /// Pitched snapshot of the source texture at submission time.
    rows: Vec<u8>,
    /// Frame counter value at which the copy completes.
    ready_at: u64,
}

struct SoftStaging {
    width: u32,
    height: u32,
    format: PixelFormat,
    /// Row pitch in bytes, `width * bpp + row_padding`.
    pitch: u32,
    /// Last completed copy, `pitch * height` bytes. Zeroed at creation,
    /// so a never-staged surface reads back as zeros.
    rows: Vec<u8>,
    pending: Option<PendingCopy>,
}

/// In-memory [`GraphicsDevice`] with configurable readback latency.
pub struct SoftwareDevice {
    textures: HashMap<u64, SoftTexture>,
    stagings: HashMap<u64, SoftStaging>,
    next_id: u64,

    /// Advances on [`end_frame`](Self::end_frame).
    frame: u64,
    /// Frames a staged copy stays in flight. Default 1.
    readback_latency: u64,
    /// Extra bytes appended to each staging row. Default 0.
    row_padding: u32,
    /// Remaining successful allocations before creates start failing.
    alloc_budget: Option<u64>,

    bound_target: Option<TextureId>,
    color_space: ColorSpace,
    viewport: (i32, i32, i32, i32),
    ortho: [f32; 6],
    blend_stack: Vec<(BlendFactor, BlendFactor)>,
    context_depth: u32,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            stagings: HashMap::new(),
            next_id: 1,
            frame: 0,
            readback_latency: 1,
            row_padding: 0,
            alloc_budget: None,
            bound_target: None,
            color_space: ColorSpace::Srgb,
            viewport: (0, 0, 0, 0),
            ortho: [0.0; 6],
            blend_stack: Vec::new(),
            context_depth: 0,
        }
    }

    /// Advance the device's notion of GPU time by one frame. The harness
    /// calls this once per host tick.
    pub fn end_frame(&mut self) {
        self.frame += 1;
    }

    /// How many frames a staged copy stays in flight before it can be
    /// read back. `0` completes within the same frame.
    pub fn set_readback_latency(&mut self, frames: u64) {
        self.readback_latency = frames;
    }

    /// Pad staging rows by `bytes`, emulating GPU row-pitch alignment.
    /// Affects surfaces created after the call.
    pub fn set_row_padding(&mut self, bytes: u32) {
        self.row_padding = bytes;
    }

    /// Let the next `n` resource creations succeed, then fail the rest.
    pub fn limit_allocations(&mut self, n: u64) {
        self.alloc_budget = Some(n);
    }

    /// Paint the bound render target with a repeating pixel pattern.
    /// Stands in for a host draw call in tests and the simulator.
    pub fn fill_target(&mut self, pixel: [u8; 4]) {
        let Some(TextureId(id)) = self.bound_target else {
            warn!("fill_target with no render target bound");
            return;
        };
        let Some(tex) = self.textures.get_mut(&id) else {
            warn!("fill_target: bound texture #{id} no longer exists");
            return;
        };
        let bpp = tex.format.bytes_per_pixel();
        for chunk in tex.data.chunks_mut(bpp) {
            chunk.copy_from_slice(&pixel[..bpp]);
        }
    }

    /// Live texture count (leak checks).
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Live staging-surface count (leak checks).
    pub fn staging_count(&self) -> usize {
        self.stagings.len()
    }

    /// Sorted ids of all live textures (identity checks across resizes).
    pub fn texture_ids(&self) -> Vec<TextureId> {
        let mut ids: Vec<_> = self.textures.keys().map(|&id| TextureId(id)).collect();
        ids.sort();
        ids
    }

    /// Current nesting depth of the graphics context.
    pub fn context_depth(&self) -> u32 {
        self.context_depth
    }

    /// Orthographic projection parameters from the last `set_ortho`:
    /// `[left, right, top, bottom, near, far]`.
    pub fn ortho_params(&self) -> [f32; 6] {
        self.ortho
    }

    /// Viewport from the last `set_viewport`: `(x, y, width, height)`.
    pub fn viewport(&self) -> (i32, i32, i32, i32) {
        self.viewport
    }

    fn take_alloc_budget(&mut self) -> bool {
        match self.alloc_budget {
            Some(0) => false,
            Some(ref mut n) => {
                *n -= 1;
                true
            }
            None => true,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for SoftwareDevice {
    fn enter_context(&mut self) {
        self.context_depth += 1;
    }

    fn leave_context(&mut self) {
        if self.context_depth == 0 {
            warn!("graphics context released more times than acquired");
            return;
        }
        self.context_depth -= 1;
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<TextureId, RelayError> {
        if !self.take_alloc_budget() {
            return Err(RelayError::TextureAllocation {
                width,
                height,
                reason: "allocation budget exhausted".into(),
            });
        }
        let len = width as usize * height as usize * format.bytes_per_pixel();
        let id = self.next_id();
        self.textures.insert(
            id,
            SoftTexture {
                width,
                height,
                format,
                data: vec![0; len],
            },
        );
        Ok(TextureId(id))
    }

    fn destroy_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id.0).is_none() {
            warn!("destroy of unknown {id}");
        }
        if self.bound_target == Some(id) {
            self.bound_target = None;
        }
    }

    fn create_staging(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<StagingId, RelayError> {
        if !self.take_alloc_budget() {
            return Err(RelayError::StagingAllocation {
                width,
                height,
                reason: "allocation budget exhausted".into(),
            });
        }
        let pitch = width * format.bytes_per_pixel() as u32 + self.row_padding;
        let id = self.next_id();
        self.stagings.insert(
            id,
            SoftStaging {
                width,
                height,
                format,
                pitch,
                rows: vec![0; pitch as usize * height as usize],
                pending: None,
            },
        );
        Ok(StagingId(id))
    }

    fn destroy_staging(&mut self, id: StagingId) {
        if self.stagings.remove(&id.0).is_none() {
            warn!("destroy of unknown {id}");
        }
    }

    fn render_target(&self) -> (Option<TextureId>, ColorSpace) {
        (self.bound_target, self.color_space)
    }

    fn set_render_target(&mut self, target: Option<TextureId>, space: ColorSpace) {
        self.bound_target = target;
        self.color_space = space;
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.viewport = (x, y, width, height);
    }

    fn set_ortho(&mut self, left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) {
        self.ortho = [left, right, top, bottom, near, far];
    }

    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]) {
        if !flags.contains(ClearFlags::COLOR) {
            return;
        }
        let pixel = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        self.fill_target(pixel);
    }

    fn push_blend_state(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.blend_stack.push((src, dst));
    }

    fn pop_blend_state(&mut self) {
        if self.blend_stack.pop().is_none() {
            warn!("blend state popped with empty stack");
        }
    }

    fn stage_texture(&mut self, dst: StagingId, src: TextureId) {
        let Some(tex) = self.textures.get(&src.0) else {
            warn!("stage from unknown {src}");
            return;
        };
        let Some(staging) = self.stagings.get_mut(&dst.0) else {
            warn!("stage into unknown {dst}");
            return;
        };
        if (tex.width, tex.height) != (staging.width, staging.height) {
            warn!(
                "stage size mismatch: {}x{} texture into {}x{} staging",
                tex.width, tex.height, staging.width, staging.height
            );
            return;
        }
        // Snapshot at submission: later texture writes must not leak in.
        let bpp = tex.format.bytes_per_pixel();
        let tight = tex.width as usize * bpp;
        let mut rows = vec![0u8; staging.pitch as usize * staging.height as usize];
        for y in 0..tex.height as usize {
            let src_row = &tex.data[y * tight..(y + 1) * tight];
            let dst_start = y * staging.pitch as usize;
            rows[dst_start..dst_start + tight].copy_from_slice(src_row);
        }
        staging.pending = Some(PendingCopy {
            rows,
            ready_at: self.frame + self.readback_latency,
        });
    }

    fn read_staging(&mut self, src: StagingId, dst: &mut [u8]) -> Result<(), RelayError> {
        let staging = self
            .stagings
            .get_mut(&src.0)
            .ok_or(RelayError::UnknownHandle {
                kind: "staging",
                id: src.0,
            })?;

        if let Some(pending) = &staging.pending {
            if self.frame < pending.ready_at {
                return Err(RelayError::StagingNotReady);
            }
            let done = staging.pending.take();
            if let Some(done) = done {
                staging.rows = done.rows;
            }
        }

        let bpp = staging.format.bytes_per_pixel();
        let tight = staging.width as usize * bpp;
        let expected = tight * staging.height as usize;
        if dst.len() != expected {
            return Err(RelayError::StagingRead(format!(
                "destination is {} bytes, surface holds {}",
                dst.len(),
                expected
            )));
        }
        for y in 0..staging.height as usize {
            let src_start = y * staging.pitch as usize;
            dst[y * tight..(y + 1) * tight]
                .copy_from_slice(&staging.rows[src_start..src_start + tight]);
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
