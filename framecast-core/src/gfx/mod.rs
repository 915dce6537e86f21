//! GPU abstraction seam.
//!
//! The pipeline never talks to a graphics API directly; it drives a
//! [`GraphicsDevice`] through resource handles. Two implementations ship
//! here:
//!
//! | Module     | Purpose                                              |
//! |------------|------------------------------------------------------|
//! | `software` | Deterministic in-memory device for tests and the sim |
//! | `d3d11`    | Direct3D 11 render targets + staging (Windows only)  |
//!
//! Resource creation and destruction must happen inside the exclusive
//! graphics context; [`GraphicsScope`] expresses that as an RAII guard,
//! and the pools take the guard rather than a bare device so the rule is
//! checked at compile time. The per-tick render path runs inside the
//! host's own render callback, which already holds the context.

use bitflags::bitflags;

use crate::error::RelayError;
use crate::frame::PixelFormat;

pub mod software;

#[cfg(target_os = "windows")]
pub mod d3d11;

#[cfg(target_os = "windows")]
pub use d3d11::D3d11Device;
pub use software::SoftwareDevice;

// ── Handles ──────────────────────────────────────────────────────

/// Opaque handle to a render-target texture owned by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) u64);

impl std::fmt::Display for TextureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tex#{}", self.0)
    }
}

/// Opaque handle to a CPU-readback staging surface owned by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StagingId(pub(crate) u64);

impl std::fmt::Display for StagingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "staging#{}", self.0)
    }
}

// ── Render state types ───────────────────────────────────────────

bitflags! {
    /// Which channels a [`GraphicsDevice::clear`] touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u32 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Blend factors for the replace-style blend the render step pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    One,
    Zero,
    SrcAlpha,
    InvSrcAlpha,
}

/// Color space a render target is bound with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    #[default]
    Srgb,
    Linear,
}

// ── GraphicsDevice ───────────────────────────────────────────────

/// The narrow GPU interface the pipeline needs.
///
/// Render and copy calls are submitted asynchronously: they return once
/// queued, not once complete. The only call that observes completion is
/// [`read_staging`](Self::read_staging), which reports
/// [`RelayError::StagingNotReady`] instead of blocking when the staged
/// copy is still in flight.
pub trait GraphicsDevice {
    /// Acquire the exclusive graphics context. Re-entrant.
    fn enter_context(&mut self);
    /// Release one level of the graphics context.
    fn leave_context(&mut self);

    /// Create a render-target texture.
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<TextureId, RelayError>;

    /// Destroy a texture. Unknown handles are ignored.
    fn destroy_texture(&mut self, id: TextureId);

    /// Create a CPU-readback staging surface.
    fn create_staging(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<StagingId, RelayError>;

    /// Destroy a staging surface. Unknown handles are ignored.
    fn destroy_staging(&mut self, id: StagingId);

    /// Currently bound render target and color space (for restore).
    fn render_target(&self) -> (Option<TextureId>, ColorSpace);

    /// Bind a render target, or `None` for the host's default target.
    fn set_render_target(&mut self, target: Option<TextureId>, space: ColorSpace);

    /// Set the rasterizer viewport in pixels.
    fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32);

    /// Set an orthographic projection.
    fn set_ortho(&mut self, left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32);

    /// Clear the bound target.
    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]);

    /// Push the current blend state and install `src`/`dst` factors.
    fn push_blend_state(&mut self, src: BlendFactor, dst: BlendFactor);

    /// Restore the blend state saved by the matching push.
    fn pop_blend_state(&mut self);

    /// Queue an asynchronous GPU copy `src` texture → `dst` staging.
    fn stage_texture(&mut self, dst: StagingId, src: TextureId);

    /// Read a completed staging copy into `dst`, compacting away any
    /// device row padding. `dst` must be exactly
    /// `width * height * bytes_per_pixel` long.
    fn read_staging(&mut self, src: StagingId, dst: &mut [u8]) -> Result<(), RelayError>;
}

// ── GraphicsScope ────────────────────────────────────────────────

/// RAII guard for the exclusive graphics context.
///
/// Derefs to the device so resource calls go through the guard:
///
/// ```
/// # use framecast_core::gfx::{GraphicsScope, GraphicsDevice};
/// # use framecast_core::gfx::software::SoftwareDevice;
/// # use framecast_core::frame::PixelFormat;
/// # let mut device = SoftwareDevice::new();
/// let mut scope = GraphicsScope::enter(&mut device);
/// let tex = scope.create_texture(64, 64, PixelFormat::Rgba8).unwrap();
/// scope.destroy_texture(tex);
/// // context released when `scope` drops
/// ```
pub struct GraphicsScope<'a, D: GraphicsDevice + ?Sized> {
    device: &'a mut D,
}

impl<'a, D: GraphicsDevice + ?Sized> GraphicsScope<'a, D> {
    /// Enter the graphics context for the lifetime of the guard.
    pub fn enter(device: &'a mut D) -> Self {
        device.enter_context();
        Self { device }
    }
}

impl<D: GraphicsDevice + ?Sized> Drop for GraphicsScope<'_, D> {
    fn drop(&mut self) {
        self.device.leave_context();
    }
}

impl<D: GraphicsDevice + ?Sized> std::ops::Deref for GraphicsScope<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.device
    }
}

impl<D: GraphicsDevice + ?Sized> std::ops::DerefMut for GraphicsScope<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.device
    }
}

// ── FrameSource ──────────────────────────────────────────────────

/// Upstream content drawn into the bound render target each tick.
///
/// The host adapter supplies this; the pipeline calls it with the target
/// already bound, cleared, and fitted with projection and blend state.
/// Any `FnMut(&mut D, u32, u32)` works as a source.
pub trait FrameSource<D: GraphicsDevice + ?Sized> {
    fn render(&mut self, device: &mut D, width: u32, height: u32);
}

impl<D, F> FrameSource<D> for F
where
    D: GraphicsDevice + ?Sized,
    F: FnMut(&mut D, u32, u32),
{
    fn render(&mut self, device: &mut D, width: u32, height: u32) {
        self(device, width, height)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::software::SoftwareDevice;
    use super::*;

    #[test]
    fn scope_balances_context_depth() {
        let mut device = SoftwareDevice::new();
        {
            let mut outer = GraphicsScope::enter(&mut device);
            assert_eq!(outer.context_depth(), 1);
            {
                let inner = GraphicsScope::enter(&mut *outer);
                assert_eq!(inner.context_depth(), 2);
            }
            assert_eq!(outer.context_depth(), 1);
        }
        assert_eq!(device.context_depth(), 0);
    }

    #[test]
    fn closures_are_frame_sources() {
        let mut device = SoftwareDevice::new();
        let mut called_with = (0, 0);
        let mut source = |_d: &mut SoftwareDevice, w: u32, h: u32| {
            called_with = (w, h);
        };
        source.render(&mut device, 640, 360);
        assert_eq!(called_with, (640, 360));
    }

    #[test]
    fn clear_flags_compose() {
        let flags = ClearFlags::COLOR | ClearFlags::DEPTH;
        assert!(flags.contains(ClearFlags::COLOR));
        assert!(!flags.contains(ClearFlags::STENCIL));
    }
}
