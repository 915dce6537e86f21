//! GPU surface ring: render textures and their staging partners.

use tracing::warn;

use crate::error::RelayError;
use crate::frame::FrameInfo;
use crate::gfx::{GraphicsDevice, GraphicsScope, StagingId, TextureId};

/// A ring of render textures paired with CPU-readable staging surfaces.
///
/// Slot `i` of each vector belongs to ring slot `i`. The pool never
/// touches the device outside the [`GraphicsScope`] passed in, which is
/// what makes the "GPU work only inside a context" rule checkable at
/// compile time.
#[derive(Default)]
pub struct SurfacePool {
    textures: Vec<TextureId>,
    stagings: Vec<StagingId>,
    width: u32,
    height: u32,
}

impl SurfacePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `depth` texture/staging pairs at the resolution carried
    /// by `info`. On failure every surface created so far is destroyed
    /// and the pool is left empty.
    pub fn allocate<D: GraphicsDevice + ?Sized>(
        &mut self,
        scope: &mut GraphicsScope<'_, D>,
        info: &FrameInfo,
        depth: usize,
    ) -> Result<(), RelayError> {
        if self.is_allocated() {
            warn!("surface pool reallocated without release");
            self.release(scope);
        }

        let result = self.allocate_inner(scope, info, depth);
        if result.is_err() {
            self.release(scope);
        }
        result
    }

    fn allocate_inner<D: GraphicsDevice + ?Sized>(
        &mut self,
        scope: &mut GraphicsScope<'_, D>,
        info: &FrameInfo,
        depth: usize,
    ) -> Result<(), RelayError> {
        for _ in 0..depth {
            let tex = scope.create_texture(info.width, info.height, info.format)?;
            self.textures.push(tex);
        }
        for _ in 0..depth {
            let staging = scope.create_staging(info.width, info.height, info.format)?;
            self.stagings.push(staging);
        }
        self.width = info.width;
        self.height = info.height;
        Ok(())
    }

    /// Destroy every surface and empty the pool.
    pub fn release<D: GraphicsDevice + ?Sized>(&mut self, scope: &mut GraphicsScope<'_, D>) {
        for tex in self.textures.drain(..) {
            scope.destroy_texture(tex);
        }
        for staging in self.stagings.drain(..) {
            scope.destroy_staging(staging);
        }
        self.width = 0;
        self.height = 0;
    }

    pub fn is_allocated(&self) -> bool {
        !self.textures.is_empty()
    }

    /// Number of texture/staging pairs.
    pub fn depth(&self) -> usize {
        self.textures.len()
    }

    /// Render texture for ring slot `index`.
    pub fn texture(&self, index: usize) -> TextureId {
        self.textures[index]
    }

    /// Staging surface for ring slot `index`.
    pub fn staging(&self, index: usize) -> StagingId {
        self.stagings[index]
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

// ── Tests ────────────────────────────────────────────────────────
