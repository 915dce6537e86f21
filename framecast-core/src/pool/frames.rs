//! CPU frame ring: the buffers handed to the transport.

use tracing::warn;

use crate::frame::FrameInfo;

/// Ring of zero-initialized CPU buffers, each sized for one full frame.
///
/// An async transport may keep referencing a published buffer until its
/// next send on the same channel, so a buffer must outlive its handoff.
/// The ring provides that guarantee structurally: a slot is not rewritten
/// until the ring has gone all the way around.
#[derive(Default)]
pub struct FramePool {
    buffers: Vec<Vec<u8>>,
    info: FrameInfo,
}

impl FramePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `depth` buffers of `info.buffer_len()` bytes each, all
    /// zeroed. Zeroed matters: the first published frame of a fresh ring
    /// is this initial content.
    pub fn allocate(&mut self, info: FrameInfo, depth: usize) {
        if self.is_allocated() {
            warn!("frame pool reallocated without release");
        }
        self.buffers = vec![vec![0; info.buffer_len()]; depth];
        self.info = info;
    }

    /// Drop every buffer. Only safe once the transport has flushed any
    /// in-flight reference.
    pub fn release(&mut self) {
        self.buffers.clear();
        self.info = FrameInfo::default();
    }

    pub fn is_allocated(&self) -> bool {
        !self.buffers.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.buffers.len()
    }

    /// Frame geometry the buffers were sized for.
    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    pub fn buffer(&self, index: usize) -> &[u8] {
        &self.buffers[index]
    }

    pub fn buffer_mut(&mut self, index: usize) -> &mut [u8] {
        &mut self.buffers[index]
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_zeroes_every_buffer() {
        let mut pool = FramePool::new();
        pool.allocate(FrameInfo::new(16, 8), 2);

        assert!(pool.is_allocated());
        assert_eq!(pool.depth(), 2);
        assert_eq!(pool.buffer(0).len(), 16 * 8 * 4);
        assert!(pool.buffer(0).iter().all(|&b| b == 0));
        assert!(pool.buffer(1).iter().all(|&b| b == 0));
    }

    #[test]
    fn release_empties_the_pool() {
        let mut pool = FramePool::new();
        pool.allocate(FrameInfo::new(16, 8), 2);
        pool.release();

        assert!(!pool.is_allocated());
        assert_eq!(pool.depth(), 0);
        assert!(pool.info().is_empty());
    }

    #[test]
    fn buffers_are_independent() {
        let mut pool = FramePool::new();
        pool.allocate(FrameInfo::new(4, 1), 2);
        pool.buffer_mut(0).fill(0xAB);

        assert!(pool.buffer(0).iter().all(|&b| b == 0xAB));
        assert!(pool.buffer(1).iter().all(|&b| b == 0));
    }
}
