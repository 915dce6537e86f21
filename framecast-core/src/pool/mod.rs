//! Frame buffer pools.
//!
//! The relay owns two pools sized to the same ring depth:
//!
//! - [`SurfacePool`] — GPU render textures plus CPU-readable staging
//!   surfaces. Lives entirely inside the graphics context; allocation
//!   and release require a [`GraphicsScope`](crate::gfx::GraphicsScope).
//! - [`FramePool`] — plain CPU byte buffers handed to the transport.
//!   No graphics context involved, so teardown can release it after the
//!   scope has ended, once the transport has flushed.
//!
//! Both pools are fully allocated or fully empty. A failed allocation
//! rolls back whatever was created, leaving the pool empty.

pub mod frames;
pub mod surfaces;

pub use frames::FramePool;
pub use surfaces::SurfacePool;
