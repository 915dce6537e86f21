//! # framecast-core
//!
//! Core library for the Framecast publish filter: relays a host
//! compositor's rendered frames to an NDI sender through a ring of
//! in-flight GPU readbacks.
//!
//! This crate contains:
//! - **Frame types**: `FrameInfo`, `PixelFormat`, `ScanMode` for the fixed
//!   RGBA8 progressive frame geometry
//! - **Graphics**: `GraphicsDevice` trait, `GraphicsScope` context guard,
//!   software and Direct3D 11 backends
//! - **Pools**: `SurfacePool` and `FramePool`, the GPU and CPU halves of
//!   the transport ring
//! - **Transport**: `Transport` trait, the recording `MemoryTransport`,
//!   and the NDI runtime binding
//! - **Pipeline**: `RelayPipeline` per-tick controller with the
//!   `ResizePhase` reconfiguration machine
//! - **Filter**: `FilterHooks` host seam and the `RelayFilter` adapter
//! - **Error**: the typed `RelayError` hierarchy built on `thiserror`

pub mod error;
pub mod filter;
pub mod frame;
pub mod gfx;
pub mod ndi;
pub mod pipeline;
pub mod pool;
pub mod publish;
pub mod resize;
pub mod settings;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use error::RelayError;
pub use filter::{FilterHooks, RelayFilter};
pub use frame::{FRAME_RATE_D, FRAME_RATE_N, FrameInfo, PixelFormat, ScanMode};
pub use gfx::{
    BlendFactor, ClearFlags, ColorSpace, FrameSource, GraphicsDevice, GraphicsScope,
    SoftwareDevice, StagingId, TextureId,
};
pub use ndi::{NdiRuntime, NdiTransport};
pub use pipeline::{PipelineStats, RelayPipeline, TickOutcome};
pub use pool::{FramePool, SurfacePool};
pub use publish::PublishEndpoint;
pub use resize::ResizePhase;
pub use settings::{DEFAULT_SENDER_NAME, FilterSettings};
pub use transport::{MemoryTransport, SenderHandle, Transport, TransportEvent, VideoFrame};

/// Crate version, reported alongside the transport runtime's version at
/// load time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
