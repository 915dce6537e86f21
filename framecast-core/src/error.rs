//! Domain-specific error types for the frame relay pipeline.
//!
//! All fallible operations return `Result<T, RelayError>`.
//! No panics on bad input — every error is typed, and everything except
//! the transport-runtime load failures is recoverable in place.

use thiserror::Error;

/// The canonical error type for the relay pipeline.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Graphics Errors ──────────────────────────────────────────
    /// A GPU render-target texture could not be created.
    #[error("texture allocation failed at {width}x{height}: {reason}")]
    TextureAllocation {
        width: u32,
        height: u32,
        reason: String,
    },

    /// A CPU-readback staging surface could not be created.
    #[error("staging surface allocation failed at {width}x{height}: {reason}")]
    StagingAllocation {
        width: u32,
        height: u32,
        reason: String,
    },

    /// The staged copy into this surface has not completed yet.
    ///
    /// Not fatal: the pipeline republishes the previous frame and
    /// retries on the next tick.
    #[error("staging surface not ready for readback")]
    StagingNotReady,

    /// Mapping or reading a staging surface failed outright.
    #[error("staging readback failed: {0}")]
    StagingRead(String),

    /// A texture or staging handle does not name a live resource.
    #[error("unknown {kind} handle: #{id}")]
    UnknownHandle { kind: &'static str, id: u64 },

    // ── Transport Runtime Errors ─────────────────────────────────
    /// The transport redistributable could not be found or opened.
    #[error("transport runtime not found (searched: {searched})")]
    RuntimeNotFound { searched: String },

    /// The library loaded but is missing a required entry point.
    #[error("transport runtime is missing symbol {0}")]
    RuntimeSymbol(&'static str),

    /// The library refused to initialize (typically an unsupported CPU).
    #[error("transport runtime failed to initialize on this machine")]
    RuntimeInit,

    // ── Publish Errors ───────────────────────────────────────────
    /// The transport rejected creation of an outbound send stream.
    #[error("sender creation failed for stream '{name}'")]
    SenderCreate { name: String },

    // ── Pipeline Errors ──────────────────────────────────────────
    /// The resize state machine was driven out of order.
    #[error("invalid resize transition: {0}")]
    ResizeTransition(&'static str),

    // ── Settings Errors ──────────────────────────────────────────
    /// The host handed us a settings payload that does not parse.
    #[error("invalid settings payload: {0}")]
    Settings(#[from] serde_json::Error),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for RelayError {
    fn from(s: String) -> Self {
        RelayError::Other(s)
    }
}

impl From<&str> for RelayError {
    fn from(s: &str) -> Self {
        RelayError::Other(s.to_string())
    }
}

impl RelayError {
    /// True for the errors that abort plugin registration entirely.
    ///
    /// Everything else is logged and survived.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelayError::RuntimeNotFound { .. }
                | RelayError::RuntimeSymbol(_)
                | RelayError::RuntimeInit
        )
    }
}
