//! Transport seam between the relay pipeline and frame delivery.
//!
//! The pipeline never talks to a wire directly. It drives a [`Transport`]:
//! create a named sender, hand it borrowed frames, flush, destroy. The
//! production implementation is [`NdiTransport`](crate::ndi::NdiTransport);
//! tests and the simulator use [`MemoryTransport`], which records every
//! call instead of sending anything.
//!
//! ## Handoff contract
//!
//! [`send_video`](Transport::send_video) is an async handoff: the
//! transport may keep reading the frame's bytes until the *next* send on
//! the same sender completes. Callers own the buffers and must keep a
//! published buffer intact for that window; sending `None` flushes the
//! sender, after which no buffer is referenced.

use std::collections::HashMap;

use tracing::warn;

use crate::error::RelayError;
use crate::frame::FrameInfo;

// ── Frame view ───────────────────────────────────────────────────

/// One video frame, borrowed from the caller's frame pool.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrame<'a> {
    pub info: FrameInfo,
    /// Tightly packed pixel rows, `info.buffer_len()` bytes.
    pub data: &'a [u8],
}

// ── Transport ────────────────────────────────────────────────────

/// Opaque id of a live sender inside a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SenderHandle(pub(crate) u64);

impl std::fmt::Display for SenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sender#{}", self.0)
    }
}

/// A frame delivery backend.
pub trait Transport {
    /// Create a named sender. `clock_video` asks the transport to pace
    /// submissions to the frame rate; the relay passes `false` because
    /// the host's render loop already paces it.
    fn create_sender(&mut self, name: &str, clock_video: bool)
    -> Result<SenderHandle, RelayError>;

    /// Destroy a sender. Callers flush first; see the handoff contract.
    fn destroy_sender(&mut self, handle: SenderHandle);

    /// Hand one frame to the sender, or flush it with `None`. Flushing
    /// blocks until the previously sent buffer is no longer referenced.
    fn send_video(&mut self, handle: SenderHandle, frame: Option<&VideoFrame<'_>>);
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn create_sender(
        &mut self,
        name: &str,
        clock_video: bool,
    ) -> Result<SenderHandle, RelayError> {
        (**self).create_sender(name, clock_video)
    }

    fn destroy_sender(&mut self, handle: SenderHandle) {
        (**self).destroy_sender(handle)
    }

    fn send_video(&mut self, handle: SenderHandle, frame: Option<&VideoFrame<'_>>) {
        (**self).send_video(handle, frame)
    }
}

// ── MemoryTransport ──────────────────────────────────────────────

/// Everything a [`MemoryTransport`] observed, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    SenderCreated {
        handle: SenderHandle,
        name: String,
    },
    SenderDestroyed {
        handle: SenderHandle,
    },
    FrameSent {
        handle: SenderHandle,
        width: u32,
        height: u32,
        bytes: usize,
        /// Copy of the frame bytes, kept only when payload retention is on.
        payload: Option<Vec<u8>>,
    },
    Flushed {
        handle: SenderHandle,
    },
}

/// Recording transport for tests and the simulator.
///
/// Payload retention is off by default; frame geometry and byte counts
/// are always recorded, the pixel data itself only on request (a minute
/// of 1080p is upwards of 30 GB).
#[derive(Default)]
pub struct MemoryTransport {
    events: Vec<TransportEvent>,
    live: HashMap<u64, String>,
    next_handle: u64,
    retain_payloads: bool,
    fail_creates: u64,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a copy of every sent frame's bytes in the event log.
    pub fn retain_payloads(&mut self, keep: bool) {
        self.retain_payloads = keep;
    }

    /// Make the next `n` calls to `create_sender` fail.
    pub fn fail_next_creates(&mut self, n: u64) {
        self.fail_creates = n;
    }

    /// Everything recorded so far, in call order.
    pub fn events(&self) -> &[TransportEvent] {
        &self.events
    }

    /// Number of senders created but not yet destroyed.
    pub fn live_senders(&self) -> usize {
        self.live.len()
    }

    /// Name of a live sender, if the handle is current.
    pub fn sender_name(&self, handle: SenderHandle) -> Option<&str> {
        self.live.get(&handle.0).map(String::as_str)
    }
}

impl Transport for MemoryTransport {
    fn create_sender(
        &mut self,
        name: &str,
        _clock_video: bool,
    ) -> Result<SenderHandle, RelayError> {
        if self.fail_creates > 0 {
            self.fail_creates -= 1;
            return Err(RelayError::SenderCreate { name: name.into() });
        }
        self.next_handle += 1;
        let handle = SenderHandle(self.next_handle);
        self.live.insert(handle.0, name.to_owned());
        self.events.push(TransportEvent::SenderCreated {
            handle,
            name: name.to_owned(),
        });
        Ok(handle)
    }

    fn destroy_sender(&mut self, handle: SenderHandle) {
        if self.live.remove(&handle.0).is_none() {
            warn!("destroy of unknown {handle}");
            return;
        }
        self.events.push(TransportEvent::SenderDestroyed { handle });
    }

    fn send_video(&mut self, handle: SenderHandle, frame: Option<&VideoFrame<'_>>) {
        if !self.live.contains_key(&handle.0) {
            warn!("send on unknown {handle}");
            return;
        }
        match frame {
            Some(frame) => {
                if frame.data.len() != frame.info.buffer_len() {
                    warn!(
                        "frame byte count {} does not match {}x{} geometry",
                        frame.data.len(),
                        frame.info.width,
                        frame.info.height
                    );
                }
                self.events.push(TransportEvent::FrameSent {
                    handle,
                    width: frame.info.width,
                    height: frame.info.height,
                    bytes: frame.data.len(),
                    payload: self.retain_payloads.then(|| frame.data.to_vec()),
                });
            }
            None => self.events.push(TransportEvent::Flushed { handle }),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
