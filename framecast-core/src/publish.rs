//! Publish endpoint: one named sender and its lifecycle.
//!
//! Wraps a [`Transport`] sender with the discipline the async handoff
//! demands: the sender is always flushed before it is destroyed, so the
//! transport can never be left holding a buffer the caller is about to
//! reuse or free. Renames take effect on the next [`connect`]; the
//! endpoint itself never decides when to reconnect, the pipeline does.
//!
//! [`connect`]: PublishEndpoint::connect

use tracing::{debug, warn};

use crate::error::RelayError;
use crate::transport::{SenderHandle, Transport, VideoFrame};

/// A named publishing slot on a transport.
pub struct PublishEndpoint<T: Transport> {
    transport: T,
    sender: Option<SenderHandle>,
    name: String,
}

impl<T: Transport> PublishEndpoint<T> {
    pub fn new(transport: T, name: &str) -> Self {
        Self {
            transport,
            sender: None,
            name: name.to_owned(),
        }
    }

    /// (Re)create the sender under the current name. Any existing sender
    /// is flushed and destroyed first. On failure the endpoint is left
    /// disconnected; publishing becomes a no-op until the next connect.
    pub fn connect(&mut self) -> Result<(), RelayError> {
        self.teardown_sender();
        let handle = self.transport.create_sender(&self.name, false)?;
        debug!("publishing as '{}'", self.name);
        self.sender = Some(handle);
        Ok(())
    }

    /// Flush and destroy the sender, if any.
    pub fn disconnect(&mut self) {
        self.teardown_sender();
    }

    /// Fence the in-flight frame without touching the sender itself.
    /// After this returns, no pool buffer is referenced by the transport.
    pub fn flush(&mut self) {
        if let Some(handle) = self.sender {
            self.transport.send_video(handle, None);
        }
    }

    /// Hand a frame to the sender. Returns `false` when disconnected.
    pub fn publish(&mut self, frame: &VideoFrame<'_>) -> bool {
        match self.sender {
            Some(handle) => {
                self.transport.send_video(handle, Some(frame));
                true
            }
            None => false,
        }
    }

    /// Record a new sender name. Takes effect on the next [`connect`];
    /// the current sender keeps publishing under the old name until then.
    ///
    /// [`connect`]: Self::connect
    pub fn set_name(&mut self, name: &str) {
        if name.is_empty() {
            warn!("ignoring empty sender name");
            return;
        }
        self.name = name.to_owned();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_some()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn teardown_sender(&mut self) {
        if let Some(handle) = self.sender.take() {
            // Flush first: the transport may still be reading the last
            // published buffer.
            self.transport.send_video(handle, None);
            self.transport.destroy_sender(handle);
        }
    }
}

impl<T: Transport> Drop for PublishEndpoint<T> {
    fn drop(&mut self) {
        self.teardown_sender();
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameInfo;
    use crate::transport::{MemoryTransport, TransportEvent};

    #[test]
    fn reconnect_flushes_before_replacing_the_sender() {
        let mut transport = MemoryTransport::new();
        let mut endpoint = PublishEndpoint::new(&mut transport, "Out");
        endpoint.connect().unwrap();
        endpoint.connect().unwrap();

        let events = endpoint.transport().events();
        assert!(matches!(
            events[0],
            TransportEvent::SenderCreated { .. }
        ));
        assert!(matches!(events[1], TransportEvent::Flushed { .. }));
        assert!(matches!(events[2], TransportEvent::SenderDestroyed { .. }));
        assert!(matches!(events[3], TransportEvent::SenderCreated { .. }));
    }

    #[test]
    fn publish_without_sender_is_a_noop() {
        let mut transport = MemoryTransport::new();
        let mut endpoint = PublishEndpoint::new(&mut transport, "Out");

        let info = FrameInfo::new(2, 2);
        let data = vec![0; info.buffer_len()];
        assert!(!endpoint.publish(&VideoFrame { info, data: &data }));
        assert!(endpoint.transport().events().is_empty());
    }

    #[test]
    fn publish_records_a_send() {
        let mut transport = MemoryTransport::new();
        let mut endpoint = PublishEndpoint::new(&mut transport, "Out");
        endpoint.connect().unwrap();

        let info = FrameInfo::new(2, 2);
        let data = vec![0; info.buffer_len()];
        assert!(endpoint.publish(&VideoFrame { info, data: &data }));
        assert!(matches!(
            endpoint.transport().events().last(),
            Some(TransportEvent::FrameSent { width: 2, .. })
        ));
    }

    #[test]
    fn rename_waits_for_the_next_connect() {
        let mut transport = MemoryTransport::new();
        let mut endpoint = PublishEndpoint::new(&mut transport, "Old");
        endpoint.connect().unwrap();

        endpoint.set_name("New");
        assert_eq!(endpoint.name(), "New");
        assert_eq!(endpoint.transport().events().len(), 1);

        endpoint.connect().unwrap();
        assert!(matches!(
            endpoint.transport().events().last(),
            Some(TransportEvent::SenderCreated { name, .. }) if name == "New"
        ));
    }

    #[test]
    fn empty_rename_is_rejected() {
        let mut transport = MemoryTransport::new();
        let mut endpoint = PublishEndpoint::new(&mut transport, "Out");
        endpoint.set_name("");
        assert_eq!(endpoint.name(), "Out");
    }

    #[test]
    fn drop_tears_the_sender_down() {
        let mut transport = MemoryTransport::new();
        {
            let mut endpoint = PublishEndpoint::new(&mut transport, "Out");
            endpoint.connect().unwrap();
        }

        assert_eq!(transport.live_senders(), 0);
        let events = transport.events();
        assert!(matches!(events[1], TransportEvent::Flushed { .. }));
        assert!(matches!(events[2], TransportEvent::SenderDestroyed { .. }));
    }

    #[test]
    fn failed_connect_leaves_endpoint_disconnected() {
        let mut transport = MemoryTransport::new();
        transport.fail_next_creates(1);
        let mut endpoint = PublishEndpoint::new(&mut transport, "Out");

        assert!(endpoint.connect().is_err());
        assert!(!endpoint.is_connected());

        let info = FrameInfo::new(2, 2);
        let data = vec![0; info.buffer_len()];
        assert!(!endpoint.publish(&VideoFrame { info, data: &data }));
    }
}
