//! Seams between the session manager and the outside world.

use std::error::Error as StdError;

use bytes::Bytes;
use tokio::sync::mpsc;
use url::Url;

use super::config::{Config, Options};
use super::events::{MethodInvocation, Payload};
use super::manager::TransportListener;

/// Result of handing a value to an [`EventSink`].
pub type SinkResult = std::result::Result<(), Box<dyn StdError + Send + Sync + 'static>>;

/// Maps the shared transport template plus per-connect options to a concrete [`Config`].
pub trait Configurator: Send + Sync + 'static {
    fn configure(&self, base: &Config, options: &Options) -> Config;
}

/// A live duplex connection. Owned exclusively by the session manager.
///
/// All methods return immediately; their effects are reported later through the
/// [`TransportListener`] the handle was opened with.
pub trait TransportHandle: Send + 'static {
    /// Enqueue a text frame.
    ///
    /// `true` means the frame was accepted into the outgoing buffer, not that it was
    /// delivered. `false` means the buffer would overflow or the transport is already
    /// closing, closed or cancelled; on overflow the transport starts a graceful close.
    fn send_text(&self, text: String) -> bool;

    /// Enqueue a binary frame. Same contract as [`TransportHandle::send_text`].
    fn send_binary(&self, bytes: Bytes) -> bool;

    /// Start a graceful close, flushing already-enqueued frames first.
    ///
    /// Returns `false` if a close was already in progress.
    fn close(&self, code: u16, reason: &str) -> bool;

    /// Terminate immediately without a close handshake.
    fn cancel(&self);
}

/// Opens transports. Implementations must return without waiting for the handshake.
pub trait Connector: Send + Sync + 'static {
    fn open(&self, url: Url, config: &Config, listener: TransportListener)
    -> Box<dyn TransportHandle>;
}

/// Destination for one inbound message stream.
pub trait EventSink<T>: Send + Sync + 'static {
    /// Deliver one value. An error is treated as a fatal delivery failure.
    fn success(&self, value: T) -> SinkResult;

    /// Called once when the sink is detached because the client terminates.
    fn end_of_stream(&self) {}
}

/// The always-present outbound notification surface.
///
/// Carries lifecycle events and message fallbacks as named method invocations.
pub trait MethodInvoker: Send + Sync + 'static {
    fn invoke_method(&self, method: &str, arguments: Payload);
}

impl<T: Send + 'static> EventSink<T> for mpsc::UnboundedSender<T> {
    fn success(&self, value: T) -> SinkResult {
        self.send(value)
            .map_err(|_e| "message stream receiver was dropped".into())
    }
}

impl MethodInvoker for mpsc::UnboundedSender<MethodInvocation> {
    fn invoke_method(&self, method: &str, arguments: Payload) {
        if self
            .send(MethodInvocation {
                method: method.to_owned(),
                arguments,
            })
            .is_err()
        {
            #[cfg(feature = "tracing")]
            tracing::warn!(method, "Method invocation receiver was dropped");
        }
    }
}
