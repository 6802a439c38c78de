use std::sync::Arc;

use bytes::Bytes;

use super::error::WsError;
use super::events::{MessageKind, Payload, SystemEvent};
use super::traits::{EventSink, MethodInvoker};

/// Fallback method name for text messages when no text sink is subscribed.
pub const ON_TEXT_MESSAGE_METHOD: &str = "onTextMessage";
/// Fallback method name for binary messages when no binary sink is subscribed.
pub const ON_BYTE_MESSAGE_METHOD: &str = "onByteMessage";

/// A subscriber for one of the two inbound message streams.
#[non_exhaustive]
#[derive(Clone)]
pub enum MessageSink {
    Text(Arc<dyn EventSink<String>>),
    Binary(Arc<dyn EventSink<Bytes>>),
}

impl MessageSink {
    pub fn text<S: EventSink<String>>(sink: S) -> Self {
        Self::Text(Arc::new(sink))
    }

    pub fn binary<S: EventSink<Bytes>>(sink: S) -> Self {
        Self::Binary(Arc::new(sink))
    }

    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text(_) => MessageKind::Text,
            Self::Binary(_) => MessageKind::Binary,
        }
    }
}

/// Routes normalized events to their current recipients.
///
/// Lifecycle events always go to the method invoker. Messages go to the
/// subscribed sink of their kind, or to the invoker under a fallback method
/// name when nothing is subscribed, so inbound data is never dropped.
pub struct EventDispatcher {
    invoker: Option<Arc<dyn MethodInvoker>>,
    text_sink: Option<Arc<dyn EventSink<String>>>,
    binary_sink: Option<Arc<dyn EventSink<Bytes>>>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new(invoker: Arc<dyn MethodInvoker>) -> Self {
        Self {
            invoker: Some(invoker),
            text_sink: None,
            binary_sink: None,
        }
    }

    /// Replace the subscriber for the sink's kind. Last subscription wins.
    pub fn subscribe(&mut self, sink: MessageSink) {
        #[cfg(feature = "tracing")]
        tracing::info!(kind = %sink.kind(), "Message sink subscribed");
        match sink {
            MessageSink::Text(sink) => self.text_sink = Some(sink),
            MessageSink::Binary(sink) => self.binary_sink = Some(sink),
        }
    }

    /// Remove the subscriber for `kind`. Returns whether one was present.
    pub fn cancel(&mut self, kind: MessageKind) -> bool {
        #[cfg(feature = "tracing")]
        tracing::info!(%kind, "Message sink cancelled");
        match kind {
            MessageKind::Text => self.text_sink.take().is_some(),
            MessageKind::Binary => self.binary_sink.take().is_some(),
        }
    }

    #[must_use]
    pub fn has_sink(&self, kind: MessageKind) -> bool {
        match kind {
            MessageKind::Text => self.text_sink.is_some(),
            MessageKind::Binary => self.binary_sink.is_some(),
        }
    }

    pub fn dispatch_system(&self, event: &SystemEvent) {
        let method = event.method_name();
        match &self.invoker {
            Some(invoker) => invoker.invoke_method(method, Payload::Map(event.payload())),
            None => {
                #[cfg(feature = "tracing")]
                tracing::warn!(method, "Dispatcher closed, dropping system event");
            }
        }
    }

    /// Deliver an inbound text message.
    ///
    /// A failing sink is fatal and returned as [`WsError::SinkDelivery`].
    pub fn dispatch_text(&self, text: String) -> Result<(), WsError> {
        if let Some(sink) = &self.text_sink {
            let len = text.len();
            return sink.success(text).map_err(|e| {
                #[cfg(feature = "tracing")]
                tracing::error!(len, error = %e, "Failed to deliver text message to sink");
                #[cfg(not(feature = "tracing"))]
                let _ = len;
                WsError::SinkDelivery {
                    kind: MessageKind::Text,
                    reason: e.to_string(),
                }
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("No text sink subscribed, falling back to method call");
        self.fallback(ON_TEXT_MESSAGE_METHOD, Payload::Text(text));
        Ok(())
    }

    /// Deliver an inbound binary message. Same failure semantics as text.
    pub fn dispatch_binary(&self, bytes: Bytes) -> Result<(), WsError> {
        if let Some(sink) = &self.binary_sink {
            let len = bytes.len();
            return sink.success(bytes).map_err(|e| {
                #[cfg(feature = "tracing")]
                tracing::error!(len, error = %e, "Failed to deliver binary message to sink");
                #[cfg(not(feature = "tracing"))]
                let _ = len;
                WsError::SinkDelivery {
                    kind: MessageKind::Binary,
                    reason: e.to_string(),
                }
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("No binary sink subscribed, falling back to method call");
        self.fallback(ON_BYTE_MESSAGE_METHOD, Payload::Bytes(bytes));
        Ok(())
    }

    fn fallback(&self, method: &str, payload: Payload) {
        if let Some(invoker) = &self.invoker {
            invoker.invoke_method(method, payload);
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!(method, "Dispatcher closed, dropping inbound message");
        }
    }

    /// Detach everything: sinks get end-of-stream, the invoker is released.
    pub fn close(&mut self) {
        if let Some(sink) = self.text_sink.take() {
            sink.end_of_stream();
        }
        if let Some(sink) = self.binary_sink.take() {
            sink.end_of_stream();
        }
        self.invoker = None;
    }
}
