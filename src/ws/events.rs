//! Lifecycle and message events flowing from the transport to listeners.

use std::error::Error as StdError;
use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

/// Close code used when the client disconnects without an explicit code.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code used when an existing session is replaced by a new connect request.
pub const GOING_AWAY: u16 = 1001;
/// Close reason used when the client disconnects without an explicit reason.
pub const CLIENT_DONE_REASON: &str = "Client done.";
/// Close reason used when an existing session is replaced by a new connect request.
pub const RESTART_REASON: &str = "Connection restart";

/// The two inbound message streams.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    Text,
    Binary,
}

/// Normalized connection lifecycle notification.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, strum_macros::IntoStaticStr)]
pub enum SystemEvent {
    #[strum(serialize = "onOpened")]
    Opened,
    #[strum(serialize = "onClosing")]
    Closing { code: u16, reason: String },
    #[strum(serialize = "onClosed")]
    Closed { code: u16, reason: String },
    #[strum(serialize = "onFailure")]
    Failure(TransportFailure),
}

impl SystemEvent {
    /// Name of the outbound method this event is delivered as.
    #[must_use]
    pub fn method_name(&self) -> &'static str {
        self.into()
    }

    #[must_use]
    pub fn context(&self) -> SystemEventContext {
        match self {
            Self::Opened => SystemEventContext::default(),
            Self::Closing { code, reason } | Self::Closed { code, reason } => SystemEventContext {
                code: Some(*code),
                reason: Some(reason.clone()),
                ..SystemEventContext::default()
            },
            Self::Failure(failure) => SystemEventContext {
                throwable_type: Some(failure.kind.clone()),
                error_message: Some(failure.message.clone()),
                cause_message: failure.cause.clone(),
                ..SystemEventContext::default()
            },
        }
    }

    /// Payload mapping carrying only the populated context fields.
    #[must_use]
    pub fn payload(&self) -> Map<String, Value> {
        self.context().into_map()
    }
}

/// Wire shape of a lifecycle event payload. Absent fields are omitted, never null.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemEventContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throwable_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause_message: Option<String>,
}

impl SystemEventContext {
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // Only strings and integers are serialized, so this is unreachable in practice.
            _ => Map::new(),
        }
    }
}

/// Best-effort diagnostics for an asynchronous transport failure.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    /// Short type name of the failure, e.g. `Io` or `Protocol`
    pub kind: String,
    pub message: String,
    /// Description of the underlying cause, when there is one
    pub cause: Option<String>,
}

impl TransportFailure {
    #[must_use]
    pub fn new<K: Into<String>, M: Into<String>>(kind: K, message: M) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            cause: None,
        }
    }

    #[must_use]
    pub fn with_cause<C: Into<String>>(mut self, cause: C) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Build a failure from an error, taking the cause from its `source()`.
    #[must_use]
    pub fn from_error<E: StdError + ?Sized>(kind: &str, error: &E) -> Self {
        Self {
            kind: kind.to_owned(),
            message: error.to_string(),
            cause: error.source().map(ToString::to_string),
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " (caused by: {cause})")?;
        }
        Ok(())
    }
}

impl StdError for TransportFailure {}

/// Arguments of an outbound method invocation.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Lifecycle event context
    Map(Map<String, Value>),
    /// Raw inbound text message
    Text(String),
    /// Raw inbound binary message
    Bytes(Bytes),
}

/// A named outbound call, as recorded by channel-backed invokers.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInvocation {
    pub method: String,
    pub arguments: Payload,
}

/// Raw callback from a transport, before it is routed by the session manager.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Text(String),
    Binary(Bytes),
    Closing { code: u16, reason: String },
    Closed { code: u16, reason: String },
    Failure(TransportFailure),
}
