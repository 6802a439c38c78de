#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

use super::events::MessageKind;

/// WebSocket session error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// A send was attempted while no transport handle is live
    NotConnected,
    /// The transport refused to enqueue an outgoing message
    SendRejected,
    /// The subscribed message sink failed to accept a delivered message
    SinkDelivery {
        /// Which message stream the delivery was for
        kind: MessageKind,
        /// Description of the sink failure
        reason: String,
    },
    /// The server URL could not be parsed
    InvalidUrl(url::ParseError),
}

impl WsError {
    /// Whether the caller should see this as a declined send.
    ///
    /// Both variants surface identically through the command surface.
    #[must_use]
    pub const fn is_declined_send(&self) -> bool {
        matches!(self, Self::NotConnected | Self::SendRejected)
    }
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "WebSocket is not connected"),
            Self::SendRejected => write!(f, "WebSocket refused to enqueue the message"),
            Self::SinkDelivery { kind, reason } => {
                write!(f, "Failed to deliver {kind} message to sink: {reason}")
            }
            Self::InvalidUrl(e) => write!(f, "Invalid WebSocket server url: {e}"),
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::InvalidUrl(e) => Some(e),
            _ => None,
        }
    }
}

// Integration with main Error type
impl From<WsError> for crate::error::Error {
    fn from(e: WsError) -> Self {
        crate::error::Error::with_source(crate::error::Kind::WebSocket, e)
    }
}
