//! Host-facing command surface.
//!
//! A host runtime talks to the client over three channels: one method channel
//! carrying requests in both directions, and two event channels streaming
//! inbound text and binary messages.
//!
//! | Command | Arguments | Success | Failure |
//! |---------|-----------|---------|---------|
//! | `connect` | `serverUrl`, `options` | `null` | `03` on empty url |
//! | `disconnect` | `code?`, `reason?` | `null` | |
//! | `sendTextMessage` | `textMessage` | `null` | `01` when the send is declined |
//! | `sendByteMessage` | `byteMessage?` | `null` | `02` when the send is declined |
//! | `getPlatformVersion` | | `"Rust <os>"` | |
//!
//! Unknown methods are answered with [`MethodResponse::NotImplemented`]. Once the
//! client is terminated, `connect` and `disconnect` fail with `04`.

pub mod handler;
pub mod types;

pub use handler::{MethodCallHandler, PlatformChannels};
pub use types::{Command, MethodCall, MethodResponse};

/// Name of the request/notification channel.
pub const METHOD_CHANNEL_NAME: &str = "tech.sharpbitstudio.web_socket_support/methods";
/// Name of the inbound text message stream.
pub const EVENT_CHANNEL_NAME_TEXT_MESSAGES: &str =
    "tech.sharpbitstudio.web_socket_support/text-messages";
/// Name of the inbound binary message stream.
pub const EVENT_CHANNEL_NAME_BINARY_MESSAGES: &str =
    "tech.sharpbitstudio.web_socket_support/binary-messages";
