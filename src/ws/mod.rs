//! WebSocket session lifecycle management.
//!
//! This module provides a single-session client that opens, maintains,
//! restarts and tears down one WebSocket connection at a time.
//!
//! # Architecture
//!
//! - [`SessionManager`]: queues every command and transport callback onto the task
//!   that owns the session
//! - [`EventDispatcher`]: routes lifecycle events and inbound messages to their recipients
//! - [`Connector`] / [`TransportHandle`]: the transport seam, implemented by `TungsteniteConnector`
//!
//! # Example
//!
//! ```ignore
//! let manager = SessionManager::builder()
//!     .invoker(Arc::new(events_tx))
//!     .connector(Arc::new(TungsteniteConnector))
//!     .build();
//!
//! manager.connect("wss://example.com/socket", Options::new())?;
//! ```

pub mod config;
#[cfg(feature = "tungstenite")]
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod manager;
pub mod session;
pub mod traits;

#[cfg(feature = "tungstenite")]
pub use connection::TungsteniteConnector;
pub use dispatcher::{EventDispatcher, MessageSink};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use manager::{SessionManager, SessionStatus, TransportListener};
pub use session::SessionPhase;
pub use traits::*;
