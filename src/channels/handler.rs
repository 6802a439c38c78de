#[cfg(feature = "tungstenite")]
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Value, json};

use super::types::request::{Command, MethodCall};
use super::types::response::{
    ERROR_CODE_INVALID_ARGUMENTS, ERROR_CODE_SEND_BYTES, ERROR_CODE_SEND_TEXT,
    ERROR_CODE_TERMINATED, ERROR_MESSAGE_INVALID_ARGUMENTS, ERROR_MESSAGE_SEND_BYTES,
    ERROR_MESSAGE_SEND_TEXT, ERROR_MESSAGE_TERMINATED, MethodResponse,
};
use crate::Result;
use crate::error::Error;
use crate::ws::events::MessageKind;
#[cfg(feature = "tungstenite")]
use crate::ws::{MethodInvoker, TungsteniteConnector};
use crate::ws::{MessageSink, SessionManager};

/// Receives requests from the method channel.
#[async_trait]
pub trait MethodCallHandler: Send + Sync {
    async fn on_method_call(&self, call: MethodCall) -> MethodResponse;
}

/// Binds the session manager to a host's method channel and message streams.
///
/// Connect and disconnect are acknowledged immediately; their outcome is
/// reported through lifecycle events. Sends are answered with the transport's
/// verdict.
#[derive(Clone)]
pub struct PlatformChannels {
    manager: SessionManager,
}

impl PlatformChannels {
    #[must_use]
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }

    /// Channels backed by a `tokio-tungstenite` transport with default configuration.
    #[cfg(feature = "tungstenite")]
    #[must_use]
    pub fn with_invoker(invoker: Arc<dyn MethodInvoker>) -> Self {
        let manager = SessionManager::builder()
            .invoker(invoker)
            .connector(Arc::new(TungsteniteConnector))
            .build();
        Self::new(manager)
    }

    #[must_use]
    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    /// A host started listening on one of the message streams.
    pub fn on_listen(&self, sink: MessageSink) -> Result<()> {
        self.manager.subscribe(sink)
    }

    /// A host stopped listening on one of the message streams.
    pub fn on_cancel(&self, kind: MessageKind) -> Result<()> {
        self.manager.cancel(kind)
    }

    /// Tear down the client. See [`SessionManager::terminate`].
    pub async fn terminate(&self) -> Result<()> {
        self.manager.terminate().await
    }

    async fn execute(&self, command: Command) -> MethodResponse {
        match command {
            Command::GetPlatformVersion => MethodResponse::Success {
                result: json!(format!("Rust {}", std::env::consts::OS)),
            },
            Command::Connect(args) => {
                let options = args.options.unwrap_or_default();
                acknowledge(self.manager.connect(&args.server_url, options))
            }
            Command::Disconnect(args) => {
                let code = args.close_code();
                acknowledge(self.manager.disconnect(code, args.reason))
            }
            Command::SendTextMessage(args) => {
                let result = self.manager.send_text(args.text_message).await;
                answer_send(result, ERROR_CODE_SEND_TEXT, ERROR_MESSAGE_SEND_TEXT)
            }
            Command::SendByteMessage(args) => {
                let bytes = Bytes::from(args.byte_message.unwrap_or_default());
                let result = self.manager.send_binary(bytes).await;
                answer_send(result, ERROR_CODE_SEND_BYTES, ERROR_MESSAGE_SEND_BYTES)
            }
        }
    }
}

#[async_trait]
impl MethodCallHandler for PlatformChannels {
    async fn on_method_call(&self, call: MethodCall) -> MethodResponse {
        #[cfg(feature = "tracing")]
        tracing::debug!(method = %call.method, "Method call received");

        match Command::decode(call) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => MethodResponse::NotImplemented,
            Err(e) => invalid_arguments(&e),
        }
    }
}

fn answer_send(result: Result<()>, code: &str, message: &str) -> MethodResponse {
    match result {
        Ok(()) => MethodResponse::success(),
        Err(e) => MethodResponse::error(code, message).with_details(Value::String(e.to_string())),
    }
}

fn acknowledge(result: Result<()>) -> MethodResponse {
    match result {
        Ok(()) => MethodResponse::success(),
        Err(e) => rejected(&e),
    }
}

fn rejected(error: &Error) -> MethodResponse {
    if error.is_closed() {
        return MethodResponse::error(ERROR_CODE_TERMINATED, ERROR_MESSAGE_TERMINATED);
    }
    invalid_arguments(error)
}

fn invalid_arguments(error: &Error) -> MethodResponse {
    MethodResponse::error(ERROR_CODE_INVALID_ARGUMENTS, ERROR_MESSAGE_INVALID_ARGUMENTS)
        .with_details(Value::String(error.to_string()))
}
