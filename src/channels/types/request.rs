#![allow(
    clippy::module_name_repetitions,
    reason = "Arguments suffix is intentional for clarity"
)]

use bon::Builder;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Result;
use crate::ws::config::Options;

pub const METHOD_PLATFORM_VERSION: &str = "getPlatformVersion";
pub const METHOD_CONNECT: &str = "connect";
pub const METHOD_DISCONNECT: &str = "disconnect";
pub const METHOD_SEND_TEXT_MESSAGE: &str = "sendTextMessage";
pub const METHOD_SEND_BYTE_MESSAGE: &str = "sendByteMessage";

/// An inbound request on the method channel.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Builder)]
#[builder(on(String, into))]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    #[builder(default)]
    pub arguments: Value,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectArguments {
    pub server_url: String,
    #[serde(default)]
    pub options: Option<Options>,
}

#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DisconnectArguments {
    /// Raw close code as sent by the host; see [`DisconnectArguments::close_code`]
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl DisconnectArguments {
    /// The close code, or `None` when absent or outside `0..=65535`.
    ///
    /// `None` makes the disconnect fall back to the default code and reason.
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        self.code.and_then(|code| u16::try_from(code).ok())
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTextArguments {
    pub text_message: String,
}

#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendByteArguments {
    /// Absent or null is sent as an empty binary frame
    #[serde(default)]
    pub byte_message: Option<Vec<u8>>,
}

/// A decoded method call.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    GetPlatformVersion,
    Connect(ConnectArguments),
    Disconnect(DisconnectArguments),
    SendTextMessage(SendTextArguments),
    SendByteMessage(SendByteArguments),
}

impl Command {
    /// Decode a method call. `Ok(None)` means the method is not implemented.
    pub fn decode(call: MethodCall) -> Result<Option<Self>> {
        let command = match call.method.as_str() {
            METHOD_PLATFORM_VERSION => Self::GetPlatformVersion,
            METHOD_CONNECT => Self::Connect(arguments(call.arguments)?),
            METHOD_DISCONNECT => Self::Disconnect(arguments_or_default(call.arguments)?),
            METHOD_SEND_TEXT_MESSAGE => Self::SendTextMessage(arguments(call.arguments)?),
            METHOD_SEND_BYTE_MESSAGE => {
                Self::SendByteMessage(arguments_or_default(call.arguments)?)
            }
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

fn arguments<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

fn arguments_or_default<T: DeserializeOwned + Default>(value: Value) -> Result<T> {
    if value.is_null() {
        return Ok(T::default());
    }
    arguments(value)
}
