use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use crate::ws::WsError;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// A command argument was rejected before reaching the session
    Validation,
    /// Internal error from dependencies
    Internal,
    /// Error raised by the WebSocket session, see [`WsError`]
    WebSocket,
    /// The session manager has been terminated and no longer accepts commands
    Closed,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Box<dyn StdError + Send + Sync + 'static>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Box::new(source),
            backtrace: Backtrace::capture(),
        }
    }

    /// The session manager task is gone.
    #[must_use]
    pub fn closed() -> Self {
        Self::with_source(Kind::Closed, Terminated)
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Validation {
            reason: message.into(),
        }
        .into()
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.kind == Kind::Closed
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.downcast_ref::<E>()
    }

    /// The session-level error, if this error originated from the WebSocket layer.
    #[must_use]
    pub fn ws_error(&self) -> Option<&WsError> {
        self.downcast_ref::<WsError>()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.source)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Source of every [`Kind::Closed`] error.
#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct Terminated;

impl fmt::Display for Terminated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebSocket client was terminated")
    }
}

impl StdError for Terminated {}

#[non_exhaustive]
#[derive(Debug)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid argument: {}", self.reason)
    }
}

impl StdError for Validation {}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::with_source(Kind::Validation, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_should_succeed() {
        let error = Error::validation("server url must not be empty");

        assert_eq!(error.kind(), Kind::Validation);
        assert_eq!(
            error.to_string(),
            "Validation: invalid argument: server url must not be empty"
        );
    }

    #[test]
    fn ws_error_downcast_should_succeed() {
        let error: Error = WsError::NotConnected.into();

        assert_eq!(error.kind(), Kind::WebSocket);
        assert!(matches!(error.ws_error(), Some(WsError::NotConnected)));
    }

    #[test]
    fn closed_reports_termination() {
        let error = Error::closed();

        assert!(error.is_closed());
        assert!(error.ws_error().is_none());
        assert!(error.downcast_ref::<Terminated>().is_some());
        assert_eq!(error.to_string(), "Closed: WebSocket client was terminated");
    }

    #[test]
    fn url_errors_are_validation() {
        let error: Error = url::Url::parse("not a url").unwrap_err().into();

        assert_eq!(error.kind(), Kind::Validation);
    }
}
