#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

//! `tokio-tungstenite` implementation of the transport seam.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at, sleep_until, timeout};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::Config;
use super::events::{GOING_AWAY, TransportFailure};
use super::manager::TransportListener;
use super::traits::{Connector, TransportHandle};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported when the peer's close frame carried no status.
const NO_STATUS_RECEIVED: u16 = 1005;
/// How long to wait for the server to finish a close handshake we started.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(60);

/// Opens WebSocket connections over TCP/TLS with `tokio-tungstenite`.
///
/// Each connection runs in its own task. The task reports `open`, inbound
/// messages, `closing`, and finally exactly one of `closed` or `failure`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn open(
        &self,
        url: Url,
        config: &Config,
        listener: TransportListener,
    ) -> Box<dyn TransportHandle> {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            queued_bytes: AtomicUsize::new(0),
            closing: AtomicBool::new(false),
            max_queue_size: config.max_queue_size,
        });
        let cancel = CancellationToken::new();

        let connection = Connection {
            config: config.clone(),
            listener,
            outgoing_rx,
            shared: Arc::clone(&shared),
            cancel: cancel.clone(),
        };
        tokio::spawn(connection.run(url));

        Box::new(TungsteniteHandle {
            outgoing_tx,
            shared,
            cancel,
        })
    }
}

enum Outgoing {
    Text(String),
    Binary(Bytes),
    Close { code: u16, reason: String },
}

/// State shared between the handle and its connection task.
struct Shared {
    queued_bytes: AtomicUsize,
    closing: AtomicBool,
    max_queue_size: usize,
}

struct TungsteniteHandle {
    outgoing_tx: mpsc::UnboundedSender<Outgoing>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl TungsteniteHandle {
    fn enqueue(&self, len: usize, message: Outgoing) -> bool {
        if self.shared.closing.load(Ordering::SeqCst) || self.cancel.is_cancelled() {
            return false;
        }

        let queued = self.shared.queued_bytes.load(Ordering::SeqCst);
        if queued.saturating_add(len) > self.shared.max_queue_size {
            #[cfg(feature = "tracing")]
            tracing::warn!(queued, len, "Outgoing buffer full, closing WebSocket");
            self.close(GOING_AWAY, "");
            return false;
        }

        self.shared.queued_bytes.fetch_add(len, Ordering::SeqCst);
        if self.outgoing_tx.send(message).is_err() {
            self.shared.queued_bytes.fetch_sub(len, Ordering::SeqCst);
            return false;
        }
        true
    }
}

impl TransportHandle for TungsteniteHandle {
    fn send_text(&self, text: String) -> bool {
        self.enqueue(text.len(), Outgoing::Text(text))
    }

    fn send_binary(&self, bytes: Bytes) -> bool {
        self.enqueue(bytes.len(), Outgoing::Binary(bytes))
    }

    fn close(&self, code: u16, reason: &str) -> bool {
        if self.shared.closing.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.outgoing_tx
            .send(Outgoing::Close {
                code,
                reason: reason.to_owned(),
            })
            .is_ok()
    }

    fn cancel(&self) {
        self.shared.closing.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }
}

struct Connection {
    config: Config,
    listener: TransportListener,
    outgoing_rx: mpsc::UnboundedReceiver<Outgoing>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl Connection {
    async fn run(mut self, url: Url) {
        let handshake = timeout(
            self.config.connect_timeout,
            connect_async_with_config(url.as_str(), None, false),
        );

        let ws_stream = tokio::select! {
            () = self.cancel.cancelled() => {
                self.listener.on_failure(canceled());
                return;
            }
            result = handshake => match result {
                Ok(Ok((ws_stream, _response))) => ws_stream,
                Ok(Err(e)) => {
                    self.listener.on_failure(failure(&e));
                    return;
                }
                Err(_elapsed) => {
                    let limit = self.config.connect_timeout;
                    self.listener.on_failure(TransportFailure::new(
                        "Timeout",
                        format!("handshake did not complete within {limit:?}"),
                    ));
                    return;
                }
            }
        };

        self.listener.on_open();

        match self.drive(ws_stream).await {
            Ok((code, reason)) => self.listener.on_closed(code, reason),
            Err(failure) => {
                self.shared.closing.store(true, Ordering::SeqCst);
                self.listener.on_failure(failure);
            }
        }
    }

    /// Pump frames until the connection ends. `Ok` carries the peer's close code and reason.
    async fn drive(&mut self, ws_stream: WsStream) -> Result<(u16, String), TransportFailure> {
        let (mut write, mut read) = ws_stream.split();

        let ping_every = self.config.ping_interval;
        let period = ping_every.max(Duration::from_millis(1));
        let mut ping_interval = interval_at(Instant::now() + ping_every, period);
        let mut awaiting_pong = false;
        let mut received_close: Option<(u16, String)> = None;
        let mut close_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Err(canceled()),

                // Handle incoming messages
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.listener.on_text(text.as_str().to_owned());
                        }
                        Some(Ok(Message::Binary(bytes))) => self.listener.on_binary(bytes),
                        Some(Ok(Message::Pong(_))) => awaiting_pong = false,
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame.map_or_else(
                                || (NO_STATUS_RECEIVED, String::new()),
                                |frame| (u16::from(frame.code), frame.reason.as_str().to_owned()),
                            );
                            self.shared.closing.store(true, Ordering::SeqCst);
                            self.listener.on_closing(code, reason.clone());
                            received_close = Some((code, reason));
                        }
                        Some(Err(tungstenite::Error::ConnectionClosed)) | None => {
                            return received_close.ok_or_else(|| {
                                TransportFailure::new("Io", "connection ended without close frame")
                            });
                        }
                        Some(Err(e)) => return Err(failure(&e)),
                        // Ping replies are queued by tungstenite itself.
                        Some(Ok(_)) => {}
                    }
                }

                // Handle frames enqueued through the handle
                Some(outgoing) = self.outgoing_rx.recv() => {
                    let (len, message) = match outgoing {
                        Outgoing::Text(text) => (text.len(), Message::Text(text.into())),
                        Outgoing::Binary(bytes) => (bytes.len(), Message::Binary(bytes)),
                        Outgoing::Close { code, reason } => {
                            close_deadline = Some(Instant::now() + CLOSE_TIMEOUT);
                            (0, Message::Close(Some(CloseFrame {
                                code: CloseCode::from(code),
                                reason: reason.into(),
                            })))
                        }
                    };
                    self.shared.queued_bytes.fetch_sub(len, Ordering::SeqCst);
                    if let Err(e) = write.send(message).await {
                        return Err(failure(&e));
                    }
                }

                // Keep-alive: a missing PONG by the next tick fails the connection
                _ = ping_interval.tick(), if !ping_every.is_zero() && close_deadline.is_none() => {
                    if awaiting_pong {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Heartbeat timeout: no PONG received within {ping_every:?}");
                        return Err(TransportFailure::new(
                            "Timeout",
                            format!("sent ping but didn't receive pong within {ping_every:?}"),
                        ));
                    }
                    awaiting_pong = true;
                    if let Err(e) = write.send(Message::Ping(Bytes::new())).await {
                        return Err(failure(&e));
                    }
                }

                () = wait_until(close_deadline) => {
                    return Err(TransportFailure::new(
                        "Timeout",
                        format!("close handshake not finished within {CLOSE_TIMEOUT:?}"),
                    ));
                }
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn canceled() -> TransportFailure {
    TransportFailure::new("Canceled", "Canceled")
}

fn failure(error: &tungstenite::Error) -> TransportFailure {
    TransportFailure::from_error(error_kind(error), error)
}

/// Short type name reported as the failure kind.
fn error_kind(error: &tungstenite::Error) -> &'static str {
    match error {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => "Closed",
        tungstenite::Error::Io(_) => "Io",
        tungstenite::Error::Capacity(_) => "Capacity",
        tungstenite::Error::Protocol(_) => "Protocol",
        tungstenite::Error::Url(_) => "Url",
        tungstenite::Error::Http(_) | tungstenite::Error::HttpFormat(_) => "Http",
        _ => "WebSocket",
    }
}
