#![cfg(feature = "tungstenite")]
#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use common::{Invocations, next_invocation, payload_map, wait_for};
use futures_util::{SinkExt as _, StreamExt as _};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use web_socket_support::ws::config::{Config, Options};
use web_socket_support::ws::{Configurator, SessionManager, TungsteniteConnector};

/// Mock WebSocket server.
struct MockWsServer {
    addr: SocketAddr,
    /// Frames pushed to ALL connected clients
    message_tx: broadcast::Sender<Message>,
    /// Data frames received from clients
    received_rx: mpsc::UnboundedReceiver<Message>,
}

impl MockWsServer {
    /// Start an echoing mock WebSocket server on a random port.
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (message_tx, _) = broadcast::channel::<Message>(100);
        let (received_tx, received_rx) = mpsc::unbounded_channel::<Message>();

        let broadcast_tx = message_tx.clone();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };

                let (mut write, mut read) = ws_stream.split();
                let received_tx = received_tx.clone();
                let mut msg_rx = broadcast_tx.subscribe();

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            // Echo data frames back to the client
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(msg @ (Message::Text(_) | Message::Binary(_)))) => {
                                        drop(received_tx.send(msg.clone()));
                                        if write.send(msg).await.is_err() {
                                            break;
                                        }
                                    }
                                    Some(Ok(_)) => {}
                                    _ => break,
                                }
                            }
                            // Push frames requested by the test
                            msg = msg_rx.recv() => {
                                match msg {
                                    Ok(msg) => {
                                        if write.send(msg).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(_) => break,
                                }
                            }
                        }
                    }
                });
            }
        });

        Self {
            addr,
            message_tx,
            received_rx,
        }
    }

    fn ws_url(&self) -> String {
        format!("ws://{}/socket", self.addr)
    }

    /// Send a frame to all connected clients.
    fn send(&self, message: Message) {
        drop(self.message_tx.send(message));
    }

    /// Receive the next data frame sent by a client.
    async fn recv(&mut self) -> Option<Message> {
        timeout(Duration::from_secs(2), self.received_rx.recv())
            .await
            .ok()
            .flatten()
    }
}

/// Passes the configured template through untouched.
struct TemplateConfigurator;

impl Configurator for TemplateConfigurator {
    fn configure(&self, base: &Config, _options: &Options) -> Config {
        base.clone()
    }
}

fn manager() -> (SessionManager, Invocations) {
    let (tx, rx) = mpsc::unbounded_channel();
    let manager = SessionManager::builder()
        .invoker(Arc::new(tx))
        .connector(Arc::new(TungsteniteConnector))
        .build();
    (manager, rx)
}

async fn connected(server: &MockWsServer) -> (SessionManager, Invocations) {
    let (manager, mut rx) = manager();
    manager.connect(&server.ws_url(), Options::new()).unwrap();
    let opened = next_invocation(&mut rx).await;
    assert_eq!(opened.method, "onOpened");
    (manager, rx)
}

#[tokio::test]
async fn text_and_binary_round_trip_through_server() {
    let mut server = MockWsServer::start().await;
    let (manager, _rx) = connected(&server).await;
    let mut texts = Box::pin(manager.text_messages().unwrap());
    let mut binaries = Box::pin(manager.binary_messages().unwrap());

    manager.send_text("hello".to_owned()).await.unwrap();
    manager
        .send_binary(Bytes::from_static(&[1, 2, 3]))
        .await
        .unwrap();

    assert_eq!(server.recv().await.unwrap(), Message::Text("hello".into()));
    assert_eq!(
        server.recv().await.unwrap(),
        Message::Binary(Bytes::from_static(&[1, 2, 3]))
    );

    let echoed = timeout(Duration::from_secs(2), texts.next()).await.unwrap();
    assert_eq!(echoed.as_deref(), Some("hello"));
    let echoed = timeout(Duration::from_secs(2), binaries.next())
        .await
        .unwrap();
    assert_eq!(echoed, Some(Bytes::from_static(&[1, 2, 3])));
}

#[tokio::test]
async fn server_push_without_sink_uses_fallback() {
    let server = MockWsServer::start().await;
    let (_manager, mut rx) = connected(&server).await;

    server.send(Message::Text("pushed".into()));

    let fallback = next_invocation(&mut rx).await;
    assert_eq!(fallback.method, "onTextMessage");
}

#[tokio::test]
async fn client_disconnect_completes_close_handshake() {
    let server = MockWsServer::start().await;
    let (manager, mut rx) = connected(&server).await;

    manager.disconnect(None, None).unwrap();

    let closed = wait_for(&mut rx, "onClosed").await;
    assert_eq!(payload_map(&closed)["code"], json!(1000));

    let status = manager.status().await.unwrap();
    assert!(!status.phase.is_connected());
}

#[tokio::test]
async fn server_close_reports_closing_then_closed() {
    let server = MockWsServer::start().await;
    let (manager, mut rx) = connected(&server).await;

    server.send(Message::Close(Some(CloseFrame {
        code: CloseCode::Library(4000),
        reason: "server going away".into(),
    })));

    let closing = next_invocation(&mut rx).await;
    assert_eq!(closing.method, "onClosing");
    assert_eq!(payload_map(&closing)["code"], json!(4000));
    assert_eq!(payload_map(&closing)["reason"], json!("server going away"));

    let closed = next_invocation(&mut rx).await;
    assert_eq!(closed.method, "onClosed");
    assert_eq!(payload_map(&closed)["code"], json!(4000));

    let err = manager.send_text("late".to_owned()).await.unwrap_err();
    assert!(err.ws_error().is_some());
}

#[tokio::test]
async fn refused_connection_reports_io_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (manager, mut rx) = manager();
    manager.connect(&format!("ws://{addr}"), Options::new()).unwrap();

    let failure = next_invocation(&mut rx).await;
    assert_eq!(failure.method, "onFailure");
    assert_eq!(payload_map(&failure)["throwableType"], json!("Io"));
}

#[tokio::test]
async fn missing_pong_fails_connection() {
    // Accepts the handshake, then never reads again, so pings go unanswered.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws_stream = tokio_tungstenite::accept_async(stream).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(ws_stream);
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let manager = SessionManager::builder()
        .invoker(Arc::new(tx))
        .connector(Arc::new(TungsteniteConnector))
        .config(
            Config::builder()
                .ping_interval(Duration::from_millis(100))
                .build(),
        )
        .configurator(Arc::new(TemplateConfigurator))
        .build();
    manager.connect(&format!("ws://{addr}"), Options::new()).unwrap();

    wait_for(&mut rx, "onOpened").await;
    let failure = wait_for(&mut rx, "onFailure").await;
    assert_eq!(payload_map(&failure)["throwableType"], json!("Timeout"));
}
