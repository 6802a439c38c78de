//! Echo session walkthrough.
//!
//! This example drives one full session lifecycle against an echo server:
//! 1. Connecting and waiting for `onOpened`
//! 2. Sending text and binary frames and reading the echoes from the message streams
//! 3. Restarting the session with a second connect
//! 4. Disconnecting and terminating the client
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info cargo run --example echo --features tracing -- wss://echo.websocket.org
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt as _;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, warn};
use web_socket_support::channels::{MethodCall, MethodCallHandler as _, PlatformChannels};
use web_socket_support::ws::events::MethodInvocation;

const DEFAULT_SERVER_URL: &str = "wss://echo.websocket.org";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let server_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_owned());

    let (events_tx, mut events) = mpsc::unbounded_channel::<MethodInvocation>();
    let channels = PlatformChannels::with_invoker(Arc::new(events_tx));
    let manager = channels.manager().clone();

    let version = channels
        .on_method_call(MethodCall::builder().method("getPlatformVersion").build())
        .await;
    info!(?version, "Platform");

    manager.connect(&server_url, serde_json::Map::new())?;
    wait_for(&mut events, "onOpened").await?;

    let mut texts = Box::pin(manager.text_messages()?);
    let mut binaries = Box::pin(manager.binary_messages()?);

    manager.send_text("hello".to_owned()).await?;
    manager.send_binary(Bytes::from_static(b"\x01\x02\x03")).await?;

    while let Ok(Some(text)) = timeout(Duration::from_secs(5), texts.next()).await {
        info!(stream = "text", %text);
        if text == "hello" {
            break;
        }
    }
    if let Ok(Some(bytes)) = timeout(Duration::from_secs(5), binaries.next()).await {
        info!(stream = "binary", len = bytes.len());
    }

    info!("Restarting session");
    manager.connect(&server_url, serde_json::Map::new())?;
    wait_for(&mut events, "onOpened").await?;
    info!(status = ?manager.status().await?, "Session restarted");

    manager.disconnect(None, None)?;
    wait_for(&mut events, "onClosed").await?;

    channels.terminate().await?;
    Ok(())
}

async fn wait_for(
    events: &mut mpsc::UnboundedReceiver<MethodInvocation>,
    method: &str,
) -> anyhow::Result<()> {
    loop {
        let Some(event) = timeout(Duration::from_secs(10), events.recv()).await? else {
            anyhow::bail!("event channel closed while waiting for {method}");
        };
        info!(method = %event.method, arguments = ?event.arguments, "Event");
        if event.method == method {
            return Ok(());
        }
        if event.method == "onFailure" {
            warn!("Session failed while waiting for {method}");
        }
    }
}
