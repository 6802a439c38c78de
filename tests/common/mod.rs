#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Not every test binary uses every helper"
)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;
use web_socket_support::ws::config::Config;
use web_socket_support::ws::events::{MethodInvocation, Payload, TransportFailure};
use web_socket_support::ws::{Connector, SessionManager, TransportHandle, TransportListener};

pub const SERVER_URL: &str = "ws://fake.server/socket";

/// Records everything the session manager did to one transport.
pub struct MockTransport {
    pub url: Url,
    pub listener: TransportListener,
    pub sent_text: Mutex<Vec<String>>,
    pub sent_binary: Mutex<Vec<Bytes>>,
    pub closes: Mutex<Vec<(u16, String)>>,
    pub cancels: AtomicU32,
    accept_sends: bool,
    complete_close: bool,
}

impl MockTransport {
    pub fn closes(&self) -> Vec<(u16, String)> {
        self.closes.lock().unwrap().clone()
    }

    pub fn sent_text(&self) -> Vec<String> {
        self.sent_text.lock().unwrap().clone()
    }

    pub fn sent_binary(&self) -> Vec<Bytes> {
        self.sent_binary.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> u32 {
        self.cancels.load(Ordering::SeqCst)
    }
}

struct MockHandle(Arc<MockTransport>);

impl TransportHandle for MockHandle {
    fn send_text(&self, text: String) -> bool {
        self.0.sent_text.lock().unwrap().push(text);
        self.0.accept_sends
    }

    fn send_binary(&self, bytes: Bytes) -> bool {
        self.0.sent_binary.lock().unwrap().push(bytes);
        self.0.accept_sends
    }

    fn close(&self, code: u16, reason: &str) -> bool {
        let mut closes = self.0.closes.lock().unwrap();
        closes.push((code, reason.to_owned()));
        if closes.len() > 1 {
            return false;
        }
        if self.0.complete_close {
            self.0.listener.on_closed(code, reason.to_owned());
        }
        true
    }

    fn cancel(&self) {
        self.0.cancels.fetch_add(1, Ordering::SeqCst);
        self.0
            .listener
            .on_failure(TransportFailure::new("Canceled", "Canceled"));
    }
}

/// Scripted transport: opens immediately, completes closes, accepts sends,
/// unless told otherwise.
#[derive(Clone)]
pub struct MockConnector {
    opened: Arc<Mutex<Vec<Arc<MockTransport>>>>,
    configs: Arc<Mutex<Vec<Config>>>,
    auto_open: Arc<AtomicBool>,
    accept_sends: bool,
    complete_close: bool,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self {
            opened: Arc::default(),
            configs: Arc::default(),
            auto_open: Arc::new(AtomicBool::new(true)),
            accept_sends: true,
            complete_close: true,
        }
    }
}

impl MockConnector {
    #[must_use]
    pub fn manual_open(self) -> Self {
        self.auto_open.store(false, Ordering::SeqCst);
        self
    }

    #[must_use]
    pub fn reject_sends(mut self) -> Self {
        self.accept_sends = false;
        self
    }

    #[must_use]
    pub fn ignore_close(mut self) -> Self {
        self.complete_close = false;
        self
    }

    pub fn opened(&self) -> Vec<Arc<MockTransport>> {
        self.opened.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn transport(&self, index: usize) -> Arc<MockTransport> {
        Arc::clone(&self.opened.lock().unwrap()[index])
    }

    pub fn configs(&self) -> Vec<Config> {
        self.configs.lock().unwrap().clone()
    }
}

impl Connector for MockConnector {
    fn open(
        &self,
        url: Url,
        config: &Config,
        listener: TransportListener,
    ) -> Box<dyn TransportHandle> {
        let transport = Arc::new(MockTransport {
            url,
            listener,
            sent_text: Mutex::default(),
            sent_binary: Mutex::default(),
            closes: Mutex::default(),
            cancels: AtomicU32::new(0),
            accept_sends: self.accept_sends,
            complete_close: self.complete_close,
        });
        if self.auto_open.load(Ordering::SeqCst) {
            transport.listener.on_open();
        }
        self.opened.lock().unwrap().push(Arc::clone(&transport));
        self.configs.lock().unwrap().push(config.clone());
        Box::new(MockHandle(transport))
    }
}

pub type Invocations = mpsc::UnboundedReceiver<MethodInvocation>;

pub fn manager(connector: &MockConnector) -> (SessionManager, Invocations) {
    let (tx, rx) = mpsc::unbounded_channel();
    let manager = SessionManager::builder()
        .invoker(Arc::new(tx))
        .connector(Arc::new(connector.clone()))
        .build();
    (manager, rx)
}

/// Wait for the next outbound invocation.
pub async fn next_invocation(rx: &mut Invocations) -> MethodInvocation {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for invocation")
        .expect("invoker channel closed")
}

/// Wait until an invocation with `method` arrives, skipping others.
pub async fn wait_for(rx: &mut Invocations, method: &str) -> MethodInvocation {
    loop {
        let invocation = next_invocation(rx).await;
        if invocation.method == method {
            return invocation;
        }
    }
}

pub fn payload_map(invocation: &MethodInvocation) -> Map<String, Value> {
    match &invocation.arguments {
        Payload::Map(map) => map.clone(),
        other => panic!("expected map payload, got {other:?}"),
    }
}

pub fn options(auto_reconnect: bool) -> Map<String, Value> {
    let mut options = Map::new();
    options.insert("autoReconnect".to_owned(), Value::Bool(auto_reconnect));
    options
}
