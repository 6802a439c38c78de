use std::sync::Arc;

use async_stream::stream;
use backoff::backoff::{Backoff as _, Constant};
use bon::bon;
use bytes::Bytes;
use futures::Stream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use url::Url;

use super::config::{Config, ConnectionConfigurator, Options};
use super::dispatcher::{EventDispatcher, MessageSink};
use super::error::WsError;
use super::events::{
    CLIENT_DONE_REASON, GOING_AWAY, MessageKind, NORMAL_CLOSURE, RESTART_REASON, SystemEvent,
    TransportEvent, TransportFailure,
};
use super::session::{ConnectionId, SessionPhase, SessionState, Transport};
use super::traits::{Configurator, Connector, MethodInvoker};
use crate::Result;
use crate::error::{Error, Kind};

/// Work items for the session task. Everything that touches session state is one of these.
enum Task {
    Connect {
        url: String,
        options: Options,
        /// Restart generation of a delayed retry, `None` for a direct request
        restart: Option<u64>,
    },
    Disconnect {
        code: Option<u16>,
        reason: Option<String>,
    },
    SendText {
        text: String,
        reply: oneshot::Sender<std::result::Result<(), WsError>>,
    },
    SendBinary {
        bytes: Bytes,
        reply: oneshot::Sender<std::result::Result<(), WsError>>,
    },
    Subscribe(MessageSink),
    Cancel(MessageKind),
    Status(oneshot::Sender<SessionStatus>),
    Transport {
        id: ConnectionId,
        event: TransportEvent,
    },
    Terminate,
}

/// Snapshot of the session record.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    /// Connect retries scheduled since the last successful open
    pub restart_attempts: u32,
    /// `autoReconnect` as read at the last connect, cleared by disconnect
    pub auto_reconnect: bool,
    /// URL of the most recent connect that reached the transport
    pub server_url: Option<String>,
}

/// Callback handle given to a transport when it is opened.
///
/// Every callback is queued onto the session task, tagged with the transport it came from.
/// Once the session manager is gone, callbacks are discarded.
#[derive(Clone)]
pub struct TransportListener {
    id: ConnectionId,
    tasks: mpsc::WeakUnboundedSender<Task>,
}

impl TransportListener {
    pub fn on_event(&self, event: TransportEvent) {
        if let Some(tasks) = self.tasks.upgrade() {
            _ = tasks.send(Task::Transport { id: self.id, event });
        }
    }

    pub fn on_open(&self) {
        self.on_event(TransportEvent::Opened);
    }

    pub fn on_text(&self, text: String) {
        self.on_event(TransportEvent::Text(text));
    }

    pub fn on_binary(&self, bytes: Bytes) {
        self.on_event(TransportEvent::Binary(bytes));
    }

    pub fn on_closing(&self, code: u16, reason: String) {
        self.on_event(TransportEvent::Closing { code, reason });
    }

    pub fn on_closed(&self, code: u16, reason: String) {
        self.on_event(TransportEvent::Closed { code, reason });
    }

    pub fn on_failure(&self, failure: TransportFailure) {
        self.on_event(TransportEvent::Failure(failure));
    }
}

/// Single-session WebSocket client.
///
/// All operations are queued onto one background task that owns the session
/// state, so no two state transitions ever run concurrently. Connection status
/// is reported asynchronously through the [`MethodInvoker`] as lifecycle events;
/// inbound messages go to subscribed [`MessageSink`]s.
///
/// # Example
///
/// ```ignore
/// let (events_tx, mut events) = tokio::sync::mpsc::unbounded_channel();
/// let manager = SessionManager::builder()
///     .invoker(Arc::new(events_tx))
///     .connector(Arc::new(TungsteniteConnector))
///     .build();
///
/// manager.connect("wss://echo.example.com", Options::new())?;
/// let mut texts = Box::pin(manager.text_messages()?);
/// ```
#[derive(Clone)]
pub struct SessionManager {
    tasks: mpsc::UnboundedSender<Task>,
    join: Arc<Mutex<Option<JoinHandle<Result<()>>>>>,
}

#[bon]
impl SessionManager {
    /// Create a session manager and start its task. Must be called within a Tokio runtime.
    #[builder]
    pub fn new(
        invoker: Arc<dyn MethodInvoker>,
        connector: Arc<dyn Connector>,
        #[builder(default)] config: Config,
        #[builder(default = default_configurator())] configurator: Arc<dyn Configurator>,
    ) -> Self {
        let (tasks, tasks_rx) = mpsc::unbounded_channel();

        let actor = Actor {
            restart_backoff: Constant::from(&config),
            config,
            configurator,
            connector,
            state: SessionState::new(),
            dispatcher: EventDispatcher::new(invoker),
            tasks: tasks.downgrade(),
        };
        let join = tokio::spawn(actor.run(tasks_rx));

        Self {
            tasks,
            join: Arc::new(Mutex::new(Some(join))),
        }
    }
}

impl SessionManager {
    fn submit(&self, task: Task) -> Result<()> {
        self.tasks.send(task).map_err(|_e| Error::closed())
    }

    /// Request a connection. Returns immediately; the outcome arrives as an
    /// `onOpened` or `onFailure` event.
    ///
    /// If a session is still live it is closed with code 1001 and this request
    /// is retried after the configured restart delay.
    pub fn connect(&self, url: &str, options: Options) -> Result<()> {
        if url.is_empty() {
            return Err(Error::validation("server url must not be empty"));
        }
        self.submit(Task::Connect {
            url: url.to_owned(),
            options,
            restart: None,
        })
    }

    /// Gracefully close the live connection, if any, and drop pending restarts.
    /// Omitting either the code or the reason closes with `(1000, "Client done.")`.
    pub fn disconnect(&self, code: Option<u16>, reason: Option<String>) -> Result<()> {
        self.submit(Task::Disconnect { code, reason })
    }

    /// Enqueue a text frame on the live connection.
    ///
    /// Fails with [`WsError::NotConnected`] before the connection opened and with
    /// [`WsError::SendRejected`] when the transport refused the frame.
    pub async fn send_text(&self, text: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.submit(Task::SendText { text, reply })?;
        rx.await.map_err(|_e| Error::closed())??;
        Ok(())
    }

    /// Enqueue a binary frame on the live connection. Same contract as [`Self::send_text`].
    pub async fn send_binary(&self, bytes: Bytes) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.submit(Task::SendBinary { bytes, reply })?;
        rx.await.map_err(|_e| Error::closed())??;
        Ok(())
    }

    pub fn subscribe(&self, sink: MessageSink) -> Result<()> {
        self.submit(Task::Subscribe(sink))
    }

    pub fn cancel(&self, kind: MessageKind) -> Result<()> {
        self.submit(Task::Cancel(kind))
    }

    /// Subscribe to inbound text messages as a stream.
    ///
    /// Replaces any existing text sink. Dropping the stream while messages are
    /// still arriving is a delivery failure and stops the session manager.
    pub fn text_messages(&self) -> Result<impl Stream<Item = String> + use<>> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.subscribe(MessageSink::text(tx))?;

        Ok(stream! {
            while let Some(text) = rx.recv().await {
                yield text;
            }
        })
    }

    /// Subscribe to inbound binary messages as a stream. See [`Self::text_messages`].
    pub fn binary_messages(&self) -> Result<impl Stream<Item = Bytes> + use<>> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.subscribe(MessageSink::binary(tx))?;

        Ok(stream! {
            while let Some(bytes) = rx.recv().await {
                yield bytes;
            }
        })
    }

    pub async fn status(&self) -> Result<SessionStatus> {
        let (reply, rx) = oneshot::channel();
        self.submit(Task::Status(reply))?;
        rx.await.map_err(|_e| Error::closed())
    }

    /// Whether the session task is still accepting work.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tasks.is_closed()
    }

    /// Disconnect, detach all sinks and stop the session task.
    ///
    /// Returns the task's final result, which carries the delivery error if a
    /// message sink failed earlier. Calling this more than once returns `Ok(())`.
    pub async fn terminate(&self) -> Result<()> {
        _ = self.tasks.send(Task::Terminate);

        let Some(join) = self.join.lock().await.take() else {
            return Ok(());
        };
        match join.await {
            Ok(result) => result,
            Err(e) => Err(Error::with_source(Kind::Internal, e)),
        }
    }
}

fn default_configurator() -> Arc<dyn Configurator> {
    Arc::new(ConnectionConfigurator)
}

/// The affinity context: the only owner of the session state.
struct Actor {
    config: Config,
    configurator: Arc<dyn Configurator>,
    connector: Arc<dyn Connector>,
    state: SessionState,
    dispatcher: EventDispatcher,
    restart_backoff: Constant,
    tasks: mpsc::WeakUnboundedSender<Task>,
}

impl Actor {
    async fn run(mut self, mut tasks_rx: mpsc::UnboundedReceiver<Task>) -> Result<()> {
        while let Some(task) = tasks_rx.recv().await {
            if matches!(task, Task::Terminate) {
                break;
            }
            if let Err(e) = self.handle(task) {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %e, "Session manager stopping after fatal error");
                self.shutdown();
                return Err(e.into());
            }
        }

        self.shutdown();
        Ok(())
    }

    fn handle(&mut self, task: Task) -> std::result::Result<(), WsError> {
        match task {
            Task::Connect {
                url,
                options,
                restart,
            } => self.connect(url, options, restart),
            Task::Disconnect { code, reason } => self.disconnect(code, reason),
            Task::SendText { text, reply } => {
                let result = self.send(|handle| handle.send_text(text), MessageKind::Text);
                _ = reply.send(result);
            }
            Task::SendBinary { bytes, reply } => {
                let result = self.send(|handle| handle.send_binary(bytes), MessageKind::Binary);
                _ = reply.send(result);
            }
            Task::Subscribe(sink) => self.dispatcher.subscribe(sink),
            Task::Cancel(kind) => {
                self.dispatcher.cancel(kind);
            }
            Task::Status(reply) => {
                _ = reply.send(SessionStatus {
                    phase: self.state.phase(),
                    restart_attempts: self.state.restart_attempts(),
                    auto_reconnect: self.state.auto_reconnect(),
                    server_url: self.state.server_url().map(ToString::to_string),
                });
            }
            Task::Transport { id, event } => return self.on_transport_event(id, event),
            // Handled by the run loop.
            Task::Terminate => {}
        }
        Ok(())
    }

    fn connect(&mut self, url: String, options: Options, restart: Option<u64>) {
        if restart.is_some_and(|generation| generation != self.state.restart_generation()) {
            #[cfg(feature = "tracing")]
            tracing::debug!(%url, "Dropping delayed connect abandoned by disconnect");
            return;
        }

        if self.state.is_live() {
            #[cfg(feature = "tracing")]
            tracing::warn!("Connection still active on new connect attempt, restarting");
            self.state.request_close(GOING_AWAY, RESTART_REASON);
            self.schedule_restart(url, options);
            return;
        }

        let parsed = match Url::parse(&url) {
            Ok(parsed) => parsed,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::error!(%url, error = %e, "Invalid WebSocket server url");
                let failure = TransportFailure::from_error("InvalidUrl", &WsError::InvalidUrl(e));
                self.dispatcher.dispatch_system(&SystemEvent::Failure(failure));
                return;
            }
        };

        let config = self.configurator.configure(&self.config, &options);
        let id = self.state.allocate_id();
        let listener = TransportListener {
            id,
            tasks: self.tasks.clone(),
        };
        let handle = self.connector.open(parsed.clone(), &config, listener);
        self.state.begin_connecting(parsed, &options, Transport { id, handle });

        #[cfg(feature = "tracing")]
        tracing::info!(%url, connection = id, "Request to connect to WebSocket server sent");
    }

    fn schedule_restart(&mut self, url: String, options: Options) {
        let attempt = self.state.record_restart_attempt();
        #[cfg(feature = "tracing")]
        tracing::info!(attempt, "Scheduling delayed connect");

        if attempt > self.config.max_restart_attempts && self.state.cancel() {
            #[cfg(feature = "tracing")]
            tracing::warn!(attempt, "Transport did not close in time, cancelling it");
        }

        let delay = self
            .restart_backoff
            .next_backoff()
            .unwrap_or(self.config.restart_delay);
        let generation = self.state.restart_generation();
        let tasks = self.tasks.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            if let Some(tasks) = tasks.upgrade() {
                _ = tasks.send(Task::Connect {
                    url,
                    options,
                    restart: Some(generation),
                });
            }
        });
    }

    fn disconnect(&mut self, code: Option<u16>, reason: Option<String>) {
        self.state.disable_auto_reconnect();
        self.state.abandon_restarts();

        if self.state.open_handle().is_none() {
            #[cfg(feature = "tracing")]
            tracing::warn!("No open WebSocket on disconnect");
            return;
        }

        let (code, reason) = match (code, reason) {
            (Some(code), Some(reason)) => (code, reason),
            _ => (NORMAL_CLOSURE, CLIENT_DONE_REASON.to_owned()),
        };
        if !self.state.request_close(code, &reason) {
            #[cfg(feature = "tracing")]
            tracing::debug!(code, %reason, "WebSocket close already in progress");
        }
    }

    fn send<F>(&self, send: F, kind: MessageKind) -> std::result::Result<(), WsError>
    where
        F: FnOnce(&dyn super::traits::TransportHandle) -> bool,
    {
        let Some(handle) = self.state.open_handle() else {
            #[cfg(feature = "tracing")]
            tracing::warn!(%kind, "WebSocket is not connected yet, unable to send message");
            #[cfg(not(feature = "tracing"))]
            let _ = kind;
            return Err(WsError::NotConnected);
        };

        if send(handle) {
            Ok(())
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!(%kind, "WebSocket refused to enqueue message");
            Err(WsError::SendRejected)
        }
    }

    fn on_transport_event(
        &mut self,
        id: ConnectionId,
        event: TransportEvent,
    ) -> std::result::Result<(), WsError> {
        match event {
            TransportEvent::Opened => {
                if self.state.opened(id) {
                    #[cfg(feature = "tracing")]
                    tracing::info!(connection = id, "WebSocket connected");
                    self.dispatcher.dispatch_system(&SystemEvent::Opened);
                } else {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(connection = id, "Open ignored, transport stale or closing");
                }
            }
            TransportEvent::Text(text) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(connection = id, len = text.len(), "Text message received");
                self.dispatcher.dispatch_text(text)?;
            }
            TransportEvent::Binary(bytes) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(connection = id, len = bytes.len(), "Byte message received");
                self.dispatcher.dispatch_binary(bytes)?;
            }
            TransportEvent::Closing { code, reason } => {
                #[cfg(feature = "tracing")]
                tracing::info!(connection = id, code, %reason, "WebSocket is about to close");
                self.state.closing(id);
                self.dispatcher.dispatch_system(&SystemEvent::Closing { code, reason });
            }
            TransportEvent::Closed { code, reason } => {
                #[cfg(feature = "tracing")]
                tracing::info!(connection = id, code, %reason, "WebSocket closed");
                self.state.terminated(id);
                self.dispatcher.dispatch_system(&SystemEvent::Closed { code, reason });
            }
            TransportEvent::Failure(failure) => {
                #[cfg(feature = "tracing")]
                tracing::error!(connection = id, %failure, "Error occurred on WebSocket");
                self.state.terminated(id);
                self.dispatcher.dispatch_system(&SystemEvent::Failure(failure));
            }
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.state.disable_auto_reconnect();
        self.state.abandon_restarts();
        if self.state.open_handle().is_some() {
            self.state.request_close(NORMAL_CLOSURE, CLIENT_DONE_REASON);
        } else {
            self.state.cancel();
        }
        self.dispatcher.close();

        #[cfg(feature = "tracing")]
        tracing::info!("Session manager terminated");
    }
}
