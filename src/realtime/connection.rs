//! The single persistent push-channel connection.
//!
//! State machine: `Disconnected -> Connecting -> Connected -> Disconnected`.
//! `start` and `stop` are serialized against each other and are no-ops
//! when the connection is already in the requested state. A reader task
//! dispatches server invocations to handlers one at a time, in arrival
//! order; a writer task drains outbound frames and sends keep-alive pings.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::{CredentialStore, RealtimeConfig, SecureString};

use super::protocol::{
    encode_close, encode_invocation, encode_ping, handshake_request, parse_handshake_response,
    parse_message, split_frames, HubMessage,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SocketSink = SplitSink<Socket, Message>;
type SocketStream = SplitStream<Socket>;

type Handler = Arc<dyn Fn(&HubEvent) + Send + Sync>;
type ClosedHandler = Arc<dyn Fn(&ClosedEvent) + Send + Sync>;

const EVENT_BUFFER: usize = 256;
const CLOSE_GRACE: Duration = Duration::from_secs(2);
const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Errors reported by [`HubConnection::start`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    #[error("Invalid hub URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to connect to hub: {0}")]
    Connect(String),

    #[error("Hub handshake failed: {0}")]
    Handshake(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A named event pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct HubEvent {
    pub name: String,
    pub arguments: Vec<Value>,
}

impl HubEvent {
    /// Decode the positional argument at `index`.
    pub fn argument<T: DeserializeOwned>(&self, index: usize) -> Option<T> {
        let value = self.arguments.get(index)?;
        match serde_json::from_value(value.clone()) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(event = %self.name, index, error = %e, "Hub event argument has unexpected shape");
                None
            }
        }
    }
}

/// Fired when the connection drops for any reason other than `stop()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedEvent {
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Handle to the push-channel connection. Clones share one connection.
#[derive(Clone)]
pub struct HubConnection {
    inner: Arc<Inner>,
}

struct Inner {
    endpoint: String,
    keep_alive: Duration,
    credentials: CredentialStore,
    next_id: AtomicU64,
    handlers: RwLock<HashMap<String, Vec<(SubscriptionId, Handler)>>>,
    closed_handlers: RwLock<Vec<(SubscriptionId, ClosedHandler)>>,
    events: broadcast::Sender<HubEvent>,
    closed: broadcast::Sender<ClosedEvent>,
    link: Mutex<Link>,
    lifecycle: tokio::sync::Mutex<()>,
}

struct Link {
    state: ConnectionState,
    /// Whether the owner wants the connection up (set by start, cleared by stop).
    desired: bool,
    /// Bumped for every new session and every explicit stop, so a reader
    /// task from an older session cannot tear down a newer one.
    generation: u64,
    session: Option<Session>,
}

struct Session {
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

enum FrameOutcome {
    Continue,
    Closed(Option<String>),
}

impl HubConnection {
    pub fn new(config: &RealtimeConfig, credentials: CredentialStore) -> Self {
        let keep_alive = if config.keep_alive_seconds == 0 {
            DEFAULT_KEEP_ALIVE
        } else {
            config.keep_alive()
        };
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (closed, _) = broadcast::channel(16);

        Self {
            inner: Arc::new(Inner {
                endpoint: config.hub_url.clone(),
                keep_alive,
                credentials,
                next_id: AtomicU64::new(1),
                handlers: RwLock::new(HashMap::new()),
                closed_handlers: RwLock::new(Vec::new()),
                events,
                closed,
                link: Mutex::new(Link {
                    state: ConnectionState::Disconnected,
                    desired: false,
                    generation: 0,
                    session: None,
                }),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.link.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// True between a `start()` and the next `stop()`.
    pub fn wants_connection(&self) -> bool {
        self.inner.link.lock().desired
    }

    /// Whether both handles refer to the same underlying connection.
    pub fn ptr_eq(&self, other: &HubConnection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Open the connection with the token stored right now.
    ///
    /// No-op when already connected. On failure the state returns to
    /// `Disconnected`, the error is logged and returned; it is never
    /// raised any other way.
    pub async fn start(&self) -> Result<(), RealtimeError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        {
            let mut link = self.inner.link.lock();
            link.desired = true;
            if link.state == ConnectionState::Connected {
                tracing::debug!("Hub already connected");
                return Ok(());
            }
            link.state = ConnectionState::Connecting;
        }

        let token = self.inner.credentials.token();
        match open(&self.inner.endpoint, token.as_ref()).await {
            Ok((sink, stream, pending)) => {
                self.install(sink, stream, pending);
                tracing::info!(endpoint = %self.inner.endpoint, "Hub connected");
                Ok(())
            }
            Err(e) => {
                self.inner.link.lock().state = ConnectionState::Disconnected;
                tracing::warn!(endpoint = %self.inner.endpoint, error = %e, "Hub connection failed");
                Err(e)
            }
        }
    }

    /// Close the connection. No-op when already disconnected.
    ///
    /// Handlers stay registered; `on_closed` is not fired.
    pub async fn stop(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let session = {
            let mut link = self.inner.link.lock();
            link.desired = false;
            if link.state == ConnectionState::Disconnected {
                return;
            }
            link.generation += 1;
            link.state = ConnectionState::Disconnected;
            link.session.take()
        };

        if let Some(session) = session {
            session.shutdown().await;
        }
        tracing::info!("Hub connection stopped");
    }

    /// Register `handler` for server event `event` (names match
    /// case-insensitively).
    ///
    /// Register before `start()`; events that arrive before registration
    /// are not replayed.
    pub fn subscribe(
        &self,
        event: &str,
        handler: impl Fn(&HubEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.inner
            .handlers
            .write()
            .entry(event_key(event))
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Subscribe and receive events through a channel instead of a callback.
    pub fn subscribe_channel(
        &self,
        event: &str,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<HubEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(event, move |ev| {
            let _ = tx.send(ev.clone());
        });
        (id, rx)
    }

    /// Register a callback for unexpected closes.
    pub fn on_closed(
        &self,
        handler: impl Fn(&ClosedEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.inner
            .closed_handlers
            .write()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove an event or close handler. Returns false for unknown ids.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        {
            let mut handlers = self.inner.handlers.write();
            for list in handlers.values_mut() {
                let before = list.len();
                list.retain(|(hid, _)| *hid != id);
                removed |= list.len() != before;
            }
            handlers.retain(|_, list| !list.is_empty());
        }
        let mut closed = self.inner.closed_handlers.write();
        let before = closed.len();
        closed.retain(|(hid, _)| *hid != id);
        removed || closed.len() != before
    }

    /// Every event, regardless of name.
    pub fn events(&self) -> broadcast::Receiver<HubEvent> {
        self.inner.events.subscribe()
    }

    pub fn closed_events(&self) -> broadcast::Receiver<ClosedEvent> {
        self.inner.closed.subscribe()
    }

    /// Invoke a server method by name with positional arguments.
    ///
    /// While disconnected the message is dropped and only logged; check
    /// [`HubConnection::is_connected`] or use the HTTP equivalent when
    /// delivery matters.
    pub fn send(&self, target: &str, arguments: Vec<Value>) {
        let link = self.inner.link.lock();
        match (&link.state, &link.session) {
            (ConnectionState::Connected, Some(session)) => {
                let frame = encode_invocation(target, &arguments);
                if session.outbound.send(Message::Text(frame)).is_err() {
                    tracing::warn!(method = %target, "Hub writer gone, message dropped");
                }
            }
            _ => {
                tracing::warn!(method = %target, "Hub not connected, message dropped");
            }
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn install(&self, sink: SocketSink, stream: SocketStream, pending: Vec<String>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let mut link = self.inner.link.lock();
        link.generation += 1;
        let generation = link.generation;

        let writer = tokio::spawn(write_loop(sink, rx, self.inner.keep_alive));
        let reader = tokio::spawn(read_loop(
            Arc::downgrade(&self.inner),
            stream,
            pending,
            generation,
        ));

        link.session = Some(Session {
            outbound,
            reader,
            writer,
        });
        link.state = ConnectionState::Connected;
    }
}

impl std::fmt::Debug for HubConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConnection")
            .field("endpoint", &self.inner.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

impl Inner {
    fn dispatch(&self, event: HubEvent) {
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .get(&event_key(&event.name))
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        if handlers.is_empty() && self.events.receiver_count() == 0 {
            tracing::debug!(event = %event.name, "No subscribers for hub event");
        }

        for handler in &handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                tracing::error!(event = %event.name, "Hub event handler panicked");
            }
        }
        let _ = self.events.send(event);
    }

    fn connection_lost(&self, generation: u64, error: Option<String>) {
        let session = {
            let mut link = self.link.lock();
            if link.generation != generation || link.state != ConnectionState::Connected {
                return;
            }
            link.state = ConnectionState::Disconnected;
            link.session.take()
        };
        if let Some(session) = session {
            session.writer.abort();
        }

        tracing::warn!(error = ?error, "Hub connection closed unexpectedly");
        let event = ClosedEvent { error };
        let handlers: Vec<ClosedHandler> = self
            .closed_handlers
            .read()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in &handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                tracing::error!("Hub close handler panicked");
            }
        }
        let _ = self.closed.send(event);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(session) = self.link.get_mut().session.take() {
            session.reader.abort();
            session.writer.abort();
        }
    }
}

impl Session {
    async fn shutdown(self) {
        let _ = self.outbound.send(Message::Text(encode_close(None)));
        let _ = self.outbound.send(Message::Close(None));
        drop(self.outbound);

        let mut writer = self.writer;
        if tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
            writer.abort();
        }
        self.reader.abort();
    }
}

fn event_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Hub endpoint rewritten to a WebSocket URL, carrying the token as the
/// `access_token` query parameter when one is present.
pub(crate) fn connect_url(
    endpoint: &str,
    token: Option<&SecureString>,
) -> Result<Url, RealtimeError> {
    let invalid = |reason: String| RealtimeError::InvalidUrl {
        url: endpoint.to_string(),
        reason,
    };

    let mut url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid(format!("cannot switch scheme to '{}'", scheme)))?;

    if let Some(token) = token {
        url.query_pairs_mut()
            .append_pair("access_token", token.expose());
    }
    Ok(url)
}

async fn open(
    endpoint: &str,
    token: Option<&SecureString>,
) -> Result<(SocketSink, SocketStream, Vec<String>), RealtimeError> {
    let url = connect_url(endpoint, token)?;
    let (socket, _response) = connect_async(url.as_str())
        .await
        .map_err(|e| RealtimeError::Connect(e.to_string()))?;
    let (mut sink, mut stream) = socket.split();

    sink.send(Message::Text(handshake_request()))
        .await
        .map_err(|e| RealtimeError::Handshake(e.to_string()))?;

    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let mut frames = split_frames(&text);
                let Some(first) = frames.next() else {
                    continue;
                };
                parse_handshake_response(first).map_err(RealtimeError::Handshake)?;
                let pending = frames.map(str::to_string).collect();
                return Ok((sink, stream, pending));
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| f.reason.to_string())
                    .unwrap_or_else(|| "no reason".to_string());
                return Err(RealtimeError::Handshake(format!(
                    "closed during handshake: {}",
                    reason
                )));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(RealtimeError::Handshake(e.to_string())),
            None => {
                return Err(RealtimeError::Handshake(
                    "connection closed during handshake".to_string(),
                ))
            }
        }
    }
}

async fn read_loop(
    inner: Weak<Inner>,
    mut stream: SocketStream,
    pending: Vec<String>,
    generation: u64,
) {
    let error = 'read: {
        for frame in &pending {
            if let FrameOutcome::Closed(error) = handle_frame(&inner, frame) {
                break 'read error;
            }
        }

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    for frame in split_frames(&text) {
                        if let FrameOutcome::Closed(error) = handle_frame(&inner, frame) {
                            break 'read error;
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break 'read frame
                        .map(|f| f.reason.to_string())
                        .filter(|reason| !reason.is_empty());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break 'read Some(e.to_string()),
                None => break 'read None,
            }
        }
    };

    if let Some(inner) = inner.upgrade() {
        inner.connection_lost(generation, error);
    }
}

fn handle_frame(inner: &Weak<Inner>, frame: &str) -> FrameOutcome {
    let Some(inner) = inner.upgrade() else {
        return FrameOutcome::Closed(None);
    };

    match parse_message(frame) {
        Ok(HubMessage::Invocation { target, arguments }) => {
            inner.dispatch(HubEvent {
                name: target,
                arguments,
            });
        }
        Ok(HubMessage::Ping) => tracing::trace!("Hub ping"),
        Ok(HubMessage::Close {
            error,
            allow_reconnect,
        }) => {
            tracing::debug!(error = ?error, allow_reconnect, "Hub sent close");
            return FrameOutcome::Closed(error);
        }
        Ok(HubMessage::Other(kind)) => {
            tracing::debug!(kind, "Ignoring hub message");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring undecodable hub frame");
        }
    }
    FrameOutcome::Continue
}

async fn write_loop(
    mut sink: SocketSink,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    keep_alive: Duration,
) {
    let mut ticker =
        tokio::time::interval_at(tokio::time::Instant::now() + keep_alive, keep_alive);

    loop {
        tokio::select! {
            message = outbound.recv() => {
                let Some(message) = message else {
                    let _ = sink.close().await;
                    break;
                };
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    tracing::debug!(error = %e, "Hub write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            _ = ticker.tick() => {
                if sink.send(Message::Text(encode_ping())).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_url_rewrites_scheme_and_adds_token() {
        let token = SecureString::new("abc def".to_string());
        let url = connect_url("https://shop.example.com/hubs/store", Some(&token)).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://shop.example.com/hubs/store?access_token=abc+def"
        );

        let url = connect_url("http://127.0.0.1:5000/hub", None).unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:5000/hub");
    }

    #[test]
    fn connect_url_rejects_other_schemes() {
        assert!(matches!(
            connect_url("ftp://example.com/hub", None),
            Err(RealtimeError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn handlers_can_be_removed() {
        let conn = HubConnection::new(&RealtimeConfig::default(), CredentialStore::in_memory());
        let a = conn.subscribe("OrderUpdated", |_| {});
        let b = conn.on_closed(|_| {});
        assert!(conn.unsubscribe(a));
        assert!(conn.unsubscribe(b));
        assert!(!conn.unsubscribe(a));
    }

    #[test]
    fn event_argument_decoding() {
        let event = HubEvent {
            name: "OrderUpdated".to_string(),
            arguments: vec![serde_json::json!(42), serde_json::json!("Shipped")],
        };
        assert_eq!(event.argument::<u64>(0), Some(42));
        assert_eq!(event.argument::<String>(1), Some("Shipped".to_string()));
        assert_eq!(event.argument::<u64>(1), None);
        assert_eq!(event.argument::<u64>(5), None);
    }

    #[test]
    fn send_while_disconnected_is_noop() {
        let conn = HubConnection::new(&RealtimeConfig::default(), CredentialStore::in_memory());
        conn.send("SendMessage", vec![serde_json::json!("hi")]);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }
}
