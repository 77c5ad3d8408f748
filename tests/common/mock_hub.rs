//! Mock push hub speaking the JSON hub protocol over a WebSocket.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

const RS: char = '\u{1e}';

#[derive(Debug, Clone)]
enum HubCommand {
    Send(String),
    Close(Option<String>),
    Drop,
}

struct HubState {
    uris: Mutex<Vec<String>>,
    frames: Mutex<Vec<Value>>,
    commands: broadcast::Sender<HubCommand>,
    accepted: AtomicUsize,
    active: AtomicUsize,
    reject_handshake: AtomicBool,
}

pub struct MockHub {
    pub addr: SocketAddr,
    state: Arc<HubState>,
    task: JoinHandle<()>,
}

impl MockHub {
    pub async fn start() -> Self {
        let (commands, _) = broadcast::channel(64);
        let state = Arc::new(HubState {
            uris: Mutex::new(Vec::new()),
            frames: Mutex::new(Vec::new()),
            commands,
            accepted: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            reject_handshake: AtomicBool::new(false),
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock hub");
        let addr = listener.local_addr().unwrap();

        let accept_state = state.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, accept_state.clone()));
            }
        });

        Self { addr, state, task }
    }

    /// Hub URL in the form the client is configured with.
    pub fn url(&self) -> String {
        format!("http://{}/hubs/store", self.addr)
    }

    /// Push an invocation of `target` to every connected client.
    pub fn invoke(&self, target: &str, arguments: Value) {
        let frame = format!(
            "{}{}",
            json!({ "type": 1, "target": target, "arguments": arguments }),
            RS
        );
        let _ = self.state.commands.send(HubCommand::Send(frame));
    }

    /// Send raw text, possibly several frames at once.
    pub fn send_raw(&self, text: &str) {
        let _ = self.state.commands.send(HubCommand::Send(text.to_string()));
    }

    /// Send a protocol close message, then close the socket.
    pub fn close(&self, error: Option<&str>) {
        let _ = self
            .state
            .commands
            .send(HubCommand::Close(error.map(str::to_string)));
    }

    /// Drop every socket without a close handshake.
    pub fn drop_connections(&self) {
        let _ = self.state.commands.send(HubCommand::Drop);
    }

    pub fn reject_handshakes(&self, reject: bool) {
        self.state.reject_handshake.store(reject, Ordering::SeqCst);
    }

    pub fn uris(&self) -> Vec<String> {
        self.state.uris.lock().clone()
    }

    /// Frames received from clients after the handshake.
    pub fn received(&self) -> Vec<Value> {
        self.state.frames.lock().clone()
    }

    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }
}

impl Drop for MockHub {
    fn drop(&mut self) {
        self.task.abort();
        let _ = self.state.commands.send(HubCommand::Drop);
    }
}

async fn serve(stream: TcpStream, state: Arc<HubState>) {
    let mut commands = state.commands.subscribe();

    let uri = Arc::new(Mutex::new(None));
    let slot = uri.clone();
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        *slot.lock() = Some(req.uri().to_string());
        Ok(resp)
    };
    let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };
    if let Some(uri) = uri.lock().take() {
        state.uris.lock().push(uri);
    }
    state.accepted.fetch_add(1, Ordering::SeqCst);

    let (mut sink, mut source) = ws.split();

    match source.next().await {
        Some(Ok(Message::Text(text))) if text.contains("\"protocol\"") => {}
        _ => return,
    }
    let reply = if state.reject_handshake.load(Ordering::SeqCst) {
        format!("{}{}", json!({ "error": "Handshake rejected" }), RS)
    } else {
        format!("{{}}{}", RS)
    };
    if sink.send(Message::Text(reply)).await.is_err() {
        return;
    }
    if state.reject_handshake.load(Ordering::SeqCst) {
        let _ = sink.close().await;
        return;
    }

    state.active.fetch_add(1, Ordering::SeqCst);
    loop {
        tokio::select! {
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let mut frames = state.frames.lock();
                    for frame in text.split(RS).filter(|f| !f.trim().is_empty()) {
                        if let Ok(value) = serde_json::from_str::<Value>(frame) {
                            frames.push(value);
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            command = commands.recv() => match command {
                Ok(HubCommand::Send(text)) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Ok(HubCommand::Close(error)) => {
                    let frame = match error {
                        Some(error) => json!({ "type": 7, "error": error }),
                        None => json!({ "type": 7 }),
                    };
                    let _ = sink.send(Message::Text(format!("{}{}", frame, RS))).await;
                    let _ = sink.close().await;
                    break;
                }
                Ok(HubCommand::Drop) | Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => {}
            },
        }
    }
    state.active.fetch_sub(1, Ordering::SeqCst);
}
