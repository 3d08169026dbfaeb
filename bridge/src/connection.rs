//! Native WebSocket Connection
//!
//! Socket I/O runs on a dedicated thread with its own tokio runtime. Events
//! are pushed to a host callback; the host is expected to forward them to the
//! thread that owns the [`crate::Bridge`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::bridge::Transport;
use crate::error::{BridgeError, Result};
use crate::preview;

/// Connection states, numbered like the browser `WebSocket.readyState`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Something that happened on the socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    Open,
    Message(String),
    Error(String),
    Close { code: u16, reason: String },
}

enum Outgoing {
    Text(String),
    Close,
}

/// Cloneable handle to a running connection.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    sender: mpsc::UnboundedSender<Outgoing>,
    ready_state: Arc<AtomicU8>,
}

impl ConnectionHandle {
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready_state.load(Ordering::SeqCst))
    }

    /// Queue a text frame. Fails unless the socket is open.
    pub fn send(&self, text: String) -> Result<()> {
        if self.ready_state() != ReadyState::Open {
            return Err(BridgeError::NotOpen);
        }
        self.sender
            .send(Outgoing::Text(text))
            .map_err(|_| BridgeError::Closed)
    }

    /// Start a normal close handshake. Only a connecting or open socket
    /// moves to `Closing`; a closed one stays closed.
    pub fn close(&self) {
        let started = self
            .ready_state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |state| {
                match ReadyState::from_u8(state) {
                    ReadyState::Connecting | ReadyState::Open => Some(ReadyState::Closing as u8),
                    ReadyState::Closing | ReadyState::Closed => None,
                }
            })
            .is_ok();
        if started {
            let _ = self.sender.send(Outgoing::Close);
        }
    }
}

impl Transport for ConnectionHandle {
    fn send_text(&self, text: String) -> Result<()> {
        self.send(text)
    }
}

/// Open a connection to `url`. Returns immediately; the outcome arrives as
/// [`ConnectionEvent::Open`] or [`ConnectionEvent::Error`] followed by
/// [`ConnectionEvent::Close`].
pub fn connect<F>(url: &Url, on_event: F) -> Result<ConnectionHandle>
where
    F: Fn(ConnectionEvent) + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let ready_state = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| BridgeError::Platform(format!("failed to create socket runtime: {}", e)))?;

    let url = url.clone();
    let state = ready_state.clone();
    thread::Builder::new()
        .name("taupy-socket".to_string())
        .spawn(move || runtime.block_on(run(url, rx, state, on_event)))
        .map_err(|e| BridgeError::Platform(format!("failed to spawn socket thread: {}", e)))?;

    Ok(ConnectionHandle {
        sender: tx,
        ready_state,
    })
}

async fn run<F>(
    url: Url,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
    ready_state: Arc<AtomicU8>,
    on_event: F,
) where
    F: Fn(ConnectionEvent),
{
    let set_state = |state: ReadyState| ready_state.store(state as u8, Ordering::SeqCst);
    let fail = |message: String| {
        set_state(ReadyState::Closed);
        on_event(ConnectionEvent::Error(message));
        on_event(ConnectionEvent::Close {
            code: 1006,
            reason: String::new(),
        });
    };

    log::info!("[WebSocket] Connecting to {}", url);
    let ws_stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, response)) => {
            log::info!("[WebSocket] Connected (status: {})", response.status());
            stream
        }
        Err(e) => {
            log::error!("[WebSocket] Connection to {} failed: {}", url, e);
            fail(e.to_string());
            return;
        }
    };

    // A close requested while still connecting wins over the open.
    if ready_state
        .compare_exchange(
            ReadyState::Connecting as u8,
            ReadyState::Open as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        )
        .is_ok()
    {
        on_event(ConnectionEvent::Open);
    }

    let (mut write, mut read) = ws_stream.split();

    let send_task = tokio::spawn(async move {
        while let Some(outgoing) = rx.recv().await {
            let message = match outgoing {
                Outgoing::Text(text) => Message::Text(text.into()),
                Outgoing::Close => Message::Close(None),
            };
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = write.send(message).await {
                log::error!("[WebSocket] Send error: {}", e);
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = read.next().await {
        match result {
            Ok(Message::Text(text)) => {
                log::debug!("[WebSocket] Received: {}", preview(text.as_str()));
                on_event(ConnectionEvent::Message(text.as_str().to_owned()));
            }
            Ok(Message::Binary(data)) => {
                log::debug!("[WebSocket] Ignoring binary frame ({} bytes)", data.len());
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
            Ok(Message::Close(frame)) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.to_string()))
                    .unwrap_or((1000, String::new()));
                log::info!("[WebSocket] Received close: {} {}", code, reason);
                set_state(ReadyState::Closed);
                on_event(ConnectionEvent::Close { code, reason });
                send_task.abort();
                return;
            }
            Err(e) => {
                log::error!("[WebSocket] Read error: {}", e);
                send_task.abort();
                fail(e.to_string());
                return;
            }
        }
    }

    send_task.abort();
    set_state(ReadyState::Closed);
    on_event(ConnectionEvent::Close {
        code: 1006,
        reason: String::new(),
    });
    log::info!("[WebSocket] Connection ended");
}
