//! Socket lifecycle for a single websocket connection.

use super::dispatcher::Dispatcher;
use super::hooks::WsHooks;
use crate::error::{BpxError, Result};
use crate::types::{CloseInfo, ConnectionState, SubscriptionMessage};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::*;
use serde::Serialize;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::{Mutex as StdMutex, PoisonError};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Close code reported when the peer's close frame carries no status.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Close code reported when the connection dropped without a close handshake.
pub const CLOSE_ABNORMAL: u16 = 1006;

// Type alias for the WebSocket stream
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// How a receive loop ended. Reported to a hook after teardown.
enum LoopExit {
    Closed(CloseInfo),
    Failed(BpxError),
}

/// Owns one websocket connection and its [`ConnectionState`].
///
/// `connect` runs the receive loop and only returns once the connection has
/// ended, so it is normally spawned on its own task while other tasks call
/// [`send`](Self::send), [`subscribe`](Self::subscribe) and
/// [`close`](Self::close) through a shared reference.
pub struct ConnectionManager {
    url: String,
    dispatcher: Dispatcher,
    state: StdMutex<ConnectionState>,
    // The split sink needs exclusive access; concurrent senders queue here.
    writer: Mutex<Option<WsSink>>,
}

impl ConnectionManager {
    pub fn new(url: impl Into<String>, hooks: WsHooks) -> Self {
        Self {
            url: url.into(),
            dispatcher: Dispatcher::new(hooks),
            state: StdMutex::new(ConnectionState::Disconnected),
            writer: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn hooks(&self) -> &WsHooks {
        self.dispatcher.hooks()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        trace!("Connection state {} -> {}", *state, next);
        *state = next;
    }

    /// Moves to `Connecting` unless a connection is already live.
    fn begin_connect(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.is_live() {
            return false;
        }
        *state = ConnectionState::Connecting;
        true
    }

    /// Connects and runs the receive loop until the connection ends.
    pub async fn connect(&self) {
        self.connect_with_cancel(CancellationToken::new()).await
    }

    /// Connects and runs the receive loop until the connection ends or `cancel`
    /// fires. Cancellation closes the transport and reports code 1000.
    ///
    /// Calling this while a connection is already live is a no-op. Failures are
    /// reported through the error hook and never returned. The close or error
    /// hook that ends a connection runs once the state is `Closed`, so it may
    /// call `connect` again.
    pub async fn connect_with_cancel(&self, cancel: CancellationToken) {
        if !self.begin_connect() {
            warn!(
                "connect() ignored: connection to {} is already {}",
                self.url,
                self.state()
            );
            return;
        }

        let url = match Url::parse(&self.url) {
            Ok(url) => url,
            Err(e) => {
                self.fail_connect(BpxError::ConnectFailure(format!(
                    "Invalid WebSocket URL '{}': {}",
                    self.url, e
                )))
                .await;
                return;
            }
        };

        info!("Connecting to WebSocket: {}", url);
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("WebSocket connect cancelled before handshake completed.");
                self.set_state(ConnectionState::Closed);
                return;
            }
            result = connect_async(url.as_str()) => result,
        };

        let ws_stream = match connected {
            Ok((ws_stream, response)) => {
                info!(
                    "WebSocket connected successfully. Response: {:?}",
                    response.status()
                );
                ws_stream
            }
            Err(e) => {
                self.fail_connect(BpxError::ConnectFailure(format!(
                    "WebSocket connection failed: {}",
                    e
                )))
                .await;
                return;
            }
        };

        let (write, read) = ws_stream.split();
        *self.writer.lock().await = Some(write);
        self.set_state(ConnectionState::Open);
        self.dispatcher.dispatch_open().await;

        let exit = self.receive_loop(read, &cancel).await;
        // Closed before the final hook: it may reconnect, and its sends are no-ops.
        self.teardown().await;
        match exit {
            LoopExit::Closed(info) => self.dispatcher.dispatch_close(info).await,
            LoopExit::Failed(error) => self.dispatcher.dispatch_error(error).await,
        }
    }

    async fn fail_connect(&self, error: BpxError) {
        error!("{}", error);
        self.set_state(ConnectionState::Closed);
        self.dispatcher.dispatch_error(error).await;
    }

    async fn receive_loop(&self, mut read: WsSource, cancel: &CancellationToken) -> LoopExit {
        let exit = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("WebSocket receive loop cancelled, closing transport.");
                    self.close().await;
                    break LoopExit::Closed(CloseInfo::new(
                        u16::from(CloseCode::Normal),
                        "cancelled",
                    ));
                }
                next = read.next() => {
                    if let ControlFlow::Break(exit) = self.handle_frame(next).await {
                        break exit;
                    }
                }
            }
        };
        info!("WebSocket receive loop finished.");
        exit
    }

    async fn handle_frame(
        &self,
        next: Option<std::result::Result<Message, tungstenite::Error>>,
    ) -> ControlFlow<LoopExit> {
        match next {
            Some(Ok(Message::Text(text))) => {
                trace!("Received WS Text: {}", text);
                self.dispatcher.dispatch_text(text).await;
            }
            Some(Ok(Message::Binary(bin))) => {
                trace!("Received WS Binary: {} bytes", bin.len());
                self.dispatcher.dispatch_binary(bin).await;
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                trace!("Received WS Ping/Pong");
            }
            Some(Ok(Message::Frame(_))) => { /* Ignore */ }
            Some(Ok(Message::Close(close_frame))) => {
                warn!("Received WS Close frame: {:?}", close_frame);
                let info = match close_frame {
                    Some(frame) => CloseInfo::new(u16::from(frame.code), frame.reason.into_owned()),
                    None => CloseInfo::new(CLOSE_NO_STATUS, ""),
                };
                return ControlFlow::Break(LoopExit::Closed(info));
            }
            Some(Err(tungstenite::Error::ConnectionClosed))
            | Some(Err(tungstenite::Error::AlreadyClosed))
            | Some(Err(tungstenite::Error::Protocol(
                ProtocolError::ResetWithoutClosingHandshake,
            ))) => {
                warn!("WebSocket connection dropped without a close handshake.");
                return ControlFlow::Break(LoopExit::Closed(CloseInfo::new(
                    CLOSE_ABNORMAL,
                    "connection reset",
                )));
            }
            Some(Err(e)) => {
                error!("WebSocket read error: {}", e);
                return ControlFlow::Break(LoopExit::Failed(BpxError::TransportError(e)));
            }
            None => {
                info!("WebSocket stream ended (read None).");
                return ControlFlow::Break(LoopExit::Closed(CloseInfo::new(
                    CLOSE_ABNORMAL,
                    "stream ended",
                )));
            }
        }
        ControlFlow::Continue(())
    }

    /// Drops the write half and marks the connection closed.
    async fn teardown(&self) {
        if let Some(mut sink) = self.writer.lock().await.take() {
            // Flushes a pending close reply; errors only mean the peer is gone.
            if let Err(e) = sink.close().await {
                trace!("WebSocket sink close: {}", e);
            }
        }
        self.set_state(ConnectionState::Closed);
        info!("WebSocket connection to {} closed.", self.url);
    }

    /// Serializes `message` to JSON and writes it if the connection is open.
    ///
    /// While the connection is not `Open` this does nothing and returns
    /// `Ok(())`; callers that need delivery should wait for the open hook.
    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        let state = self.state();
        if state != ConnectionState::Open {
            debug!("Dropping outbound message: connection is {}", state);
            return Ok(());
        }
        let text = serde_json::to_string(message)?;
        self.send_text(text).await
    }

    /// Sends a control message. Same semantics as [`send`](Self::send).
    pub async fn subscribe(&self, message: &SubscriptionMessage) -> Result<()> {
        self.send(message).await
    }

    async fn send_text(&self, text: String) -> Result<()> {
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(sink) => {
                trace!("Sending WS message: {}", text);
                sink.send(Message::Text(text))
                    .await
                    .map_err(|e| BpxError::WebsocketError(format!("Failed to send message: {}", e)))
            }
            None => Ok(()),
        }
    }

    /// Starts a graceful close. Only acts on an open connection, so repeated
    /// calls (or calls on a connection that never opened) do nothing.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != ConnectionState::Open {
                debug!("close() ignored: connection is {}", *state);
                return;
            }
            *state = ConnectionState::Closing;
        }

        info!("Closing WebSocket connection to {}...", self.url);
        let mut writer = self.writer.lock().await;
        if let Some(sink) = writer.as_mut() {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            };
            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                warn!("Failed to send close frame: {}", e);
            }
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.url)
            .field("state", &self.state())
            .field("hooks", self.dispatcher.hooks())
            .finish()
    }
}
