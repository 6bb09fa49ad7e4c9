//! WebSocket API client implementation for the Backpack Exchange.
//!
//! This module provides WebSocket clients for the exchange's real-time streams.
//! Public and account streams use the same endpoint and come in two client types:
//!
//! - [`WebsocketPublicClient`]: public market data (tickers, depth, klines, trades, mark prices)
//! - [`WebsocketAccountClient`]: authenticated account events (orders, fills, balances, positions)
//!
//! # Architecture
//!
//! - [`ConnectionManager`] owns one socket, its [`ConnectionState`](crate::types::ConnectionState)
//!   and the receive loop
//! - [`Dispatcher`] parses inbound frames and calls the [`WsHooks`]
//! - [`PublicStreams`] and [`AccountStreams`] build subscribe/unsubscribe messages
//! - [`SharedConnectionRegistry`] lets public clients share one connection per endpoint
//!
//! There is no automatic reconnection or resubscription. A closed connection
//! stays closed until `connect` is called again.
//!
//! # Usage
//!
//! ## Public Data Streams
//!
//! ```no_run
//! use bpx_connector_rs::websocket::{
//!     PublicStreams, WebsocketClientConfig, WebsocketPublicClient, WsHooks,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let hooks = WsHooks::new()
//!         .on_message(|msg| println!("Received: {:?}", msg))
//!         .on_close(|info| println!("Connection closed: {} {}", info.code, info.reason));
//!
//!     let client = WebsocketPublicClient::new(&WebsocketClientConfig::default(), hooks);
//!
//!     // connect() runs until the connection ends, so give it its own task.
//!     let runner = client.clone();
//!     let connection = tokio::spawn(async move { runner.connect().await });
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!     client
//!         .subscribe(&PublicStreams::subscribe_ticker("SOL_USDC"))
//!         .await
//!         .expect("Failed to subscribe");
//!
//!     tokio::signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
//!     client.close().await;
//!     let _ = connection.await;
//! }
//! ```
//!
//! ## Account Streams
//!
//! ```no_run
//! use bpx_connector_rs::websocket::{WebsocketAccountClient, WebsocketClientConfig, WsHooks};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> bpx_connector_rs::Result<()> {
//!     let client = Arc::new(WebsocketAccountClient::new(
//!         "your_api_key",
//!         "your_base64_secret",
//!         &WebsocketClientConfig::default(),
//!         WsHooks::new().on_message(|msg| println!("Received: {:?}", msg)),
//!     )?);
//!
//!     let runner = Arc::clone(&client);
//!     let connection = tokio::spawn(async move { runner.connect().await });
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!     client.subscribe_order_update().await?;
//!     client.subscribe_balance_update().await?;
//!
//!     tokio::signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
//!     client.close().await;
//!     let _ = connection.await;
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Problems inside the receive loop never surface as `Err`: connect failures
//! and transport errors go to the error hook, orderly closes to the close hook,
//! and frames that are not JSON reach the message hook as raw text. Events with
//! no registered hook are dropped. Sending on a connection that is not open is
//! a silent no-op.
//!
//! # Message Handling
//!
//! Hooks can be plain closures or async closures. Each hook call is awaited
//! before the next frame is read, so hooks for one connection never overlap
//! and see frames in arrival order. Keep them quick to avoid stalling the loop.

pub mod client;
pub mod connection;
pub mod dispatcher;
pub mod hooks;
pub mod registry;
pub mod streams;

// Re-export the client structs for easier access
pub use client::{
    WebsocketAccountClient, WebsocketClientConfig, WebsocketPublicClient, BPX_WS_URL,
};
pub use connection::ConnectionManager;
pub use dispatcher::Dispatcher;
pub use hooks::{AsyncHook, Hook, SyncHook, WsHooks};
pub use registry::{RegistryKey, SharedConnectionRegistry, StreamKind};
pub use streams::{AccountStreams, PublicStreams, DEFAULT_WINDOW_MS};
