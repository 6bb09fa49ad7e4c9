use super::connection::ConnectionManager;
use super::hooks::WsHooks;
use super::registry::{RegistryKey, SharedConnectionRegistry, StreamKind};
use super::streams::{AccountStreams, PublicStreams, DEFAULT_WINDOW_MS};
use crate::auth::Credentials;
use crate::error::{BpxError, Result};
use crate::types::{ConnectionState, SubscriptionMessage};
use log::*;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const BPX_WS_URL: &str = "wss://ws.backpack.exchange/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsocketClientConfig {
    pub base_url: String, // Same endpoint serves public and account streams
    pub window: u64,      // Signature validity in milliseconds
    pub debug: bool,      // Log the canonical signing string
}

impl Default for WebsocketClientConfig {
    fn default() -> Self {
        Self {
            base_url: BPX_WS_URL.to_string(),
            window: DEFAULT_WINDOW_MS,
            debug: false,
        }
    }
}

impl WebsocketClientConfig {
    /// Reads `BPX_WS_URL`, `BPX_WS_WINDOW` and `BPX_DEBUG`, falling back to the
    /// defaults for unset variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(url) = env::var("BPX_WS_URL") {
            config.base_url = url;
        }
        if let Ok(window) = env::var("BPX_WS_WINDOW") {
            config.window = parse_window(&window)?;
        }
        if let Ok(debug) = env::var("BPX_DEBUG") {
            config.debug = parse_flag(&debug)?;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_window(mut self, window: u64) -> Self {
        self.window = window;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

fn parse_window(value: &str) -> Result<u64> {
    match value.trim().parse::<u64>() {
        Ok(window) if window > 0 => Ok(window),
        _ => Err(BpxError::ConfigError(format!(
            "BPX_WS_WINDOW must be a positive number of milliseconds, got '{}'",
            value
        ))),
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(BpxError::ConfigError(format!(
            "BPX_DEBUG must be true or false, got '{}'",
            value
        ))),
    }
}

// --- Public Client ---

/// Client for public market-data streams.
///
/// All handles created against the same registry and endpoint share one
/// connection: only the first handle's hooks are used, `connect` on any handle
/// is a no-op while the shared connection is live, and `subscribe` from any
/// handle goes over the same socket.
#[derive(Debug, Clone)]
pub struct WebsocketPublicClient {
    registry: Arc<SharedConnectionRegistry>,
    key: RegistryKey,
    connection: Arc<ConnectionManager>,
}

impl WebsocketPublicClient {
    /// Returns a handle to the process-wide public connection for
    /// `config.base_url`, creating it with `hooks` if none exists.
    pub fn new(config: &WebsocketClientConfig, hooks: WsHooks) -> Self {
        Self::with_registry(&SharedConnectionRegistry::global(), config, hooks)
    }

    pub fn with_registry(
        registry: &Arc<SharedConnectionRegistry>,
        config: &WebsocketClientConfig,
        hooks: WsHooks,
    ) -> Self {
        let key = RegistryKey::public(config.base_url.clone());
        let connection = registry.acquire(key.clone(), || {
            ConnectionManager::new(config.base_url.clone(), hooks)
        });
        Self {
            registry: Arc::clone(registry),
            key,
            connection,
        }
    }

    /// Drops every public binding in the global registry so the next
    /// [`new`](Self::new) builds a fresh connection with fresh hooks.
    pub fn reset_instance() {
        SharedConnectionRegistry::global().reset_kind(StreamKind::Public);
    }

    /// Gives this handle back to its registry; returns whether it was the last
    /// one and the shared binding was dropped.
    pub fn release(self) -> bool {
        self.registry.release(&self.key, self.connection)
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn shares_connection_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.connection, &other.connection)
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    /// Runs the shared connection until it ends. See
    /// [`ConnectionManager::connect`].
    pub async fn connect(&self) {
        self.connection.connect().await
    }

    pub async fn connect_with_cancel(&self, cancel: CancellationToken) {
        self.connection.connect_with_cancel(cancel).await
    }

    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        self.connection.send(message).await
    }

    pub async fn subscribe(&self, message: &SubscriptionMessage) -> Result<()> {
        self.connection.subscribe(message).await
    }

    pub async fn unsubscribe<I, S>(&self, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribe(&PublicStreams::unsubscribe(topics)).await
    }

    pub async fn close(&self) {
        info!("Stopping public WebSocket client...");
        self.connection.close().await
    }
}

// --- Account Client ---

/// Client for authenticated account streams. Each client owns its connection.
#[derive(Debug)]
pub struct WebsocketAccountClient {
    connection: Arc<ConnectionManager>,
    streams: AccountStreams,
}

impl WebsocketAccountClient {
    /// Builds a client from the API public key and base64 secret key. Fails if
    /// the secret key is not a valid Ed25519 seed.
    pub fn new(
        api_key: impl Into<String>,
        secret_key: &str,
        config: &WebsocketClientConfig,
        hooks: WsHooks,
    ) -> Result<Self> {
        let credentials = Credentials::new(api_key, secret_key)?;
        Ok(Self::from_credentials(credentials, config, hooks))
    }

    pub fn from_credentials(
        credentials: Credentials,
        config: &WebsocketClientConfig,
        hooks: WsHooks,
    ) -> Self {
        Self {
            connection: Arc::new(ConnectionManager::new(config.base_url.clone(), hooks)),
            streams: AccountStreams::new(credentials, config.window, config.debug),
        }
    }

    /// Message builders signed with this client's credentials.
    pub fn streams(&self) -> &AccountStreams {
        &self.streams
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    pub async fn connect(&self) {
        self.connection.connect().await
    }

    pub async fn connect_with_cancel(&self, cancel: CancellationToken) {
        self.connection.connect_with_cancel(cancel).await
    }

    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        self.connection.send(message).await
    }

    pub async fn subscribe(&self, message: &SubscriptionMessage) -> Result<()> {
        self.connection.subscribe(message).await
    }

    pub async fn subscribe_order_update(&self) -> Result<()> {
        self.subscribe(&self.streams.subscribe_order_update()).await
    }

    pub async fn subscribe_fill_update(&self) -> Result<()> {
        self.subscribe(&self.streams.subscribe_fill_update()).await
    }

    pub async fn subscribe_balance_update(&self) -> Result<()> {
        self.subscribe(&self.streams.subscribe_balance_update()).await
    }

    pub async fn subscribe_position_update(&self) -> Result<()> {
        self.subscribe(&self.streams.subscribe_position_update()).await
    }

    pub async fn unsubscribe<I, S>(&self, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribe(&self.streams.unsubscribe(topics)).await
    }

    pub async fn close(&self) {
        info!("Stopping account WebSocket client...");
        self.connection.close().await
    }
}
