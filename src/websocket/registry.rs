//! Process-wide sharing of websocket connections.
//!
//! Public market-data clients share one socket per endpoint. Rather than hiding
//! that behind constructor magic, the binding lives in a
//! [`SharedConnectionRegistry`] with explicit [`acquire`], [`release`] and
//! [`reset`] operations. Tests (or callers who want isolation) build their own
//! registry; everything else uses [`SharedConnectionRegistry::global`].
//!
//! [`acquire`]: SharedConnectionRegistry::acquire
//! [`release`]: SharedConnectionRegistry::release
//! [`reset`]: SharedConnectionRegistry::reset

use super::connection::ConnectionManager;
use log::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

static GLOBAL_REGISTRY: OnceLock<Arc<SharedConnectionRegistry>> = OnceLock::new();

/// What a shared connection carries.
///
/// Only public clients share connections today; every
/// `WebsocketAccountClient` owns its socket. `Account` is a reserved key kind
/// for callers that want to pool account connections in their own registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Public,
    Account,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Account => f.write_str("account"),
        }
    }
}

/// Identifies one shared connection: what it is for and where it points.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    pub kind: StreamKind,
    pub endpoint: String,
}

impl RegistryKey {
    pub fn new(kind: StreamKind, endpoint: impl Into<String>) -> Self {
        Self {
            kind,
            endpoint: endpoint.into(),
        }
    }

    pub fn public(endpoint: impl Into<String>) -> Self {
        Self::new(StreamKind::Public, endpoint)
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.endpoint)
    }
}

/// Holds at most one [`ConnectionManager`] per [`RegistryKey`].
#[derive(Default)]
pub struct SharedConnectionRegistry {
    connections: Mutex<HashMap<RegistryKey, Arc<ConnectionManager>>>,
}

impl SharedConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<Self> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(Self::new()))
            .clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RegistryKey, Arc<ConnectionManager>>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the connection bound to `key`, creating it with `make` when
    /// there is none.
    ///
    /// Only the first caller's `make` runs, so hooks passed by later callers
    /// are ignored until the key is [`reset`](Self::reset).
    pub fn acquire<F>(&self, key: RegistryKey, make: F) -> Arc<ConnectionManager>
    where
        F: FnOnce() -> ConnectionManager,
    {
        let mut connections = self.lock();
        if let Some(existing) = connections.get(&key) {
            debug!("Reusing shared connection {} (new hooks ignored)", key);
            return Arc::clone(existing);
        }
        info!("Creating shared connection {}", key);
        let connection = Arc::new(make());
        connections.insert(key, Arc::clone(&connection));
        connection
    }

    pub fn get(&self, key: &RegistryKey) -> Option<Arc<ConnectionManager>> {
        self.lock().get(key).cloned()
    }

    /// Gives back `handle`. The key is unbound when no other handle to that
    /// connection remains. Returns whether the binding was removed.
    pub fn release(&self, key: &RegistryKey, handle: Arc<ConnectionManager>) -> bool {
        let mut connections = self.lock();
        let is_bound = connections
            .get(key)
            .map(|bound| Arc::ptr_eq(bound, &handle))
            .unwrap_or(false);
        drop(handle);
        if !is_bound {
            return false;
        }
        let last_reference = connections
            .get(key)
            .map(|bound| Arc::strong_count(bound) == 1)
            .unwrap_or(false);
        if last_reference {
            info!("Released shared connection {}", key);
            connections.remove(key);
        }
        last_reference
    }

    /// Unbinds `key` unconditionally so the next acquire builds a fresh
    /// connection. Existing handles keep the old connection alive.
    pub fn reset(&self, key: &RegistryKey) -> Option<Arc<ConnectionManager>> {
        let removed = self.lock().remove(key);
        if removed.is_some() {
            info!("Reset shared connection {}", key);
        }
        removed
    }

    /// Unbinds every key of the given kind.
    pub fn reset_kind(&self, kind: StreamKind) {
        self.lock().retain(|key, _| key.kind != kind);
    }

    pub fn reset_all(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl fmt::Debug for SharedConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.lock().keys().map(ToString::to_string).collect();
        f.debug_struct("SharedConnectionRegistry")
            .field("connections", &keys)
            .finish()
    }
}
