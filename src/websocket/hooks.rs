//! Caller-supplied callbacks for connection lifecycle events.
//!
//! Every callback is stored behind the [`Hook`] trait. A hook is either a plain
//! closure ([`SyncHook`]) or a closure returning a future ([`AsyncHook`]); the
//! dispatcher awaits both the same way, so an async hook finishes before the
//! next event is delivered.

use crate::error::BpxError;
use crate::types::{CloseInfo, WsPayload};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A single callback invoked with one event argument.
#[async_trait]
pub trait Hook<T: Send + 'static>: Send + Sync {
    async fn call(&self, arg: T);
}

/// Runs the closure inline.
pub struct SyncHook<F>(F);

impl<F> SyncHook<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<T, F> Hook<T> for SyncHook<F>
where
    T: Send + 'static,
    F: Fn(T) + Send + Sync,
{
    async fn call(&self, arg: T) {
        (self.0)(arg)
    }
}

/// Runs the closure and awaits the future it returns.
pub struct AsyncHook<F>(F);

impl<F> AsyncHook<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<T, F, Fut> Hook<T> for AsyncHook<F>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn call(&self, arg: T) {
        (self.0)(arg).await
    }
}

pub type OpenHook = Arc<dyn Hook<()>>;
pub type MessageHook = Arc<dyn Hook<WsPayload>>;
pub type ErrorHook = Arc<dyn Hook<BpxError>>;
pub type CloseHook = Arc<dyn Hook<CloseInfo>>;

/// The set of optional hooks attached to a connection.
///
/// ```
/// use bpx_connector_rs::websocket::WsHooks;
///
/// let hooks = WsHooks::new()
///     .on_open(|| println!("open"))
///     .on_message_async(|msg| async move { println!("{:?}", msg) })
///     .on_close(|info| println!("closed: {} {}", info.code, info.reason));
/// assert!(hooks.has_message_hook());
/// ```
#[derive(Clone, Default)]
pub struct WsHooks {
    pub(crate) on_open: Option<OpenHook>,
    pub(crate) on_message: Option<MessageHook>,
    pub(crate) on_error: Option<ErrorHook>,
    pub(crate) on_close: Option<CloseHook>,
}

impl WsHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_open = Some(Arc::new(SyncHook::new(move |()| f())));
        self
    }

    pub fn on_open_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_open = Some(Arc::new(AsyncHook::new(move |()| f())));
        self
    }

    pub fn on_message<F>(mut self, f: F) -> Self
    where
        F: Fn(WsPayload) + Send + Sync + 'static,
    {
        self.on_message = Some(Arc::new(SyncHook::new(f)));
        self
    }

    pub fn on_message_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(WsPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_message = Some(Arc::new(AsyncHook::new(f)));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(BpxError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(SyncHook::new(f)));
        self
    }

    pub fn on_error_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(BpxError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_error = Some(Arc::new(AsyncHook::new(f)));
        self
    }

    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(CloseInfo) + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(SyncHook::new(f)));
        self
    }

    pub fn on_close_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CloseInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_close = Some(Arc::new(AsyncHook::new(f)));
        self
    }

    /// Installs a custom [`Hook`] implementation for inbound messages.
    pub fn with_message_hook(mut self, hook: MessageHook) -> Self {
        self.on_message = Some(hook);
        self
    }

    pub fn has_message_hook(&self) -> bool {
        self.on_message.is_some()
    }
}

impl fmt::Debug for WsHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsHooks")
            .field("on_open", &self.on_open.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}
