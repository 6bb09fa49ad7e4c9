use super::hooks::WsHooks;
use crate::error::BpxError;
use crate::types::{CloseInfo, WsPayload};
use log::*;

/// Parses a text frame as JSON, keeping the raw text when it is not JSON.
pub fn parse_text_frame(text: String) -> WsPayload {
    match serde_json::from_str(&text) {
        Ok(value) => WsPayload::Json(value),
        Err(e) => {
            debug!("Inbound frame is not JSON ({}), forwarding raw text", e);
            WsPayload::Text(text)
        }
    }
}

/// Parses a binary frame as JSON, falling back to its (lossy) UTF-8 text.
pub fn parse_binary_frame(bytes: Vec<u8>) -> WsPayload {
    match serde_json::from_slice(&bytes) {
        Ok(value) => WsPayload::Json(value),
        Err(_) => match String::from_utf8(bytes) {
            Ok(text) => WsPayload::Text(text),
            Err(e) => WsPayload::Text(String::from_utf8_lossy(e.as_bytes()).into_owned()),
        },
    }
}

/// Routes connection events to the registered hooks.
///
/// Each dispatch awaits the hook before returning. The receive loop dispatches
/// one event at a time, so hooks of one connection never overlap and observe
/// frames in arrival order. Events without a registered hook are dropped.
#[derive(Clone, Debug, Default)]
pub struct Dispatcher {
    hooks: WsHooks,
}

impl Dispatcher {
    pub fn new(hooks: WsHooks) -> Self {
        Self { hooks }
    }

    pub fn hooks(&self) -> &WsHooks {
        &self.hooks
    }

    pub async fn dispatch_open(&self) {
        if let Some(hook) = &self.hooks.on_open {
            hook.call(()).await;
        }
    }

    pub async fn dispatch_text(&self, text: String) {
        if self.hooks.on_message.is_none() {
            trace!("No message hook registered, dropping frame");
            return;
        }
        self.dispatch_message(parse_text_frame(text)).await;
    }

    pub async fn dispatch_binary(&self, bytes: Vec<u8>) {
        if self.hooks.on_message.is_none() {
            trace!("No message hook registered, dropping binary frame");
            return;
        }
        self.dispatch_message(parse_binary_frame(bytes)).await;
    }

    pub async fn dispatch_message(&self, payload: WsPayload) {
        if let Some(hook) = &self.hooks.on_message {
            hook.call(payload).await;
        }
    }

    pub async fn dispatch_error(&self, error: BpxError) {
        match &self.hooks.on_error {
            Some(hook) => hook.call(error).await,
            None => debug!("No error hook registered, dropping error: {}", error),
        }
    }

    pub async fn dispatch_close(&self, info: CloseInfo) {
        match &self.hooks.on_close {
            Some(hook) => hook.call(info).await,
            None => debug!(
                "No close hook registered, dropping close {} {}",
                info.code, info.reason
            ),
        }
    }
}
