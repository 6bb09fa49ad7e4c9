use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// --- Enums ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionMethod {
    Subscribe,
    Unsubscribe,
}

/// Lifecycle of a single websocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    /// Whether a connection in this state still owns a live (or in-flight) socket.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Open | Self::Closing)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

// --- Control messages ---

/// Subscribe/unsubscribe control message sent to the exchange.
///
/// The signed fields are only set for account streams and are left out of the
/// serialized JSON otherwise.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionMessage {
    pub method: SubscriptionMethod,
    pub params: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<u64>,
    #[serde(rename = "apiKey", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl SubscriptionMessage {
    /// Unsigned message, as used by the public streams.
    pub fn new(method: SubscriptionMethod, params: Vec<String>) -> Self {
        Self {
            method,
            params,
            signature: None,
            timestamp: None,
            window: None,
            api_key: None,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

// --- Inbound ---

/// An inbound frame as delivered to the message hook.
#[derive(Debug, Clone, PartialEq)]
pub enum WsPayload {
    /// Frame parsed as JSON.
    Json(Value),
    /// Frame that is not valid JSON, passed through untouched.
    Text(String),
}

impl WsPayload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Json(_) => None,
            Self::Text(text) => Some(text),
        }
    }
}

/// Close code and reason reported to the close hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}
