use thiserror::Error;
use tokio_tungstenite::tungstenite;
use url::ParseError;

pub type Result<T, E = BpxError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum BpxError {
    #[error("WebSocket Connect Failure: {0}")]
    ConnectFailure(String),

    #[error("WebSocket Error: {0}")]
    WebsocketError(String),

    #[error("Authentication Error: {0}")]
    AuthenticationError(String),

    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("WebSocket Transport Error: {0}")]
    TransportError(#[from] tungstenite::Error),

    #[error("JSON Serialization/Deserialization Error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("URL Parsing Error: {0}")]
    UrlParseError(#[from] ParseError),
}
