pub mod auth;
pub mod error;
pub mod types;
pub mod websocket;
pub use error::{BpxError, Result};
