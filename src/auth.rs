use crate::error::{BpxError, Result};
use base64::Engine;
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use log::info;
use std::fmt;
use zeroize::Zeroizing;

/// Instruction signed by every account stream control message, including
/// `UNSUBSCRIBE`. The exchange verifies against this literal.
pub const SUBSCRIBE_INSTRUCTION: &str = "subscribe";

/// Gets the current UTC timestamp in milliseconds since the Unix epoch.
pub fn get_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Decodes a base64 Ed25519 seed (32 bytes) into a signing key.
fn parse_secret_key(secret_key_b64: &str) -> Result<SigningKey> {
    let decoded = Zeroizing::new(
        base64::engine::general_purpose::STANDARD
            .decode(secret_key_b64.trim())
            .map_err(|e| {
                BpxError::AuthenticationError(format!("Failed to decode base64 secret key: {}", e))
            })?,
    );

    if decoded.len() != 32 {
        return Err(BpxError::AuthenticationError(format!(
            "Invalid secret key length: Expected 32 bytes, got {}",
            decoded.len()
        )));
    }

    let mut seed = Zeroizing::new([0u8; 32]);
    seed.copy_from_slice(&decoded);
    Ok(SigningKey::from_bytes(&seed))
}

/// API key pair used to authenticate account streams.
pub struct Credentials {
    api_key: String,
    signing_key: SigningKey,
}

impl Credentials {
    /// Builds credentials from the API public key and the base64-encoded
    /// Ed25519 private key seed. Malformed key material is rejected here so a
    /// client can never be created with a key that fails to sign later.
    pub fn new(api_key: impl Into<String>, secret_key_b64: &str) -> Result<Self> {
        let signing_key = parse_secret_key(secret_key_b64)?;
        Ok(Self {
            api_key: api_key.into(),
            signing_key,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

/// Builds the canonical string signed for websocket authentication.
pub fn signing_string(instruction: &str, timestamp: i64, window: u64) -> String {
    format!(
        "instruction={}&timestamp={}&window={}",
        instruction, timestamp, window
    )
}

/// Generates an Ed25519 signature for a message and returns it base64 encoded.
pub fn generate_signature(signing_key: &SigningKey, message: &str) -> String {
    let signature = signing_key.sign(message.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(signature.to_bytes())
}

/// Signs `instruction` for the given timestamp and validity window.
///
/// With `debug` set, the canonical string is logged before signing.
pub fn sign_instruction(
    signing_key: &SigningKey,
    instruction: &str,
    timestamp: i64,
    window: u64,
    debug: bool,
) -> String {
    let sign_str = signing_string(instruction, timestamp, window);
    if debug {
        info!("WS sign string: {}", sign_str);
    }
    generate_signature(signing_key, &sign_str)
}
