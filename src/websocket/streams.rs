//! Subscription control messages for public and account streams.
//!
//! Topics follow the exchange grammar, e.g. `ticker.SOL_USDC`,
//! `kline.SOL_USDC.1m` or `account.orderUpdate`. Builders only construct
//! messages; sending them is the connection's job.

use crate::auth::{self, Credentials, SUBSCRIBE_INSTRUCTION};
use crate::types::{SubscriptionMessage, SubscriptionMethod};

pub const DEFAULT_WINDOW_MS: u64 = 5000;

pub const TICKERS_TOPIC: &str = "tickers";
pub const MARK_PRICES_TOPIC: &str = "markPrices";
pub const ORDER_UPDATE_TOPIC: &str = "account.orderUpdate";
pub const FILL_UPDATE_TOPIC: &str = "account.fillUpdate";
pub const BALANCE_UPDATE_TOPIC: &str = "account.balanceUpdate";
pub const POSITION_UPDATE_TOPIC: &str = "account.positionUpdate";

fn subscribe(topic: String) -> SubscriptionMessage {
    SubscriptionMessage::new(SubscriptionMethod::Subscribe, vec![topic])
}

fn collect_topics<I, S>(topics: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    topics.into_iter().map(Into::into).collect()
}

// --- Public ---

/// Builders for unauthenticated market-data streams.
pub struct PublicStreams;

impl PublicStreams {
    pub fn subscribe_ticker(symbol: &str) -> SubscriptionMessage {
        subscribe(format!("ticker.{}", symbol))
    }

    /// Tickers for every symbol.
    pub fn subscribe_tickers() -> SubscriptionMessage {
        subscribe(TICKERS_TOPIC.to_string())
    }

    pub fn subscribe_depth(symbol: &str) -> SubscriptionMessage {
        subscribe(format!("depth.{}", symbol))
    }

    /// Candles for `symbol` at `interval` (e.g. "1m", "1h", "1d").
    pub fn subscribe_klines(symbol: &str, interval: &str) -> SubscriptionMessage {
        subscribe(format!("kline.{}.{}", symbol, interval))
    }

    pub fn subscribe_trades(symbol: &str) -> SubscriptionMessage {
        subscribe(format!("trades.{}", symbol))
    }

    pub fn subscribe_mark_price(symbol: &str) -> SubscriptionMessage {
        subscribe(format!("markPrice.{}", symbol))
    }

    /// Mark prices for every symbol.
    pub fn subscribe_mark_prices() -> SubscriptionMessage {
        subscribe(MARK_PRICES_TOPIC.to_string())
    }

    pub fn unsubscribe<I, S>(topics: I) -> SubscriptionMessage
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SubscriptionMessage::new(SubscriptionMethod::Unsubscribe, collect_topics(topics))
    }
}

// --- Account ---

/// Builders for authenticated account streams.
///
/// Every message is signed on the spot with the current timestamp. A signature
/// is only accepted within `window` milliseconds of its timestamp, so messages
/// must not be cached and replayed.
#[derive(Debug)]
pub struct AccountStreams {
    credentials: Credentials,
    window: u64,
    debug: bool,
}

impl AccountStreams {
    pub fn new(credentials: Credentials, window: u64, debug: bool) -> Self {
        Self {
            credentials,
            window,
            debug,
        }
    }

    pub fn api_key(&self) -> &str {
        self.credentials.api_key()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn window(&self) -> u64 {
        self.window
    }

    /// Whether the canonical signing string is logged for every message.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Signs and builds a control message for `params`.
    ///
    /// The signed instruction is always `subscribe`, for `UNSUBSCRIBE` too;
    /// that is what the exchange verifies.
    pub fn build<I, S>(&self, method: SubscriptionMethod, params: I) -> SubscriptionMessage
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build_at(method, collect_topics(params), auth::get_timestamp_ms())
    }

    pub(crate) fn build_at(
        &self,
        method: SubscriptionMethod,
        params: Vec<String>,
        timestamp: i64,
    ) -> SubscriptionMessage {
        let signature = auth::sign_instruction(
            self.credentials.signing_key(),
            SUBSCRIBE_INSTRUCTION,
            timestamp,
            self.window,
            self.debug,
        );
        SubscriptionMessage {
            method,
            params,
            signature: Some(signature),
            timestamp: Some(timestamp),
            window: Some(self.window),
            api_key: Some(self.credentials.api_key().to_string()),
        }
    }

    /// Authentication message sent when opening an account stream; it
    /// subscribes to order updates.
    pub fn auth_message(&self) -> SubscriptionMessage {
        self.subscribe_order_update()
    }

    pub fn subscribe_order_update(&self) -> SubscriptionMessage {
        self.build(SubscriptionMethod::Subscribe, [ORDER_UPDATE_TOPIC])
    }

    pub fn subscribe_fill_update(&self) -> SubscriptionMessage {
        self.build(SubscriptionMethod::Subscribe, [FILL_UPDATE_TOPIC])
    }

    pub fn subscribe_balance_update(&self) -> SubscriptionMessage {
        self.build(SubscriptionMethod::Subscribe, [BALANCE_UPDATE_TOPIC])
    }

    pub fn subscribe_position_update(&self) -> SubscriptionMessage {
        self.build(SubscriptionMethod::Subscribe, [POSITION_UPDATE_TOPIC])
    }

    pub fn unsubscribe<I, S>(&self, topics: I) -> SubscriptionMessage
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build(SubscriptionMethod::Unsubscribe, topics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use ed25519_dalek::{Signature, Verifier};
    use serde_json::json;
    use std::sync::{Mutex, Once, PoisonError};

    const TEST_SECRET_KEY: &str = "AQIDBAUGBwgJCgsMDQ4PEBESExQVFhcYGRobHB0eHyA=";
    const TEST_PUBLIC_KEY: &str = "ebVWLo/mVPlAeLES6KmLp5AfhTrmlb7X4OORC60ElmQ=";

    fn account_streams(window: u64) -> AccountStreams {
        let creds = Credentials::new(TEST_PUBLIC_KEY, TEST_SECRET_KEY).expect("valid test key");
        AccountStreams::new(creds, window, false)
    }

    // Collects every log record's message for the whole test binary.
    struct CaptureLogger(Mutex<Vec<String>>);

    impl log::Log for CaptureLogger {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    static CAPTURE: CaptureLogger = CaptureLogger(Mutex::new(Vec::new()));

    fn captured_logs() -> Vec<String> {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = log::set_logger(&CAPTURE);
            log::set_max_level(log::LevelFilter::Trace);
        });
        CAPTURE.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn assert_signature_valid(streams: &AccountStreams, msg: &SubscriptionMessage) {
        let sign_str = auth::signing_string(
            SUBSCRIBE_INSTRUCTION,
            msg.timestamp.expect("timestamp"),
            msg.window.expect("window"),
        );
        let raw = base64::engine::general_purpose::STANDARD
            .decode(msg.signature.as_ref().expect("signature"))
            .expect("base64 signature");
        let bytes: [u8; 64] = raw.as_slice().try_into().expect("64 byte signature");
        streams
            .credentials()
            .verifying_key()
            .verify(sign_str.as_bytes(), &Signature::from_bytes(&bytes))
            .expect("signature verifies");
    }

    #[test]
    fn test_public_subscribe_ticker() {
        assert_eq!(
            serde_json::to_value(PublicStreams::subscribe_ticker("SOL_USDC")).unwrap(),
            json!({"method": "SUBSCRIBE", "params": ["ticker.SOL_USDC"]})
        );
    }

    #[test]
    fn test_public_subscribe_klines() {
        assert_eq!(
            serde_json::to_value(PublicStreams::subscribe_klines("SOL_USDC", "1m")).unwrap(),
            json!({"method": "SUBSCRIBE", "params": ["kline.SOL_USDC.1m"]})
        );
    }

    #[test]
    fn test_public_unsubscribe_keeps_topic_order() {
        let msg = PublicStreams::unsubscribe(["ticker.SOL_USDC", "depth.SOL_USDC"]);
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"method":"UNSUBSCRIBE","params":["ticker.SOL_USDC","depth.SOL_USDC"]}"#
        );
    }

    #[test]
    fn test_public_topics() {
        let topic = |msg: SubscriptionMessage| {
            assert_eq!(msg.method, SubscriptionMethod::Subscribe);
            assert!(!msg.is_signed());
            msg.params.join(",")
        };
        assert_eq!(topic(PublicStreams::subscribe_tickers()), "tickers");
        assert_eq!(topic(PublicStreams::subscribe_depth("BTC_USDC")), "depth.BTC_USDC");
        assert_eq!(topic(PublicStreams::subscribe_trades("BTC_USDC")), "trades.BTC_USDC");
        assert_eq!(
            topic(PublicStreams::subscribe_mark_price("SOL_USDC_PERP")),
            "markPrice.SOL_USDC_PERP"
        );
        assert_eq!(topic(PublicStreams::subscribe_mark_prices()), "markPrices");
    }

    #[test]
    fn test_account_message_carries_auth_fields() {
        let streams = account_streams(DEFAULT_WINDOW_MS);
        let msg = streams.build_at(
            SubscriptionMethod::Subscribe,
            vec![ORDER_UPDATE_TOPIC.to_string()],
            1700000000000,
        );
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "method": "SUBSCRIBE",
                "params": ["account.orderUpdate"],
                "signature": "qYObWEJ/qkxAAHMEK/xzkZFUSR1Jk4ee5KLJO+o1QyNFW2JS6Zy87vmr7m2UCH48q5LsojwfHIaXGeexEBF4BA==",
                "timestamp": 1700000000000i64,
                "window": 5000,
                "apiKey": TEST_PUBLIC_KEY
            })
        );
    }

    #[test]
    fn test_account_unsubscribe_signs_subscribe_instruction() {
        let streams = account_streams(DEFAULT_WINDOW_MS);
        let unsub = streams.build_at(
            SubscriptionMethod::Unsubscribe,
            vec![FILL_UPDATE_TOPIC.to_string()],
            1700000000000,
        );
        let sub = streams.build_at(
            SubscriptionMethod::Subscribe,
            vec![FILL_UPDATE_TOPIC.to_string()],
            1700000000000,
        );
        assert_eq!(unsub.method, SubscriptionMethod::Unsubscribe);
        assert_eq!(unsub.signature, sub.signature);
        assert_signature_valid(&streams, &unsub);
    }

    #[test]
    fn test_account_builders_sign_every_call() {
        let streams = account_streams(60000);
        let first = streams.subscribe_balance_update();
        let second = streams.subscribe_balance_update();

        assert_signature_valid(&streams, &first);
        assert_signature_valid(&streams, &second);
        assert!(second.timestamp >= first.timestamp);
        if first.timestamp == second.timestamp {
            assert_eq!(first.signature, second.signature);
        } else {
            assert_ne!(first.signature, second.signature);
        }
    }

    #[test]
    fn test_account_topics_and_window() {
        let streams = account_streams(10000);
        let cases = [
            (streams.auth_message(), ORDER_UPDATE_TOPIC),
            (streams.subscribe_order_update(), ORDER_UPDATE_TOPIC),
            (streams.subscribe_fill_update(), FILL_UPDATE_TOPIC),
            (streams.subscribe_balance_update(), BALANCE_UPDATE_TOPIC),
            (streams.subscribe_position_update(), POSITION_UPDATE_TOPIC),
        ];
        for (msg, topic) in cases {
            assert_eq!(msg.method, SubscriptionMethod::Subscribe);
            assert_eq!(msg.params, vec![topic.to_string()]);
            assert_eq!(msg.window, Some(10000));
            assert_eq!(msg.api_key.as_deref(), Some(TEST_PUBLIC_KEY));
            assert_signature_valid(&streams, &msg);
        }

        let unsub = streams.unsubscribe(vec![ORDER_UPDATE_TOPIC, POSITION_UPDATE_TOPIC]);
        assert_eq!(unsub.method, SubscriptionMethod::Unsubscribe);
        assert_eq!(
            unsub.params,
            vec![ORDER_UPDATE_TOPIC.to_string(), POSITION_UPDATE_TOPIC.to_string()]
        );
    }

    #[test]
    fn test_debug_mode_logs_sign_string_and_still_signs() {
        captured_logs();
        let creds = Credentials::new(TEST_PUBLIC_KEY, TEST_SECRET_KEY).expect("valid test key");
        let debug_streams = AccountStreams::new(creds, 7000, true);
        assert!(debug_streams.debug());

        let msg = debug_streams.build_at(
            SubscriptionMethod::Subscribe,
            vec![ORDER_UPDATE_TOPIC.to_string()],
            1700000004242,
        );
        assert_signature_valid(&debug_streams, &msg);
        let quiet = account_streams(7000).build_at(
            SubscriptionMethod::Subscribe,
            vec![ORDER_UPDATE_TOPIC.to_string()],
            1700000004242,
        );
        assert_eq!(msg, quiet);

        let expected = "WS sign string: instruction=subscribe&timestamp=1700000004242&window=7000";
        let logs = captured_logs();
        assert_eq!(logs.iter().filter(|line| line.as_str() == expected).count(), 1);
    }

    #[test]
    fn test_sign_string_not_logged_without_debug() {
        captured_logs();
        let streams = account_streams(9000);
        assert!(!streams.debug());
        streams.build_at(
            SubscriptionMethod::Subscribe,
            vec![FILL_UPDATE_TOPIC.to_string()],
            1700000009191,
        );
        assert!(!captured_logs()
            .iter()
            .any(|line| line.contains("timestamp=1700000009191")));
    }
}
