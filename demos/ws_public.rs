// demos/ws_public.rs
use bpx_connector_rs::types::{CloseInfo, WsPayload};
use bpx_connector_rs::websocket::{
    PublicStreams, WebsocketClientConfig, WebsocketPublicClient, WsHooks,
};
use tokio::time::{sleep, Duration};

// Simple message handler that just prints the message
fn message_handler(message: WsPayload) {
    match message {
        WsPayload::Json(value) => println!("Received Message: {}", value),
        WsPayload::Text(text) => println!("Received raw text: {}", text),
    }
}

// Simple close handler
fn close_handler(info: CloseInfo) {
    println!("Connection Closed: {} {}", info.code, info.reason);
}

#[tokio::main]
async fn main() {
    // Initialize logging (optional)
    env_logger::init();

    // Optional: Load .env file if you have one
    dotenv::dotenv().ok();

    let config = match WebsocketClientConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return;
        }
    };
    println!("Connecting to Public WebSocket at {}...", config.base_url);

    let hooks = WsHooks::new()
        .on_open(|| println!("Connected."))
        .on_message(message_handler)
        .on_error(|e| eprintln!("WebSocket error: {}", e))
        .on_close(close_handler);
    let client = WebsocketPublicClient::new(&config, hooks);

    // connect() runs the receive loop until the connection ends
    let runner = client.clone();
    let connection = tokio::spawn(async move { runner.connect().await });

    // Subscriptions sent before the socket opens are dropped
    for _ in 0..50 {
        if client.is_open() {
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
    if !client.is_open() {
        eprintln!("Connection did not open, giving up.");
        return;
    }

    println!("Subscribing to topics...");
    let symbol = "SOL_USDC";
    let subscriptions = [
        PublicStreams::subscribe_ticker(symbol),
        PublicStreams::subscribe_depth(symbol),
        PublicStreams::subscribe_klines(symbol, "1m"),
    ];
    for sub in &subscriptions {
        if let Err(e) = client.subscribe(sub).await {
            eprintln!("Error subscribing to {:?}: {}", sub.params, e);
        }
    }

    // Keep the connection alive for a while
    println!("Listening for messages for 30 seconds...");
    sleep(Duration::from_secs(30)).await;

    println!("Unsubscribing...");
    let topics = [
        format!("ticker.{}", symbol),
        format!("depth.{}", symbol),
        format!("kline.{}.1m", symbol),
    ];
    if let Err(e) = client.unsubscribe(topics).await {
        eprintln!("Error unsubscribing: {}", e);
    }
    sleep(Duration::from_secs(2)).await;

    println!("Stopping client...");
    client.close().await;
    let _ = connection.await;

    println!("Demo finished.");
}
