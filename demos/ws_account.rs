// demos/ws_account.rs
use bpx_connector_rs::websocket::{WebsocketAccountClient, WebsocketClientConfig, WsHooks};
use std::env;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Sets up logging, honouring RUST_LOG when set
fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .with_line_number(true)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging();
    dotenv::dotenv().ok();

    let api_key = env::var("BPX_PUBLIC_KEY").map_err(|_| anyhow::anyhow!("BPX_PUBLIC_KEY not set"))?;
    let secret = env::var("BPX_SECRET_KEY").map_err(|_| anyhow::anyhow!("BPX_SECRET_KEY not set"))?;
    let config = WebsocketClientConfig::from_env()?;

    let hooks = WsHooks::new()
        .on_open(|| info!("Account stream connected"))
        .on_message_async(|msg| async move {
            info!("Account event: {:?}", msg);
        })
        .on_error(|e| error!("Account stream error: {}", e))
        .on_close(|c| warn!("Account stream closed: {} {}", c.code, c.reason));

    let client = Arc::new(WebsocketAccountClient::new(api_key, &secret, &config, hooks)?);
    info!("Connecting to {}", config.base_url);

    let cancel = CancellationToken::new();
    let runner = Arc::clone(&client);
    let token = cancel.clone();
    let connection = tokio::spawn(async move { runner.connect_with_cancel(token).await });

    for _ in 0..50 {
        if client.is_open() {
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
    if !client.is_open() {
        anyhow::bail!("account connection did not open");
    }

    client.subscribe_order_update().await?;
    client.subscribe_fill_update().await?;
    client.subscribe_balance_update().await?;
    client.subscribe_position_update().await?;
    info!("Subscribed to account streams, press ctrl+c to stop");

    tokio::signal::ctrl_c().await?;
    cancel.cancel();
    connection.await?;
    info!("Demo finished");
    Ok(())
}
