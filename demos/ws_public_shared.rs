// demos/ws_public_shared.rs
//
// Two public client handles created in the same process share one socket.
// The second handle's hooks are ignored until the shared instance is reset.
use bpx_connector_rs::websocket::{
    PublicStreams, WebsocketClientConfig, WebsocketPublicClient, WsHooks,
};
use tokio::time::{sleep, Duration};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    dotenv::dotenv().ok();

    let config = WebsocketClientConfig::from_env()?;

    let first = WebsocketPublicClient::new(
        &config,
        WsHooks::new().on_message(|msg| info!("[first hooks] {:?}", msg)),
    );
    let second = WebsocketPublicClient::new(
        &config,
        WsHooks::new().on_message(|msg| info!("[second hooks, never called] {:?}", msg)),
    );
    info!(
        "Handles share a connection: {}",
        first.shares_connection_with(&second)
    );

    let runner = first.clone();
    let connection = tokio::spawn(async move { runner.connect().await });
    while !first.is_open() && !connection.is_finished() {
        sleep(Duration::from_millis(100)).await;
    }

    // A no-op: the shared connection is already live.
    second.connect().await;

    first
        .subscribe(&PublicStreams::subscribe_ticker("SOL_USDC"))
        .await?;
    second
        .subscribe(&PublicStreams::subscribe_trades("SOL_USDC"))
        .await?;

    if !first.is_open() {
        anyhow::bail!("shared connection did not open");
    }

    sleep(Duration::from_secs(15)).await;

    second.close().await;
    connection.await?;

    WebsocketPublicClient::reset_instance();
    let fresh = WebsocketPublicClient::new(&config, WsHooks::new());
    info!(
        "After reset, new handle shares the old connection: {}",
        fresh.shares_connection_with(&first)
    );
    Ok(())
}
