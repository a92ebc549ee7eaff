//! Stream live events from a running data server.
//!
//! Run with: cargo run -p marketfeed-client --example live_feed
//! The endpoint defaults to ws://127.0.0.1:8000/ws; override with
//! MARKETFEED_WS_URL.

use std::time::Duration;

use marketfeed_client::{FeedClient, FeedConfig, FeedEvent};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let client = FeedClient::new(FeedConfig::from_env());
    let mut events = client.events();

    println!("Connecting to {}...", client.config().url);
    if let Err(e) = client.connect().await {
        eprintln!("Connect failed: {e}");
        return;
    }

    for symbol in ["SPY", "QQQ", "AAPL"] {
        if let Err(e) = client.subscribe(symbol).await {
            eprintln!("Subscribe {symbol} failed: {e}");
        }
    }

    println!("Streaming for 60 seconds...");
    let deadline = tokio::time::sleep(Duration::from_secs(60));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Ok(FeedEvent::MarketData(data)) => {
                    println!("{} @ {} (vol {})", data.symbol, data.price, data.volume);
                }
                Ok(FeedEvent::Signals(signals)) => {
                    println!("signals: {} ({:.0}% confidence)", signals.market_bias, signals.confidence * 100.0);
                }
                Ok(FeedEvent::PositionUpdate(update)) => {
                    println!("position {}: pnl {}", update.position_id, update.pnl);
                }
                Ok(FeedEvent::StatusChange(state)) => {
                    println!("status: {:?} (healthy: {})", state, client.is_healthy());
                }
                Ok(FeedEvent::ServerError(err)) => {
                    eprintln!("server error: {}", err.error);
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    }

    client.disconnect().await;
    println!("Done.");
}
