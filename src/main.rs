use ctrader_feed::FeedError;
use ctrader_feed::client::Client;
use ctrader_feed::config::{AppConfig, debug_enabled, fetch_config};
use ctrader_feed::credentials::populate_env_from_keychain;
use ctrader_feed::models::TrendbarPeriod;
use tracing::{Level, info, warn};

fn main() -> Result<(), FeedError> {
    let level = if debug_enabled()? {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    // Mutates the environment, so it runs before the runtime spawns threads.
    populate_env_from_keychain();
    let app_config = fetch_config()?;

    let mut args = std::env::args().skip(1);
    let symbol_id: i64 = match args.next() {
        Some(arg) => arg
            .parse()
            .map_err(|_| FeedError::Config(format!("invalid symbol id `{arg}`")))?,
        None => 1,
    };
    let period: TrendbarPeriod = match args.next() {
        Some(arg) => arg.parse()?,
        None => TrendbarPeriod::M1,
    };

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| FeedError::Config(format!("failed to start runtime: {e}")))?;
    runtime.block_on(run(app_config, symbol_id, period))
}

async fn run(app_config: AppConfig, symbol_id: i64, period: TrendbarPeriod) -> Result<(), FeedError> {
    let client = Client::from_config(&app_config.ctrader);
    client.connect().await?;

    match client.symbol_details(&[symbol_id]).await {
        Ok(details) => {
            if let Some(symbol) = details.symbol.first() {
                info!(symbol_id, digits = symbol.digits, "Symbol found");
            }
        }
        Err(e) => warn!(symbol_id, error = %e, "Could not look up symbol details"),
    }

    let mut bars = client.subscribe_live_bars(symbol_id, period).await?;
    info!(symbol_id, %period, "Streaming live bars, press Ctrl-C to stop");

    loop {
        tokio::select! {
            bar = bars.recv() => match bar {
                Some(bar) => info!(
                    symbol_id = bar.symbol_id,
                    period = %bar.period,
                    time = bar.candle.time,
                    open = %bar.candle.open,
                    high = %bar.candle.high,
                    low = %bar.candle.low,
                    close = %bar.candle.close,
                    volume = bar.candle.volume,
                    "Live bar"
                ),
                None => {
                    warn!(reason = ?bars.end_reason(), "Live bar stream ended");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    client.disconnect().await;
    Ok(())
}
