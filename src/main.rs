//! WebAPI router demo: log on, subscribe a few symbols, log every event.
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use webapi_router::types::*;
use webapi_router::{
    ClientConfig, ConnectionSink, DepthSnapshot, HistoricalDataSink, JsonCodec, MarketDataSink, OrderRejection,
    OrderUpdate, PositionUpdate, ScopeMask, SessionInfoSink, SessionManager, TradingSink, WsTransport,
};

// ═══════════════════════════════════════════════════════════════════
// CONSOLE SINK
// ═══════════════════════════════════════════════════════════════════
#[derive(Debug)]
enum Lifecycle {
    Started,
    Ended,
}

struct ConsoleSink {
    lifecycle: mpsc::UnboundedSender<Lifecycle>,
}

impl ConnectionSink for ConsoleSink {
    fn session_error(&self, text: &str) -> Result<()> {
        warn!("[MAIN] Session error: {}", text);
        self.lifecycle.send(Lifecycle::Ended)?;
        Ok(())
    }

    fn session_started(&self, result: &LogonResult) -> Result<()> {
        info!("[MAIN] Session started, base time {}", result.base_time);
        self.lifecycle.send(Lifecycle::Started)?;
        Ok(())
    }

    fn session_stopped(&self, reason: Option<&LoggedOff>) -> Result<()> {
        info!("[MAIN] Session stopped: {:?}", reason.map(|r| r.logoff_reason));
        self.lifecycle.send(Lifecycle::Ended)?;
        Ok(())
    }
}

impl MarketDataSink for ConsoleSink {
    fn instrument_static_info(&self, requested_symbol: &str, report: &SymbolResolutionReport) -> Result<()> {
        let m = &report.contract_metadata;
        info!("[MAIN] {} = {} ({}), tick {}", requested_symbol, m.contract_symbol, m.title, m.tick_size);
        Ok(())
    }

    fn instrument_subscribed(&self, status: &MarketDataSubscriptionStatus) -> Result<()> {
        info!("[MAIN] Contract {} subscription {:?} at {:?}", status.contract_id, status.status_code, status.level);
        Ok(())
    }

    fn instrument_update(&self, depth: &DepthSnapshot) -> Result<()> {
        tracing::debug!(
            "[MAIN] {} bid {:?} ask {:?} last {:?}",
            depth.requested_symbol,
            depth.best_bid.map(|l| l.price),
            depth.best_ask.map(|l| l.price),
            depth.last_trade.map(|l| l.price)
        );
        Ok(())
    }

    fn unresolved_symbol(&self, requested_symbol: &str, report: &InformationReport) -> Result<()> {
        warn!("[MAIN] Unknown symbol {} ({:?})", requested_symbol, report.status_code);
        Ok(())
    }
}

impl TradingSink for ConsoleSink {
    fn accounts_resolved(&self, report: &AccountsReport) -> Result<()> {
        for brokerage in &report.brokerage {
            for series in &brokerage.sales_series {
                for account in &series.account {
                    info!("[MAIN] Account {} {} ({})", account.account_id, account.name, brokerage.name);
                }
            }
        }
        Ok(())
    }

    fn collateral_status_change(&self, status: &CollateralStatus) -> Result<()> {
        info!("[MAIN] Collateral {} {}: margin {:.2}", status.account_id, status.currency, status.total_margin);
        Ok(())
    }

    fn order_request_rejected(&self, rejection: &OrderRejection) -> Result<()> {
        warn!(
            "[MAIN] Order {:?} rejected: {}",
            rejection.cl_order_id,
            rejection.reject.text_message.as_deref().unwrap_or("")
        );
        Ok(())
    }

    fn order_status_change(&self, update: &OrderUpdate) -> Result<()> {
        if let Some(record) = &update.record {
            info!(
                "[MAIN] Order {} {:?} filled {}/{}",
                record.chain_order_id, record.status, record.fill_qty, record.order.qty
            );
        }
        Ok(())
    }

    fn historical_orders_resolved(&self, orders: &[OrderUpdate]) -> Result<()> {
        info!("[MAIN] {} historical orders", orders.len());
        Ok(())
    }

    fn position_status_change(&self, update: &PositionUpdate) -> Result<()> {
        let s = &update.summary;
        info!(
            "[MAIN] Position {} long {} short {} avg {:.4} rpnl {:.2}",
            update.symbol, s.long_qty, s.short_qty, s.average_price, s.realized_pnl
        );
        Ok(())
    }

    fn trading_snapshot_completion(&self, _snapshot: &TradeSnapshotCompletion, completed: ScopeMask) -> Result<()> {
        if completed == ScopeMask::ALL {
            info!("[MAIN] Trading snapshot complete");
        }
        Ok(())
    }
}

impl SessionInfoSink for ConsoleSink {}

impl HistoricalDataSink for ConsoleSink {
    fn time_bar_received(&self, report: &TimeBarReport) -> Result<()> {
        info!("[MAIN] {} bars for request {}", report.time_bar.len(), report.request_id);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).with_target(false).init();
    info!("═══ WebAPI router ═══");

    let config = match std::env::args().nth(1) {
        Some(path) => ClientConfig::from_toml_file(path)?,
        None => ClientConfig::default(),
    }
    .with_env_overrides();
    if config.host.is_empty() {
        anyhow::bail!("no host configured: pass a config file or set WEBAPI_HOST");
    }
    let symbols: Vec<String> = std::env::var("WEBAPI_SYMBOLS")
        .unwrap_or_else(|_| "CLZ25".to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let session = SessionManager::new(config.clone(), WsTransport::new()?, Arc::new(JsonCodec));
    let (tx, mut lifecycle) = mpsc::unbounded_channel();
    let sink = Arc::new(ConsoleSink { lifecycle: tx });
    session.register_connection(sink.clone());
    session.register_market_data(sink.clone());
    session.register_trading(sink.clone());
    session.register_session_info(sink.clone());
    session.register_historical(sink);

    session.log_on(&config.username, &config.password, &config.host)?;

    let mut status = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("[MAIN] Ctrl-C, logging off");
                if session.logoff().is_ok() {
                    let _ = tokio::time::timeout(Duration::from_secs(5), lifecycle.recv()).await;
                }
                break;
            }
            Some(event) = lifecycle.recv() => match event {
                Lifecycle::Started => {
                    session.request_accounts()?;
                    session.request_trading_subscription(&SubscriptionScope::ALL)?;
                    for symbol in &symbols {
                        session.request_instrument_subscription(symbol)?;
                    }
                }
                Lifecycle::Ended => break,
            },
            _ = status.tick() => {
                for symbol in &symbols {
                    if let Some(depth) = session.contract_id(symbol).and_then(|id| session.depth(id)) {
                        info!(
                            "[MAIN] {} mid {:?} spread {:?} | {} rows",
                            symbol, depth.mid_price(), depth.spread(), depth.row_count()
                        );
                    }
                }
            }
        }
    }

    info!("[MAIN] Done");
    Ok(())
}
