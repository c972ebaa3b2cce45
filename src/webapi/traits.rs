//! Seams of the protocol engine
//!
//! The session talks to the outside world only through these traits:
//! a byte-oriented transport, a structured-message codec, and five narrow
//! consumer capabilities. A consumer implements only the sinks it needs;
//! every callback has a no-op default.

use std::sync::Weak;

use anyhow::Result;

use super::error::Result as ClientResult;
use super::order_book::DepthSnapshot;
use super::order_state::{OrderRejection, OrderUpdate, ScopeMask};
use super::positions::PositionUpdate;
use super::types::*;

// ======================= TRANSPORT =======================

/// Ordered, reliable, message-framed duplex channel.
///
/// Implementations must not block: `open` starts connecting and reports
/// the outcome through the bound listener, `send` queues a frame.
pub trait Transport: Send + Sync {
    /// Register the receiver of transport events. Held weakly so the
    /// session and its transport do not keep each other alive.
    fn bind(&self, listener: Weak<dyn TransportListener>);

    fn open(&self, host: &str) -> Result<()>;

    fn send(&self, payload: Vec<u8>) -> Result<()>;

    fn close(&self);
}

/// Transport events, delivered by the transport's own execution context.
pub trait TransportListener: Send + Sync {
    fn on_opened(&self);

    fn on_closed(&self);

    fn on_error(&self, reason: &str);

    fn on_data(&self, payload: &[u8]);
}

// ======================= CODEC =======================

pub trait MessageCodec: Send + Sync {
    fn encode(&self, msg: &ClientMsg) -> ClientResult<Vec<u8>>;

    fn decode(&self, payload: &[u8]) -> ClientResult<ServerMsg>;
}

// ======================= SINKS =======================

pub trait ConnectionSink: Send + Sync {
    fn session_error(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn session_started(&self, _result: &LogonResult) -> Result<()> {
        Ok(())
    }

    /// `reason` is `None` when the transport closed without a server logoff.
    fn session_stopped(&self, _reason: Option<&LoggedOff>) -> Result<()> {
        Ok(())
    }
}

pub trait MarketDataSink: Send + Sync {
    fn instrument_static_info(&self, _requested_symbol: &str, _report: &SymbolResolutionReport) -> Result<()> {
        Ok(())
    }

    fn instrument_subscribed(&self, _status: &MarketDataSubscriptionStatus) -> Result<()> {
        Ok(())
    }

    fn instrument_update(&self, _depth: &DepthSnapshot) -> Result<()> {
        Ok(())
    }

    fn unresolved_symbol(&self, _requested_symbol: &str, _report: &InformationReport) -> Result<()> {
        Ok(())
    }
}

pub trait TradingSink: Send + Sync {
    fn accounts_resolved(&self, _report: &AccountsReport) -> Result<()> {
        Ok(())
    }

    fn collateral_status_change(&self, _status: &CollateralStatus) -> Result<()> {
        Ok(())
    }

    fn order_request_rejected(&self, _rejection: &OrderRejection) -> Result<()> {
        Ok(())
    }

    fn order_status_change(&self, _update: &OrderUpdate) -> Result<()> {
        Ok(())
    }

    /// Every entry has `historical == true`.
    fn historical_orders_resolved(&self, _orders: &[OrderUpdate]) -> Result<()> {
        Ok(())
    }

    fn position_status_change(&self, _update: &PositionUpdate) -> Result<()> {
        Ok(())
    }

    fn trading_snapshot_completion(&self, _snapshot: &TradeSnapshotCompletion, _completed: ScopeMask) -> Result<()> {
        Ok(())
    }

    fn trading_subscription_status(&self, _status: &TradeSubscriptionStatus) -> Result<()> {
        Ok(())
    }

    fn statement_balances_resolved(&self, _report: &LastStatementBalancesReport) -> Result<()> {
        Ok(())
    }
}

pub trait SessionInfoSink: Send + Sync {
    fn session_information(&self, _report: &SessionInformationReport) -> Result<()> {
        Ok(())
    }
}

pub trait HistoricalDataSink: Send + Sync {
    fn time_and_sales_received(&self, _report: &TimeAndSalesReport) -> Result<()> {
        Ok(())
    }

    fn time_bar_received(&self, _report: &TimeBarReport) -> Result<()> {
        Ok(())
    }
}
