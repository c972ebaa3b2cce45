//! Consumer registries and fan-out
//!
//! Five ordered, append-only sink sets. Every event goes to every sink of
//! its domain in registration order; a sink that fails or panics is logged
//! and skipped so the rest still receive the event.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tracing::{error, warn};

use super::order_book::DepthSnapshot;
use super::order_state::{OrderRejection, OrderUpdate, ScopeMask};
use super::positions::PositionUpdate;
use super::traits::{ConnectionSink, HistoricalDataSink, MarketDataSink, SessionInfoSink, TradingSink};
use super::types::*;

/// Domain event produced by inbound processing, delivered after the
/// session's state lock is released.
#[derive(Debug, Clone)]
pub enum Event {
    // Connection
    SessionError(String),
    SessionStarted(LogonResult),
    SessionStopped(Option<LoggedOff>),

    // Market data
    InstrumentStaticInfo(String, SymbolResolutionReport),
    InstrumentSubscribed(MarketDataSubscriptionStatus),
    InstrumentUpdate(DepthSnapshot),
    UnresolvedSymbol(String, InformationReport),

    // Trading
    AccountsResolved(AccountsReport),
    CollateralStatusChange(CollateralStatus),
    OrderRequestRejected(OrderRejection),
    OrderStatusChange(OrderUpdate),
    HistoricalOrdersResolved(Vec<OrderUpdate>),
    PositionStatusChange(PositionUpdate),
    TradingSnapshotCompletion(TradeSnapshotCompletion, ScopeMask),
    TradingSubscriptionStatus(TradeSubscriptionStatus),
    StatementBalancesResolved(LastStatementBalancesReport),

    // Session info
    SessionInformation(SessionInformationReport),

    // Historical data
    TimeAndSalesReceived(TimeAndSalesReport),
    TimeBarReceived(TimeBarReport),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::SessionError(_) => "SessionError",
            Event::SessionStarted(_) => "SessionStarted",
            Event::SessionStopped(_) => "SessionStopped",
            Event::InstrumentStaticInfo(..) => "InstrumentStaticInfo",
            Event::InstrumentSubscribed(_) => "InstrumentSubscribed",
            Event::InstrumentUpdate(_) => "InstrumentUpdate",
            Event::UnresolvedSymbol(..) => "UnresolvedSymbol",
            Event::AccountsResolved(_) => "AccountsResolved",
            Event::CollateralStatusChange(_) => "CollateralStatusChange",
            Event::OrderRequestRejected(_) => "OrderRequestRejected",
            Event::OrderStatusChange(_) => "OrderStatusChange",
            Event::HistoricalOrdersResolved(_) => "HistoricalOrdersResolved",
            Event::PositionStatusChange(_) => "PositionStatusChange",
            Event::TradingSnapshotCompletion(..) => "TradingSnapshotCompletion",
            Event::TradingSubscriptionStatus(_) => "TradingSubscriptionStatus",
            Event::StatementBalancesResolved(_) => "StatementBalancesResolved",
            Event::SessionInformation(_) => "SessionInformation",
            Event::TimeAndSalesReceived(_) => "TimeAndSalesReceived",
            Event::TimeBarReceived(_) => "TimeBarReceived",
        }
    }
}

type SinkSet<S> = RwLock<Vec<Arc<S>>>;

#[derive(Default)]
pub struct SinkRegistry {
    connection: SinkSet<dyn ConnectionSink>,
    market_data: SinkSet<dyn MarketDataSink>,
    trading: SinkSet<dyn TradingSink>,
    session_info: SinkSet<dyn SessionInfoSink>,
    historical: SinkSet<dyn HistoricalDataSink>,
}

fn push<S: ?Sized>(set: &SinkSet<S>, sink: Arc<S>) {
    set.write().unwrap_or_else(|e| e.into_inner()).push(sink);
}

fn count<S: ?Sized>(set: &SinkSet<S>) -> usize {
    set.read().unwrap_or_else(|e| e.into_inner()).len()
}

/// Deliver to a snapshot of the set so a sink may register others while
/// being called.
fn deliver<S: ?Sized>(set: &SinkSet<S>, event: &str, call: impl Fn(&S) -> anyhow::Result<()>) {
    let sinks: Vec<Arc<S>> = set.read().unwrap_or_else(|e| e.into_inner()).clone();
    for (i, sink) in sinks.iter().enumerate() {
        match catch_unwind(AssertUnwindSafe(|| call(sink.as_ref()))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("[EVENTS] {} consumer #{} failed: {:#}", event, i, e),
            Err(_) => error!("[EVENTS] {} consumer #{} panicked", event, i),
        }
    }
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_connection(&self, sink: Arc<dyn ConnectionSink>) {
        push(&self.connection, sink);
    }

    pub fn register_market_data(&self, sink: Arc<dyn MarketDataSink>) {
        push(&self.market_data, sink);
    }

    pub fn register_trading(&self, sink: Arc<dyn TradingSink>) {
        push(&self.trading, sink);
    }

    pub fn register_session_info(&self, sink: Arc<dyn SessionInfoSink>) {
        push(&self.session_info, sink);
    }

    pub fn register_historical(&self, sink: Arc<dyn HistoricalDataSink>) {
        push(&self.historical, sink);
    }

    /// Registered sink counts: connection, market data, trading, session
    /// info, historical.
    pub fn counts(&self) -> [usize; 5] {
        [
            count(&self.connection),
            count(&self.market_data),
            count(&self.trading),
            count(&self.session_info),
            count(&self.historical),
        ]
    }

    pub fn dispatch(&self, event: &Event) {
        let name = event.name();
        match event {
            Event::SessionError(text) => deliver(&self.connection, name, |s| s.session_error(text)),
            Event::SessionStarted(result) => deliver(&self.connection, name, |s| s.session_started(result)),
            Event::SessionStopped(reason) => deliver(&self.connection, name, |s| s.session_stopped(reason.as_ref())),

            Event::InstrumentStaticInfo(symbol, report) => {
                deliver(&self.market_data, name, |s| s.instrument_static_info(symbol, report))
            }
            Event::InstrumentSubscribed(status) => deliver(&self.market_data, name, |s| s.instrument_subscribed(status)),
            Event::InstrumentUpdate(depth) => deliver(&self.market_data, name, |s| s.instrument_update(depth)),
            Event::UnresolvedSymbol(symbol, report) => {
                deliver(&self.market_data, name, |s| s.unresolved_symbol(symbol, report))
            }

            Event::AccountsResolved(report) => deliver(&self.trading, name, |s| s.accounts_resolved(report)),
            Event::CollateralStatusChange(status) => {
                deliver(&self.trading, name, |s| s.collateral_status_change(status))
            }
            Event::OrderRequestRejected(rejection) => {
                deliver(&self.trading, name, |s| s.order_request_rejected(rejection))
            }
            Event::OrderStatusChange(update) => deliver(&self.trading, name, |s| s.order_status_change(update)),
            Event::HistoricalOrdersResolved(orders) => {
                deliver(&self.trading, name, |s| s.historical_orders_resolved(orders))
            }
            Event::PositionStatusChange(update) => deliver(&self.trading, name, |s| s.position_status_change(update)),
            Event::TradingSnapshotCompletion(snapshot, mask) => {
                deliver(&self.trading, name, |s| s.trading_snapshot_completion(snapshot, *mask))
            }
            Event::TradingSubscriptionStatus(status) => {
                deliver(&self.trading, name, |s| s.trading_subscription_status(status))
            }
            Event::StatementBalancesResolved(report) => {
                deliver(&self.trading, name, |s| s.statement_balances_resolved(report))
            }

            Event::SessionInformation(report) => deliver(&self.session_info, name, |s| s.session_information(report)),

            Event::TimeAndSalesReceived(report) => {
                deliver(&self.historical, name, |s| s.time_and_sales_received(report))
            }
            Event::TimeBarReceived(report) => deliver(&self.historical, name, |s| s.time_bar_received(report)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ConnectionSink for Recorder {
        fn session_error(&self, text: &str) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(format!("{}:{}", self.tag, text));
            Ok(())
        }
    }

    struct Failing;

    impl ConnectionSink for Failing {
        fn session_error(&self, _text: &str) -> anyhow::Result<()> {
            anyhow::bail!("sink unavailable")
        }
    }

    struct Panicking;

    impl ConnectionSink for Panicking {
        fn session_error(&self, _text: &str) -> anyhow::Result<()> {
            panic!("consumer bug")
        }
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = SinkRegistry::new();
        registry.register_connection(Arc::new(Recorder { tag: "a", log: log.clone() }));
        registry.register_connection(Arc::new(Recorder { tag: "b", log: log.clone() }));

        registry.dispatch(&Event::SessionError("boom".into()));
        assert_eq!(*log.lock().unwrap(), vec!["a:boom", "b:boom"]);
    }

    #[test]
    fn test_failing_consumers_do_not_block_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = SinkRegistry::new();
        registry.register_connection(Arc::new(Failing));
        registry.register_connection(Arc::new(Panicking));
        registry.register_connection(Arc::new(Recorder { tag: "z", log: log.clone() }));

        registry.dispatch(&Event::SessionError("x".into()));
        assert_eq!(*log.lock().unwrap(), vec!["z:x"]);
    }

    #[test]
    fn test_events_only_reach_their_domain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = SinkRegistry::new();
        registry.register_connection(Arc::new(Recorder { tag: "c", log: log.clone() }));

        registry.dispatch(&Event::TimeBarReceived(TimeBarReport::default()));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(registry.counts(), [1, 0, 0, 0, 0]);
    }
}
