//! Session Manager
//!
//! Owns the transport, the logon state machine and request-id allocation.
//! Each inbound batch is routed by kind to the instrument cache, the depth
//! engine and the order tracker; resulting events fan out to the sinks.
//!
//! Two locks:
//! - `inbound` serializes whole batches, fan-out included
//! - `core` guards session state and is held only while mutating/sending
//!
//! Sinks run with `core` released, so a callback may issue requests. A
//! callback must not feed another batch in synchronously.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone, Utc};
use tracing::{debug, error, info, warn};

use super::config::ClientConfig;
use super::error::{ClientError, Result};
use super::events::{Event, SinkRegistry};
use super::instruments::InstrumentResolutionCache;
use super::order_book::{DepthSnapshot, MarketDepthEngine};
use super::order_state::{OrderRecord, OrderStateTracker, ScopeMask, WaitingLeg};
use super::order_template::{build_cancel, build_modify, next_cl_order_id, ModifyParams};
use super::positions::PositionSummary;
use super::traits::{
    ConnectionSink, HistoricalDataSink, MarketDataSink, MessageCodec, SessionInfoSink, TradingSink, Transport,
    TransportListener,
};
use super::types::*;

// ======================= STATE =======================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    LoggedIn,
}

struct Credentials {
    user: String,
    password: String,
}

struct Core {
    state: ConnectionState,
    request_id: RequestId,
    /// Set by the first fatal error; cleared by the next `log_on`
    error_latched: bool,
    credentials: Option<Credentials>,
    base_time: Option<DateTime<Utc>>,
    instruments: InstrumentResolutionCache,
    depth: MarketDepthEngine,
    orders: OrderStateTracker,
    /// order-contract symbols already sent for resolution this session
    auto_resolving: HashSet<String>,
}

impl Core {
    fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            request_id: 0,
            error_latched: false,
            credentials: None,
            base_time: None,
            instruments: InstrumentResolutionCache::new(),
            depth: MarketDepthEngine::new(),
            orders: OrderStateTracker::new(),
            auto_resolving: HashSet::new(),
        }
    }

    fn next_request_id(&mut self) -> RequestId {
        self.request_id += 1;
        self.request_id
    }

    fn require_login(&self) -> Result<()> {
        match self.state {
            ConnectionState::LoggedIn => Ok(()),
            _ => Err(ClientError::NotLoggedIn),
        }
    }

    /// Milliseconds since the session base time
    fn relative_now(&self) -> i64 {
        self.base_time
            .map(|base| (Utc::now() - base).num_milliseconds())
            .unwrap_or(0)
    }
}

/// What routing one batch produced, acted on after `core` is released
#[derive(Default)]
struct Outcome {
    events: Vec<Event>,
    errors: Vec<ClientError>,
    close_transport: bool,
}

impl Outcome {
    fn fail(&mut self, e: ClientError) {
        error!("[SESSION] {}", e);
        self.errors.push(e);
    }
}

fn parse_base_time(text: &str, format: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, format)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| ClientError::InvalidBaseTime(format!("{:?}: {}", text, e)))
}

// ======================= SESSION MANAGER =======================

pub struct SessionManager {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    codec: Arc<dyn MessageCodec>,
    sinks: SinkRegistry,
    inbound: Mutex<()>,
    core: Mutex<Core>,
}

impl SessionManager {
    /// Build a session and bind it as the transport's listener.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>, codec: Arc<dyn MessageCodec>) -> Arc<Self> {
        let session = Arc::new(Self {
            config,
            transport,
            codec,
            sinks: SinkRegistry::new(),
            inbound: Mutex::new(()),
            core: Mutex::new(Core::new()),
        });
        let listener: Weak<SessionManager> = Arc::downgrade(&session);
        let listener: Weak<dyn TransportListener> = listener;
        session.transport.bind(listener);
        session
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn gate(&self) -> MutexGuard<'_, ()> {
        self.inbound.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn send(&self, msg: &ClientMsg) -> Result<()> {
        let payload = self.codec.encode(msg)?;
        self.transport
            .send(payload)
            .map_err(|e| ClientError::Send(format!("{:#}", e)))
    }

    fn finish(&self, outcome: Outcome) -> Vec<ClientError> {
        if outcome.close_transport {
            self.transport.close();
        }
        for event in &outcome.events {
            self.sinks.dispatch(event);
        }
        outcome.errors
    }

    // === Registration ===

    pub fn register_connection(&self, sink: Arc<dyn ConnectionSink>) {
        self.sinks.register_connection(sink);
    }

    pub fn register_market_data(&self, sink: Arc<dyn MarketDataSink>) {
        self.sinks.register_market_data(sink);
    }

    pub fn register_trading(&self, sink: Arc<dyn TradingSink>) {
        self.sinks.register_trading(sink);
    }

    pub fn register_session_info(&self, sink: Arc<dyn SessionInfoSink>) {
        self.sinks.register_session_info(sink);
    }

    pub fn register_historical(&self, sink: Arc<dyn HistoricalDataSink>) {
        self.sinks.register_historical(sink);
    }

    pub fn sinks(&self) -> &SinkRegistry {
        &self.sinks
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // === Lifecycle ===

    /// Start connecting. The logon request goes out once the transport
    /// reports open; the outcome arrives through the connection sinks.
    pub fn log_on(&self, user: &str, password: &str, host: &str) -> Result<()> {
        {
            let mut core = self.core();
            if core.state != ConnectionState::Disconnected {
                return Err(ClientError::AlreadyConnected);
            }
            core.error_latched = false;
            core.request_id = 0;
            core.credentials = Some(Credentials {
                user: user.to_string(),
                password: password.to_string(),
            });
            core.state = ConnectionState::Connecting;
        }

        info!("[SESSION] Connecting to {} as {}", host, user);
        if let Err(e) = self.transport.open(host) {
            let mut core = self.core();
            core.state = ConnectionState::Disconnected;
            core.credentials = None;
            error!("[SESSION] Failed to open transport: {:#}", e);
            return Err(ClientError::Connection(format!("{:#}", e)));
        }
        Ok(())
    }

    /// Ask the server to end the session. State changes only when the
    /// logged-off acknowledgment (or a transport close) arrives.
    pub fn logoff(&self) -> Result<()> {
        let core = self.core();
        core.require_login()?;
        info!("[SESSION] Logging off");
        self.send(&ClientMsg {
            logoff: Some(Logoff::default()),
            ..Default::default()
        })
    }

    /// Single exit path for every way a session ends. Returns false (and
    /// emits nothing) when already disconnected.
    fn teardown(core: &mut Core, notice: Event, out: &mut Outcome) -> bool {
        if core.state == ConnectionState::Disconnected {
            return false;
        }
        info!("[SESSION] Session ended ({})", notice.name());
        core.state = ConnectionState::Disconnected;
        core.request_id = 0;
        core.base_time = None;
        core.credentials = None;
        core.instruments.reset();
        core.depth.clear();
        core.orders.end_session();
        core.auto_resolving.clear();
        out.events.push(notice);
        true
    }

    // === Accessors ===

    pub fn state(&self) -> ConnectionState {
        self.core().state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state() == ConnectionState::LoggedIn
    }

    /// Most recently issued request id; 0 before the first request
    pub fn last_request_id(&self) -> RequestId {
        self.core().request_id
    }

    pub fn base_time(&self) -> Option<DateTime<Utc>> {
        self.core().base_time
    }

    /// Convert a wire timestamp (ms relative to base time) to UTC.
    pub fn absolute_time(&self, rel_ms: i64) -> Option<DateTime<Utc>> {
        let base = self.core().base_time?;
        TimeDelta::try_milliseconds(rel_ms).and_then(|delta| base.checked_add_signed(delta))
    }

    pub fn contract_id(&self, symbol: &str) -> Option<ContractId> {
        let core = self.core();
        core.instruments
            .lookup(symbol)
            .or_else(|| core.instruments.lookup_resolved(symbol))
    }

    pub fn depth(&self, contract_id: ContractId) -> Option<DepthSnapshot> {
        self.core().depth.snapshot(contract_id)
    }

    pub fn order(&self, chain_order_id: &str) -> Option<OrderRecord> {
        self.core().orders.order(chain_order_id).cloned()
    }

    pub fn order_by_client_id(&self, cl_order_id: &str) -> Option<OrderRecord> {
        self.core().orders.order_by_client_id(cl_order_id).cloned()
    }

    pub fn can_cancel_or_modify(&self, chain_order_id: &str) -> bool {
        self.core().orders.eligible_for_change(chain_order_id).is_ok()
    }

    pub fn waiting_legs(&self) -> Vec<WaitingLeg> {
        self.core().orders.waiting_legs()
    }

    pub fn position_summary(&self, account_id: AccountId, symbol: &str) -> Option<PositionSummary> {
        self.core()
            .orders
            .positions()
            .position(account_id, symbol)
            .map(|p| p.summary())
    }

    pub fn open_position_symbols(&self, account_id: AccountId) -> Vec<String> {
        self.core()
            .orders
            .positions()
            .open_symbols(account_id)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn balances(&self) -> Vec<Balance> {
        self.core().orders.positions().balances().to_vec()
    }

    pub fn completed_scopes(&self) -> ScopeMask {
        self.core().orders.completed_scopes()
    }

    // ======================= REQUESTS =======================

    fn information_request(&self, query: InformationQuery) -> Result<RequestId> {
        let mut core = self.core();
        core.require_login()?;
        let id = core.next_request_id();
        debug!("[SESSION] Information request {} {:?}", id, query);
        self.send(&ClientMsg {
            information_request: vec![InformationRequest { id, query }],
            ..Default::default()
        })?;
        Ok(id)
    }

    fn resolve(&self, core: &mut Core, symbol: &str) -> Result<RequestId> {
        let id = core.next_request_id();
        core.instruments.begin_resolution(id, symbol)?;
        self.send(&ClientMsg {
            information_request: vec![InformationRequest {
                id,
                query: InformationQuery::SymbolResolution {
                    symbol: symbol.to_string(),
                },
            }],
            ..Default::default()
        })?;
        Ok(id)
    }

    fn send_subscription(&self, contract_id: ContractId, level: SubscriptionLevel) -> Result<()> {
        debug!("[DEPTH] Subscribing contract {} at {:?}", contract_id, level);
        self.send(&ClientMsg {
            market_data_subscription: vec![MarketDataSubscription { contract_id, level }],
            ..Default::default()
        })
    }

    fn send_order(&self, core: &mut Core, action: OrderAction) -> Result<RequestId> {
        let id = core.next_request_id();
        match &action {
            OrderAction::NewOrder(order) => core.orders.note_submitted(id, order),
            other => {
                if let Some(cl_order_id) = other.cl_order_id() {
                    core.orders.note_request(id, cl_order_id);
                }
            }
        }
        let sent = self.send(&ClientMsg {
            order_request: vec![OrderRequest { request_id: id, action }],
            ..Default::default()
        });
        if let Err(e) = sent {
            core.orders.forget_request(id);
            return Err(e);
        }
        Ok(id)
    }

    pub fn request_accounts(&self) -> Result<RequestId> {
        self.information_request(InformationQuery::Accounts)
    }

    /// Resolve and subscribe a symbol. An already-resolved symbol is
    /// subscribed directly and returns 0.
    pub fn request_instrument_subscription(&self, symbol: &str) -> Result<RequestId> {
        let mut core = self.core();
        core.require_login()?;
        if let Some(contract_id) = core.instruments.lookup(symbol) {
            debug!("[INSTRUMENTS] {} cached as contract {}", symbol, contract_id);
            self.send_subscription(contract_id, self.config.subscription_level)?;
            return Ok(0);
        }
        self.resolve(&mut core, symbol)
    }

    /// Accepts the requested text or the resolved contract symbol. Cache
    /// and book are dropped once the server confirms.
    pub fn request_instrument_unsubscription(&self, symbol: &str) -> Result<RequestId> {
        let core = self.core();
        core.require_login()?;
        let contract_id = core
            .instruments
            .lookup(symbol)
            .or_else(|| core.instruments.lookup_resolved(symbol));
        match contract_id {
            Some(contract_id) => self.send_subscription(contract_id, SubscriptionLevel::None)?,
            None => debug!("[INSTRUMENTS] {} is not subscribed", symbol),
        }
        Ok(0)
    }

    pub fn request_place_order(&self, mut order: Order) -> Result<RequestId> {
        let mut core = self.core();
        core.require_login()?;
        if order.cl_order_id.is_empty() {
            order.cl_order_id = next_cl_order_id(None);
        }
        if order.when_utc_time == 0 {
            order.when_utc_time = core.relative_now();
        }
        info!(
            "[ORDERS] Place {} {} x{} on contract {} ({})",
            order.side.as_str(),
            order.cl_order_id,
            order.qty,
            order.contract_id,
            order.account_id
        );
        self.send_order(&mut core, OrderAction::NewOrder(order))
    }

    pub fn request_modify_order(&self, chain_order_id: &str, params: &ModifyParams) -> Result<RequestId> {
        let mut core = self.core();
        core.require_login()?;
        let modify = match core.orders.eligible_for_change(chain_order_id) {
            Ok(record) => build_modify(record, params, core.relative_now()),
            Err(e) => {
                warn!("[ORDERS] Modify refused: {}", e);
                return Err(e);
            }
        };
        info!("[ORDERS] Modify {} ({} -> {})", chain_order_id, modify.orig_cl_order_id, modify.cl_order_id);
        self.send_order(&mut core, OrderAction::ModifyOrder(modify))
    }

    /// Cancel a live order. Orders that can no longer change are refused
    /// locally and nothing is sent.
    pub fn request_cancel_order(&self, chain_order_id: &str) -> Result<RequestId> {
        let mut core = self.core();
        core.require_login()?;
        let cancel = match core.orders.eligible_for_change(chain_order_id) {
            Ok(record) => build_cancel(record, core.relative_now()),
            Err(e) => {
                warn!("[ORDERS] Cancel refused: {}", e);
                return Err(e);
            }
        };
        info!("[ORDERS] Cancel {} ({} -> {})", chain_order_id, cancel.orig_cl_order_id, cancel.cl_order_id);
        self.send_order(&mut core, OrderAction::CancelOrder(cancel))
    }

    fn compound_order(
        &self,
        core: &mut Core,
        mut legs: Vec<Order>,
        compound_type: CompoundOrderType,
        compound_id: &str,
        restage: bool,
    ) -> Result<RequestId> {
        let now = core.relative_now();
        for leg in legs.iter_mut().filter(|l| l.when_utc_time == 0) {
            leg.when_utc_time = now;
        }
        let compound = core.orders.submit_compound(legs, compound_type, compound_id)?;
        info!(
            "[ORDERS] Compound {:?} {} with {} legs",
            compound_type,
            compound_id,
            compound.compound_order_entry.len()
        );
        match self.send_order(core, OrderAction::NewCompoundOrder(compound)) {
            Ok(id) => Ok(id),
            Err(e) => {
                warn!("[ORDERS] Compound {} not sent: {}", compound_id, e);
                core.orders.withdraw_compound(compound_id, restage);
                Err(e)
            }
        }
    }

    pub fn request_new_compound_order(
        &self,
        legs: Vec<Order>,
        compound_type: CompoundOrderType,
        compound_id: &str,
    ) -> Result<RequestId> {
        let mut core = self.core();
        core.require_login()?;
        self.compound_order(&mut core, legs, compound_type, compound_id, false)
    }

    /// Hold a leg client-side until `flush_compound_order`.
    pub fn stage_compound_leg(&self, order: Order) -> Result<()> {
        self.core().orders.stage_leg(order)
    }

    pub fn unstage_compound_leg(&self, cl_order_id: &str) -> Option<Order> {
        self.core().orders.unstage_leg(cl_order_id)
    }

    /// Send every staged leg as one compound request and clear staging. If
    /// the request cannot be sent the legs stay staged.
    pub fn flush_compound_order(&self, compound_type: CompoundOrderType, compound_id: &str) -> Result<RequestId> {
        let mut core = self.core();
        core.require_login()?;
        let legs = core.orders.take_staged();
        self.compound_order(&mut core, legs, compound_type, compound_id, true)
    }

    pub fn request_historical_orders(&self, account_id: AccountId, from_date: i64, to_date: i64) -> Result<RequestId> {
        self.information_request(InformationQuery::HistoricalOrders {
            account_id: vec![account_id],
            from_date,
            to_date,
        })
    }

    pub fn request_session_information(&self, session_info_id: i32) -> Result<RequestId> {
        self.information_request(InformationQuery::SessionInformation { session_info_id })
    }

    pub fn request_statement_balances(&self) -> Result<RequestId> {
        self.information_request(InformationQuery::LastStatementBalances)
    }

    /// A non-zero `request_id` (normally to drop an earlier request) is
    /// reused as-is; zero allocates a fresh id.
    pub fn request_time_and_sales(
        &self,
        params: TimeAndSalesParameters,
        request_type: HistoricalRequestType,
        request_id: RequestId,
    ) -> Result<RequestId> {
        let mut core = self.core();
        core.require_login()?;
        let id = if request_id != 0 { request_id } else { core.next_request_id() };
        debug!("[HISTORY] Time and sales {:?} request {}", request_type, id);
        self.send(&ClientMsg {
            time_and_sales_request: vec![TimeAndSalesRequest {
                request_id: id,
                request_type,
                time_and_sales_parameters: (request_type == HistoricalRequestType::Get).then_some(params),
            }],
            ..Default::default()
        })?;
        Ok(id)
    }

    pub fn request_time_bars(
        &self,
        params: TimeBarParameters,
        request_type: HistoricalRequestType,
        request_id: RequestId,
    ) -> Result<RequestId> {
        let mut core = self.core();
        core.require_login()?;
        let id = if request_id != 0 { request_id } else { core.next_request_id() };
        debug!("[HISTORY] Time bars {:?} request {}", request_type, id);
        self.send(&ClientMsg {
            time_bar_request: vec![TimeBarRequest {
                request_id: id,
                request_type,
                time_bar_parameters: (request_type == HistoricalRequestType::Get).then_some(params),
            }],
            ..Default::default()
        })?;
        Ok(id)
    }

    pub fn request_trading_subscription(&self, scopes: &[SubscriptionScope]) -> Result<RequestId> {
        let mut core = self.core();
        core.require_login()?;
        let id = core.next_request_id();
        core.orders.register_subscription(id, scopes);
        info!("[ORDERS] Trade subscription {} for {:?}", id, scopes);
        self.send(&ClientMsg {
            trade_subscription: vec![TradeSubscription {
                id,
                subscribe: true,
                publication_type: PublicationType::AllAuthorized,
                subscription_scope: scopes.to_vec(),
            }],
            ..Default::default()
        })?;
        Ok(id)
    }

    // ======================= INBOUND =======================

    /// Route one decoded batch and deliver the resulting events. Local
    /// errors are returned; they never stop the rest of the batch.
    pub fn process_batch(&self, msg: ServerMsg) -> Vec<ClientError> {
        let _gate = self.gate();
        let outcome = {
            let mut core = self.core();
            self.route(&mut core, msg)
        };
        self.finish(outcome)
    }

    fn route(&self, core: &mut Core, msg: ServerMsg) -> Outcome {
        let mut out = Outcome::default();
        if core.state == ConnectionState::Disconnected {
            debug!("[SESSION] Dropping batch received while disconnected");
            return out;
        }

        let ServerMsg {
            logon_result,
            logged_off,
            ping,
            pong: _,
            information_report,
            market_data_subscription_status,
            real_time_market_data,
            trade_subscription_status,
            trade_snapshot_completion,
            order_request_reject,
            order_status,
            position_status,
            collateral_status,
            time_bar_report,
            time_and_sales_report,
        } = msg;

        if let Some(result) = logon_result {
            self.on_logon_result(core, result, &mut out);
            if core.state == ConnectionState::Disconnected {
                return out;
            }
        }

        if let Some(ping) = ping {
            let pong = Pong {
                token: ping.token,
                ping_utc_time: ping.ping_utc_time,
                pong_utc_time: core.relative_now(),
            };
            if let Err(e) = self.send(&ClientMsg {
                pong: Some(pong),
                ..Default::default()
            }) {
                out.fail(e);
            }
        }

        for report in information_report {
            self.on_information_report(core, report, &mut out);
        }

        for status in market_data_subscription_status {
            Self::on_subscription_status(core, status, &mut out);
        }

        for data in &real_time_market_data {
            if let Some(depth) = core.depth.apply(data) {
                out.events.push(Event::InstrumentUpdate(depth));
            }
        }

        for status in trade_subscription_status {
            if status.status_code != TradeSubscriptionStatusCode::Success {
                warn!(
                    "[ORDERS] Trade subscription {} {:?}: {}",
                    status.id,
                    status.status_code,
                    status.text_message.as_deref().unwrap_or("")
                );
            }
            out.events.push(Event::TradingSubscriptionStatus(status));
        }

        for completion in trade_snapshot_completion {
            match core.orders.apply_snapshot_completion(&completion) {
                Some(mask) => {
                    info!("[ORDERS] Snapshot complete for {:?}", completion.subscription_scope);
                    out.events.push(Event::TradingSnapshotCompletion(completion, mask));
                }
                None => debug!("[ORDERS] Ignoring snapshot completion for subscription {}", completion.subscription_id),
            }
        }

        for reject in &order_request_reject {
            let rejection = core.orders.apply_rejection(reject);
            out.events.push(Event::OrderRequestRejected(rejection));
        }

        for status in &order_status {
            let update = core.orders.apply_order_status(status, false);
            self.discover_contracts(core, status, &mut out);
            out.events.push(Event::OrderStatusChange(update));
        }

        for status in &position_status {
            match core.orders.apply_position_status(status) {
                Ok(update) => out.events.push(Event::PositionStatusChange(update)),
                Err(e) => out.fail(e),
            }
        }

        for status in collateral_status {
            core.orders.apply_collateral_status(&status);
            out.events.push(Event::CollateralStatusChange(status));
        }

        for report in time_bar_report {
            out.events.push(Event::TimeBarReceived(report));
        }

        for report in time_and_sales_report {
            out.events.push(Event::TimeAndSalesReceived(report));
        }

        if let Some(logged_off) = logged_off {
            info!(
                "[SESSION] Logged off ({:?}) {}",
                logged_off.logoff_reason,
                logged_off.text_message.as_deref().unwrap_or("")
            );
            if Self::teardown(core, Event::SessionStopped(Some(logged_off)), &mut out) {
                out.close_transport = true;
            }
        }

        out
    }

    fn on_logon_result(&self, core: &mut Core, result: LogonResult, out: &mut Outcome) {
        if core.state != ConnectionState::Connecting {
            warn!("[SESSION] Unexpected logon result in state {:?}", core.state);
            return;
        }

        if result.result_code != LogonResultCode::Success {
            let text = result
                .text_message
                .clone()
                .unwrap_or_else(|| format!("Logon failed: {:?}", result.result_code));
            error!("[SESSION] {}", text);
            core.error_latched = true;
            Self::teardown(core, Event::SessionError(text), out);
            out.close_transport = true;
            return;
        }

        match parse_base_time(&result.base_time, &self.config.base_time_format) {
            Ok(base) => {
                core.base_time = Some(base);
                core.state = ConnectionState::LoggedIn;
                core.credentials = None;
                info!("[SESSION] Logged in as user {} (base time {})", result.user_id, base);
                out.events.push(Event::SessionStarted(result));
            }
            Err(e) => {
                core.error_latched = true;
                Self::teardown(core, Event::SessionError(e.to_string()), out);
                out.close_transport = true;
                out.fail(e);
            }
        }
    }

    fn on_information_report(&self, core: &mut Core, report: InformationReport, out: &mut Outcome) {
        if report.status_code.is_failure() {
            let text = report.text_message.as_deref().unwrap_or("");
            if !core.instruments.is_pending(report.id) {
                warn!("[SESSION] Information request {} failed ({:?}): {}", report.id, report.status_code, text);
                return;
            }
            match core.instruments.fail_resolution(report.id) {
                Ok(symbol) => {
                    // a later order report may retry it
                    core.auto_resolving.remove(&symbol);
                    warn!("[INSTRUMENTS] Could not resolve {} ({:?}): {}", symbol, report.status_code, text);
                    out.events.push(Event::UnresolvedSymbol(symbol, report));
                }
                Err(e) => out.fail(e),
            }
            return;
        }

        let InformationReport { id, payload, .. } = report;
        let Some(payload) = payload else {
            debug!("[SESSION] Information report {} without payload", id);
            return;
        };

        match payload {
            InformationPayload::SymbolResolution(resolution) => self.on_symbol_resolved(core, id, resolution, out),
            InformationPayload::Accounts(accounts) => out.events.push(Event::AccountsResolved(accounts)),
            InformationPayload::SessionInformation(info) => out.events.push(Event::SessionInformation(info)),
            InformationPayload::LastStatementBalances(balances) => {
                core.orders.set_statement_balances(&balances);
                out.events.push(Event::StatementBalancesResolved(balances));
            }
            InformationPayload::HistoricalOrders(history) => {
                let updates: Vec<_> = history
                    .order_status
                    .iter()
                    .map(|status| core.orders.apply_order_status(status, true))
                    .collect();
                for status in &history.order_status {
                    self.discover_contracts(core, status, out);
                }
                out.events.push(Event::HistoricalOrdersResolved(updates));
            }
        }
    }

    fn on_symbol_resolved(
        &self,
        core: &mut Core,
        request_id: RequestId,
        resolution: SymbolResolutionReport,
        out: &mut Outcome,
    ) {
        let metadata = &resolution.contract_metadata;
        let requested = match core
            .instruments
            .complete_resolution(request_id, metadata.contract_id, &metadata.contract_symbol)
        {
            Ok(requested) => requested,
            Err(e) => return out.fail(e),
        };

        info!(
            "[INSTRUMENTS] {} resolved to {} (contract {})",
            requested, metadata.contract_symbol, metadata.contract_id
        );
        core.orders.remember_contract(metadata);
        core.depth.track(&requested, metadata);
        if let Err(e) = self.send_subscription(metadata.contract_id, self.config.subscription_level) {
            out.fail(e);
        }
        out.events.push(Event::InstrumentStaticInfo(requested, resolution));
    }

    fn on_subscription_status(core: &mut Core, status: MarketDataSubscriptionStatus, out: &mut Outcome) {
        match status.status_code {
            SubscriptionStatusCode::Success if status.level == SubscriptionLevel::None => {
                core.instruments.unsubscribe(status.contract_id);
                core.depth.untrack(status.contract_id);
                info!("[DEPTH] Unsubscribed contract {}", status.contract_id);
            }
            SubscriptionStatusCode::Success => {
                debug!("[DEPTH] Contract {} subscribed at {:?}", status.contract_id, status.level);
            }
            code => warn!(
                "[DEPTH] Subscription for contract {} failed ({:?}): {}",
                status.contract_id,
                code,
                status.text_message.as_deref().unwrap_or("")
            ),
        }
        out.events.push(Event::InstrumentSubscribed(status));
    }

    /// Resolve contracts first seen on order reports so they get live data.
    fn discover_contracts(&self, core: &mut Core, status: &OrderStatus, out: &mut Outcome) {
        if !self.config.auto_subscribe_order_contracts || core.state != ConnectionState::LoggedIn {
            return;
        }
        for metadata in &status.contract_metadata {
            let symbol = &metadata.contract_symbol;
            if symbol.is_empty()
                || core.depth.is_tracked(metadata.contract_id)
                || core.instruments.lookup(symbol).is_some()
                || !core.auto_resolving.insert(symbol.clone())
            {
                continue;
            }
            debug!("[ORDERS] Subscribing to order contract {}", symbol);
            if let Err(e) = self.resolve(core, symbol) {
                out.fail(e);
            }
        }
    }
}

// ======================= TRANSPORT EVENTS =======================

impl TransportListener for SessionManager {
    fn on_opened(&self) {
        let mut core = self.core();
        if core.state != ConnectionState::Connecting {
            return;
        }
        let Some(credentials) = core.credentials.as_ref() else {
            return;
        };
        let logon = self.config.logon(&credentials.user, &credentials.password);
        info!("[SESSION] Transport open, sending logon for {}", logon.user_name);

        let sent = self.send(&ClientMsg {
            logon: Some(logon),
            ..Default::default()
        });
        // password is not kept past the logon request
        core.credentials = None;
        drop(core);

        if let Err(e) = sent {
            self.on_error(&e.to_string());
        }
    }

    fn on_closed(&self) {
        let _gate = self.gate();
        let mut out = Outcome::default();
        {
            let mut core = self.core();
            if Self::teardown(&mut core, Event::SessionStopped(None), &mut out) {
                warn!("[SESSION] Transport closed");
            }
        }
        self.finish(out);
    }

    fn on_error(&self, reason: &str) {
        let _gate = self.gate();
        let mut out = Outcome::default();
        {
            let mut core = self.core();
            if core.error_latched {
                debug!("[SESSION] Suppressed repeated transport error: {}", reason);
                return;
            }
            error!("[SESSION] Transport error: {}", reason);
            core.error_latched = true;
            if Self::teardown(&mut core, Event::SessionError(reason.to_string()), &mut out) {
                out.close_transport = true;
            }
        }
        self.finish(out);
    }

    fn on_data(&self, payload: &[u8]) {
        match self.codec.decode(payload) {
            Ok(msg) => {
                let errors = self.process_batch(msg);
                if !errors.is_empty() {
                    debug!("[SESSION] Batch processed with {} local errors", errors.len());
                }
            }
            Err(e) => error!("[SESSION] Dropping undecodable message: {}", e),
        }
    }
}
