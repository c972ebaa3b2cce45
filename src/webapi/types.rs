//! WebAPI message schema
//!
//! Structured client and server messages exchanged over the transport.
//! Encoding is the job of a `MessageCodec`; this module only defines shapes.
//! All `*_utc_time` fields are milliseconds relative to the session base time.

use serde::{Deserialize, Serialize};

pub type ContractId = u32;
pub type RequestId = u32;
pub type AccountId = i32;

// ======================= SESSION =======================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Logon {
    pub user_name: String,
    pub password: String,
    pub client_app_id: String,
    pub client_version: String,
    pub protocol_version_major: u32,
    pub protocol_version_minor: u32,
    pub drop_concurrent_session: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Logoff {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogonResultCode {
    #[default]
    Success,
    Failure,
    NoOnetime,
    PasswordExpired,
    ConcurrentSession,
    Redirected,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogonResult {
    pub result_code: LogonResultCode,
    /// Session origin, `yyyy-MM-ddTHH:mm:ss` in UTC.
    pub base_time: String,
    pub session_token: Option<String>,
    pub text_message: Option<String>,
    pub user_id: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogoffReason {
    #[default]
    ByRequest,
    Redirected,
    Forced,
    Reassigned,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggedOff {
    pub logoff_reason: LogoffReason,
    pub text_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub token: String,
    pub ping_utc_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pong {
    pub token: String,
    pub ping_utc_time: i64,
    pub pong_utc_time: i64,
}

// ======================= INFORMATION =======================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InformationQuery {
    Accounts,
    SymbolResolution { symbol: String },
    SessionInformation { session_info_id: i32 },
    LastStatementBalances,
    HistoricalOrders { account_id: Vec<AccountId>, from_date: i64, to_date: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformationRequest {
    pub id: RequestId,
    pub query: InformationQuery,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InformationStatus {
    #[default]
    Success,
    Subscribed,
    Update,
    Failure,
    Disconnected,
    Dropped,
    NotFound,
}

impl InformationStatus {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            InformationStatus::Failure
                | InformationStatus::Disconnected
                | InformationStatus::Dropped
                | InformationStatus::NotFound
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractMetadata {
    pub contract_id: ContractId,
    pub contract_symbol: String,
    /// Multiplier turning an integer wire price into a display price.
    pub correct_price_scale: f64,
    pub display_price_scale: u32,
    pub title: String,
    pub description: String,
    pub currency: String,
    pub cfi_code: String,
    pub tick_size: f64,
    pub tick_value: f64,
    pub is_most_active: bool,
    pub last_trading_date: i64,
    pub first_notice_date: Option<i64>,
    pub underlying_contract_symbol: Option<String>,
    pub session_info_id: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolResolutionReport {
    pub contract_metadata: ContractMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    pub account_id: AccountId,
    pub brokerage_account_id: String,
    pub name: String,
    pub last_statement_date: i64,
    pub is_view_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesSeries {
    pub number: String,
    pub name: String,
    pub account: Vec<Account>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Brokerage {
    pub id: u32,
    pub name: String,
    pub sales_series: Vec<SalesSeries>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsReport {
    pub brokerage: Vec<Brokerage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSchedule {
    pub name: String,
    pub is_primary: bool,
    /// Offsets from midnight, milliseconds.
    pub start_offset: i64,
    pub end_offset: i64,
    pub days: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSegment {
    pub session_segment_id: i64,
    pub from_utc_time: i64,
    pub to_utc_time: Option<i64>,
    pub session_schedule: Vec<SessionSchedule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionInformationReport {
    pub session_info_id: i32,
    pub session_segment: Vec<SessionSegment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Balance {
    pub id: i32,
    pub account_id: AccountId,
    pub statement_date: i64,
    pub currency: String,
    pub balance: f64,
    pub total_value: f64,
    pub ote: f64,
    pub upl: f64,
    pub mvo: f64,
    pub cash_excess: f64,
    pub collateral: f64,
    pub initial_margin: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LastStatementBalancesReport {
    pub balance: Vec<Balance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalOrdersReport {
    pub order_status: Vec<OrderStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InformationPayload {
    SymbolResolution(SymbolResolutionReport),
    Accounts(AccountsReport),
    SessionInformation(SessionInformationReport),
    LastStatementBalances(LastStatementBalancesReport),
    HistoricalOrders(HistoricalOrdersReport),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InformationReport {
    pub id: RequestId,
    pub status_code: InformationStatus,
    pub text_message: Option<String>,
    pub payload: Option<InformationPayload>,
}

// ======================= MARKET DATA =======================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionLevel {
    #[default]
    None,
    Trades,
    TradesBba,
    TradesBbaVolumes,
    TradesBbaDom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataSubscription {
    pub contract_id: ContractId,
    pub level: SubscriptionLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatusCode {
    #[default]
    Success,
    Disconnected,
    Failure,
    InvalidParams,
    AccessDenied,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataSubscriptionStatus {
    pub contract_id: ContractId,
    pub status_code: SubscriptionStatusCode,
    pub level: SubscriptionLevel,
    pub text_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteType {
    #[default]
    Trade,
    BestBid,
    BestAsk,
    Bid,
    Ask,
    Settlement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionOhlcIndicator {
    Open,
    High,
    Low,
    Close,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quote {
    #[serde(rename = "type")]
    pub quote_type: QuoteType,
    pub quote_utc_time: i64,
    /// Integer wire price; multiply by the contract's price scale to display.
    pub price: i64,
    pub volume: u64,
    pub session_ohlc_indicator: Vec<SessionOhlcIndicator>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketValues {
    pub open_price: i64,
    pub high_price: i64,
    pub low_price: i64,
    pub close_price: i64,
    pub indicative_open: i64,
    pub total_volume: u64,
    pub yesterday_close: i64,
    pub yesterday_settlement: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealTimeMarketData {
    pub contract_id: ContractId,
    pub is_snapshot: bool,
    pub quote: Vec<Quote>,
    pub market_values: Option<MarketValues>,
}

// ======================= ORDERS =======================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Mkt,
    #[default]
    Lmt,
    Stp,
    Stl,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    #[default]
    Day,
    Gtc,
    Gtd,
    Fak,
    Fok,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub account_id: AccountId,
    pub when_utc_time: i64,
    pub contract_id: ContractId,
    pub cl_order_id: String,
    pub order_type: OrderType,
    pub duration: TimeInForce,
    pub side: Side,
    pub qty: u32,
    pub limit_price: Option<i64>,
    pub stop_price: Option<i64>,
    pub good_thru_date: Option<i64>,
    pub is_manual: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifyOrder {
    pub order_id: String,
    pub account_id: AccountId,
    pub orig_cl_order_id: String,
    pub cl_order_id: String,
    pub when_utc_time: i64,
    pub qty: Option<u32>,
    pub limit_price: Option<i64>,
    pub stop_price: Option<i64>,
    pub duration: Option<TimeInForce>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: String,
    pub account_id: AccountId,
    pub orig_cl_order_id: String,
    pub cl_order_id: String,
    pub when_utc_time: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompoundOrderType {
    /// One-Processes-Other
    Opo,
    /// One-Cancels-Other
    #[default]
    Oco,
    Group,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompoundOrder {
    pub compound_type: CompoundOrderType,
    pub cl_compound_id: String,
    pub compound_order_entry: Vec<Order>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    NewOrder(Order),
    ModifyOrder(ModifyOrder),
    CancelOrder(CancelOrder),
    NewCompoundOrder(CompoundOrder),
}

impl OrderAction {
    /// Client order id carried by the action (the first leg for compounds).
    pub fn cl_order_id(&self) -> Option<&str> {
        match self {
            OrderAction::NewOrder(o) => Some(&o.cl_order_id),
            OrderAction::ModifyOrder(m) => Some(&m.cl_order_id),
            OrderAction::CancelOrder(c) => Some(&c.cl_order_id),
            OrderAction::NewCompoundOrder(c) => {
                c.compound_order_entry.first().map(|o| o.cl_order_id.as_str())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub request_id: RequestId,
    pub action: OrderAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderRequestReject {
    pub request_id: RequestId,
    pub reject_code: u32,
    pub text_message: Option<String>,
}

/// Order state as reported by the server. `Unset` marks ack-only reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusCode {
    #[default]
    Unset,
    InTransit,
    Rejected,
    Working,
    Expired,
    InCancel,
    InModify,
    Cancelled,
    Filled,
    Suspended,
    Disconnected,
    ActiveAt,
}

impl OrderStatusCode {
    pub fn is_set(&self) -> bool {
        *self != OrderStatusCode::Unset
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatusCode::Filled
                | OrderStatusCode::Cancelled
                | OrderStatusCode::Rejected
                | OrderStatusCode::Expired
                | OrderStatusCode::Disconnected
        )
    }

    pub fn can_cancel_or_modify(&self) -> bool {
        !self.is_terminal() && *self != OrderStatusCode::InCancel
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatusCode {
    #[default]
    InTransit,
    Rejected,
    Ack,
    Fill,
    Modified,
    Cancelled,
    RejectCancel,
    RejectModify,
    Expired,
    Disconnected,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionStatus {
    pub status: TransactionStatusCode,
    pub trans_id: u64,
    pub trans_utc_time: i64,
    pub fill_qty: u32,
    pub text_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompoundOrderStructure {
    pub cl_compound_id: String,
    pub compound_type: CompoundOrderType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderStatus {
    pub status: OrderStatusCode,
    pub order_id: String,
    pub chain_order_id: String,
    pub status_utc_time: i64,
    pub fill_qty: u32,
    pub avg_fill_price: i64,
    pub remaining_qty: u32,
    pub account_id: AccountId,
    pub order: Order,
    pub transaction_status: Vec<TransactionStatus>,
    pub contract_metadata: Vec<ContractMetadata>,
    pub compound_order_structure: Option<CompoundOrderStructure>,
}

// ======================= POSITIONS & COLLATERAL =======================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenPosition {
    pub id: i32,
    pub qty: u32,
    pub price: f64,
    pub trade_date: i64,
    pub statement_date: i64,
    pub trade_utc_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurchaseAndSalesGroup {
    pub id: i32,
    pub realized_profit_loss: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionStatus {
    pub account_id: AccountId,
    pub contract_id: ContractId,
    pub is_short_open_position: bool,
    pub open_position: Vec<OpenPosition>,
    pub purchase_and_sales_group: Vec<PurchaseAndSalesGroup>,
    pub contract_metadata: Option<ContractMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollateralStatus {
    pub account_id: AccountId,
    pub currency: String,
    pub total_margin: f64,
    pub purchasing_power: f64,
    pub ote: Option<f64>,
    pub upl: Option<f64>,
    pub mvo: Option<f64>,
}

// ======================= TRADE SUBSCRIPTION =======================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionScope {
    Orders,
    Positions,
    Collateral,
}

impl SubscriptionScope {
    pub const ALL: [SubscriptionScope; 3] = [
        SubscriptionScope::Orders,
        SubscriptionScope::Positions,
        SubscriptionScope::Collateral,
    ];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicationType {
    Accounts,
    SalesSeries,
    Brokerage,
    #[default]
    AllAuthorized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSubscription {
    pub id: RequestId,
    pub subscribe: bool,
    pub publication_type: PublicationType,
    pub subscription_scope: Vec<SubscriptionScope>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSubscriptionStatusCode {
    #[default]
    Success,
    Disconnected,
    Failure,
    InvalidParams,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeSubscriptionStatus {
    pub id: RequestId,
    pub status_code: TradeSubscriptionStatusCode,
    pub text_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeSnapshotCompletion {
    pub subscription_id: RequestId,
    pub subscription_scope: Vec<SubscriptionScope>,
}

// ======================= HISTORICAL DATA =======================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoricalRequestType {
    #[default]
    Get,
    Drop,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeAndSalesLevel {
    #[default]
    Trades,
    TradesBbaVolumes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeAndSalesParameters {
    pub contract_id: ContractId,
    pub level: TimeAndSalesLevel,
    pub from_utc_time: i64,
    pub to_utc_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAndSalesRequest {
    pub request_id: RequestId,
    pub request_type: HistoricalRequestType,
    pub time_and_sales_parameters: Option<TimeAndSalesParameters>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeAndSalesReport {
    pub request_id: RequestId,
    pub result_code: u32,
    pub quote: Vec<Quote>,
    pub is_report_complete: bool,
    pub text_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarUnit {
    Year,
    SemiAnnual,
    Quarter,
    Month,
    Week,
    Day,
    Hour,
    #[default]
    Min,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeBarParameters {
    pub contract_id: ContractId,
    pub bar_unit: BarUnit,
    pub unit_number: u32,
    pub from_utc_time: i64,
    pub to_utc_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBarRequest {
    pub request_id: RequestId,
    pub request_type: HistoricalRequestType,
    pub time_bar_parameters: Option<TimeBarParameters>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeBar {
    pub bar_utc_time: i64,
    pub open_price: i64,
    pub high_price: i64,
    pub low_price: i64,
    pub close_price: i64,
    pub volume: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeBarReport {
    pub request_id: RequestId,
    pub status_code: u32,
    pub time_bar: Vec<TimeBar>,
    pub is_report_complete: bool,
    pub text_message: Option<String>,
}

// ======================= ENVELOPES =======================

/// Client to server message. Every field is optional; one message may
/// carry several requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientMsg {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logon: Option<Logon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logoff: Option<Logoff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pong: Option<Pong>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub information_request: Vec<InformationRequest>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub market_data_subscription: Vec<MarketDataSubscription>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_request: Vec<OrderRequest>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trade_subscription: Vec<TradeSubscription>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub time_and_sales_request: Vec<TimeAndSalesRequest>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub time_bar_request: Vec<TimeBarRequest>,
}

/// Server to client message: a batch of independent reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerMsg {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logon_result: Option<LogonResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged_off: Option<LoggedOff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping: Option<Ping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pong: Option<Pong>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub information_report: Vec<InformationReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub market_data_subscription_status: Vec<MarketDataSubscriptionStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub real_time_market_data: Vec<RealTimeMarketData>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trade_subscription_status: Vec<TradeSubscriptionStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trade_snapshot_completion: Vec<TradeSnapshotCompletion>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_request_reject: Vec<OrderRequestReject>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_status: Vec<OrderStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub position_status: Vec<PositionStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collateral_status: Vec<CollateralStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub time_bar_report: Vec<TimeBarReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub time_and_sales_report: Vec<TimeAndSalesReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses_block_cancel() {
        for s in [
            OrderStatusCode::Filled,
            OrderStatusCode::Cancelled,
            OrderStatusCode::Rejected,
            OrderStatusCode::Expired,
            OrderStatusCode::Disconnected,
        ] {
            assert!(s.is_terminal());
            assert!(!s.can_cancel_or_modify());
        }
        assert!(!OrderStatusCode::InCancel.is_terminal());
        assert!(!OrderStatusCode::InCancel.can_cancel_or_modify());
        assert!(OrderStatusCode::Working.can_cancel_or_modify());
    }

    #[test]
    fn test_information_failures() {
        assert!(InformationStatus::NotFound.is_failure());
        assert!(InformationStatus::Dropped.is_failure());
        assert!(!InformationStatus::Success.is_failure());
        assert!(!InformationStatus::Update.is_failure());
    }
}
