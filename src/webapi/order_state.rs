//! Order State Tracker
//!
//! Reconciles order, position and collateral reports into per-account
//! views, stages compound (multi-leg) orders before transmission, and
//! tracks trading-subscription snapshot completion.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::error::{ClientError, Result};
use super::positions::{PositionBook, PositionUpdate};
use super::types::{
    ContractId, ContractMetadata, CollateralStatus, CompoundOrder, CompoundOrderType, LastStatementBalancesReport,
    Order, OrderRequestReject, OrderStatus, OrderStatusCode, PositionStatus, RequestId, SubscriptionScope,
    TradeSnapshotCompletion, TransactionStatusCode,
};

// ============================================================================
// Order Records
// ============================================================================

/// One entry of an order's append-only history
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTransaction {
    pub status: OrderStatusCode,
    pub client_order_id: String,
    pub fill_qty: u32,
    pub utc_time: i64,
    pub transaction: Option<TransactionStatusCode>,
    pub text_message: Option<String>,
}

/// Order keyed by its chain id, stable across modify/cancel
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub chain_order_id: String,
    /// Most recent client order id; changes per modify/cancel
    pub client_order_id: String,
    pub order_id: String,
    pub account_id: i32,
    pub contract_id: ContractId,
    pub order: Order,
    pub status: OrderStatusCode,
    pub fill_qty: u32,
    pub avg_fill_price: i64,
    pub remaining_qty: u32,
    pub compound_id: Option<String>,
    pub historical: bool,
    pub transactions: Vec<OrderTransaction>,
}

impl OrderRecord {
    fn from_report(report: &OrderStatus, historical: bool) -> Self {
        Self {
            chain_order_id: report.chain_order_id.clone(),
            client_order_id: report.order.cl_order_id.clone(),
            order_id: report.order_id.clone(),
            account_id: report.account_id,
            contract_id: report.order.contract_id,
            order: report.order.clone(),
            status: report.status,
            fill_qty: report.fill_qty,
            avg_fill_price: report.avg_fill_price,
            remaining_qty: report.remaining_qty,
            compound_id: None,
            historical,
            transactions: Vec::new(),
        }
    }

    fn absorb(&mut self, report: &OrderStatus) {
        self.client_order_id = report.order.cl_order_id.clone();
        self.order_id = report.order_id.clone();
        self.order = report.order.clone();
        self.status = report.status;
        self.fill_qty = report.fill_qty;
        self.avg_fill_price = report.avg_fill_price;
        self.remaining_qty = report.remaining_qty;
        if let Some(structure) = &report.compound_order_structure {
            self.compound_id = Some(structure.cl_compound_id.clone());
        }

        let last = report.transaction_status.last();
        self.transactions.push(OrderTransaction {
            status: report.status,
            client_order_id: report.order.cl_order_id.clone(),
            fill_qty: report.fill_qty,
            utc_time: last.map(|t| t.trans_utc_time).unwrap_or(report.status_utc_time),
            transaction: last.map(|t| t.status),
            text_message: last.and_then(|t| t.text_message.clone()),
        });
    }

    pub fn can_cancel_or_modify(&self) -> bool {
        self.status.can_cancel_or_modify()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Delivered to trading consumers for each order-status report
#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpdate {
    pub report: OrderStatus,
    /// `None` for ack-only reports and reports on already-terminal orders
    pub record: Option<OrderRecord>,
    pub historical: bool,
    /// Client order ids of WAITING legs superseded by this report
    pub cleared_waiting: Vec<String>,
}

/// Order request rejection with the client order id it carried
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRejection {
    pub reject: OrderRequestReject,
    pub cl_order_id: Option<String>,
}

// ============================================================================
// Compound Staging
// ============================================================================

/// Legs accumulated client-side before a compound order is transmitted
#[derive(Debug, Default)]
pub struct CompoundOrderStaging {
    legs: Vec<Order>,
}

impl CompoundOrderStaging {
    pub fn stage(&mut self, order: Order) -> Result<()> {
        if self.legs.iter().any(|o| o.cl_order_id == order.cl_order_id) {
            return Err(ClientError::DuplicateClientOrderId(order.cl_order_id));
        }
        self.legs.push(order);
        Ok(())
    }

    pub fn unstage(&mut self, cl_order_id: &str) -> Option<Order> {
        let i = self.legs.iter().position(|o| o.cl_order_id == cl_order_id)?;
        Some(self.legs.remove(i))
    }

    pub fn take(&mut self) -> Vec<Order> {
        std::mem::take(&mut self.legs)
    }

    /// Put legs back ahead of anything staged since they were taken.
    pub fn restore(&mut self, legs: Vec<Order>) {
        let later = std::mem::replace(&mut self.legs, legs);
        for order in later {
            if !self.legs.iter().any(|o| o.cl_order_id == order.cl_order_id) {
                self.legs.push(order);
            }
        }
    }

    pub fn legs(&self) -> &[Order] {
        &self.legs
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }
}

/// A not-yet-server-known leg shown to the caller as WAITING
#[derive(Debug, Clone, PartialEq)]
pub struct WaitingLeg {
    pub compound_id: Option<String>,
    pub order: Order,
}

// ============================================================================
// Trading Subscription
// ============================================================================

/// Completion bits over {orders, positions, collateral}
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeMask(u8);

impl ScopeMask {
    pub const ORDERS: ScopeMask = ScopeMask(1);
    pub const POSITIONS: ScopeMask = ScopeMask(2);
    pub const COLLATERAL: ScopeMask = ScopeMask(4);
    pub const ALL: ScopeMask = ScopeMask(7);

    pub fn of(scope: SubscriptionScope) -> Self {
        match scope {
            SubscriptionScope::Orders => Self::ORDERS,
            SubscriptionScope::Positions => Self::POSITIONS,
            SubscriptionScope::Collateral => Self::COLLATERAL,
        }
    }

    pub fn contains(&self, other: ScopeMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ScopeMask) {
        self.0 |= other.0;
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

// ============================================================================
// Tracker
// ============================================================================

#[derive(Debug, Default)]
pub struct OrderStateTracker {
    /// chain_order_id -> record
    orders: HashMap<String, OrderRecord>,
    /// latest client order id -> chain_order_id
    by_client_id: HashMap<String, String>,
    /// sent orders not yet seen in a status report, by client order id
    in_flight: HashMap<String, Order>,
    /// order request id -> client order id, for rejection reporting
    requests: HashMap<RequestId, String>,
    contracts: HashMap<ContractId, ContractMetadata>,
    staging: CompoundOrderStaging,
    /// transmitted compounds awaiting their first status report
    submitted: HashMap<String, CompoundOrder>,
    positions: PositionBook,
    subscription_ids: HashMap<SubscriptionScope, RequestId>,
    completed: ScopeMask,
}

impl OrderStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // === Orders ===

    /// Fold an order-status report. Historical reports take the same path,
    /// flagged so callers can render them differently.
    pub fn apply_order_status(&mut self, report: &OrderStatus, historical: bool) -> OrderUpdate {
        for metadata in &report.contract_metadata {
            self.contracts
                .entry(metadata.contract_id)
                .or_insert_with(|| metadata.clone());
        }

        let record = if report.status.is_set() {
            self.reconcile(report, historical)
        } else {
            None
        };

        let cleared_waiting = match &report.compound_order_structure {
            Some(structure) => self.clear_compound(&structure.cl_compound_id),
            None => Vec::new(),
        };

        OrderUpdate {
            report: report.clone(),
            record,
            historical,
            cleared_waiting,
        }
    }

    fn reconcile(&mut self, report: &OrderStatus, historical: bool) -> Option<OrderRecord> {
        let chain_id = &report.chain_order_id;
        let record = self
            .orders
            .entry(chain_id.clone())
            .or_insert_with(|| OrderRecord::from_report(report, historical));

        if record.is_terminal() && !record.transactions.is_empty() {
            debug!("[ORDERS] {} already {:?}, ignoring {:?}", chain_id, record.status, report.status);
            return None;
        }

        if record.client_order_id != report.order.cl_order_id {
            self.by_client_id.remove(&record.client_order_id);
        }
        record.absorb(report);
        if !historical {
            record.historical = false;
        }
        self.by_client_id.insert(report.order.cl_order_id.clone(), chain_id.clone());
        // acknowledged: no longer needed to name a rejection
        self.in_flight.remove(&report.order.cl_order_id);
        self.requests.retain(|_, cl| *cl != report.order.cl_order_id);

        if !historical {
            let rejected_transaction = report.transaction_status.last().filter(|t| {
                matches!(t.status, TransactionStatusCode::RejectCancel | TransactionStatusCode::RejectModify)
            });
            if report.status == OrderStatusCode::Rejected {
                warn!("[ORDERS] Order {} rejected: {}", chain_id, text_of(report));
            } else if let Some(t) = rejected_transaction {
                warn!("[ORDERS] Last transaction {:?} on {} rejected: {}", t.status, chain_id, text_of(report));
            }
        }

        debug!("[ORDERS] {} -> {:?} (fill {})", chain_id, record.status, record.fill_qty);
        Some(record.clone())
    }

    pub fn order(&self, chain_order_id: &str) -> Option<&OrderRecord> {
        self.orders.get(chain_order_id)
    }

    pub fn order_by_client_id(&self, cl_order_id: &str) -> Option<&OrderRecord> {
        self.by_client_id.get(cl_order_id).and_then(|chain| self.orders.get(chain))
    }

    pub fn in_flight(&self, cl_order_id: &str) -> Option<&Order> {
        self.in_flight.get(cl_order_id)
    }

    /// Record that lives for cancel/modify, or why it cannot be touched
    pub fn eligible_for_change(&self, chain_order_id: &str) -> Result<&OrderRecord> {
        let record = self
            .orders
            .get(chain_order_id)
            .ok_or_else(|| ClientError::UnknownOrder(chain_order_id.to_string()))?;
        if !record.can_cancel_or_modify() {
            return Err(ClientError::OrderNotEligible {
                chain_order_id: chain_order_id.to_string(),
                status: record.status,
            });
        }
        Ok(record)
    }

    pub fn working_orders(&self) -> Vec<&OrderRecord> {
        self.orders.values().filter(|o| o.can_cancel_or_modify()).collect()
    }

    pub fn orders_with_status(&self, status: OrderStatusCode) -> Vec<&OrderRecord> {
        self.orders.values().filter(|o| o.status == status).collect()
    }

    pub fn note_submitted(&mut self, request_id: RequestId, order: &Order) {
        self.in_flight.insert(order.cl_order_id.clone(), order.clone());
        self.requests.insert(request_id, order.cl_order_id.clone());
    }

    pub fn note_request(&mut self, request_id: RequestId, cl_order_id: &str) {
        self.requests.insert(request_id, cl_order_id.to_string());
    }

    /// Undo `note_submitted` / `note_request` for a request that never left.
    pub fn forget_request(&mut self, request_id: RequestId) {
        if let Some(cl_order_id) = self.requests.remove(&request_id) {
            self.in_flight.remove(&cl_order_id);
        }
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    pub fn apply_rejection(&mut self, reject: &OrderRequestReject) -> OrderRejection {
        let cl_order_id = self.requests.remove(&reject.request_id);
        if let Some(cl) = &cl_order_id {
            self.in_flight.remove(cl);
        }
        warn!(
            "[ORDERS] Request {} rejected ({}): {}",
            reject.request_id,
            reject.reject_code,
            reject.text_message.as_deref().unwrap_or("")
        );
        OrderRejection {
            reject: reject.clone(),
            cl_order_id,
        }
    }

    // === Contract metadata ===

    pub fn contract(&self, contract_id: ContractId) -> Option<&ContractMetadata> {
        self.contracts.get(&contract_id)
    }

    pub fn remember_contract(&mut self, metadata: &ContractMetadata) {
        self.contracts
            .entry(metadata.contract_id)
            .or_insert_with(|| metadata.clone());
    }

    // === Compound orders ===

    pub fn stage_leg(&mut self, order: Order) -> Result<()> {
        self.staging.stage(order)
    }

    pub fn unstage_leg(&mut self, cl_order_id: &str) -> Option<Order> {
        self.staging.unstage(cl_order_id)
    }

    pub fn take_staged(&mut self) -> Vec<Order> {
        self.staging.take()
    }

    pub fn staged_legs(&self) -> &[Order] {
        self.staging.legs()
    }

    /// Build the compound request body and keep its legs as WAITING until
    /// the server reports on the compound id.
    pub fn submit_compound(
        &mut self,
        legs: Vec<Order>,
        compound_type: CompoundOrderType,
        compound_id: &str,
    ) -> Result<CompoundOrder> {
        if legs.is_empty() {
            return Err(ClientError::EmptyCompoundOrder(compound_id.to_string()));
        }
        let compound = CompoundOrder {
            compound_type,
            cl_compound_id: compound_id.to_string(),
            compound_order_entry: legs,
        };
        self.submitted.insert(compound_id.to_string(), compound.clone());
        Ok(compound)
    }

    /// Drop a transmitted compound whose request could not be sent. With
    /// `restage` its legs go back to staging.
    pub fn withdraw_compound(&mut self, compound_id: &str, restage: bool) -> Option<CompoundOrder> {
        let compound = self.submitted.remove(compound_id)?;
        if restage {
            self.staging.restore(compound.compound_order_entry.clone());
        }
        Some(compound)
    }

    fn clear_compound(&mut self, compound_id: &str) -> Vec<String> {
        match self.submitted.remove(compound_id) {
            Some(compound) => {
                let cleared: Vec<String> = compound
                    .compound_order_entry
                    .into_iter()
                    .map(|o| o.cl_order_id)
                    .collect();
                debug!("[ORDERS] Compound {} acknowledged, cleared {} waiting legs", compound_id, cleared.len());
                cleared
            }
            None => Vec::new(),
        }
    }

    /// Staged legs plus transmitted-but-unacknowledged compound legs
    pub fn waiting_legs(&self) -> Vec<WaitingLeg> {
        let staged = self.staging.legs().iter().map(|o| WaitingLeg {
            compound_id: None,
            order: o.clone(),
        });
        let submitted = self.submitted.values().flat_map(|c| {
            c.compound_order_entry.iter().map(move |o| WaitingLeg {
                compound_id: Some(c.cl_compound_id.clone()),
                order: o.clone(),
            })
        });
        staged.chain(submitted).collect()
    }

    // === Positions & collateral ===

    pub fn apply_position_status(&mut self, status: &PositionStatus) -> Result<PositionUpdate> {
        if let Some(metadata) = &status.contract_metadata {
            self.remember_contract(metadata);
        }
        let symbol = self
            .contracts
            .get(&status.contract_id)
            .map(|m| m.contract_symbol.clone())
            .ok_or(ClientError::UnknownContract(status.contract_id))?;
        Ok(self.positions.apply(status, &symbol))
    }

    pub fn apply_collateral_status(&mut self, status: &CollateralStatus) {
        self.positions.apply_collateral(status);
    }

    pub fn set_statement_balances(&mut self, report: &LastStatementBalancesReport) {
        self.positions.set_balances(report);
    }

    pub fn positions(&self) -> &PositionBook {
        &self.positions
    }

    // === Trading subscription ===

    pub fn register_subscription(&mut self, id: RequestId, scopes: &[SubscriptionScope]) {
        for scope in scopes {
            self.subscription_ids.insert(*scope, id);
        }
        self.completed = ScopeMask::default();
    }

    /// Set bits for scopes whose original subscribe id matches. Returns
    /// `None` when nothing matched.
    pub fn apply_snapshot_completion(&mut self, snapshot: &TradeSnapshotCompletion) -> Option<ScopeMask> {
        let mut matched = false;
        for scope in &snapshot.subscription_scope {
            if self.subscription_ids.get(scope) == Some(&snapshot.subscription_id) {
                self.completed.insert(ScopeMask::of(*scope));
                matched = true;
            }
        }
        matched.then_some(self.completed)
    }

    pub fn completed_scopes(&self) -> ScopeMask {
        self.completed
    }

    /// Forget session-scoped correlation state; order history stays.
    pub fn end_session(&mut self) {
        self.requests.clear();
        self.in_flight.clear();
        self.submitted.clear();
        self.subscription_ids.clear();
        self.completed = ScopeMask::default();
    }
}

fn text_of(report: &OrderStatus) -> &str {
    report
        .transaction_status
        .last()
        .and_then(|t| t.text_message.as_deref())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webapi::types::{CompoundOrderStructure, OpenPosition, TransactionStatus};

    fn report(chain: &str, cl: &str, status: OrderStatusCode) -> OrderStatus {
        OrderStatus {
            status,
            chain_order_id: chain.to_string(),
            order_id: format!("srv-{}", chain),
            account_id: 1,
            order: Order {
                cl_order_id: cl.to_string(),
                contract_id: 500,
                qty: 2,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn leg(cl: &str) -> Order {
        Order {
            cl_order_id: cl.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_working_then_rejected_is_ineligible() {
        let mut tracker = OrderStateTracker::new();
        tracker.apply_order_status(&report("A1", "c1", OrderStatusCode::Working), false);
        assert!(tracker.eligible_for_change("A1").is_ok());

        tracker.apply_order_status(&report("A1", "c1", OrderStatusCode::Rejected), false);
        assert_eq!(
            tracker.eligible_for_change("A1").unwrap_err(),
            ClientError::OrderNotEligible {
                chain_order_id: "A1".into(),
                status: OrderStatusCode::Rejected
            }
        );
        assert_eq!(tracker.order("A1").unwrap().transactions.len(), 2);
    }

    #[test]
    fn test_terminal_order_ignores_later_reports() {
        let mut tracker = OrderStateTracker::new();
        tracker.apply_order_status(&report("A1", "c1", OrderStatusCode::Filled), false);
        let update = tracker.apply_order_status(&report("A1", "c1", OrderStatusCode::Working), false);
        assert!(update.record.is_none());
        let record = tracker.order("A1").unwrap();
        assert_eq!(record.status, OrderStatusCode::Filled);
        assert_eq!(record.transactions.len(), 1);
    }

    #[test]
    fn test_in_cancel_is_ineligible_but_not_terminal() {
        let mut tracker = OrderStateTracker::new();
        tracker.apply_order_status(&report("A1", "c1", OrderStatusCode::Working), false);
        tracker.apply_order_status(&report("A1", "c2", OrderStatusCode::InCancel), false);
        assert!(tracker.eligible_for_change("A1").is_err());
        let update = tracker.apply_order_status(&report("A1", "c2", OrderStatusCode::Cancelled), false);
        assert_eq!(update.record.unwrap().status, OrderStatusCode::Cancelled);
    }

    #[test]
    fn test_unset_status_only_caches_metadata() {
        let mut tracker = OrderStateTracker::new();
        let mut r = report("A1", "c1", OrderStatusCode::Unset);
        r.contract_metadata.push(ContractMetadata {
            contract_id: 500,
            contract_symbol: "F.US.CLEZ25".into(),
            ..Default::default()
        });
        let update = tracker.apply_order_status(&r, false);
        assert!(update.record.is_none());
        assert!(tracker.order("A1").is_none());
        assert_eq!(tracker.contract(500).unwrap().contract_symbol, "F.US.CLEZ25");
    }

    #[test]
    fn test_client_id_lookup_follows_latest() {
        let mut tracker = OrderStateTracker::new();
        tracker.apply_order_status(&report("A1", "c1", OrderStatusCode::Working), false);
        tracker.apply_order_status(&report("A1", "c2", OrderStatusCode::InModify), false);
        assert!(tracker.order_by_client_id("c1").is_none());
        assert_eq!(tracker.order_by_client_id("c2").unwrap().chain_order_id, "A1");
    }

    #[test]
    fn test_unknown_order() {
        let tracker = OrderStateTracker::new();
        assert_eq!(
            tracker.eligible_for_change("nope").unwrap_err(),
            ClientError::UnknownOrder("nope".into())
        );
    }

    #[test]
    fn test_compound_legs_cleared_on_status() {
        let mut tracker = OrderStateTracker::new();
        tracker.stage_leg(leg("L1")).unwrap();
        tracker.stage_leg(leg("L2")).unwrap();
        assert!(matches!(tracker.stage_leg(leg("L2")), Err(ClientError::DuplicateClientOrderId(_))));

        let legs = tracker.take_staged();
        tracker.submit_compound(legs, CompoundOrderType::Oco, "C1").unwrap();
        assert!(tracker.staged_legs().is_empty());
        assert_eq!(tracker.waiting_legs().len(), 2);

        let mut r = report("A1", "L1", OrderStatusCode::Working);
        r.compound_order_structure = Some(CompoundOrderStructure {
            cl_compound_id: "C1".into(),
            compound_type: CompoundOrderType::Oco,
        });
        let update = tracker.apply_order_status(&r, false);
        assert_eq!(update.cleared_waiting, vec!["L1".to_string(), "L2".to_string()]);
        assert!(tracker.waiting_legs().is_empty());
        assert_eq!(tracker.order("A1").unwrap().compound_id.as_deref(), Some("C1"));
    }

    #[test]
    fn test_end_session_drops_submitted_compounds() {
        let mut tracker = OrderStateTracker::new();
        tracker.submit_compound(vec![leg("L1"), leg("L2")], CompoundOrderType::Oco, "C1").unwrap();
        assert_eq!(tracker.waiting_legs().len(), 2);

        tracker.end_session();
        assert!(tracker.waiting_legs().is_empty());
    }

    #[test]
    fn test_withdrawn_compound_restages_legs() {
        let mut tracker = OrderStateTracker::new();
        tracker.stage_leg(leg("L1")).unwrap();
        tracker.stage_leg(leg("L2")).unwrap();
        let legs = tracker.take_staged();
        tracker.submit_compound(legs, CompoundOrderType::Oco, "C1").unwrap();
        tracker.stage_leg(leg("L3")).unwrap();

        let withdrawn = tracker.withdraw_compound("C1", true).unwrap();
        assert_eq!(withdrawn.compound_order_entry.len(), 2);
        let staged: Vec<&str> = tracker.staged_legs().iter().map(|o| o.cl_order_id.as_str()).collect();
        assert_eq!(staged, vec!["L1", "L2", "L3"]);
        assert!(tracker.waiting_legs().iter().all(|w| w.compound_id.is_none()));

        tracker.submit_compound(vec![leg("L4")], CompoundOrderType::Opo, "C2").unwrap();
        tracker.withdraw_compound("C2", false).unwrap();
        assert_eq!(tracker.staged_legs().len(), 3);
        assert!(tracker.withdraw_compound("C2", false).is_none());
    }

    #[test]
    fn test_status_report_retires_request() {
        let mut tracker = OrderStateTracker::new();
        tracker.note_submitted(5, &leg("c5"));
        tracker.note_request(6, "c6");
        assert_eq!(tracker.pending_requests(), 2);

        tracker.apply_order_status(&report("A5", "c5", OrderStatusCode::Working), false);
        assert_eq!(tracker.pending_requests(), 1);
        assert!(tracker.in_flight("c5").is_none());

        tracker.forget_request(6);
        assert_eq!(tracker.pending_requests(), 0);
    }

    #[test]
    fn test_empty_compound_rejected() {
        let mut tracker = OrderStateTracker::new();
        assert_eq!(
            tracker.submit_compound(vec![], CompoundOrderType::Opo, "C9"),
            Err(ClientError::EmptyCompoundOrder("C9".into()))
        );
    }

    #[test]
    fn test_unstage_leg() {
        let mut tracker = OrderStateTracker::new();
        tracker.stage_leg(leg("L1")).unwrap();
        assert!(tracker.unstage_leg("L1").is_some());
        assert!(tracker.unstage_leg("L1").is_none());
        assert!(tracker.waiting_legs().is_empty());
    }

    #[test]
    fn test_snapshot_completion_mask() {
        let mut tracker = OrderStateTracker::new();
        tracker.register_subscription(7, &SubscriptionScope::ALL);

        let miss = TradeSnapshotCompletion {
            subscription_id: 8,
            subscription_scope: vec![SubscriptionScope::Orders],
        };
        assert!(tracker.apply_snapshot_completion(&miss).is_none());

        let hit = TradeSnapshotCompletion {
            subscription_id: 7,
            subscription_scope: vec![SubscriptionScope::Orders, SubscriptionScope::Collateral],
        };
        let mask = tracker.apply_snapshot_completion(&hit).unwrap();
        assert!(mask.contains(ScopeMask::ORDERS));
        assert!(mask.contains(ScopeMask::COLLATERAL));
        assert!(!mask.contains(ScopeMask::POSITIONS));
    }

    #[test]
    fn test_rejection_carries_client_id() {
        let mut tracker = OrderStateTracker::new();
        tracker.note_submitted(5, &leg("c5"));
        assert!(tracker.in_flight("c5").is_some());
        let rejection = tracker.apply_rejection(&OrderRequestReject {
            request_id: 5,
            reject_code: 1,
            text_message: Some("bad price".into()),
        });
        assert_eq!(rejection.cl_order_id.as_deref(), Some("c5"));
        assert!(tracker.in_flight("c5").is_none());
    }

    #[test]
    fn test_position_needs_contract_metadata() {
        let mut tracker = OrderStateTracker::new();
        let status = PositionStatus {
            account_id: 1,
            contract_id: 500,
            open_position: vec![OpenPosition { id: 7, qty: 3, ..Default::default() }],
            ..Default::default()
        };
        assert_eq!(tracker.apply_position_status(&status).unwrap_err(), ClientError::UnknownContract(500));

        tracker.remember_contract(&ContractMetadata {
            contract_id: 500,
            contract_symbol: "F.US.CLEZ25".into(),
            ..Default::default()
        });
        let update = tracker.apply_position_status(&status).unwrap();
        assert_eq!(update.symbol, "F.US.CLEZ25");
        assert_eq!(update.summary.long_qty, 3);
    }

    #[test]
    fn test_rejected_transaction_recorded() {
        let mut tracker = OrderStateTracker::new();
        let mut r = report("A1", "c1", OrderStatusCode::Working);
        r.transaction_status.push(TransactionStatus {
            status: TransactionStatusCode::RejectCancel,
            trans_utc_time: 99,
            text_message: Some("too late".into()),
            ..Default::default()
        });
        let update = tracker.apply_order_status(&r, false);
        let tx = &update.record.unwrap().transactions[0];
        assert_eq!(tx.transaction, Some(TransactionStatusCode::RejectCancel));
        assert_eq!(tx.utc_time, 99);
    }
}
