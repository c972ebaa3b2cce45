//! Order Templates
//!
//! Builds new/modify/cancel order bodies for one account and contract with
//! fresh client order ids.

use uuid::Uuid;

use super::order_state::OrderRecord;
use super::types::{AccountId, CancelOrder, ContractId, ModifyOrder, Order, OrderType, Side, TimeInForce};

/// Fresh client order id, optionally prefixed for easier log grepping
pub fn next_cl_order_id(prefix: Option<&str>) -> String {
    let id = Uuid::new_v4().simple().to_string();
    match prefix {
        Some(p) => format!("{}_{}", p, id),
        None => id,
    }
}

/// Order builder bound to one account and contract
#[derive(Debug, Clone)]
pub struct OrderTemplate {
    pub account_id: AccountId,
    pub contract_id: ContractId,
    pub duration: TimeInForce,
    prefix: Option<String>,
}

impl OrderTemplate {
    pub fn new(account_id: AccountId, contract_id: ContractId) -> Self {
        Self {
            account_id,
            contract_id,
            duration: TimeInForce::Day,
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    pub fn with_duration(mut self, duration: TimeInForce) -> Self {
        self.duration = duration;
        self
    }

    fn base(&self, side: Side, qty: u32, order_type: OrderType) -> Order {
        Order {
            account_id: self.account_id,
            contract_id: self.contract_id,
            cl_order_id: next_cl_order_id(self.prefix.as_deref()),
            order_type,
            duration: self.duration,
            side,
            qty,
            is_manual: true,
            ..Default::default()
        }
    }

    pub fn market(&self, side: Side, qty: u32) -> Order {
        self.base(side, qty, OrderType::Mkt)
    }

    /// Limit order; `price` is in wire units (display price / price scale)
    pub fn limit(&self, side: Side, qty: u32, price: i64) -> Order {
        Order {
            limit_price: Some(price),
            ..self.base(side, qty, OrderType::Lmt)
        }
    }

    pub fn stop(&self, side: Side, qty: u32, stop_price: i64) -> Order {
        Order {
            stop_price: Some(stop_price),
            ..self.base(side, qty, OrderType::Stp)
        }
    }

    pub fn stop_limit(&self, side: Side, qty: u32, stop_price: i64, limit_price: i64) -> Order {
        Order {
            stop_price: Some(stop_price),
            limit_price: Some(limit_price),
            ..self.base(side, qty, OrderType::Stl)
        }
    }
}

/// Fields a modify may change; `None` keeps the working value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifyParams {
    pub qty: Option<u32>,
    pub limit_price: Option<i64>,
    pub stop_price: Option<i64>,
    pub duration: Option<TimeInForce>,
}

pub fn build_cancel(record: &OrderRecord, when_utc_time: i64) -> CancelOrder {
    CancelOrder {
        order_id: record.order_id.clone(),
        account_id: record.account_id,
        orig_cl_order_id: record.client_order_id.clone(),
        cl_order_id: next_cl_order_id(None),
        when_utc_time,
    }
}

pub fn build_modify(record: &OrderRecord, params: &ModifyParams, when_utc_time: i64) -> ModifyOrder {
    ModifyOrder {
        order_id: record.order_id.clone(),
        account_id: record.account_id,
        orig_cl_order_id: record.client_order_id.clone(),
        cl_order_id: next_cl_order_id(None),
        when_utc_time,
        qty: params.qty,
        limit_price: params.limit_price,
        stop_price: params.stop_price,
        duration: params.duration,
    }
}
