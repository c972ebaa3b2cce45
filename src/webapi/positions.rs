//! Position Reconciliation - folds partial position and collateral reports
//! into per-account views.
//!
//! Aggregates are recomputed from the current lots on every update rather
//! than accumulated, so a missed message cannot make them drift.

use std::collections::HashMap;

use tracing::debug;

use super::types::{
    AccountId, Balance, CollateralStatus, ContractId, LastStatementBalancesReport, OpenPosition, PositionStatus,
    PurchaseAndSalesGroup,
};

/// Open lots and realized groups for one (account, symbol)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionRecord {
    pub account_id: AccountId,
    pub contract_id: ContractId,
    pub symbol: String,
    pub is_short: bool,
    pub lots: Vec<OpenPosition>,
    pub groups: Vec<PurchaseAndSalesGroup>,
}

impl PositionRecord {
    fn new(account_id: AccountId, contract_id: ContractId, symbol: String) -> Self {
        Self {
            account_id,
            contract_id,
            symbol,
            ..Default::default()
        }
    }

    /// Match lots and groups by id: zero removes, anything else replaces.
    fn merge(&mut self, status: &PositionStatus) {
        for lot in &status.open_position {
            match self.lots.iter().position(|l| l.id == lot.id) {
                Some(i) if lot.qty == 0 => {
                    self.lots.remove(i);
                }
                Some(i) => self.lots[i].qty = lot.qty,
                None if lot.qty == 0 => {}
                None => {
                    self.lots.push(lot.clone());
                    self.is_short = status.is_short_open_position;
                }
            }
        }

        for group in &status.purchase_and_sales_group {
            match self.groups.iter().position(|g| g.id == group.id) {
                Some(i) if group.realized_profit_loss == 0.0 => {
                    self.groups.remove(i);
                }
                Some(i) => self.groups[i].realized_profit_loss = group.realized_profit_loss,
                None if group.realized_profit_loss == 0.0 => {}
                None => self.groups.push(group.clone()),
            }
        }
    }

    pub fn summary(&self) -> PositionSummary {
        let qty: u64 = self.lots.iter().map(|l| l.qty as u64).sum();
        let (long_qty, short_qty) = if self.is_short { (0, qty) } else { (qty, 0) };

        // simple mean of lot prices, see `weighted_average_price`
        let average_price = if self.lots.is_empty() {
            0.0
        } else {
            self.lots.iter().map(|l| l.price).sum::<f64>() / self.lots.len() as f64
        };
        let weighted_average_price = if qty == 0 {
            0.0
        } else {
            self.lots.iter().map(|l| l.price * l.qty as f64).sum::<f64>() / qty as f64
        };

        PositionSummary {
            long_qty,
            short_qty,
            average_price,
            weighted_average_price,
            realized_pnl: self.groups.iter().map(|g| g.realized_profit_loss).sum(),
            open_lots: self.lots.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionSummary {
    pub long_qty: u64,
    pub short_qty: u64,
    /// Arithmetic mean of open-lot prices
    pub average_price: f64,
    pub weighted_average_price: f64,
    pub realized_pnl: f64,
    pub open_lots: usize,
}

/// Delivered to trading consumers after each position report
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub report: PositionStatus,
    pub symbol: String,
    pub record: PositionRecord,
    pub summary: PositionSummary,
}

/// Positions keyed by account then symbol, plus statement balances that
/// collateral updates patch in place.
#[derive(Debug, Default)]
pub struct PositionBook {
    accounts: HashMap<AccountId, HashMap<String, PositionRecord>>,
    balances: Vec<Balance>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, status: &PositionStatus, symbol: &str) -> PositionUpdate {
        let record = self
            .accounts
            .entry(status.account_id)
            .or_default()
            .entry(symbol.to_string())
            .or_insert_with(|| PositionRecord::new(status.account_id, status.contract_id, symbol.to_string()));
        record.merge(status);

        let summary = record.summary();
        debug!(
            "[POSITIONS] {} acct {} | long {} short {} | lots {} | rpnl {:.2}",
            symbol, status.account_id, summary.long_qty, summary.short_qty, summary.open_lots, summary.realized_pnl
        );

        PositionUpdate {
            report: status.clone(),
            symbol: symbol.to_string(),
            record: record.clone(),
            summary,
        }
    }

    pub fn position(&self, account_id: AccountId, symbol: &str) -> Option<&PositionRecord> {
        self.accounts.get(&account_id)?.get(symbol)
    }

    /// Symbols with at least one open lot for an account
    pub fn open_symbols(&self, account_id: AccountId) -> Vec<&str> {
        let mut symbols: Vec<&str> = self
            .accounts
            .get(&account_id)
            .map(|m| m.values().filter(|r| !r.lots.is_empty()).map(|r| r.symbol.as_str()).collect())
            .unwrap_or_default();
        symbols.sort_unstable();
        symbols
    }

    pub fn set_balances(&mut self, report: &LastStatementBalancesReport) {
        self.balances = report.balance.clone();
    }

    pub fn balances(&self) -> &[Balance] {
        &self.balances
    }

    /// Patch OTE/MVO of the matching statement balance; absent fields keep
    /// their previous value.
    pub fn apply_collateral(&mut self, status: &CollateralStatus) {
        for balance in self
            .balances
            .iter_mut()
            .filter(|b| b.account_id == status.account_id && b.currency == status.currency)
        {
            if let Some(ote) = status.ote {
                balance.ote = ote;
            }
            if let Some(mvo) = status.mvo {
                balance.mvo = mvo;
            }
        }
    }

    pub fn clear(&mut self) {
        self.accounts.clear();
        self.balances.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot(id: i32, qty: u32, price: f64) -> OpenPosition {
        OpenPosition {
            id,
            qty,
            price,
            ..Default::default()
        }
    }

    fn status(lots: Vec<OpenPosition>, groups: Vec<PurchaseAndSalesGroup>) -> PositionStatus {
        PositionStatus {
            account_id: 1,
            contract_id: 500,
            open_position: lots,
            purchase_and_sales_group: groups,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_qty_lot_removed() {
        let mut book = PositionBook::new();
        let update = book.apply(&status(vec![lot(7, 3, 100.0)], vec![]), "CLZ25");
        assert_eq!(update.summary.long_qty, 3);

        let update = book.apply(&status(vec![lot(7, 0, 100.0)], vec![]), "CLZ25");
        assert_eq!(update.summary.long_qty, 0);
        assert_eq!(update.summary.open_lots, 0);
        assert!(book.open_symbols(1).is_empty());
    }

    #[test]
    fn test_lot_qty_replaced_not_added() {
        let mut book = PositionBook::new();
        book.apply(&status(vec![lot(1, 2, 10.0), lot(2, 4, 20.0)], vec![]), "CLZ25");
        let update = book.apply(&status(vec![lot(1, 5, 10.0)], vec![]), "CLZ25");
        assert_eq!(update.summary.long_qty, 9);
        assert!((update.summary.average_price - 15.0).abs() < 1e-9);
        assert!((update.summary.weighted_average_price - 130.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_position() {
        let mut book = PositionBook::new();
        let mut s = status(vec![lot(1, 2, 10.0)], vec![]);
        s.is_short_open_position = true;
        let update = book.apply(&s, "CLZ25");
        assert_eq!(update.summary.short_qty, 2);
        assert_eq!(update.summary.long_qty, 0);
    }

    #[test]
    fn test_realized_groups_matched_by_id() {
        let mut book = PositionBook::new();
        let g = |id, pnl| PurchaseAndSalesGroup { id, realized_profit_loss: pnl };
        book.apply(&status(vec![], vec![g(1, 10.0), g(2, -4.0)]), "CLZ25");
        let update = book.apply(&status(vec![], vec![g(1, 12.0)]), "CLZ25");
        assert!((update.summary.realized_pnl - 8.0).abs() < 1e-9);
        let update = book.apply(&status(vec![], vec![g(2, 0.0)]), "CLZ25");
        assert!((update.summary.realized_pnl - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_collateral_patches_matching_balance() {
        let mut book = PositionBook::new();
        book.set_balances(&LastStatementBalancesReport {
            balance: vec![
                Balance { account_id: 1, currency: "USD".into(), ote: 1.0, mvo: 2.0, ..Default::default() },
                Balance { account_id: 1, currency: "EUR".into(), ote: 3.0, mvo: 4.0, ..Default::default() },
            ],
        });
        book.apply_collateral(&CollateralStatus {
            account_id: 1,
            currency: "USD".into(),
            ote: Some(10.0),
            mvo: None,
            ..Default::default()
        });
        assert_eq!(book.balances()[0].ote, 10.0);
        assert_eq!(book.balances()[0].mvo, 2.0);
        assert_eq!(book.balances()[1].ote, 3.0);
    }
}
