//! Market depth engine
//!
//! Consolidates snapshot and incremental quote batches into one book per
//! instrument: best bid/ask slots, last trade, session values and a sorted
//! depth ladder on each side. Prices are kept as integer wire ticks and
//! scaled only when a snapshot is handed to consumers.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use super::types::{
    ContractId, ContractMetadata, MarketValues, Quote, QuoteType, RealTimeMarketData, SessionOhlcIndicator,
};

/// Order book side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    Bid,
    Ask,
}

/// A single price level, in wire units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: i64,
    pub volume: u64,
    pub utc_time: i64,
}

impl From<&Quote> for PriceLevel {
    fn from(q: &Quote) -> Self {
        Self {
            price: q.price,
            volume: q.volume,
            utc_time: q.quote_utc_time,
        }
    }
}

/// Display-ready level: price multiplied by the contract price scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledLevel {
    pub price: f64,
    pub volume: u64,
    pub utc_time: i64,
}

/// Book for one instrument
#[derive(Debug, Clone)]
pub struct InstrumentBook {
    pub contract_id: ContractId,
    pub requested_symbol: String,
    pub metadata: ContractMetadata,
    best_bid: Option<PriceLevel>,
    best_ask: Option<PriceLevel>,
    last_trade: Option<PriceLevel>,
    settlement: Option<PriceLevel>,
    /// Bids sorted by price descending (best bid first)
    bids: Vec<PriceLevel>,
    /// Asks sorted by price ascending (best ask first)
    asks: Vec<PriceLevel>,
    values: MarketValues,
}

impl InstrumentBook {
    pub fn new(requested_symbol: String, metadata: ContractMetadata) -> Self {
        Self {
            contract_id: metadata.contract_id,
            requested_symbol,
            metadata,
            best_bid: None,
            best_ask: None,
            last_trade: None,
            settlement: None,
            bids: Vec::with_capacity(32),
            asks: Vec::with_capacity(32),
            values: MarketValues::default(),
        }
    }

    /// Merge one quote batch
    pub fn apply(&mut self, data: &RealTimeMarketData) {
        if data.is_snapshot {
            self.bids.clear();
            self.asks.clear();
            self.values = data.market_values.clone().unwrap_or_default();
        } else if let Some(values) = &data.market_values {
            merge_values(&mut self.values, values);
        }

        for quote in &data.quote {
            self.merge_ohlc(quote);
            match quote.quote_type {
                QuoteType::BestBid => self.best_bid = Some(quote.into()),
                QuoteType::BestAsk => self.best_ask = Some(quote.into()),
                QuoteType::Bid => self.apply_level(BookSide::Bid, quote.into()),
                QuoteType::Ask => self.apply_level(BookSide::Ask, quote.into()),
                QuoteType::Trade => {
                    if quote.volume != 0 {
                        self.last_trade = Some(quote.into());
                        // Snapshot totals already include the trade
                        if !data.is_snapshot {
                            self.values.total_volume = self.values.total_volume.saturating_add(quote.volume);
                        }
                    }
                }
                QuoteType::Settlement => self.settlement = Some(quote.into()),
            }
        }
    }

    /// Insert, replace or remove the level at `level.price`
    pub fn apply_level(&mut self, side: BookSide, level: PriceLevel) {
        let levels = match side {
            BookSide::Bid => &mut self.bids,
            BookSide::Ask => &mut self.asks,
        };

        let search = levels.binary_search_by(|l| match side {
            BookSide::Ask => l.price.cmp(&level.price),
            BookSide::Bid => level.price.cmp(&l.price),
        });

        match (search, level.volume) {
            (Ok(i), 0) => {
                levels.remove(i);
            }
            (Ok(i), _) => levels[i] = level,
            (Err(_), 0) => {}
            (Err(i), _) => levels.insert(i, level),
        }
    }

    fn merge_ohlc(&mut self, quote: &Quote) {
        for indicator in &quote.session_ohlc_indicator {
            match indicator {
                SessionOhlcIndicator::Open => self.values.open_price = quote.price,
                SessionOhlcIndicator::High => self.values.high_price = quote.price,
                SessionOhlcIndicator::Low => self.values.low_price = quote.price,
                SessionOhlcIndicator::Close => self.values.close_price = quote.price,
            }
        }
    }

    // === Accessors ===

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.best_bid
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.best_ask
    }

    pub fn last_trade(&self) -> Option<PriceLevel> {
        self.last_trade
    }

    pub fn settlement(&self) -> Option<PriceLevel> {
        self.settlement
    }

    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    pub fn values(&self) -> &MarketValues {
        &self.values
    }

    pub fn price_scale(&self) -> f64 {
        self.metadata.correct_price_scale
    }

    /// Total volume in the top N levels of a side
    pub fn depth(&self, side: BookSide, levels: usize) -> u64 {
        let ladder = match side {
            BookSide::Bid => &self.bids,
            BookSide::Ask => &self.asks,
        };
        ladder.iter().take(levels).map(|l| l.volume).sum()
    }

    pub fn snapshot(&self) -> DepthSnapshot {
        let scale = self.price_scale();
        let scaled = |l: &PriceLevel| ScaledLevel {
            price: l.price as f64 * scale,
            volume: l.volume,
            utc_time: l.utc_time,
        };
        DepthSnapshot {
            contract_id: self.contract_id,
            requested_symbol: self.requested_symbol.clone(),
            contract_symbol: self.metadata.contract_symbol.clone(),
            best_bid: self.best_bid.as_ref().map(scaled),
            best_ask: self.best_ask.as_ref().map(scaled),
            last_trade: self.last_trade.as_ref().map(scaled),
            settlement: self.settlement.as_ref().map(scaled),
            asks: self.asks.iter().map(scaled).collect(),
            bids: self.bids.iter().map(scaled).collect(),
            values: self.values.clone(),
            price_scale: scale,
        }
    }

    /// Panics if a ladder is unsorted, holds a duplicate price or a
    /// zero-volume level. Test helper.
    pub fn assert_invariants(&self) {
        for (side, ladder, want) in [
            (BookSide::Ask, &self.asks, Ordering::Less),
            (BookSide::Bid, &self.bids, Ordering::Greater),
        ] {
            for w in ladder.windows(2) {
                assert_eq!(w[0].price.cmp(&w[1].price), want, "{:?} ladder out of order", side);
            }
            assert!(ladder.iter().all(|l| l.volume > 0), "{:?} ladder holds zero volume", side);
        }
    }
}

/// Non-zero fields overwrite; zero means "unchanged", never "reset".
fn merge_values(dst: &mut MarketValues, src: &MarketValues) {
    fn keep(dst: &mut i64, src: i64) {
        if src != 0 {
            *dst = src;
        }
    }
    keep(&mut dst.open_price, src.open_price);
    keep(&mut dst.high_price, src.high_price);
    keep(&mut dst.low_price, src.low_price);
    keep(&mut dst.close_price, src.close_price);
    keep(&mut dst.indicative_open, src.indicative_open);
    keep(&mut dst.yesterday_close, src.yesterday_close);
    keep(&mut dst.yesterday_settlement, src.yesterday_settlement);
    if src.total_volume != 0 {
        dst.total_volume = src.total_volume;
    }
}

/// Consolidated view handed to market-data consumers
#[derive(Debug, Clone, PartialEq)]
pub struct DepthSnapshot {
    pub contract_id: ContractId,
    pub requested_symbol: String,
    pub contract_symbol: String,
    pub best_bid: Option<ScaledLevel>,
    pub best_ask: Option<ScaledLevel>,
    pub last_trade: Option<ScaledLevel>,
    pub settlement: Option<ScaledLevel>,
    /// Ascending by price
    pub asks: Vec<ScaledLevel>,
    /// Descending by price
    pub bids: Vec<ScaledLevel>,
    pub values: MarketValues,
    pub price_scale: f64,
}

impl DepthSnapshot {
    pub fn ask_row(&self, row: usize) -> Option<&ScaledLevel> {
        self.asks.get(row)
    }

    pub fn bid_row(&self, row: usize) -> Option<&ScaledLevel> {
        self.bids.get(row)
    }

    /// Rows needed to display both ladders side by side
    pub fn row_count(&self) -> usize {
        self.asks.len().max(self.bids.len())
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / 2.0),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }
}

/// One book per subscribed contract
#[derive(Debug, Default)]
pub struct MarketDepthEngine {
    books: HashMap<ContractId, InstrumentBook>,
}

impl MarketDepthEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a resolved instrument. Returns false if the contract
    /// already has a book.
    pub fn track(&mut self, requested_symbol: &str, metadata: &ContractMetadata) -> bool {
        if self.books.contains_key(&metadata.contract_id) {
            return false;
        }
        self.books.insert(
            metadata.contract_id,
            InstrumentBook::new(requested_symbol.to_string(), metadata.clone()),
        );
        true
    }

    pub fn untrack(&mut self, contract_id: ContractId) -> Option<InstrumentBook> {
        self.books.remove(&contract_id)
    }

    pub fn is_tracked(&self, contract_id: ContractId) -> bool {
        self.books.contains_key(&contract_id)
    }

    /// Merge a batch. Batches for unknown contracts are dropped, not queued.
    pub fn apply(&mut self, data: &RealTimeMarketData) -> Option<DepthSnapshot> {
        match self.books.get_mut(&data.contract_id) {
            Some(book) => {
                book.apply(data);
                Some(book.snapshot())
            }
            None => {
                debug!("[DEPTH] Dropping update for untracked contract {}", data.contract_id);
                None
            }
        }
    }

    pub fn book(&self, contract_id: ContractId) -> Option<&InstrumentBook> {
        self.books.get(&contract_id)
    }

    pub fn snapshot(&self, contract_id: ContractId) -> Option<DepthSnapshot> {
        self.books.get(&contract_id).map(InstrumentBook::snapshot)
    }

    pub fn clear(&mut self) {
        self.books.clear();
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(contract_id: ContractId, scale: f64) -> ContractMetadata {
        ContractMetadata {
            contract_id,
            contract_symbol: "F.US.CLEZ25".to_string(),
            correct_price_scale: scale,
            ..Default::default()
        }
    }

    fn quote(quote_type: QuoteType, price: i64, volume: u64) -> Quote {
        Quote {
            quote_type,
            price,
            volume,
            ..Default::default()
        }
    }

    fn batch(is_snapshot: bool, quotes: Vec<Quote>) -> RealTimeMarketData {
        RealTimeMarketData {
            contract_id: 500,
            is_snapshot,
            quote: quotes,
            market_values: None,
        }
    }

    fn engine() -> MarketDepthEngine {
        let mut engine = MarketDepthEngine::new();
        assert!(engine.track("CLZ25", &metadata(500, 0.01)));
        engine
    }

    #[test]
    fn test_best_ask_scaled_and_separate_from_ladder() {
        let mut engine = engine();
        let snap = engine
            .apply(&batch(
                true,
                vec![quote(QuoteType::BestAsk, 10050, 12), quote(QuoteType::Ask, 10050, 12)],
            ))
            .unwrap();
        let ask = snap.best_ask.unwrap();
        assert!((ask.price - 100.50).abs() < 1e-9);
        assert_eq!(ask.volume, 12);
        assert_eq!(snap.asks.len(), 1);

        let snap = engine.apply(&batch(false, vec![quote(QuoteType::Ask, 10050, 0)])).unwrap();
        assert!(snap.asks.is_empty());
        assert_eq!(snap.best_ask.unwrap().volume, 12);
    }

    #[test]
    fn test_ladders_sorted_both_ways() {
        let mut engine = engine();
        engine.apply(&batch(
            false,
            vec![
                quote(QuoteType::Ask, 103, 1),
                quote(QuoteType::Ask, 101, 2),
                quote(QuoteType::Ask, 102, 3),
                quote(QuoteType::Bid, 98, 1),
                quote(QuoteType::Bid, 100, 2),
                quote(QuoteType::Bid, 99, 3),
                quote(QuoteType::Bid, 99, 7),
            ],
        ));
        let book = engine.book(500).unwrap();
        book.assert_invariants();
        let asks: Vec<i64> = book.asks().iter().map(|l| l.price).collect();
        let bids: Vec<i64> = book.bids().iter().map(|l| l.price).collect();
        assert_eq!(asks, vec![101, 102, 103]);
        assert_eq!(bids, vec![100, 99, 98]);
        assert_eq!(book.bids()[1].volume, 7);
        assert_eq!(book.depth(BookSide::Bid, 2), 9);
    }

    #[test]
    fn test_zero_volume_for_missing_level_is_noop() {
        let mut engine = engine();
        engine.apply(&batch(false, vec![quote(QuoteType::Bid, 100, 0)]));
        assert!(engine.book(500).unwrap().bids().is_empty());
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let mut engine = engine();
        let snap = batch(
            true,
            vec![
                quote(QuoteType::Ask, 101, 2),
                quote(QuoteType::Bid, 99, 4),
                quote(QuoteType::Trade, 100, 5),
            ],
        );
        let first = engine.apply(&snap).unwrap();
        let second = engine.apply(&snap).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_trade_volume_counted_outside_snapshots_only() {
        let mut engine = engine();
        let mut snap = batch(true, vec![quote(QuoteType::Trade, 100, 5)]);
        snap.market_values = Some(MarketValues {
            total_volume: 50,
            ..Default::default()
        });
        engine.apply(&snap);
        assert_eq!(engine.book(500).unwrap().values().total_volume, 50);

        engine.apply(&batch(false, vec![quote(QuoteType::Trade, 101, 3)]));
        let book = engine.book(500).unwrap();
        assert_eq!(book.values().total_volume, 53);
        assert_eq!(book.last_trade().unwrap().price, 101);

        engine.apply(&batch(false, vec![quote(QuoteType::Trade, 102, 0)]));
        assert_eq!(engine.book(500).unwrap().last_trade().unwrap().price, 101);
    }

    #[test]
    fn test_total_volume_saturates() {
        let mut engine = engine();
        engine.apply(&batch(false, vec![quote(QuoteType::Trade, 100, u64::MAX)]));
        engine.apply(&batch(false, vec![quote(QuoteType::Trade, 101, 5)]));
        let book = engine.book(500).unwrap();
        assert_eq!(book.values().total_volume, u64::MAX);
        assert_eq!(book.last_trade().unwrap().price, 101);
    }

    #[test]
    fn test_zero_static_fields_do_not_reset() {
        let mut engine = engine();
        let mut snap = batch(true, vec![]);
        snap.market_values = Some(MarketValues {
            open_price: 90,
            yesterday_close: 88,
            ..Default::default()
        });
        engine.apply(&snap);

        let mut update = batch(false, vec![]);
        update.market_values = Some(MarketValues {
            high_price: 95,
            ..Default::default()
        });
        engine.apply(&update);
        let values = engine.book(500).unwrap().values();
        assert_eq!(values.open_price, 90);
        assert_eq!(values.high_price, 95);
        assert_eq!(values.yesterday_close, 88);
    }

    #[test]
    fn test_ohlc_indicators() {
        let mut engine = engine();
        let mut q = quote(QuoteType::Trade, 120, 1);
        q.session_ohlc_indicator = vec![SessionOhlcIndicator::High, SessionOhlcIndicator::Close];
        engine.apply(&batch(false, vec![q]));
        let values = engine.book(500).unwrap().values();
        assert_eq!(values.high_price, 120);
        assert_eq!(values.close_price, 120);
        assert_eq!(values.open_price, 0);
    }

    #[test]
    fn test_unknown_contract_dropped() {
        let mut engine = engine();
        let mut data = batch(false, vec![quote(QuoteType::Ask, 1, 1)]);
        data.contract_id = 999;
        assert!(engine.apply(&data).is_none());
        assert!(!engine.is_tracked(999));
    }

    #[test]
    fn test_track_twice_rejected() {
        let mut engine = engine();
        assert!(!engine.track("CLZ25", &metadata(500, 0.01)));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_row_addressing() {
        let mut engine = engine();
        let snap = engine
            .apply(&batch(
                false,
                vec![
                    quote(QuoteType::Ask, 10100, 1),
                    quote(QuoteType::Ask, 10200, 1),
                    quote(QuoteType::Bid, 10000, 1),
                ],
            ))
            .unwrap();
        assert_eq!(snap.row_count(), 2);
        assert!((snap.ask_row(1).unwrap().price - 102.0).abs() < 1e-9);
        assert!(snap.bid_row(1).is_none());
    }
}
