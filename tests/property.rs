use proptest::prelude::*;
use webapi_router::types::{ContractMetadata, Quote, QuoteType, RealTimeMarketData};
use webapi_router::InstrumentBook;

proptest! {
    #[test]
    fn ladder_invariants_hold(batches in prop::collection::vec(any_batch(), 1..200)) {
        let mut book = new_book();
        for batch in &batches {
            book.apply(batch);
            book.assert_invariants();
        }

        let mut asks: Vec<i64> = book.asks().iter().map(|l| l.price).collect();
        asks.dedup();
        prop_assert_eq!(asks.len(), book.asks().len());
    }

    #[test]
    fn snapshot_is_idempotent(batch in any_batch()) {
        let batch = RealTimeMarketData { is_snapshot: true, ..batch };

        let mut once = new_book();
        once.apply(&batch);

        let mut twice = new_book();
        twice.apply(&batch);
        twice.apply(&batch);

        prop_assert_eq!(once.snapshot(), twice.snapshot());
    }

    #[test]
    fn snapshot_discards_prior_levels(before in any_batch(), snap in any_batch()) {
        let snap = RealTimeMarketData { is_snapshot: true, ..snap };

        let mut fresh = new_book();
        fresh.apply(&snap);

        let mut seeded = new_book();
        seeded.apply(&before);
        seeded.apply(&snap);

        prop_assert_eq!(fresh.bids(), seeded.bids());
        prop_assert_eq!(fresh.asks(), seeded.asks());
    }
}

fn new_book() -> InstrumentBook {
    InstrumentBook::new(
        "CLZ25".to_string(),
        ContractMetadata {
            contract_id: 500,
            contract_symbol: "F.US.CLEZ25".to_string(),
            correct_price_scale: 0.01,
            ..Default::default()
        },
    )
}

fn any_batch() -> impl Strategy<Value = RealTimeMarketData> {
    (any::<bool>(), prop::collection::vec(any_quote(), 0..40)).prop_map(|(is_snapshot, quote)| RealTimeMarketData {
        contract_id: 500,
        is_snapshot,
        quote,
        market_values: None,
    })
}

fn any_quote() -> impl Strategy<Value = Quote> {
    // narrow price band so levels collide often
    (any_quote_type(), 9_990i64..10_010i64, prop_oneof![Just(0u64), 1u64..50u64]).prop_map(
        |(quote_type, price, volume)| Quote {
            quote_type,
            price,
            volume,
            ..Default::default()
        },
    )
}

fn any_quote_type() -> impl Strategy<Value = QuoteType> {
    prop_oneof![
        4 => Just(QuoteType::Bid),
        4 => Just(QuoteType::Ask),
        1 => Just(QuoteType::BestBid),
        1 => Just(QuoteType::BestAsk),
        1 => Just(QuoteType::Trade),
        1 => Just(QuoteType::Settlement),
    ]
}
