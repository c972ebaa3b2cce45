//! WebAPI Client Layer
//!
//! Session management, instrument resolution, depth consolidation and
//! order/position reconciliation for the market-data and order-routing
//! WebAPI.

pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod instruments;
pub mod order_book;
pub mod order_state;
pub mod order_template;
pub mod positions;
pub mod session;
pub mod traits;
pub mod types;
pub mod ws_transport;

pub use codec::JsonCodec;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use events::{Event, SinkRegistry};
pub use instruments::InstrumentResolutionCache;
pub use order_book::{BookSide, DepthSnapshot, InstrumentBook, MarketDepthEngine, PriceLevel, ScaledLevel};
pub use order_state::{OrderRecord, OrderRejection, OrderStateTracker, OrderUpdate, ScopeMask, WaitingLeg};
pub use order_template::{ModifyParams, OrderTemplate};
pub use positions::{PositionBook, PositionRecord, PositionSummary, PositionUpdate};
pub use session::{ConnectionState, SessionManager};
pub use traits::*;
pub use ws_transport::WsTransport;
