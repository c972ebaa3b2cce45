//! Client protocol engine for a market-data and order-routing WebAPI.

pub mod webapi;

pub use webapi::*;
