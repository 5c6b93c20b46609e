//! Stock price lookup.

mod stocks_service;

pub use stocks_service::StockService;
