pub mod alert;
pub mod binance;
pub mod kv;
pub mod lifecycle;

pub use alert::LogAlerter;
pub use binance::{BinanceFeed, BinanceStream};
pub use kv::SqliteKvStore;
pub use lifecycle::{Engine, EngineHandle};
