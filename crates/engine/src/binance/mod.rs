mod rest;
mod stream;

pub use rest::BinanceFeed;
pub use stream::BinanceStream;
