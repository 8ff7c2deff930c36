pub mod candle;
pub mod market;
pub mod orderbook;
pub mod trade;

pub use candle::*;
pub use market::*;
pub use orderbook::*;
pub use trade::*;
