//! External market data clients

pub mod yahoo;

pub use yahoo::YahooClient;
