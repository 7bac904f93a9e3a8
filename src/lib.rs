//! cTrader Open API live bars client library.
//!
//! Turns the platform's spot (tick) stream and its partial trendbar
//! fragments into per-subscriber OHLCV candle updates, shares one upstream
//! subscription among any number of subscribers, and keeps the connection
//! alive with heartbeat supervision and automatic resubscription. Symbol
//! lookup and historical trendbars are available on the same connection.

pub mod aggregator;
pub mod auth;
pub mod client;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod models;
pub mod price;
pub mod registry;
pub mod stream;
pub mod supervisor;
pub mod symbols;
pub mod upstream;
pub mod websocket;

pub use client::Client;
pub use error::{FeedError, Result};
pub use stream::{LiveBarStream, StreamEnd};
pub use supervisor::{ConnectionState, SupervisorConfig};
pub use upstream::Connection;
