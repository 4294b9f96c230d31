pub mod api;
pub mod config;
pub mod error;
pub mod http_cache;
pub mod http_client;
pub mod logging;
pub mod market_values;
pub mod normalize;
pub mod store;
pub mod sync;
