pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod log;
pub mod reducer;
pub mod server;
pub mod services;
pub mod span;
pub mod tally;
pub mod websocket;
