mod client;
mod config;
mod models;

pub use client::*;
pub use config::*;
pub use models::parse_carrier_timestamp;
