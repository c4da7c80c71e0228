mod client;
mod config;
mod ewaybill_repository;
mod pickup_repository;
mod serviceability_repository;
mod shipment_repository;
mod tracking_repository;
mod waybill_repository;

pub use client::*;
pub use config::*;
pub use ewaybill_repository::*;
pub use pickup_repository::*;
pub use serviceability_repository::*;
pub use shipment_repository::*;
pub use tracking_repository::*;
pub use waybill_repository::*;
