mod demo;
mod ewaybill_service;
mod pickup_service;
mod serviceability_service;
mod shipment_service;
mod tracking_service;
mod waybill_service;

pub use demo::*;
pub use ewaybill_service::*;
pub use pickup_service::*;
pub use serviceability_service::*;
pub use shipment_service::*;
pub use tracking_service::*;
pub use waybill_service::*;
