mod ewaybill_handler;
mod extract;
mod pickup_handler;
mod router;
mod serviceability_handler;
mod shipment_handler;
mod tracking_handler;
mod waybill_handler;

pub use extract::{ApiJson, ApiQuery};
pub use router::{build_dispatch_router, DispatchServices};
