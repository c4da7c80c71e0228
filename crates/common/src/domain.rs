mod carrier;
mod ewaybill;
mod pickup;
mod result;
mod serviceability;
mod shipment;
mod tracking;
mod waybill;

pub use carrier::*;
pub use ewaybill::*;
pub use pickup::*;
pub use result::*;
pub use serviceability::*;
pub use shipment::*;
pub use tracking::*;
pub use waybill::*;
