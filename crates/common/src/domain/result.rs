use crate::domain::{CarrierError, WaybillStatus};
use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Waybill not found: {0}")]
    WaybillNotFound(String),

    #[error("Invalid waybill: {0}")]
    InvalidWaybill(String),

    #[error("Waybill {waybill} cannot move from {from} to {to}")]
    InvalidWaybillTransition {
        waybill: String,
        from: WaybillStatus,
        to: WaybillStatus,
    },

    #[error("No generated waybills left in inventory")]
    WaybillInventoryExhausted,

    #[error("Shipment not found: {0}")]
    ShipmentNotFound(String),

    #[error("Shipment already cancelled: {0}")]
    ShipmentAlreadyCancelled(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Carrier rejected request: {0}")]
    CarrierRejected(String),

    #[error("E-waybill not found for waybill: {0}")]
    EwaybillNotFound(String),

    #[error("Invalid e-waybill: {0}")]
    InvalidEwaybill(String),

    #[error("Invalid pincode: {0}")]
    InvalidPincode(String),

    #[error("Serviceability not cached for pincode: {0}")]
    ServiceabilityNotFound(String),

    #[error("Tracking history not found for waybill: {0}")]
    TrackingNotFound(String),

    #[error("Pickup request not found: {0}")]
    PickupNotFound(String),

    #[error("Invalid pickup request: {0}")]
    InvalidPickup(String),

    #[error("Carrier error: {0}")]
    Carrier(#[from] CarrierError),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
