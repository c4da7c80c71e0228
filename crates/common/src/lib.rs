pub mod delhivery;
pub mod domain;
pub mod garde;
pub mod http;
pub mod postgres;
pub mod telemetry;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::{
    MockCarrierClient, MockEwaybillRepository, MockPickupRepository, MockServiceabilityRepository,
    MockShipmentRepository, MockTrackingRepository, MockWaybillRepository,
};
