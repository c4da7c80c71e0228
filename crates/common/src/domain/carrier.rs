use crate::domain::ScanEvent;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while talking to the logistics carrier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CarrierError {
    #[error("carrier rejected credentials (HTTP {0})")]
    Unauthorized(u16),

    #[error("carrier returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("carrier request failed: {0}")]
    Transport(String),

    #[error("unexpected carrier payload: {0}")]
    Decode(String),
}

impl CarrierError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CarrierError::Unauthorized(_))
    }
}

/// Payment mode accepted by the carrier's manifest API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PaymentMode {
    #[default]
    Prepaid,
    #[serde(rename = "COD")]
    Cod,
    Pickup,
    #[serde(rename = "REPL")]
    Repl,
}

/// One package in the carrier's shipment manifest.
///
/// Field names follow the carrier's JSON contract. Every field is always
/// populated because the carrier fails with an opaque error on nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierShipment {
    pub name: String,
    pub add: String,
    pub pin: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub phone: String,
    pub order: String,
    pub payment_mode: PaymentMode,
    pub products_desc: String,
    pub cod_amount: f64,
    pub total_amount: f64,
    pub order_date: String,
    pub seller_name: String,
    pub quantity: u32,
    pub waybill: String,
    pub weight: f64,
    pub shipment_length: f64,
    pub shipment_width: f64,
    pub shipment_height: f64,
    pub shipping_mode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierPickupLocation {
    pub name: String,
}

/// Manifest body posted to the carrier's create endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierShipmentRequest {
    pub shipments: Vec<CarrierShipment>,
    pub pickup_location: CarrierPickupLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CarrierPackage {
    pub waybill: String,
    pub status: String,
    pub refnum: Option<String>,
    pub remarks: Vec<String>,
}

impl CarrierPackage {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CarrierShipmentResponse {
    pub success: bool,
    pub upload_wbn: Option<String>,
    pub packages: Vec<CarrierPackage>,
    pub remarks: Option<String>,
    pub raw: serde_json::Value,
}

impl CarrierShipmentResponse {
    /// Collect carrier remarks into one readable message
    pub fn rejection_message(&self) -> String {
        let mut parts: Vec<String> = self
            .packages
            .iter()
            .flat_map(|p| p.remarks.iter().cloned())
            .filter(|r| !r.trim().is_empty())
            .collect();
        if let Some(rmk) = &self.remarks {
            if !rmk.trim().is_empty() {
                parts.push(rmk.clone());
            }
        }
        if parts.is_empty() {
            "carrier did not accept the shipment".to_string()
        } else {
            parts.join("; ")
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CarrierStatus {
    pub status: String,
    pub location: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CarrierTracking {
    pub waybill: String,
    pub status: Option<CarrierStatus>,
    pub scans: Vec<ScanEvent>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CarrierPincode {
    pub pincode: String,
    pub district: Option<String>,
    pub state_code: Option<String>,
    pub prepaid: bool,
    pub cod: bool,
    pub pickup: bool,
    pub is_oda: bool,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CarrierPickupRequest {
    pub pickup_date: NaiveDate,
    pub pickup_time: NaiveTime,
    pub pickup_location: String,
    pub expected_package_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CarrierPickupResponse {
    pub pickup_id: Option<String>,
    pub raw: serde_json::Value,
}

/// Client for the logistics carrier's REST API
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CarrierClient: Send + Sync {
    /// Request a batch of fresh waybill numbers
    async fn fetch_waybills(&self, count: u32) -> Result<Vec<String>, CarrierError>;

    /// Submit a shipment manifest
    async fn create_shipment(
        &self,
        request: &CarrierShipmentRequest,
    ) -> Result<CarrierShipmentResponse, CarrierError>;

    /// Cancel a manifested shipment by waybill
    async fn cancel_shipment(&self, waybill: &str) -> Result<serde_json::Value, CarrierError>;

    /// Fetch live tracking for a waybill
    async fn track(&self, waybill: &str) -> Result<CarrierTracking, CarrierError>;

    /// Look up a pincode; `None` when the carrier does not serve it
    async fn check_pincode(&self, pincode: &str) -> Result<Option<CarrierPincode>, CarrierError>;

    /// Attach a GST e-waybill to a manifested shipment
    async fn update_ewaybill(
        &self,
        waybill: &str,
        invoice_number: &str,
        ewaybill_number: &str,
    ) -> Result<serde_json::Value, CarrierError>;

    /// Schedule a warehouse pickup
    async fn create_pickup(
        &self,
        request: &CarrierPickupRequest,
    ) -> Result<CarrierPickupResponse, CarrierError>;
}
