use crate::domain::result::DomainResult;
use crate::domain::{CarrierShipment, PaymentMode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_WEIGHT_GRAMS: f64 = 500.0;
pub const DEFAULT_DIMENSION_CM: f64 = 10.0;
pub const DEFAULT_PRODUCTS_DESC: &str = "Merchandise";
pub const DEFAULT_COUNTRY: &str = "India";
pub const DEFAULT_SHIPPING_MODE: &str = "Surface";

/// Date format the carrier expects for `order_date`
pub const CARRIER_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Created,
    Failed,
    Cancelled,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Created => "created",
            ShipmentStatus::Failed => "failed",
            ShipmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ShipmentStatus::Created),
            "failed" => Ok(ShipmentStatus::Failed),
            "cancelled" => Ok(ShipmentStatus::Cancelled),
            other => Err(format!("unknown shipment status: {}", other)),
        }
    }
}

/// A shipment manifested with the carrier, with the raw exchange kept for audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: String,
    pub order_id: String,
    pub vendor_id: Option<String>,
    pub waybill: Option<String>,
    pub status: ShipmentStatus,
    pub request: serde_json::Value,
    pub carrier_response: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Order fields used to build a carrier manifest. Optional fields get fallbacks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShipmentOrder {
    pub order_id: String,
    pub vendor_id: Option<String>,
    pub waybill: Option<String>,
    pub customer_name: String,
    pub address: String,
    pub pincode: String,
    pub city: String,
    pub state: String,
    pub country: Option<String>,
    pub phone: String,
    pub payment_mode: Option<PaymentMode>,
    pub cod_amount: Option<f64>,
    pub total_amount: Option<f64>,
    pub quantity: Option<u32>,
    pub weight_grams: Option<f64>,
    pub length_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
    pub products_desc: Option<String>,
    pub seller_name: Option<String>,
    pub order_date: Option<DateTime<Utc>>,
}

fn positive_or(value: Option<f64>, fallback: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => fallback,
    }
}

fn non_blank_or(value: Option<&str>, fallback: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

/// Build the carrier package for an order.
///
/// The carrier rejects nulls with opaque errors, so every optional field is
/// filled: dates default to `now`, amounts to 0, quantity to 1, weight and
/// dimensions to small parcel defaults. Prepaid orders never carry a COD amount.
pub fn build_carrier_shipment(
    order: &ShipmentOrder,
    waybill: Option<&str>,
    default_seller: &str,
    now: DateTime<Utc>,
) -> CarrierShipment {
    let payment_mode = order.payment_mode.unwrap_or_default();
    let total_amount = positive_or(order.total_amount, 0.0);
    let cod_amount = match payment_mode {
        PaymentMode::Cod => positive_or(order.cod_amount, total_amount),
        _ => 0.0,
    };

    CarrierShipment {
        name: order.customer_name.trim().to_string(),
        add: order.address.trim().to_string(),
        pin: order.pincode.trim().to_string(),
        city: order.city.trim().to_string(),
        state: order.state.trim().to_string(),
        country: non_blank_or(order.country.as_deref(), DEFAULT_COUNTRY),
        phone: order.phone.trim().to_string(),
        order: order.order_id.clone(),
        payment_mode,
        products_desc: non_blank_or(order.products_desc.as_deref(), DEFAULT_PRODUCTS_DESC),
        cod_amount,
        total_amount,
        order_date: order
            .order_date
            .unwrap_or(now)
            .format(CARRIER_DATE_FORMAT)
            .to_string(),
        seller_name: non_blank_or(order.seller_name.as_deref(), default_seller),
        quantity: order.quantity.filter(|q| *q > 0).unwrap_or(1),
        waybill: waybill.unwrap_or_default().to_string(),
        weight: positive_or(order.weight_grams, DEFAULT_WEIGHT_GRAMS),
        shipment_length: positive_or(order.length_cm, DEFAULT_DIMENSION_CM),
        shipment_width: positive_or(order.width_cm, DEFAULT_DIMENSION_CM),
        shipment_height: positive_or(order.height_cm, DEFAULT_DIMENSION_CM),
        shipping_mode: DEFAULT_SHIPPING_MODE.to_string(),
    }
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ShipmentRepository: Send + Sync {
    async fn create_shipment(&self, shipment: Shipment) -> DomainResult<Shipment>;

    async fn get_shipment(&self, id: &str) -> DomainResult<Option<Shipment>>;

    async fn list_shipments_by_order(&self, order_id: &str) -> DomainResult<Vec<Shipment>>;

    async fn update_shipment_status(
        &self,
        id: &str,
        status: ShipmentStatus,
    ) -> DomainResult<Shipment>;
}
