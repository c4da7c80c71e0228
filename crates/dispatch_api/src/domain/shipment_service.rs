use crate::domain::{ReserveWaybillRequest, WaybillService};
use chrono::{DateTime, Utc};
use common::domain::{
    build_carrier_shipment, is_valid_pincode, is_valid_waybill, CarrierClient,
    CarrierPickupLocation, CarrierShipmentRequest, DomainError, DomainResult, PaymentMode,
    Shipment, ShipmentOrder, ShipmentRepository, ShipmentStatus,
};
use garde::Validate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Order details submitted for manifesting
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateShipmentRequest {
    #[garde(length(min = 1, max = 128))]
    pub order_id: String,
    #[garde(skip)]
    #[serde(default)]
    pub vendor_id: Option<String>,
    #[garde(skip)]
    #[serde(default)]
    pub waybill: Option<String>,
    #[garde(length(min = 1))]
    pub customer_name: String,
    #[garde(length(min = 1))]
    pub address: String,
    #[garde(skip)]
    pub pincode: String,
    #[garde(length(min = 1))]
    pub city: String,
    #[garde(length(min = 1))]
    pub state: String,
    #[garde(skip)]
    #[serde(default)]
    pub country: Option<String>,
    #[garde(length(min = 7, max = 15))]
    pub phone: String,
    #[garde(skip)]
    #[serde(default)]
    pub payment_mode: Option<PaymentMode>,
    #[garde(skip)]
    #[serde(default)]
    pub cod_amount: Option<f64>,
    #[garde(skip)]
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[garde(skip)]
    #[serde(default)]
    pub quantity: Option<u32>,
    #[garde(skip)]
    #[serde(default)]
    pub weight_grams: Option<f64>,
    #[garde(skip)]
    #[serde(default)]
    pub length_cm: Option<f64>,
    #[garde(skip)]
    #[serde(default)]
    pub width_cm: Option<f64>,
    #[garde(skip)]
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[garde(skip)]
    #[serde(default)]
    pub products_desc: Option<String>,
    #[garde(skip)]
    #[serde(default)]
    pub seller_name: Option<String>,
    #[garde(skip)]
    #[serde(default)]
    pub order_date: Option<DateTime<Utc>>,
}

impl From<CreateShipmentRequest> for ShipmentOrder {
    fn from(request: CreateShipmentRequest) -> Self {
        ShipmentOrder {
            order_id: request.order_id,
            vendor_id: request.vendor_id,
            waybill: request.waybill,
            customer_name: request.customer_name,
            address: request.address,
            pincode: request.pincode,
            city: request.city,
            state: request.state,
            country: request.country,
            phone: request.phone,
            payment_mode: request.payment_mode,
            cod_amount: request.cod_amount,
            total_amount: request.total_amount,
            quantity: request.quantity,
            weight_grams: request.weight_grams,
            length_cm: request.length_cm,
            width_cm: request.width_cm,
            height_cm: request.height_cm,
            products_desc: request.products_desc,
            seller_name: request.seller_name,
            order_date: request.order_date,
        }
    }
}

/// Domain service that manifests orders with the carrier
pub struct ShipmentService {
    shipment_repository: Arc<dyn ShipmentRepository>,
    waybill_service: Arc<WaybillService>,
    carrier: Arc<dyn CarrierClient>,
    pickup_location: String,
    default_seller: String,
}

impl ShipmentService {
    pub fn new(
        shipment_repository: Arc<dyn ShipmentRepository>,
        waybill_service: Arc<WaybillService>,
        carrier: Arc<dyn CarrierClient>,
        pickup_location: String,
        default_seller: String,
    ) -> Self {
        Self {
            shipment_repository,
            waybill_service,
            carrier,
            pickup_location,
            default_seller,
        }
    }

    /// Pick the waybill for an order: explicit, then inventory, then none
    async fn choose_waybill(&self, order: &ShipmentOrder) -> DomainResult<Option<String>> {
        if let Some(explicit) = order.waybill.as_deref().map(str::trim) {
            if !explicit.is_empty() {
                if !is_valid_waybill(explicit) {
                    return Err(DomainError::InvalidWaybill(explicit.to_string()));
                }
                self.waybill_service.ensure_assignable(explicit).await?;
                return Ok(Some(explicit.to_string()));
            }
        }

        match self
            .waybill_service
            .reserve(ReserveWaybillRequest {
                order_id: order.order_id.clone(),
            })
            .await
        {
            Ok(reserved) => Ok(Some(reserved.waybill)),
            Err(DomainError::WaybillInventoryExhausted) => {
                warn!("Waybill inventory empty, carrier will assign one");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn create_shipment(&self, request: CreateShipmentRequest) -> DomainResult<Shipment> {
        common::garde::validate_struct(&request)?;
        if !is_valid_pincode(request.pincode.trim()) {
            return Err(DomainError::InvalidPincode(request.pincode));
        }

        let order = ShipmentOrder::from(request);
        let waybill = self.choose_waybill(&order).await?;

        let manifest = CarrierShipmentRequest {
            shipments: vec![build_carrier_shipment(
                &order,
                waybill.as_deref(),
                &self.default_seller,
                Utc::now(),
            )],
            pickup_location: CarrierPickupLocation {
                name: self.pickup_location.clone(),
            },
        };
        let request_json = serde_json::to_value(&manifest)
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(waybill = ?waybill, "Submitting manifest to carrier");
        let outcome = self.carrier.create_shipment(&manifest).await;

        let response = match outcome {
            Ok(response) if response.success => response,
            Ok(response) => {
                let message = response.rejection_message();
                warn!(reason = %message, "Carrier rejected shipment");
                self.store_failed(&order, waybill, request_json, response.raw)
                    .await?;
                return Err(DomainError::CarrierRejected(message));
            }
            Err(e) => {
                error!(error = %e, "Carrier call failed");
                let body = serde_json::json!({ "error": e.to_string() });
                self.store_failed(&order, waybill, request_json, body).await?;
                return Err(e.into());
            }
        };

        let assigned = response
            .packages
            .iter()
            .find(|p| p.is_success() && !p.waybill.is_empty())
            .map(|p| p.waybill.clone())
            .or(waybill);

        let shipment = self
            .shipment_repository
            .create_shipment(Shipment {
                id: xid::new().to_string(),
                order_id: order.order_id.clone(),
                vendor_id: order.vendor_id.clone(),
                waybill: assigned.clone(),
                status: ShipmentStatus::Created,
                request: request_json,
                carrier_response: response.raw,
                created_at: None,
                updated_at: None,
            })
            .await?;

        if let Some(number) = assigned.as_deref() {
            // the carrier already holds the shipment; inventory drift is logged, not fatal
            if let Err(e) = self
                .waybill_service
                .record_shipment_waybill(number, &order.order_id, &shipment.id)
                .await
            {
                warn!(waybill = %number, error = %e, "Failed to mark waybill used");
            }
        }

        info!(shipment_id = %shipment.id, waybill = ?shipment.waybill, "Shipment created");
        Ok(shipment)
    }

    async fn store_failed(
        &self,
        order: &ShipmentOrder,
        waybill: Option<String>,
        request_json: serde_json::Value,
        carrier_response: serde_json::Value,
    ) -> DomainResult<Shipment> {
        self.shipment_repository
            .create_shipment(Shipment {
                id: xid::new().to_string(),
                order_id: order.order_id.clone(),
                vendor_id: order.vendor_id.clone(),
                waybill,
                status: ShipmentStatus::Failed,
                request: request_json,
                carrier_response,
                created_at: None,
                updated_at: None,
            })
            .await
    }

    pub async fn get_shipment(&self, id: &str) -> DomainResult<Shipment> {
        self.shipment_repository
            .get_shipment(id)
            .await?
            .ok_or_else(|| DomainError::ShipmentNotFound(id.to_string()))
    }

    pub async fn list_shipments_by_order(&self, order_id: &str) -> DomainResult<Vec<Shipment>> {
        if order_id.trim().is_empty() {
            return Err(DomainError::InvalidOrder("order_id is required".to_string()));
        }
        self.shipment_repository
            .list_shipments_by_order(order_id)
            .await
    }

    /// Cancel a shipment at the carrier, then release its waybill
    #[instrument(skip(self))]
    pub async fn cancel_shipment(&self, id: &str) -> DomainResult<Shipment> {
        let shipment = self.get_shipment(id).await?;
        match shipment.status {
            ShipmentStatus::Cancelled => {
                return Err(DomainError::ShipmentAlreadyCancelled(id.to_string()))
            }
            ShipmentStatus::Failed => {
                return Err(DomainError::InvalidOrder(format!(
                    "shipment {} was never manifested",
                    id
                )))
            }
            ShipmentStatus::Created => {}
        }

        if let Some(waybill) = shipment.waybill.as_deref() {
            self.carrier.cancel_shipment(waybill).await?;

            // the carrier no longer holds the shipment; inventory drift is logged, not fatal
            if let Err(e) = self
                .waybill_service
                .record_shipment_cancellation(waybill)
                .await
            {
                warn!(waybill, error = %e, "Failed to mark waybill cancelled");
            }
        }

        let cancelled = self
            .shipment_repository
            .update_shipment_status(id, ShipmentStatus::Cancelled)
            .await?;

        info!("Shipment cancelled");
        Ok(cancelled)
    }
}
