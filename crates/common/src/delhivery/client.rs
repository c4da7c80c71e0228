use crate::delhivery::models::{
    parse_bulk_waybills, parse_create_shipment, parse_pickup, parse_pincode, parse_tracking,
};
use crate::delhivery::DelhiveryConfig;
use crate::domain::{
    CarrierClient, CarrierError, CarrierPickupRequest, CarrierPickupResponse, CarrierPincode,
    CarrierShipmentRequest, CarrierShipmentResponse, CarrierTracking,
};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};

/// Delhivery implementation of [`CarrierClient`]
#[derive(Clone)]
pub struct DelhiveryClient {
    http: reqwest::Client,
    config: DelhiveryConfig,
}

impl DelhiveryClient {
    pub fn new(config: DelhiveryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        info!(base_url = %config.base_url, "Delhivery client configured");
        Ok(Self { http, config })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(
                header::AUTHORIZATION,
                format!("Token {}", self.config.api_token),
            )
            .header(header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, CarrierError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| CarrierError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CarrierError::Transport(e.to_string()))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            error!(status = status.as_u16(), "Delhivery rejected API token");
            return Err(CarrierError::Unauthorized(status.as_u16()));
        }

        if !status.is_success() {
            error!(status = status.as_u16(), body = %body, "Delhivery request failed");
            return Err(CarrierError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| CarrierError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CarrierClient for DelhiveryClient {
    #[instrument(skip(self))]
    async fn fetch_waybills(&self, count: u32) -> Result<Vec<String>, CarrierError> {
        debug!("Requesting bulk waybills");

        let mut request = self
            .http
            .get(self.config.url("/waybill/api/bulk/json/"))
            .query(&[("count", count.to_string())]);
        if !self.config.client_name.is_empty() {
            request = request.query(&[("cl", self.config.client_name.as_str())]);
        }

        let payload = self.send(request).await?;
        let waybills = parse_bulk_waybills(&payload).map_err(CarrierError::Decode)?;

        info!(requested = count, received = waybills.len(), "Fetched bulk waybills");
        Ok(waybills)
    }

    #[instrument(skip(self, request), fields(packages = request.shipments.len()))]
    async fn create_shipment(
        &self,
        request: &CarrierShipmentRequest,
    ) -> Result<CarrierShipmentResponse, CarrierError> {
        debug!("Submitting shipment manifest");

        let data = serde_json::to_string(request).map_err(|e| CarrierError::Decode(e.to_string()))?;
        let http_request = self
            .http
            .post(self.config.url("/api/cmu/create.json"))
            .form(&[("format", "json"), ("data", data.as_str())]);

        let raw = self.send(http_request).await?;
        let response = parse_create_shipment(raw).map_err(CarrierError::Decode)?;

        info!(
            success = response.success,
            upload_wbn = ?response.upload_wbn,
            "Shipment manifest submitted"
        );
        Ok(response)
    }

    #[instrument(skip(self))]
    async fn cancel_shipment(&self, waybill: &str) -> Result<Value, CarrierError> {
        debug!("Cancelling shipment at carrier");

        let request = self
            .http
            .post(self.config.url("/api/p/edit"))
            .json(&json!({ "waybill": waybill, "cancellation": "true" }));

        let raw = self.send(request).await?;
        info!("Carrier accepted cancellation");
        Ok(raw)
    }

    #[instrument(skip(self))]
    async fn track(&self, waybill: &str) -> Result<CarrierTracking, CarrierError> {
        debug!("Fetching live tracking");

        let request = self
            .http
            .get(self.config.url("/api/v1/packages/json/"))
            .query(&[("waybill", waybill)]);

        let raw = self.send(request).await?;
        let tracking = parse_tracking(waybill, raw)
            .map_err(CarrierError::Decode)?
            .ok_or_else(|| CarrierError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                body: format!("no tracking data for waybill {}", waybill),
            })?;

        info!(scans = tracking.scans.len(), "Fetched live tracking");
        Ok(tracking)
    }

    #[instrument(skip(self))]
    async fn check_pincode(&self, pincode: &str) -> Result<Option<CarrierPincode>, CarrierError> {
        debug!("Checking pincode serviceability");

        let request = self
            .http
            .get(self.config.url("/c/api/pin-codes/json/"))
            .query(&[("filter_codes", pincode)]);

        let raw = self.send(request).await?;
        let result = parse_pincode(pincode, raw).map_err(CarrierError::Decode)?;

        info!(serviceable = result.is_some(), "Pincode checked");
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn update_ewaybill(
        &self,
        waybill: &str,
        invoice_number: &str,
        ewaybill_number: &str,
    ) -> Result<Value, CarrierError> {
        debug!("Pushing e-waybill to carrier");

        let request = self
            .http
            .put(self.config.url(&format!("/api/rest/ewaybill/{}/", waybill)))
            .json(&json!({
                "data": [{ "dcn": invoice_number, "ewbn": ewaybill_number }]
            }));

        let raw = self.send(request).await?;
        info!("Carrier accepted e-waybill");
        Ok(raw)
    }

    #[instrument(skip(self, request), fields(location = %request.pickup_location))]
    async fn create_pickup(
        &self,
        request: &CarrierPickupRequest,
    ) -> Result<CarrierPickupResponse, CarrierError> {
        debug!("Requesting pickup");

        let body = json!({
            "pickup_time": request.pickup_time.format("%H:%M:%S").to_string(),
            "pickup_date": request.pickup_date.format("%Y-%m-%d").to_string(),
            "pickup_location": request.pickup_location,
            "expected_package_count": request.expected_package_count,
        });
        let http_request = self
            .http
            .post(self.config.url("/fm/request/new/"))
            .json(&body);

        let raw = self.send(http_request).await?;
        let response = parse_pickup(raw);

        info!(pickup_id = ?response.pickup_id, "Pickup requested");
        Ok(response)
    }
}
