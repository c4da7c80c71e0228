use chrono::{FixedOffset, NaiveDate, NaiveTime, Utc};
use common::domain::{
    is_valid_waybill, CarrierClient, CarrierPickupRequest, DomainError, DomainResult,
    PickupRepository, PickupRequest, PickupStatus,
};
use garde::Validate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, instrument};

pub const MAX_PICKUP_PACKAGES: u32 = 10_000;

/// Pickup dates are compared against the calendar day in India
const IST_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePickupRequest {
    #[garde(skip)]
    pub pickup_date: NaiveDate,
    #[garde(skip)]
    pub pickup_time: NaiveTime,
    /// Falls back to the configured warehouse when absent
    #[garde(skip)]
    #[serde(default)]
    pub pickup_location: Option<String>,
    #[garde(range(min = 1, max = MAX_PICKUP_PACKAGES))]
    pub expected_package_count: u32,
    #[garde(skip)]
    #[serde(default)]
    pub waybills: Vec<String>,
}

pub struct PickupService {
    pickup_repository: Arc<dyn PickupRepository>,
    carrier: Arc<dyn CarrierClient>,
    default_location: String,
}

impl PickupService {
    pub fn new(
        pickup_repository: Arc<dyn PickupRepository>,
        carrier: Arc<dyn CarrierClient>,
        default_location: String,
    ) -> Self {
        Self {
            pickup_repository,
            carrier,
            default_location,
        }
    }

    fn today() -> NaiveDate {
        match FixedOffset::east_opt(IST_OFFSET_SECONDS) {
            Some(ist) => Utc::now().with_timezone(&ist).date_naive(),
            None => Utc::now().date_naive(),
        }
    }

    #[instrument(skip(self, request), fields(pickup_date = %request.pickup_date, packages = request.expected_package_count))]
    pub async fn create_pickup(&self, request: CreatePickupRequest) -> DomainResult<PickupRequest> {
        common::garde::validate_struct(&request)?;

        if request.pickup_date < Self::today() {
            return Err(DomainError::InvalidPickup(format!(
                "pickup date {} is in the past",
                request.pickup_date
            )));
        }
        if let Some(bad) = request.waybills.iter().find(|w| !is_valid_waybill(w)) {
            return Err(DomainError::InvalidWaybill(bad.clone()));
        }

        let pickup_location = request
            .pickup_location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(self.default_location.as_str())
            .to_string();
        if pickup_location.is_empty() {
            return Err(DomainError::InvalidPickup(
                "pickup location is not configured".to_string(),
            ));
        }

        let carrier_request = CarrierPickupRequest {
            pickup_date: request.pickup_date,
            pickup_time: request.pickup_time,
            pickup_location: pickup_location.clone(),
            expected_package_count: request.expected_package_count,
        };

        let mut record = PickupRequest {
            id: xid::new().to_string(),
            carrier_pickup_id: None,
            pickup_date: request.pickup_date,
            pickup_time: request.pickup_time,
            pickup_location,
            expected_package_count: request.expected_package_count as i32,
            waybills: request.waybills,
            status: PickupStatus::Scheduled,
            carrier_response: serde_json::Value::Null,
            created_at: None,
            updated_at: None,
        };

        match self.carrier.create_pickup(&carrier_request).await {
            Ok(response) => {
                record.carrier_pickup_id = response.pickup_id;
                record.carrier_response = response.raw;
                let stored = self.pickup_repository.create_pickup(record).await?;
                info!(pickup_id = %stored.id, carrier_pickup_id = ?stored.carrier_pickup_id, "Pickup scheduled");
                Ok(stored)
            }
            Err(e) => {
                error!(error = %e, "Carrier pickup request failed");
                record.status = PickupStatus::Failed;
                record.carrier_response = serde_json::json!({ "error": e.to_string() });
                self.pickup_repository.create_pickup(record).await?;
                Err(e.into())
            }
        }
    }

    pub async fn get_pickup(&self, id: &str) -> DomainResult<PickupRequest> {
        self.pickup_repository
            .get_pickup(id)
            .await?
            .ok_or_else(|| DomainError::PickupNotFound(id.to_string()))
    }

    pub async fn list_pickups(&self, limit: i64) -> DomainResult<Vec<PickupRequest>> {
        if !(1..=crate::domain::MAX_LIST_LIMIT).contains(&limit) {
            return Err(DomainError::ValidationError(format!(
                "limit must be between 1 and {}",
                crate::domain::MAX_LIST_LIMIT
            )));
        }
        self.pickup_repository.list_pickups(limit).await
    }
}
