use crate::domain::demo_serviceability;
use chrono::{Duration, Utc};
use common::domain::{
    is_valid_pincode, CarrierClient, DomainError, DomainResult, Serviceability,
    ServiceabilityRepository,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Serviceability answer with where it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceabilityView {
    #[serde(flatten)]
    pub record: Serviceability,
    pub cached: bool,
    pub demo: bool,
}

pub struct ServiceabilityService {
    serviceability_repository: Arc<dyn ServiceabilityRepository>,
    carrier: Arc<dyn CarrierClient>,
    max_age: Option<Duration>,
    demo_fallback: bool,
}

impl ServiceabilityService {
    /// `max_age` of `None` keeps cached answers forever
    pub fn new(
        serviceability_repository: Arc<dyn ServiceabilityRepository>,
        carrier: Arc<dyn CarrierClient>,
        max_age: Option<Duration>,
        demo_fallback: bool,
    ) -> Self {
        Self {
            serviceability_repository,
            carrier,
            max_age,
            demo_fallback,
        }
    }

    #[instrument(skip(self))]
    pub async fn check(&self, pincode: &str, refresh: bool) -> DomainResult<ServiceabilityView> {
        if !is_valid_pincode(pincode) {
            return Err(DomainError::InvalidPincode(pincode.to_string()));
        }

        let now = Utc::now();
        if !refresh {
            if let Some(record) = self
                .serviceability_repository
                .get_serviceability(pincode)
                .await?
            {
                if !record.is_stale(self.max_age, now) {
                    debug!("Serving cached serviceability");
                    return Ok(ServiceabilityView {
                        record,
                        cached: true,
                        demo: false,
                    });
                }
                debug!(checked_at = %record.checked_at, "Cached serviceability is stale");
            }
        }

        let record = match self.carrier.check_pincode(pincode).await {
            Ok(Some(found)) => Serviceability::from_carrier(found, now),
            Ok(None) => Serviceability::not_serviceable(pincode, now),
            Err(e) if e.is_unauthorized() && self.demo_fallback => {
                warn!("Carrier rejected token, serving demo serviceability");
                return Ok(ServiceabilityView {
                    record: demo_serviceability(pincode, now),
                    cached: false,
                    demo: true,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let stored = self
            .serviceability_repository
            .upsert_serviceability(record)
            .await?;

        info!(serviceable = stored.serviceable, "Serviceability refreshed");
        Ok(ServiceabilityView {
            record: stored,
            cached: false,
            demo: false,
        })
    }

    pub async fn get_cached(&self, pincode: &str) -> DomainResult<Serviceability> {
        if !is_valid_pincode(pincode) {
            return Err(DomainError::InvalidPincode(pincode.to_string()));
        }

        self.serviceability_repository
            .get_serviceability(pincode)
            .await?
            .ok_or_else(|| DomainError::ServiceabilityNotFound(pincode.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{CarrierError, CarrierPincode, MockCarrierClient, MockServiceabilityRepository};

    fn service(
        repo: MockServiceabilityRepository,
        carrier: MockCarrierClient,
        max_age: Option<Duration>,
        demo_fallback: bool,
    ) -> ServiceabilityService {
        ServiceabilityService::new(Arc::new(repo), Arc::new(carrier), max_age, demo_fallback)
    }

    fn carrier_pincode() -> CarrierPincode {
        CarrierPincode {
            pincode: "110001".to_string(),
            district: Some("New Delhi".to_string()),
            state_code: Some("DL".to_string()),
            prepaid: true,
            cod: true,
            pickup: false,
            is_oda: false,
            raw: serde_json::json!({"postal_code": {"pin": 110001}}),
        }
    }

    #[tokio::test]
    async fn test_cached_record_is_served_without_carrier() {
        let mut repo = MockServiceabilityRepository::new();
        repo.expect_get_serviceability()
            .return_once(|_| Ok(Some(Serviceability::from_carrier(carrier_pincode(), Utc::now()))));
        let mut carrier = MockCarrierClient::new();
        carrier.expect_check_pincode().times(0);

        let view = service(repo, carrier, None, false)
            .check("110001", false)
            .await
            .unwrap();
        assert!(view.cached);
        assert!(view.record.serviceable);
    }

    #[tokio::test]
    async fn test_stale_record_is_refreshed() {
        let mut repo = MockServiceabilityRepository::new();
        repo.expect_get_serviceability().return_once(|_| {
            Ok(Some(Serviceability::not_serviceable(
                "110001",
                Utc::now() - Duration::hours(48),
            )))
        });
        repo.expect_upsert_serviceability()
            .withf(|record| record.serviceable)
            .times(1)
            .returning(|record| Ok(record));

        let mut carrier = MockCarrierClient::new();
        carrier
            .expect_check_pincode()
            .times(1)
            .return_once(|_| Ok(Some(carrier_pincode())));

        let view = service(repo, carrier, Some(Duration::hours(24)), false)
            .check("110001", false)
            .await
            .unwrap();
        assert!(!view.cached);
        assert_eq!(view.record.district.as_deref(), Some("New Delhi"));
    }

    #[tokio::test]
    async fn test_unserviceable_pincode_is_cached() {
        let mut repo = MockServiceabilityRepository::new();
        repo.expect_upsert_serviceability()
            .withf(|record| !record.serviceable && record.pincode == "999999")
            .times(1)
            .returning(|record| Ok(record));
        repo.expect_get_serviceability().times(0);

        let mut carrier = MockCarrierClient::new();
        carrier.expect_check_pincode().return_once(|_| Ok(None));

        let view = service(repo, carrier, None, false)
            .check("999999", true)
            .await
            .unwrap();
        assert!(!view.record.serviceable);
    }

    #[tokio::test]
    async fn test_demo_fallback_on_unauthorized_is_not_cached() {
        let mut repo = MockServiceabilityRepository::new();
        repo.expect_get_serviceability().return_once(|_| Ok(None));
        repo.expect_upsert_serviceability().times(0);

        let mut carrier = MockCarrierClient::new();
        carrier
            .expect_check_pincode()
            .return_once(|_| Err(CarrierError::Unauthorized(401)));

        let view = service(repo, carrier, None, true)
            .check("110001", false)
            .await
            .unwrap();
        assert!(view.demo);
        assert!(!view.cached);
    }

    #[tokio::test]
    async fn test_unauthorized_without_fallback_is_an_error() {
        let mut repo = MockServiceabilityRepository::new();
        repo.expect_get_serviceability().return_once(|_| Ok(None));

        let mut carrier = MockCarrierClient::new();
        carrier
            .expect_check_pincode()
            .return_once(|_| Err(CarrierError::Unauthorized(401)));

        let result = service(repo, carrier, None, false)
            .check("110001", false)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Carrier(CarrierError::Unauthorized(_)))
        ));
    }

    #[tokio::test]
    async fn test_invalid_pincode() {
        let svc = service(
            MockServiceabilityRepository::new(),
            MockCarrierClient::new(),
            None,
            false,
        );
        assert!(matches!(
            svc.check("01234", false).await,
            Err(DomainError::InvalidPincode(_))
        ));
        assert!(matches!(
            svc.get_cached("abcdef").await,
            Err(DomainError::InvalidPincode(_))
        ));
    }
}
