use common::domain::{
    is_valid_waybill, CarrierClient, DomainError, DomainResult, InsertWaybillsRepoInput,
    TransitionWaybillRepoInput, Waybill, WaybillRepository, WaybillSource, WaybillStats,
    WaybillStatus, MAX_BULK_WAYBILLS,
};
use garde::Validate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 1_000;

/// Request to pull a batch of waybills from the carrier
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FetchBulkWaybillsRequest {
    #[garde(range(min = 1, max = MAX_BULK_WAYBILLS))]
    pub count: u32,
}

/// Request to reserve a waybill for an order
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReserveWaybillRequest {
    #[garde(length(min = 1, max = 128))]
    pub order_id: String,
}

/// Request to mark a waybill as consumed by a shipment
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MarkWaybillUsedRequest {
    #[garde(skip)]
    #[serde(default)]
    pub waybill: String,
    #[garde(length(min = 1))]
    pub shipment_id: String,
}

#[derive(Debug, Clone, Validate)]
pub struct ListWaybillsRequest {
    #[garde(skip)]
    pub status: Option<WaybillStatus>,
    #[garde(range(min = 1, max = MAX_LIST_LIMIT))]
    pub limit: i64,
}

/// Domain service for the waybill inventory
pub struct WaybillService {
    waybill_repository: Arc<dyn WaybillRepository>,
    carrier: Arc<dyn CarrierClient>,
}

impl WaybillService {
    pub fn new(
        waybill_repository: Arc<dyn WaybillRepository>,
        carrier: Arc<dyn CarrierClient>,
    ) -> Self {
        Self {
            waybill_repository,
            carrier,
        }
    }

    fn check_waybill(waybill: &str) -> DomainResult<()> {
        if is_valid_waybill(waybill) {
            Ok(())
        } else {
            Err(DomainError::InvalidWaybill(waybill.to_string()))
        }
    }

    /// Fetch waybills from the carrier and store the unseen ones as `generated`
    #[instrument(skip(self, request), fields(count = request.count))]
    pub async fn fetch_bulk(&self, request: FetchBulkWaybillsRequest) -> DomainResult<Vec<Waybill>> {
        common::garde::validate_struct(&request)?;

        let issued = self.carrier.fetch_waybills(request.count).await?;
        let (valid, invalid): (Vec<String>, Vec<String>) =
            issued.into_iter().partition(|w| is_valid_waybill(w));
        if !invalid.is_empty() {
            warn!(count = invalid.len(), "Carrier returned malformed waybill numbers");
        }

        if valid.is_empty() {
            info!("Carrier returned no usable waybills");
            return Ok(Vec::new());
        }

        let inserted = self
            .waybill_repository
            .insert_waybills(InsertWaybillsRepoInput {
                waybills: valid,
                source: WaybillSource::DelhiveryBulk,
                status: WaybillStatus::Generated,
            })
            .await?;

        info!(inserted = inserted.len(), "Bulk waybills stored");
        Ok(inserted)
    }

    /// Reserve a waybill for an order; repeat calls for the same order return the same waybill
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn reserve(&self, request: ReserveWaybillRequest) -> DomainResult<Waybill> {
        common::garde::validate_struct(&request)?;

        if let Some(existing) = self
            .waybill_repository
            .find_reserved_for_order(&request.order_id)
            .await?
        {
            debug!(waybill = %existing.waybill, "Order already holds a reserved waybill");
            return Ok(existing);
        }

        let reserved = self
            .waybill_repository
            .reserve_waybill(&request.order_id)
            .await?
            .ok_or(DomainError::WaybillInventoryExhausted)?;

        info!(waybill = %reserved.waybill, "Waybill reserved");
        Ok(reserved)
    }

    pub async fn get(&self, waybill: &str) -> DomainResult<Waybill> {
        Self::check_waybill(waybill)?;

        self.waybill_repository
            .get_waybill(waybill)
            .await?
            .ok_or_else(|| DomainError::WaybillNotFound(waybill.to_string()))
    }

    /// Move a stored waybill to `to`, enforcing the lifecycle
    async fn transition(
        &self,
        current: Waybill,
        to: WaybillStatus,
        order_id: Option<String>,
        shipment_id: Option<String>,
    ) -> DomainResult<Waybill> {
        if !current.status.can_transition_to(to) {
            return Err(DomainError::InvalidWaybillTransition {
                waybill: current.waybill,
                from: current.status,
                to,
            });
        }

        let updated = self
            .waybill_repository
            .transition_waybill(TransitionWaybillRepoInput {
                waybill: current.waybill.clone(),
                from: current.status,
                to,
                order_id,
                shipment_id,
            })
            .await?;

        match updated {
            Some(waybill) => Ok(waybill),
            // lost a race; report against the status that won
            None => {
                let latest = self.get(&current.waybill).await?;
                Err(DomainError::InvalidWaybillTransition {
                    waybill: latest.waybill,
                    from: latest.status,
                    to,
                })
            }
        }
    }

    #[instrument(skip(self, request), fields(waybill = %request.waybill, shipment_id = %request.shipment_id))]
    pub async fn mark_used(&self, request: MarkWaybillUsedRequest) -> DomainResult<Waybill> {
        common::garde::validate_struct(&request)?;

        let current = self.get(&request.waybill).await?;
        let used = self
            .transition(current, WaybillStatus::Used, None, Some(request.shipment_id))
            .await?;

        info!("Waybill marked used");
        Ok(used)
    }

    /// Cancel a waybill; used waybills are cancelled at the carrier first
    #[instrument(skip(self))]
    pub async fn cancel(&self, waybill: &str) -> DomainResult<Waybill> {
        let current = self.get(waybill).await?;
        if !current.status.can_transition_to(WaybillStatus::Cancelled) {
            return Err(DomainError::InvalidWaybillTransition {
                waybill: current.waybill,
                from: current.status,
                to: WaybillStatus::Cancelled,
            });
        }

        if current.status == WaybillStatus::Used {
            self.carrier.cancel_shipment(waybill).await?;
        }

        let cancelled = self
            .transition(current, WaybillStatus::Cancelled, None, None)
            .await?;

        info!("Waybill cancelled");
        Ok(cancelled)
    }

    /// Check that an order may ship under `waybill`. Numbers unknown to the
    /// inventory are allowed; known ones must still be able to become `used`.
    pub async fn ensure_assignable(&self, waybill: &str) -> DomainResult<()> {
        Self::check_waybill(waybill)?;

        match self.waybill_repository.get_waybill(waybill).await? {
            Some(current) if !current.status.can_transition_to(WaybillStatus::Used) => {
                Err(DomainError::InvalidWaybillTransition {
                    waybill: current.waybill,
                    from: current.status,
                    to: WaybillStatus::Used,
                })
            }
            _ => Ok(()),
        }
    }

    /// Move inventory to `cancelled` after the carrier already cancelled the
    /// shipment. Unknown and already-cancelled waybills are left as they are.
    #[instrument(skip(self))]
    pub async fn record_shipment_cancellation(
        &self,
        waybill: &str,
    ) -> DomainResult<Option<Waybill>> {
        let current = match self.waybill_repository.get_waybill(waybill).await? {
            Some(current) => current,
            None => return Ok(None),
        };
        if current.status == WaybillStatus::Cancelled {
            return Ok(Some(current));
        }

        self.transition(current, WaybillStatus::Cancelled, None, None)
            .await
            .map(Some)
    }

    /// Record that a shipment consumed `waybill`, adding it to the inventory if the
    /// carrier assigned it
    #[instrument(skip(self))]
    pub async fn record_shipment_waybill(
        &self,
        waybill: &str,
        order_id: &str,
        shipment_id: &str,
    ) -> DomainResult<Waybill> {
        Self::check_waybill(waybill)?;

        let current = match self.waybill_repository.get_waybill(waybill).await? {
            Some(existing) => existing,
            None => {
                debug!("Adding carrier-assigned waybill to inventory");
                let inserted = self
                    .waybill_repository
                    .insert_waybills(InsertWaybillsRepoInput {
                        waybills: vec![waybill.to_string()],
                        source: WaybillSource::CarrierAssigned,
                        status: WaybillStatus::Generated,
                    })
                    .await?;
                match inserted.into_iter().next() {
                    Some(w) => w,
                    None => self.get(waybill).await?,
                }
            }
        };

        self.transition(
            current,
            WaybillStatus::Used,
            Some(order_id.to_string()),
            Some(shipment_id.to_string()),
        )
        .await
    }

    pub async fn list(&self, request: ListWaybillsRequest) -> DomainResult<Vec<Waybill>> {
        common::garde::validate_struct(&request)?;

        let waybills = self
            .waybill_repository
            .list_waybills(request.status, request.limit)
            .await?;

        debug!(count = waybills.len(), "Listed waybills");
        Ok(waybills)
    }

    pub async fn stats(&self) -> DomainResult<WaybillStats> {
        self.waybill_repository.waybill_stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::domain::{CarrierError, MockCarrierClient, MockWaybillRepository};

    const WB: &str = "1234567890123";

    fn waybill(number: &str, status: WaybillStatus) -> Waybill {
        Waybill {
            waybill: number.to_string(),
            status,
            source: WaybillSource::DelhiveryBulk,
            order_id: None,
            shipment_id: None,
            reserved_at: None,
            used_at: None,
            cancelled_at: None,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        }
    }

    fn service(repo: MockWaybillRepository, carrier: MockCarrierClient) -> WaybillService {
        WaybillService::new(Arc::new(repo), Arc::new(carrier))
    }

    #[tokio::test]
    async fn test_fetch_bulk_rejects_out_of_range_count() {
        let svc = service(MockWaybillRepository::new(), MockCarrierClient::new());

        for count in [0, MAX_BULK_WAYBILLS + 1] {
            let result = svc.fetch_bulk(FetchBulkWaybillsRequest { count }).await;
            assert!(matches!(result, Err(DomainError::ValidationError(_))));
        }
    }

    #[tokio::test]
    async fn test_fetch_bulk_stores_valid_numbers_as_generated() {
        let mut carrier = MockCarrierClient::new();
        carrier
            .expect_fetch_waybills()
            .withf(|count| *count == 3)
            .times(1)
            .return_once(|_| {
                Ok(vec![
                    "1234567890123".to_string(),
                    "bogus".to_string(),
                    "1234567890124".to_string(),
                ])
            });

        let mut repo = MockWaybillRepository::new();
        repo.expect_insert_waybills()
            .withf(|input| {
                input.waybills == vec!["1234567890123", "1234567890124"]
                    && input.source == WaybillSource::DelhiveryBulk
                    && input.status == WaybillStatus::Generated
            })
            .times(1)
            .return_once(|input| {
                Ok(input
                    .waybills
                    .iter()
                    .map(|w| waybill(w, WaybillStatus::Generated))
                    .collect())
            });

        let inserted = service(repo, carrier)
            .fetch_bulk(FetchBulkWaybillsRequest { count: 3 })
            .await
            .unwrap();
        assert_eq!(inserted.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_bulk_propagates_carrier_error() {
        let mut carrier = MockCarrierClient::new();
        carrier
            .expect_fetch_waybills()
            .return_once(|_| Err(CarrierError::Unauthorized(401)));

        let result = service(MockWaybillRepository::new(), carrier)
            .fetch_bulk(FetchBulkWaybillsRequest { count: 5 })
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Carrier(CarrierError::Unauthorized(401)))
        ));
    }

    #[tokio::test]
    async fn test_reserve_is_idempotent_per_order() {
        let mut repo = MockWaybillRepository::new();
        repo.expect_find_reserved_for_order()
            .withf(|order| order == "ORD-1")
            .times(1)
            .return_once(|_| {
                let mut w = waybill(WB, WaybillStatus::Reserved);
                w.order_id = Some("ORD-1".to_string());
                Ok(Some(w))
            });
        repo.expect_reserve_waybill().times(0);

        let reserved = service(repo, MockCarrierClient::new())
            .reserve(ReserveWaybillRequest {
                order_id: "ORD-1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(reserved.waybill, WB);
    }

    #[tokio::test]
    async fn test_reserve_exhausted_inventory() {
        let mut repo = MockWaybillRepository::new();
        repo.expect_find_reserved_for_order()
            .return_once(|_| Ok(None));
        repo.expect_reserve_waybill().return_once(|_| Ok(None));

        let result = service(repo, MockCarrierClient::new())
            .reserve(ReserveWaybillRequest {
                order_id: "ORD-2".to_string(),
            })
            .await;
        assert!(matches!(result, Err(DomainError::WaybillInventoryExhausted)));
    }

    #[tokio::test]
    async fn test_mark_used_rejects_cancelled_waybill() {
        let mut repo = MockWaybillRepository::new();
        repo.expect_get_waybill()
            .return_once(|_| Ok(Some(waybill(WB, WaybillStatus::Cancelled))));
        repo.expect_transition_waybill().times(0);

        let result = service(repo, MockCarrierClient::new())
            .mark_used(MarkWaybillUsedRequest {
                waybill: WB.to_string(),
                shipment_id: "shp_1".to_string(),
            })
            .await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidWaybillTransition {
                from: WaybillStatus::Cancelled,
                to: WaybillStatus::Used,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_mark_used_from_reserved() {
        let mut repo = MockWaybillRepository::new();
        repo.expect_get_waybill()
            .return_once(|_| Ok(Some(waybill(WB, WaybillStatus::Reserved))));
        repo.expect_transition_waybill()
            .withf(|input| {
                input.from == WaybillStatus::Reserved
                    && input.to == WaybillStatus::Used
                    && input.shipment_id.as_deref() == Some("shp_1")
            })
            .times(1)
            .return_once(|_| {
                let mut w = waybill(WB, WaybillStatus::Used);
                w.shipment_id = Some("shp_1".to_string());
                Ok(Some(w))
            });

        let used = service(repo, MockCarrierClient::new())
            .mark_used(MarkWaybillUsedRequest {
                waybill: WB.to_string(),
                shipment_id: "shp_1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(used.status, WaybillStatus::Used);
    }

    #[tokio::test]
    async fn test_mark_used_lost_race_reports_current_status() {
        let mut repo = MockWaybillRepository::new();
        let mut calls = 0;
        repo.expect_get_waybill().times(2).returning(move |_| {
            calls += 1;
            let status = if calls == 1 {
                WaybillStatus::Generated
            } else {
                WaybillStatus::Cancelled
            };
            Ok(Some(waybill(WB, status)))
        });
        repo.expect_transition_waybill().return_once(|_| Ok(None));

        let result = service(repo, MockCarrierClient::new())
            .mark_used(MarkWaybillUsedRequest {
                waybill: WB.to_string(),
                shipment_id: "shp_1".to_string(),
            })
            .await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidWaybillTransition {
                from: WaybillStatus::Cancelled,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_cancel_used_waybill_calls_carrier() {
        let mut repo = MockWaybillRepository::new();
        repo.expect_get_waybill()
            .return_once(|_| Ok(Some(waybill(WB, WaybillStatus::Used))));
        repo.expect_transition_waybill()
            .withf(|input| input.from == WaybillStatus::Used && input.to == WaybillStatus::Cancelled)
            .return_once(|_| Ok(Some(waybill(WB, WaybillStatus::Cancelled))));

        let mut carrier = MockCarrierClient::new();
        carrier
            .expect_cancel_shipment()
            .withf(|w| w == WB)
            .times(1)
            .return_once(|_| Ok(serde_json::json!({"status": true})));

        let cancelled = service(repo, carrier).cancel(WB).await.unwrap();
        assert_eq!(cancelled.status, WaybillStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_generated_waybill_skips_carrier() {
        let mut repo = MockWaybillRepository::new();
        repo.expect_get_waybill()
            .return_once(|_| Ok(Some(waybill(WB, WaybillStatus::Generated))));
        repo.expect_transition_waybill()
            .return_once(|_| Ok(Some(waybill(WB, WaybillStatus::Cancelled))));

        let mut carrier = MockCarrierClient::new();
        carrier.expect_cancel_shipment().times(0);

        service(repo, carrier).cancel(WB).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_twice_is_a_conflict() {
        let mut repo = MockWaybillRepository::new();
        repo.expect_get_waybill()
            .return_once(|_| Ok(Some(waybill(WB, WaybillStatus::Cancelled))));

        let result = service(repo, MockCarrierClient::new()).cancel(WB).await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidWaybillTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_validates_number_and_existence() {
        let svc = service(MockWaybillRepository::new(), MockCarrierClient::new());
        assert!(matches!(
            svc.get("12ab").await,
            Err(DomainError::InvalidWaybill(_))
        ));

        let mut repo = MockWaybillRepository::new();
        repo.expect_get_waybill().return_once(|_| Ok(None));
        let svc = service(repo, MockCarrierClient::new());
        assert!(matches!(
            svc.get(WB).await,
            Err(DomainError::WaybillNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_record_shipment_waybill_inserts_carrier_assigned() {
        let mut repo = MockWaybillRepository::new();
        repo.expect_get_waybill().return_once(|_| Ok(None));
        repo.expect_insert_waybills()
            .withf(|input| input.source == WaybillSource::CarrierAssigned)
            .return_once(|_| {
                let mut w = waybill(WB, WaybillStatus::Generated);
                w.source = WaybillSource::CarrierAssigned;
                Ok(vec![w])
            });
        repo.expect_transition_waybill()
            .withf(|input| {
                input.to == WaybillStatus::Used
                    && input.order_id.as_deref() == Some("ORD-1")
                    && input.shipment_id.as_deref() == Some("shp_1")
            })
            .return_once(|_| Ok(Some(waybill(WB, WaybillStatus::Used))));

        let recorded = service(repo, MockCarrierClient::new())
            .record_shipment_waybill(WB, "ORD-1", "shp_1")
            .await
            .unwrap();
        assert_eq!(recorded.status, WaybillStatus::Used);
    }

    #[tokio::test]
    async fn test_list_validates_limit() {
        let svc = service(MockWaybillRepository::new(), MockCarrierClient::new());
        let result = svc
            .list(ListWaybillsRequest {
                status: None,
                limit: MAX_LIST_LIMIT + 1,
            })
            .await;
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }
}
