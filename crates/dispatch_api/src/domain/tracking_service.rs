use crate::domain::demo_tracking;
use chrono::Utc;
use common::domain::{
    is_valid_waybill, merge_scans, CarrierClient, DomainError, DomainResult, TrackingHistory,
    TrackingRepository,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingView {
    #[serde(flatten)]
    pub history: TrackingHistory,
    pub demo: bool,
}

pub struct TrackingService {
    tracking_repository: Arc<dyn TrackingRepository>,
    carrier: Arc<dyn CarrierClient>,
    demo_fallback: bool,
}

impl TrackingService {
    pub fn new(
        tracking_repository: Arc<dyn TrackingRepository>,
        carrier: Arc<dyn CarrierClient>,
        demo_fallback: bool,
    ) -> Self {
        Self {
            tracking_repository,
            carrier,
            demo_fallback,
        }
    }

    /// Pull live tracking and fold it into the stored history
    #[instrument(skip(self))]
    pub async fn track(&self, waybill: &str) -> DomainResult<TrackingView> {
        if !is_valid_waybill(waybill) {
            return Err(DomainError::InvalidWaybill(waybill.to_string()));
        }

        let now = Utc::now();
        let live = match self.carrier.track(waybill).await {
            Ok(live) => live,
            Err(e) if e.is_unauthorized() && self.demo_fallback => {
                warn!("Carrier rejected token, serving demo tracking");
                return Ok(TrackingView {
                    history: demo_tracking(waybill, now),
                    demo: true,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let existing = self.tracking_repository.get_tracking(waybill).await?;
        let known_scans = existing.map(|h| h.scans).unwrap_or_default();
        let incoming = live.scans.len();
        let scans = merge_scans(known_scans, live.scans);
        debug!(incoming, merged = scans.len(), "Merged scans");

        let latest_scan = scans.last();
        let (current_status, current_location, status_updated_at) = match live.status {
            Some(status) => (
                Some(status.status),
                status
                    .location
                    .or_else(|| latest_scan.and_then(|s| s.location.clone())),
                status.timestamp.or_else(|| latest_scan.map(|s| s.timestamp)),
            ),
            None => (
                latest_scan.map(|s| s.status.clone()),
                latest_scan.and_then(|s| s.location.clone()),
                latest_scan.map(|s| s.timestamp),
            ),
        };

        let stored = self
            .tracking_repository
            .upsert_tracking(TrackingHistory {
                waybill: waybill.to_string(),
                current_status,
                current_location,
                status_updated_at,
                scans,
                last_synced_at: now,
            })
            .await?;

        info!(status = ?stored.current_status, scans = stored.scans.len(), "Tracking synced");
        Ok(TrackingView {
            history: stored,
            demo: false,
        })
    }

    pub async fn get_history(&self, waybill: &str) -> DomainResult<TrackingHistory> {
        if !is_valid_waybill(waybill) {
            return Err(DomainError::InvalidWaybill(waybill.to_string()));
        }

        self.tracking_repository
            .get_tracking(waybill)
            .await?
            .ok_or_else(|| DomainError::TrackingNotFound(waybill.to_string()))
    }
}
