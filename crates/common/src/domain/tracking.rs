use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single carrier scan of a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub status: String,
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub description: Option<String>,
    pub status_code: Option<String>,
}

impl ScanEvent {
    fn same_event(&self, other: &ScanEvent) -> bool {
        self.timestamp == other.timestamp
            && self.status == other.status
            && self.location == other.location
    }
}

/// Cached tracking state for one waybill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingHistory {
    pub waybill: String,
    pub current_status: Option<String>,
    pub current_location: Option<String>,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub scans: Vec<ScanEvent>,
    pub last_synced_at: DateTime<Utc>,
}

/// Append incoming scans that are not already recorded, ordered by timestamp.
///
/// Existing scans are never dropped. Sorting is stable so scans sharing a
/// timestamp keep their arrival order.
pub fn merge_scans(existing: Vec<ScanEvent>, incoming: Vec<ScanEvent>) -> Vec<ScanEvent> {
    let mut merged = existing;
    for scan in incoming {
        if !merged.iter().any(|known| known.same_event(&scan)) {
            merged.push(scan);
        }
    }
    merged.sort_by_key(|scan| scan.timestamp);
    merged
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TrackingRepository: Send + Sync {
    async fn upsert_tracking(&self, history: TrackingHistory) -> DomainResult<TrackingHistory>;

    async fn get_tracking(&self, waybill: &str) -> DomainResult<Option<TrackingHistory>>;
}
