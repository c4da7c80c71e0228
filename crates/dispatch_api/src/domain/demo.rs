//! Placeholder carrier data served when the carrier rejects our token and the
//! demo fallback is switched on. Every payload is tagged `"demo": true`.

use chrono::{DateTime, Duration, Utc};
use common::domain::{ScanEvent, Serviceability, TrackingHistory};

pub fn demo_serviceability(pincode: &str, now: DateTime<Utc>) -> Serviceability {
    Serviceability {
        pincode: pincode.to_string(),
        serviceable: true,
        district: Some("Demo District".to_string()),
        state_code: Some("DL".to_string()),
        prepaid: true,
        cod: true,
        pickup: true,
        is_oda: false,
        raw: serde_json::json!({ "demo": true }),
        checked_at: now,
    }
}

pub fn demo_tracking(waybill: &str, now: DateTime<Utc>) -> TrackingHistory {
    let scan = |hours_ago: i64, status: &str, location: &str| ScanEvent {
        status: status.to_string(),
        location: Some(location.to_string()),
        timestamp: now - Duration::hours(hours_ago),
        description: Some("Demo scan".to_string()),
        status_code: None,
    };
    let scans = vec![
        scan(48, "Manifested", "Origin Hub"),
        scan(30, "In Transit", "Sort Center"),
        scan(6, "Pending", "Destination Hub"),
    ];
    let latest = scans.last().cloned();

    TrackingHistory {
        waybill: waybill.to_string(),
        current_status: latest.as_ref().map(|s| s.status.clone()),
        current_location: latest.as_ref().and_then(|s| s.location.clone()),
        status_updated_at: latest.map(|s| s.timestamp),
        scans,
        last_synced_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_tracking_is_time_ordered() {
        let history = demo_tracking("1234567890123", Utc::now());
        assert!(history
            .scans
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));
        assert_eq!(history.current_status.as_deref(), Some("Pending"));
    }

    #[test]
    fn test_demo_serviceability_is_tagged() {
        let record = demo_serviceability("110001", Utc::now());
        assert_eq!(record.raw["demo"], true);
    }
}
