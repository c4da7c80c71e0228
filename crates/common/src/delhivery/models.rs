//! Wire types for Delhivery payloads and their conversion into carrier domain types.
//!
//! The carrier is loose with types: numbers arrive as strings and vice versa,
//! remarks are sometimes a string and sometimes a list, and timestamps carry
//! no offset (they are India Standard Time).

use crate::domain::{
    CarrierPackage, CarrierPickupResponse, CarrierPincode, CarrierShipmentResponse,
    CarrierStatus, CarrierTracking, ScanEvent,
};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

const IST_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

const NAIVE_TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a carrier timestamp; values without an offset are read as IST
pub fn parse_carrier_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    let ist = FixedOffset::east_opt(IST_OFFSET_SECONDS)?;
    NAIVE_TIMESTAMP_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .and_then(|naive| naive.and_local_timezone(ist).single())
            .map(|ts| ts.with_timezone(&Utc))
    })
}

/// Render a scalar JSON value as a string, dropping nulls and blanks
fn scalar_to_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn yes(flag: &Option<String>) -> bool {
    flag.as_deref()
        .map(|f| f.trim().eq_ignore_ascii_case("y"))
        .unwrap_or(false)
}

/// Waybill numbers from the bulk endpoint: a comma separated string or a list
pub fn parse_bulk_waybills(payload: &Value) -> Result<Vec<String>, String> {
    match payload {
        Value::String(s) => Ok(s
            .split(',')
            .map(|w| w.trim().trim_matches('"').to_string())
            .filter(|w| !w.is_empty())
            .collect()),
        Value::Array(items) => Ok(items.iter().filter_map(scalar_to_string).collect()),
        other => Err(format!("expected waybill list, got {}", other)),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Remarks {
    One(String),
    Many(Vec<String>),
}

impl Default for Remarks {
    fn default() -> Self {
        Remarks::Many(Vec::new())
    }
}

impl From<Remarks> for Vec<String> {
    fn from(remarks: Remarks) -> Self {
        match remarks {
            Remarks::One(s) if s.trim().is_empty() => Vec::new(),
            Remarks::One(s) => vec![s],
            Remarks::Many(list) => list,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PackageWire {
    #[serde(default)]
    waybill: Value,
    #[serde(default)]
    status: String,
    #[serde(default)]
    refnum: Value,
    #[serde(default)]
    remarks: Option<Remarks>,
}

#[derive(Debug, Deserialize)]
struct CreateShipmentWire {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    upload_wbn: Value,
    #[serde(default)]
    packages: Vec<PackageWire>,
    #[serde(default)]
    rmk: Value,
}

pub fn parse_create_shipment(raw: Value) -> Result<CarrierShipmentResponse, String> {
    let wire: CreateShipmentWire =
        serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;

    let packages = wire
        .packages
        .into_iter()
        .map(|p| CarrierPackage {
            waybill: scalar_to_string(&p.waybill).unwrap_or_default(),
            status: p.status,
            refnum: scalar_to_string(&p.refnum),
            remarks: p.remarks.unwrap_or_default().into(),
        })
        .collect();

    Ok(CarrierShipmentResponse {
        success: wire.success,
        upload_wbn: scalar_to_string(&wire.upload_wbn),
        packages,
        remarks: scalar_to_string(&wire.rmk),
        raw,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StatusWire {
    #[serde(default)]
    status: String,
    #[serde(default)]
    status_location: Option<String>,
    #[serde(default)]
    status_date_time: Option<String>,
    #[serde(default)]
    instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ScanDetailWire {
    #[serde(default)]
    scan: String,
    #[serde(default)]
    scan_date_time: Option<String>,
    #[serde(default)]
    scanned_location: Option<String>,
    #[serde(default)]
    instructions: Option<String>,
    #[serde(default)]
    status_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ScanWire {
    scan_detail: ScanDetailWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ShipmentWire {
    #[serde(default, rename = "AWB")]
    awb: Value,
    #[serde(default)]
    status: Option<StatusWire>,
    #[serde(default)]
    scans: Vec<ScanWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ShipmentDataWire {
    shipment: ShipmentWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrackingWire {
    #[serde(default)]
    shipment_data: Vec<ShipmentDataWire>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse a tracking payload; `Ok(None)` when the carrier knows no such waybill
pub fn parse_tracking(waybill: &str, raw: Value) -> Result<Option<CarrierTracking>, String> {
    let wire: TrackingWire = serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;

    let Some(data) = wire.shipment_data.into_iter().next() else {
        return Ok(None);
    };
    let shipment = data.shipment;

    let status = shipment.status.map(|s| CarrierStatus {
        timestamp: s.status_date_time.as_deref().and_then(parse_carrier_timestamp),
        status: s.status,
        location: non_blank(s.status_location),
        instructions: non_blank(s.instructions),
    });

    let scans = shipment
        .scans
        .into_iter()
        .filter_map(|scan| {
            let detail = scan.scan_detail;
            let Some(timestamp) = detail
                .scan_date_time
                .as_deref()
                .and_then(parse_carrier_timestamp)
            else {
                warn!(waybill = %waybill, scan = %detail.scan, "Skipping scan without a readable timestamp");
                return None;
            };
            Some(ScanEvent {
                status: detail.scan,
                location: non_blank(detail.scanned_location),
                timestamp,
                description: non_blank(detail.instructions),
                status_code: non_blank(detail.status_code),
            })
        })
        .collect();

    Ok(Some(CarrierTracking {
        waybill: scalar_to_string(&shipment.awb).unwrap_or_else(|| waybill.to_string()),
        status,
        scans,
        raw,
    }))
}

#[derive(Debug, Deserialize)]
struct PostalCodeWire {
    #[serde(default)]
    pin: Value,
    #[serde(default)]
    district: Option<String>,
    #[serde(default)]
    state_code: Option<String>,
    #[serde(default)]
    pre_paid: Option<String>,
    #[serde(default)]
    cod: Option<String>,
    #[serde(default)]
    pickup: Option<String>,
    #[serde(default)]
    is_oda: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeliveryCodeWire {
    postal_code: PostalCodeWire,
}

#[derive(Debug, Deserialize)]
struct PincodeWire {
    #[serde(default)]
    delivery_codes: Vec<DeliveryCodeWire>,
}

/// Parse a pin-code lookup; an empty `delivery_codes` list means not serviceable
pub fn parse_pincode(pincode: &str, raw: Value) -> Result<Option<CarrierPincode>, String> {
    let wire: PincodeWire = serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;

    Ok(wire.delivery_codes.into_iter().next().map(|code| {
        let pc = code.postal_code;
        CarrierPincode {
            pincode: scalar_to_string(&pc.pin).unwrap_or_else(|| pincode.to_string()),
            district: non_blank(pc.district),
            state_code: non_blank(pc.state_code),
            prepaid: yes(&pc.pre_paid),
            cod: yes(&pc.cod),
            pickup: yes(&pc.pickup),
            is_oda: yes(&pc.is_oda),
            raw,
        }
    }))
}

pub fn parse_pickup(raw: Value) -> CarrierPickupResponse {
    let pickup_id = raw.get("pickup_id").and_then(scalar_to_string);
    CarrierPickupResponse { pickup_id, raw }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_without_offset_is_ist() {
        let ts = parse_carrier_timestamp("2024-03-01T10:30:00.123").unwrap();
        assert_eq!(
            ts,
            Utc.with_ymd_and_hms(2024, 3, 1, 5, 0, 0).unwrap() + chrono::Duration::milliseconds(123)
        );
    }

    #[test]
    fn test_parse_timestamp_with_offset() {
        let ts = parse_carrier_timestamp("2024-03-01T10:30:00+05:30").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 1, 5, 0, 0).unwrap());
        assert!(parse_carrier_timestamp("").is_none());
        assert!(parse_carrier_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_parse_bulk_waybills_string_and_list() {
        let from_string = parse_bulk_waybills(&json!("1234567890123, 1234567890124,")).unwrap();
        assert_eq!(from_string, vec!["1234567890123", "1234567890124"]);

        let from_list = parse_bulk_waybills(&json!(["1234567890125", 1234567890126u64])).unwrap();
        assert_eq!(from_list, vec!["1234567890125", "1234567890126"]);

        assert!(parse_bulk_waybills(&json!({"error": "nope"})).is_err());
    }

    #[test]
    fn test_parse_create_shipment_with_mixed_remarks() {
        let raw = json!({
            "success": false,
            "upload_wbn": 12345,
            "rmk": "",
            "packages": [
                {"waybill": "", "status": "Fail", "refnum": "ORD-1", "remarks": ["Duplicate order id"]},
                {"waybill": 1234567890123u64, "status": "Success", "refnum": null, "remarks": ""}
            ]
        });

        let parsed = parse_create_shipment(raw).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.upload_wbn.as_deref(), Some("12345"));
        assert_eq!(parsed.remarks, None);
        assert_eq!(parsed.packages.len(), 2);
        assert_eq!(parsed.packages[0].remarks, vec!["Duplicate order id"]);
        assert_eq!(parsed.packages[0].refnum.as_deref(), Some("ORD-1"));
        assert_eq!(parsed.packages[1].waybill, "1234567890123");
        assert!(parsed.packages[1].is_success());
        assert!(parsed.packages[1].remarks.is_empty());
    }

    #[test]
    fn test_parse_tracking_collects_scans() {
        let raw = json!({
            "ShipmentData": [{
                "Shipment": {
                    "AWB": "1234567890123",
                    "Status": {
                        "Status": "In Transit",
                        "StatusLocation": "Delhi_Hub",
                        "StatusDateTime": "2024-03-02T09:00:00",
                        "Instructions": ""
                    },
                    "Scans": [
                        {"ScanDetail": {"Scan": "Manifested", "ScanDateTime": "2024-03-01T10:00:00", "ScannedLocation": "Mumbai", "Instructions": "Shipment picked", "StatusCode": "X-UCI"}},
                        {"ScanDetail": {"Scan": "Broken", "ScanDateTime": ""}}
                    ]
                }
            }]
        });

        let tracking = parse_tracking("1234567890123", raw).unwrap().unwrap();
        let status = tracking.status.unwrap();
        assert_eq!(status.status, "In Transit");
        assert_eq!(status.location.as_deref(), Some("Delhi_Hub"));
        assert!(status.instructions.is_none());
        assert_eq!(tracking.scans.len(), 1);
        assert_eq!(tracking.scans[0].status, "Manifested");
        assert_eq!(tracking.scans[0].status_code.as_deref(), Some("X-UCI"));
    }

    #[test]
    fn test_parse_tracking_unknown_waybill() {
        let parsed = parse_tracking("1", json!({"ShipmentData": []})).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_parse_pincode_flags() {
        let raw = json!({
            "delivery_codes": [{
                "postal_code": {
                    "pin": 110001,
                    "district": "New Delhi",
                    "state_code": "DL",
                    "pre_paid": "Y",
                    "cod": "N",
                    "pickup": "y",
                    "is_oda": "N"
                }
            }]
        });

        let pincode = parse_pincode("110001", raw).unwrap().unwrap();
        assert_eq!(pincode.pincode, "110001");
        assert!(pincode.prepaid);
        assert!(!pincode.cod);
        assert!(pincode.pickup);
        assert!(!pincode.is_oda);
        assert_eq!(pincode.state_code.as_deref(), Some("DL"));
    }

    #[test]
    fn test_parse_pincode_not_served() {
        let parsed = parse_pincode("999999", json!({"delivery_codes": []})).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_parse_pickup_numeric_id() {
        let parsed = parse_pickup(json!({"pickup_id": 98765, "incoming_center_name": "Hub"}));
        assert_eq!(parsed.pickup_id.as_deref(), Some("98765"));
    }
}
