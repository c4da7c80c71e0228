use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// E-waybills are treated as valid for roughly three months after generation
pub const EWAYBILL_VALIDITY_DAYS: i64 = 90;

/// Invoice value (INR) above which GST requires an e-waybill
pub const EWAYBILL_THRESHOLD_INR: f64 = 50_000.0;

/// Compliance document attached to a shipment's waybill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ewaybill {
    pub waybill: String,
    pub ewaybill_number: String,
    pub invoice_number: String,
    pub invoice_value: f64,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub carrier_response: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Ewaybill {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Repository input for upserting an e-waybill by waybill number
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertEwaybillRepoInput {
    pub waybill: String,
    pub ewaybill_number: String,
    pub invoice_number: String,
    pub invoice_value: f64,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub carrier_response: serde_json::Value,
}

pub fn ewaybill_expiry(generated_at: DateTime<Utc>) -> DateTime<Utc> {
    generated_at + Duration::days(EWAYBILL_VALIDITY_DAYS)
}

pub fn requires_ewaybill(invoice_value: f64) -> bool {
    invoice_value > EWAYBILL_THRESHOLD_INR
}

/// GST e-waybill numbers are 12 digits
pub fn is_valid_ewaybill_number(number: &str) -> bool {
    number.len() == 12 && number.chars().all(|c| c.is_ascii_digit())
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EwaybillRepository: Send + Sync {
    /// Insert or replace the e-waybill for a waybill (last write wins)
    async fn upsert_ewaybill(&self, input: UpsertEwaybillRepoInput) -> DomainResult<Ewaybill>;

    async fn get_ewaybill(&self, waybill: &str) -> DomainResult<Option<Ewaybill>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_expiry_is_ninety_days_out() {
        let generated = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        let expiry = ewaybill_expiry(generated);
        assert_eq!(expiry, Utc.with_ymd_and_hms(2024, 4, 9, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_is_expired_boundary() {
        let generated = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        let ewaybill = Ewaybill {
            waybill: "1490812345678".to_string(),
            ewaybill_number: "331234567890".to_string(),
            invoice_number: "INV-1".to_string(),
            invoice_value: 72_000.0,
            generated_at: generated,
            expires_at: ewaybill_expiry(generated),
            carrier_response: serde_json::Value::Null,
            created_at: None,
            updated_at: None,
        };

        assert!(!ewaybill.is_expired(generated));
        assert!(ewaybill.is_expired(ewaybill.expires_at));
    }

    #[test]
    fn test_threshold() {
        assert!(!requires_ewaybill(50_000.0));
        assert!(requires_ewaybill(50_000.01));
    }

    #[test]
    fn test_ewaybill_number_shape() {
        assert!(is_valid_ewaybill_number("331234567890"));
        assert!(!is_valid_ewaybill_number("33123456789"));
        assert!(!is_valid_ewaybill_number("33123456789X"));
    }
}
