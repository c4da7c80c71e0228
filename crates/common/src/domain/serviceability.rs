use crate::domain::result::DomainResult;
use crate::domain::CarrierPincode;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Cached answer to "does the carrier deliver to this pincode"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Serviceability {
    pub pincode: String,
    pub serviceable: bool,
    pub district: Option<String>,
    pub state_code: Option<String>,
    pub prepaid: bool,
    pub cod: bool,
    pub pickup: bool,
    pub is_oda: bool,
    pub raw: serde_json::Value,
    pub checked_at: DateTime<Utc>,
}

impl Serviceability {
    pub fn from_carrier(pincode: CarrierPincode, checked_at: DateTime<Utc>) -> Self {
        Self {
            pincode: pincode.pincode,
            serviceable: true,
            district: pincode.district,
            state_code: pincode.state_code,
            prepaid: pincode.prepaid,
            cod: pincode.cod,
            pickup: pincode.pickup,
            is_oda: pincode.is_oda,
            raw: pincode.raw,
            checked_at,
        }
    }

    pub fn not_serviceable(pincode: &str, checked_at: DateTime<Utc>) -> Self {
        Self {
            pincode: pincode.to_string(),
            serviceable: false,
            district: None,
            state_code: None,
            prepaid: false,
            cod: false,
            pickup: false,
            is_oda: false,
            raw: serde_json::json!({ "delivery_codes": [] }),
            checked_at,
        }
    }

    /// `max_age` of `None` means cached entries never go stale
    pub fn is_stale(&self, max_age: Option<Duration>, now: DateTime<Utc>) -> bool {
        match max_age {
            Some(age) => now - self.checked_at > age,
            None => false,
        }
    }
}

/// Indian postal codes: six digits, no leading zero
pub fn is_valid_pincode(pincode: &str) -> bool {
    pincode.len() == 6
        && pincode.chars().all(|c| c.is_ascii_digit())
        && !pincode.starts_with('0')
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ServiceabilityRepository: Send + Sync {
    async fn upsert_serviceability(&self, record: Serviceability) -> DomainResult<Serviceability>;

    async fn get_serviceability(&self, pincode: &str) -> DomainResult<Option<Serviceability>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pincode_validation() {
        assert!(is_valid_pincode("110001"));
        assert!(is_valid_pincode("560103"));
        assert!(!is_valid_pincode("011001"));
        assert!(!is_valid_pincode("11001"));
        assert!(!is_valid_pincode("1100011"));
        assert!(!is_valid_pincode("11000a"));
    }

    #[test]
    fn test_staleness() {
        let now = Utc::now();
        let record = Serviceability::not_serviceable("110001", now - Duration::hours(30));

        assert!(!record.is_stale(None, now));
        assert!(record.is_stale(Some(Duration::hours(24)), now));
        assert!(!record.is_stale(Some(Duration::hours(48)), now));
    }
}
