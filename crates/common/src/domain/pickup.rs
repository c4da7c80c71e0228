use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupStatus {
    Scheduled,
    Failed,
}

impl PickupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickupStatus::Scheduled => "scheduled",
            PickupStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PickupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PickupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(PickupStatus::Scheduled),
            "failed" => Ok(PickupStatus::Failed),
            other => Err(format!("unknown pickup status: {}", other)),
        }
    }
}

/// A scheduled carrier visit to a warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupRequest {
    pub id: String,
    pub carrier_pickup_id: Option<String>,
    pub pickup_date: NaiveDate,
    pub pickup_time: NaiveTime,
    pub pickup_location: String,
    pub expected_package_count: i32,
    pub waybills: Vec<String>,
    pub status: PickupStatus,
    pub carrier_response: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PickupRepository: Send + Sync {
    async fn create_pickup(&self, pickup: PickupRequest) -> DomainResult<PickupRequest>;

    async fn get_pickup(&self, id: &str) -> DomainResult<Option<PickupRequest>>;

    /// Newest pickups first
    async fn list_pickups(&self, limit: i64) -> DomainResult<Vec<PickupRequest>>;
}
