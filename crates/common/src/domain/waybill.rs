use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of waybills the carrier hands out per bulk request
pub const MAX_BULK_WAYBILLS: u32 = 10_000;

/// Lifecycle state of a waybill in the local inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaybillStatus {
    Generated,
    Reserved,
    Used,
    Cancelled,
}

impl WaybillStatus {
    pub const ALL: [WaybillStatus; 4] = [
        WaybillStatus::Generated,
        WaybillStatus::Reserved,
        WaybillStatus::Used,
        WaybillStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WaybillStatus::Generated => "generated",
            WaybillStatus::Reserved => "reserved",
            WaybillStatus::Used => "used",
            WaybillStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the inventory allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: WaybillStatus) -> bool {
        use WaybillStatus::*;
        matches!(
            (self, next),
            (Generated, Reserved)
                | (Generated, Used)
                | (Reserved, Used)
                | (Generated, Cancelled)
                | (Reserved, Cancelled)
                | (Used, Cancelled)
        )
    }
}

impl fmt::Display for WaybillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WaybillStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generated" => Ok(WaybillStatus::Generated),
            "reserved" => Ok(WaybillStatus::Reserved),
            "used" => Ok(WaybillStatus::Used),
            "cancelled" => Ok(WaybillStatus::Cancelled),
            other => Err(format!("unknown waybill status: {}", other)),
        }
    }
}

/// Where a waybill number came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaybillSource {
    DelhiveryBulk,
    CarrierAssigned,
    Manual,
}

impl WaybillSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaybillSource::DelhiveryBulk => "delhivery_bulk",
            WaybillSource::CarrierAssigned => "carrier_assigned",
            WaybillSource::Manual => "manual",
        }
    }
}

impl fmt::Display for WaybillSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WaybillSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delhivery_bulk" => Ok(WaybillSource::DelhiveryBulk),
            "carrier_assigned" => Ok(WaybillSource::CarrierAssigned),
            "manual" => Ok(WaybillSource::Manual),
            other => Err(format!("unknown waybill source: {}", other)),
        }
    }
}

/// A carrier tracking number held in the local inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waybill {
    pub waybill: String,
    pub status: WaybillStatus,
    pub source: WaybillSource,
    pub order_id: Option<String>,
    pub shipment_id: Option<String>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub used_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Repository input for inserting freshly issued waybills
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertWaybillsRepoInput {
    pub waybills: Vec<String>,
    pub source: WaybillSource,
    pub status: WaybillStatus,
}

/// Repository input for a conditional status change.
///
/// The update only applies while the stored status is still `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionWaybillRepoInput {
    pub waybill: String,
    pub from: WaybillStatus,
    pub to: WaybillStatus,
    pub order_id: Option<String>,
    pub shipment_id: Option<String>,
}

/// Count of waybills per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaybillStats {
    pub generated: i64,
    pub reserved: i64,
    pub used: i64,
    pub cancelled: i64,
}

impl WaybillStats {
    pub fn record(&mut self, status: WaybillStatus, count: i64) {
        match status {
            WaybillStatus::Generated => self.generated += count,
            WaybillStatus::Reserved => self.reserved += count,
            WaybillStatus::Used => self.used += count,
            WaybillStatus::Cancelled => self.cancelled += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.generated + self.reserved + self.used + self.cancelled
    }
}

/// Basic shape check for carrier waybill numbers (digits only, 8-20 long)
pub fn is_valid_waybill(waybill: &str) -> bool {
    let len = waybill.len();
    (8..=20).contains(&len) && waybill.chars().all(|c| c.is_ascii_digit())
}

/// Repository trait for waybill inventory persistence
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait WaybillRepository: Send + Sync {
    /// Insert waybills, skipping numbers that already exist. Returns the inserted rows.
    async fn insert_waybills(&self, input: InsertWaybillsRepoInput) -> DomainResult<Vec<Waybill>>;

    /// Reserve the oldest generated waybill for an order, or return the one the
    /// order already holds. Atomic per order: concurrent calls for the same
    /// order yield the same waybill.
    async fn reserve_waybill(&self, order_id: &str) -> DomainResult<Option<Waybill>>;

    /// Find the waybill currently reserved for an order
    async fn find_reserved_for_order(&self, order_id: &str) -> DomainResult<Option<Waybill>>;

    /// Get a waybill by number
    async fn get_waybill(&self, waybill: &str) -> DomainResult<Option<Waybill>>;

    /// Conditionally change status; `None` when the stored status no longer matches
    async fn transition_waybill(
        &self,
        input: TransitionWaybillRepoInput,
    ) -> DomainResult<Option<Waybill>>;

    /// List waybills, newest first
    async fn list_waybills(
        &self,
        status: Option<WaybillStatus>,
        limit: i64,
    ) -> DomainResult<Vec<Waybill>>;

    /// Count waybills per status
    async fn waybill_stats(&self) -> DomainResult<WaybillStats>;
}
