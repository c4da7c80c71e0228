use crate::domain::{DomainError, DomainResult, ScanEvent, TrackingHistory, TrackingRepository};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use tokio_postgres::Row;
use tracing::{debug, info};

const TRACKING_COLUMNS: &str =
    "waybill, current_status, current_location, status_updated_at, scans, last_synced_at";

fn row_to_tracking(row: &Row) -> DomainResult<TrackingHistory> {
    let scans: serde_json::Value = row.get(4);
    let scans: Vec<ScanEvent> =
        serde_json::from_value(scans).map_err(|e| DomainError::RepositoryError(e.into()))?;

    Ok(TrackingHistory {
        waybill: row.get(0),
        current_status: row.get(1),
        current_location: row.get(2),
        status_updated_at: row.get(3),
        scans,
        last_synced_at: row.get(5),
    })
}

#[derive(Clone)]
pub struct PostgresTrackingRepository {
    client: PostgresClient,
}

impl PostgresTrackingRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TrackingRepository for PostgresTrackingRepository {
    async fn upsert_tracking(&self, history: TrackingHistory) -> DomainResult<TrackingHistory> {
        debug!(waybill = %history.waybill, scans = history.scans.len(), "Upserting tracking history");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let scans =
            serde_json::to_value(&history.scans).map_err(|e| DomainError::RepositoryError(e.into()))?;

        let query = format!(
            "INSERT INTO tracking_history ({cols})
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (waybill) DO UPDATE SET
                 current_status = EXCLUDED.current_status,
                 current_location = EXCLUDED.current_location,
                 status_updated_at = EXCLUDED.status_updated_at,
                 scans = EXCLUDED.scans,
                 last_synced_at = EXCLUDED.last_synced_at
             RETURNING {cols}",
            cols = TRACKING_COLUMNS
        );

        let row = conn
            .query_one(
                &query,
                &[
                    &history.waybill,
                    &history.current_status,
                    &history.current_location,
                    &history.status_updated_at,
                    &scans,
                    &history.last_synced_at,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let stored = row_to_tracking(&row)?;
        info!(waybill = %stored.waybill, status = ?stored.current_status, "Tracking history stored");
        Ok(stored)
    }

    async fn get_tracking(&self, waybill: &str) -> DomainResult<Option<TrackingHistory>> {
        debug!(waybill = %waybill, "Getting tracking history from database");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!(
            "SELECT {} FROM tracking_history WHERE waybill = $1",
            TRACKING_COLUMNS
        );
        let row = conn
            .query_opt(&query, &[&waybill])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.as_ref().map(row_to_tracking).transpose()
    }
}
