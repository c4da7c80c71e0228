use crate::domain::{
    DomainError, DomainResult, InsertWaybillsRepoInput, TransitionWaybillRepoInput, Waybill,
    WaybillRepository, WaybillSource, WaybillStats, WaybillStatus,
};
use crate::postgres::PostgresClient;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tracing::{debug, info};

const WAYBILL_COLUMNS: &str = "waybill, status, source, order_id, shipment_id, reserved_at, used_at, cancelled_at, created_at, updated_at";

/// Waybill row for PostgreSQL storage
#[derive(Debug, Clone)]
pub struct WaybillRow {
    pub waybill: String,
    pub status: String,
    pub source: String,
    pub order_id: Option<String>,
    pub shipment_id: Option<String>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub used_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Row> for WaybillRow {
    fn from(row: &Row) -> Self {
        WaybillRow {
            waybill: row.get(0),
            status: row.get(1),
            source: row.get(2),
            order_id: row.get(3),
            shipment_id: row.get(4),
            reserved_at: row.get(5),
            used_at: row.get(6),
            cancelled_at: row.get(7),
            created_at: row.get(8),
            updated_at: row.get(9),
        }
    }
}

impl TryFrom<WaybillRow> for Waybill {
    type Error = DomainError;

    fn try_from(row: WaybillRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<WaybillStatus>()
            .map_err(|e| DomainError::RepositoryError(anyhow!(e)))?;
        let source = row
            .source
            .parse::<WaybillSource>()
            .map_err(|e| DomainError::RepositoryError(anyhow!(e)))?;

        Ok(Waybill {
            waybill: row.waybill,
            status,
            source,
            order_id: row.order_id,
            shipment_id: row.shipment_id,
            reserved_at: row.reserved_at,
            used_at: row.used_at,
            cancelled_at: row.cancelled_at,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        })
    }
}

fn rows_to_waybills(rows: &[Row]) -> DomainResult<Vec<Waybill>> {
    rows.iter()
        .map(|row| Waybill::try_from(WaybillRow::from(row)))
        .collect()
}

#[derive(Clone)]
pub struct PostgresWaybillRepository {
    client: PostgresClient,
}

impl PostgresWaybillRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WaybillRepository for PostgresWaybillRepository {
    async fn insert_waybills(&self, input: InsertWaybillsRepoInput) -> DomainResult<Vec<Waybill>> {
        debug!(count = input.waybills.len(), source = %input.source, "Inserting waybills");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();
        let source = input.source.as_str();
        let status = input.status.as_str();

        let query = format!(
            "INSERT INTO waybills (waybill, status, source, created_at, updated_at)
             SELECT DISTINCT w, $2::text, $3::text, $4::timestamptz, $4::timestamptz FROM unnest($1::text[]) AS w
             ON CONFLICT (waybill) DO NOTHING
             RETURNING {}",
            WAYBILL_COLUMNS
        );

        let rows = conn
            .query(&query, &[&input.waybills, &status, &source, &now])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let inserted = rows_to_waybills(&rows)?;
        info!(
            requested = input.waybills.len(),
            inserted = inserted.len(),
            "Waybills inserted"
        );
        Ok(inserted)
    }

    async fn reserve_waybill(&self, order_id: &str) -> DomainResult<Option<Waybill>> {
        debug!(order_id = %order_id, "Reserving waybill");

        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        // serializes reservations per order until commit
        tx.execute("SELECT pg_advisory_xact_lock(hashtext($1))", &[&order_id])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let existing_query = format!(
            "SELECT {} FROM waybills
             WHERE order_id = $1 AND status = 'reserved'
             LIMIT 1",
            WAYBILL_COLUMNS
        );
        let existing = tx
            .query_opt(&existing_query, &[&order_id])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;
        if let Some(row) = existing {
            let waybill = Waybill::try_from(WaybillRow::from(&row))?;
            tx.commit()
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?;
            debug!(waybill = %waybill.waybill, "Order already holds a reservation");
            return Ok(Some(waybill));
        }

        let now = Utc::now();

        // SKIP LOCKED keeps concurrent reservations from picking the same row
        let reserve_query = format!(
            "WITH candidate AS (
                 SELECT waybill FROM waybills
                 WHERE status = 'generated'
                 ORDER BY created_at, waybill
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             UPDATE waybills w
             SET status = 'reserved', order_id = $1, reserved_at = $2, updated_at = $2
             FROM candidate
             WHERE w.waybill = candidate.waybill
             RETURNING {}",
            WAYBILL_COLUMNS
                .split(", ")
                .map(|c| format!("w.{}", c))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let row = tx
            .query_opt(&reserve_query, &[&order_id, &now])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let waybill = row
            .map(|row| Waybill::try_from(WaybillRow::from(&row)))
            .transpose()?;
        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if let Some(ref w) = waybill {
            info!(waybill = %w.waybill, order_id = %order_id, "Waybill reserved");
        }
        Ok(waybill)
    }

    async fn find_reserved_for_order(&self, order_id: &str) -> DomainResult<Option<Waybill>> {
        debug!(order_id = %order_id, "Looking up reserved waybill for order");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!(
            "SELECT {} FROM waybills
             WHERE order_id = $1 AND status = 'reserved'
             ORDER BY reserved_at DESC
             LIMIT 1",
            WAYBILL_COLUMNS
        );

        let row = conn
            .query_opt(&query, &[&order_id])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.map(|row| Waybill::try_from(WaybillRow::from(&row)))
            .transpose()
    }

    async fn get_waybill(&self, waybill: &str) -> DomainResult<Option<Waybill>> {
        debug!(waybill = %waybill, "Getting waybill from database");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!("SELECT {} FROM waybills WHERE waybill = $1", WAYBILL_COLUMNS);

        let row = conn
            .query_opt(&query, &[&waybill])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.map(|row| Waybill::try_from(WaybillRow::from(&row)))
            .transpose()
    }

    async fn transition_waybill(
        &self,
        input: TransitionWaybillRepoInput,
    ) -> DomainResult<Option<Waybill>> {
        debug!(
            waybill = %input.waybill,
            from = %input.from,
            to = %input.to,
            "Transitioning waybill"
        );

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();
        let to = input.to.as_str();
        let from = input.from.as_str();

        let query = format!(
            "UPDATE waybills SET
                 status = $1::text,
                 order_id = COALESCE($2, order_id),
                 shipment_id = COALESCE($3, shipment_id),
                 reserved_at = CASE WHEN $1::text = 'reserved' THEN $4 ELSE reserved_at END,
                 used_at = CASE WHEN $1::text = 'used' THEN $4 ELSE used_at END,
                 cancelled_at = CASE WHEN $1::text = 'cancelled' THEN $4 ELSE cancelled_at END,
                 updated_at = $4
             WHERE waybill = $5 AND status = $6::text
             RETURNING {}",
            WAYBILL_COLUMNS
        );

        let row = conn
            .query_opt(
                &query,
                &[
                    &to,
                    &input.order_id,
                    &input.shipment_id,
                    &now,
                    &input.waybill,
                    &from,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let waybill = row
            .map(|row| Waybill::try_from(WaybillRow::from(&row)))
            .transpose()?;

        match &waybill {
            Some(w) => info!(waybill = %w.waybill, status = %w.status, "Waybill transitioned"),
            None => debug!(waybill = %input.waybill, "Waybill status changed concurrently"),
        }
        Ok(waybill)
    }

    async fn list_waybills(
        &self,
        status: Option<WaybillStatus>,
        limit: i64,
    ) -> DomainResult<Vec<Waybill>> {
        debug!(status = ?status, limit, "Listing waybills from database");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let status = status.map(|s| s.as_str());
        let query = format!(
            "SELECT {} FROM waybills
             WHERE ($1::text IS NULL OR status = $1::text)
             ORDER BY created_at DESC, waybill
             LIMIT $2",
            WAYBILL_COLUMNS
        );

        let rows = conn
            .query(&query, &[&status, &limit])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let waybills = rows_to_waybills(&rows)?;
        info!(count = waybills.len(), "Listed waybills from database");
        Ok(waybills)
    }

    async fn waybill_stats(&self) -> DomainResult<WaybillStats> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query("SELECT status, COUNT(*) FROM waybills GROUP BY status", &[])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let mut stats = WaybillStats::default();
        for row in rows {
            let status: String = row.get(0);
            let count: i64 = row.get(1);
            let status = status
                .parse::<WaybillStatus>()
                .map_err(|e| DomainError::RepositoryError(anyhow!(e)))?;
            stats.record(status, count);
        }

        debug!(total = stats.total(), "Computed waybill stats");
        Ok(stats)
    }
}
