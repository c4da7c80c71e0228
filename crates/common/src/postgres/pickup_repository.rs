use crate::domain::{DomainError, DomainResult, PickupRepository, PickupRequest, PickupStatus};
use crate::postgres::PostgresClient;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use tokio_postgres::Row;
use tracing::{debug, info};

const PICKUP_COLUMNS: &str = "id, carrier_pickup_id, pickup_date, pickup_time, pickup_location, expected_package_count, waybills, status, carrier_response, created_at, updated_at";

fn row_to_pickup(row: &Row) -> DomainResult<PickupRequest> {
    let status: String = row.get(7);
    let status = status
        .parse::<PickupStatus>()
        .map_err(|e| DomainError::RepositoryError(anyhow!(e)))?;

    Ok(PickupRequest {
        id: row.get(0),
        carrier_pickup_id: row.get(1),
        pickup_date: row.get(2),
        pickup_time: row.get(3),
        pickup_location: row.get(4),
        expected_package_count: row.get(5),
        waybills: row.get(6),
        status,
        carrier_response: row.get(8),
        created_at: Some(row.get(9)),
        updated_at: Some(row.get(10)),
    })
}

#[derive(Clone)]
pub struct PostgresPickupRepository {
    client: PostgresClient,
}

impl PostgresPickupRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PickupRepository for PostgresPickupRepository {
    async fn create_pickup(&self, pickup: PickupRequest) -> DomainResult<PickupRequest> {
        debug!(pickup_id = %pickup.id, location = %pickup.pickup_location, "Creating pickup request");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();
        let status = pickup.status.as_str();
        let query = format!(
            "INSERT INTO pickup_requests ({cols})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
             RETURNING {cols}",
            cols = PICKUP_COLUMNS
        );

        let row = conn
            .query_one(
                &query,
                &[
                    &pickup.id,
                    &pickup.carrier_pickup_id,
                    &pickup.pickup_date,
                    &pickup.pickup_time,
                    &pickup.pickup_location,
                    &pickup.expected_package_count,
                    &pickup.waybills,
                    &status,
                    &pickup.carrier_response,
                    &now,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let stored = row_to_pickup(&row)?;
        info!(pickup_id = %stored.id, status = %stored.status, "Pickup request stored");
        Ok(stored)
    }

    async fn get_pickup(&self, id: &str) -> DomainResult<Option<PickupRequest>> {
        debug!(pickup_id = %id, "Getting pickup request from database");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!("SELECT {} FROM pickup_requests WHERE id = $1", PICKUP_COLUMNS);
        let row = conn
            .query_opt(&query, &[&id])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.as_ref().map(row_to_pickup).transpose()
    }

    async fn list_pickups(&self, limit: i64) -> DomainResult<Vec<PickupRequest>> {
        debug!(limit, "Listing pickup requests from database");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!(
            "SELECT {} FROM pickup_requests ORDER BY created_at DESC LIMIT $1",
            PICKUP_COLUMNS
        );
        let rows = conn
            .query(&query, &[&limit])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let pickups = rows
            .iter()
            .map(row_to_pickup)
            .collect::<DomainResult<Vec<_>>>()?;

        info!(count = pickups.len(), "Listed pickup requests from database");
        Ok(pickups)
    }
}
