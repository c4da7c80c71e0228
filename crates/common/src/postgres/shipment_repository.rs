use crate::domain::{DomainError, DomainResult, Shipment, ShipmentRepository, ShipmentStatus};
use crate::postgres::PostgresClient;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use tokio_postgres::Row;
use tracing::{debug, info};

const SHIPMENT_COLUMNS: &str =
    "id, order_id, vendor_id, waybill, status, request, carrier_response, created_at, updated_at";

fn row_to_shipment(row: &Row) -> DomainResult<Shipment> {
    let status: String = row.get(4);
    let status = status
        .parse::<ShipmentStatus>()
        .map_err(|e| DomainError::RepositoryError(anyhow!(e)))?;

    Ok(Shipment {
        id: row.get(0),
        order_id: row.get(1),
        vendor_id: row.get(2),
        waybill: row.get(3),
        status,
        request: row.get(5),
        carrier_response: row.get(6),
        created_at: Some(row.get(7)),
        updated_at: Some(row.get(8)),
    })
}

#[derive(Clone)]
pub struct PostgresShipmentRepository {
    client: PostgresClient,
}

impl PostgresShipmentRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ShipmentRepository for PostgresShipmentRepository {
    async fn create_shipment(&self, shipment: Shipment) -> DomainResult<Shipment> {
        debug!(shipment_id = %shipment.id, order_id = %shipment.order_id, "Creating shipment in database");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();
        let status = shipment.status.as_str();

        let query = format!(
            "INSERT INTO shipments (id, order_id, vendor_id, waybill, status, request, carrier_response, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING {}",
            SHIPMENT_COLUMNS
        );

        let row = conn
            .query_one(
                &query,
                &[
                    &shipment.id,
                    &shipment.order_id,
                    &shipment.vendor_id,
                    &shipment.waybill,
                    &status,
                    &shipment.request,
                    &shipment.carrier_response,
                    &now,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let created = row_to_shipment(&row)?;
        info!(shipment_id = %created.id, status = %created.status, "Shipment stored");
        Ok(created)
    }

    async fn get_shipment(&self, id: &str) -> DomainResult<Option<Shipment>> {
        debug!(shipment_id = %id, "Getting shipment from database");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!("SELECT {} FROM shipments WHERE id = $1", SHIPMENT_COLUMNS);
        let row = conn
            .query_opt(&query, &[&id])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.as_ref().map(row_to_shipment).transpose()
    }

    async fn list_shipments_by_order(&self, order_id: &str) -> DomainResult<Vec<Shipment>> {
        debug!(order_id = %order_id, "Listing shipments for order");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!(
            "SELECT {} FROM shipments WHERE order_id = $1 ORDER BY created_at DESC",
            SHIPMENT_COLUMNS
        );
        let rows = conn
            .query(&query, &[&order_id])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let shipments = rows
            .iter()
            .map(row_to_shipment)
            .collect::<DomainResult<Vec<_>>>()?;

        info!(count = shipments.len(), "Listed shipments from database");
        Ok(shipments)
    }

    async fn update_shipment_status(
        &self,
        id: &str,
        status: ShipmentStatus,
    ) -> DomainResult<Shipment> {
        debug!(shipment_id = %id, status = %status, "Updating shipment status");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();
        let status = status.as_str();
        let query = format!(
            "UPDATE shipments SET status = $1, updated_at = $2 WHERE id = $3 RETURNING {}",
            SHIPMENT_COLUMNS
        );

        let row = conn
            .query_opt(&query, &[&status, &now, &id])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        match row {
            Some(row) => {
                let shipment = row_to_shipment(&row)?;
                info!(shipment_id = %shipment.id, status = %shipment.status, "Shipment status updated");
                Ok(shipment)
            }
            None => Err(DomainError::ShipmentNotFound(id.to_string())),
        }
    }
}
