use crate::domain::{DomainError, DomainResult, Serviceability, ServiceabilityRepository};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use tokio_postgres::Row;
use tracing::{debug, info};

const SERVICEABILITY_COLUMNS: &str =
    "pincode, serviceable, district, state_code, prepaid, cod, pickup, is_oda, raw, checked_at";

impl From<&Row> for Serviceability {
    fn from(row: &Row) -> Self {
        Serviceability {
            pincode: row.get(0),
            serviceable: row.get(1),
            district: row.get(2),
            state_code: row.get(3),
            prepaid: row.get(4),
            cod: row.get(5),
            pickup: row.get(6),
            is_oda: row.get(7),
            raw: row.get(8),
            checked_at: row.get(9),
        }
    }
}

#[derive(Clone)]
pub struct PostgresServiceabilityRepository {
    client: PostgresClient,
}

impl PostgresServiceabilityRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ServiceabilityRepository for PostgresServiceabilityRepository {
    async fn upsert_serviceability(&self, record: Serviceability) -> DomainResult<Serviceability> {
        debug!(pincode = %record.pincode, serviceable = record.serviceable, "Upserting serviceability");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!(
            "INSERT INTO serviceability_cache ({cols})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (pincode) DO UPDATE SET
                 serviceable = EXCLUDED.serviceable,
                 district = EXCLUDED.district,
                 state_code = EXCLUDED.state_code,
                 prepaid = EXCLUDED.prepaid,
                 cod = EXCLUDED.cod,
                 pickup = EXCLUDED.pickup,
                 is_oda = EXCLUDED.is_oda,
                 raw = EXCLUDED.raw,
                 checked_at = EXCLUDED.checked_at
             RETURNING {cols}",
            cols = SERVICEABILITY_COLUMNS
        );

        let row = conn
            .query_one(
                &query,
                &[
                    &record.pincode,
                    &record.serviceable,
                    &record.district,
                    &record.state_code,
                    &record.prepaid,
                    &record.cod,
                    &record.pickup,
                    &record.is_oda,
                    &record.raw,
                    &record.checked_at,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let stored = Serviceability::from(&row);
        info!(pincode = %stored.pincode, serviceable = stored.serviceable, "Serviceability cached");
        Ok(stored)
    }

    async fn get_serviceability(&self, pincode: &str) -> DomainResult<Option<Serviceability>> {
        debug!(pincode = %pincode, "Reading serviceability cache");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!(
            "SELECT {} FROM serviceability_cache WHERE pincode = $1",
            SERVICEABILITY_COLUMNS
        );
        let row = conn
            .query_opt(&query, &[&pincode])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.as_ref().map(Serviceability::from))
    }
}
