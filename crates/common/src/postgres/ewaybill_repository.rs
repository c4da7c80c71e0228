use crate::domain::{
    DomainError, DomainResult, Ewaybill, EwaybillRepository, UpsertEwaybillRepoInput,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::Utc;
use tokio_postgres::Row;
use tracing::{debug, info};

const EWAYBILL_COLUMNS: &str = "waybill, ewaybill_number, invoice_number, invoice_value, generated_at, expires_at, carrier_response, created_at, updated_at";

impl From<&Row> for Ewaybill {
    fn from(row: &Row) -> Self {
        Ewaybill {
            waybill: row.get(0),
            ewaybill_number: row.get(1),
            invoice_number: row.get(2),
            invoice_value: row.get(3),
            generated_at: row.get(4),
            expires_at: row.get(5),
            carrier_response: row.get(6),
            created_at: Some(row.get(7)),
            updated_at: Some(row.get(8)),
        }
    }
}

#[derive(Clone)]
pub struct PostgresEwaybillRepository {
    client: PostgresClient,
}

impl PostgresEwaybillRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EwaybillRepository for PostgresEwaybillRepository {
    async fn upsert_ewaybill(&self, input: UpsertEwaybillRepoInput) -> DomainResult<Ewaybill> {
        debug!(waybill = %input.waybill, "Upserting e-waybill");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();
        let query = format!(
            "INSERT INTO ewaybills (waybill, ewaybill_number, invoice_number, invoice_value, generated_at, expires_at, carrier_response, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             ON CONFLICT (waybill) DO UPDATE SET
                 ewaybill_number = EXCLUDED.ewaybill_number,
                 invoice_number = EXCLUDED.invoice_number,
                 invoice_value = EXCLUDED.invoice_value,
                 generated_at = EXCLUDED.generated_at,
                 expires_at = EXCLUDED.expires_at,
                 carrier_response = EXCLUDED.carrier_response,
                 updated_at = EXCLUDED.updated_at
             RETURNING {}",
            EWAYBILL_COLUMNS
        );

        let row = conn
            .query_one(
                &query,
                &[
                    &input.waybill,
                    &input.ewaybill_number,
                    &input.invoice_number,
                    &input.invoice_value,
                    &input.generated_at,
                    &input.expires_at,
                    &input.carrier_response,
                    &now,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let ewaybill = Ewaybill::from(&row);
        info!(waybill = %ewaybill.waybill, expires_at = %ewaybill.expires_at, "E-waybill stored");
        Ok(ewaybill)
    }

    async fn get_ewaybill(&self, waybill: &str) -> DomainResult<Option<Ewaybill>> {
        debug!(waybill = %waybill, "Getting e-waybill from database");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!("SELECT {} FROM ewaybills WHERE waybill = $1", EWAYBILL_COLUMNS);
        let row = conn
            .query_opt(&query, &[&waybill])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.as_ref().map(Ewaybill::from))
    }
}
