use chrono::Utc;
use common::domain::{
    ewaybill_expiry, is_valid_ewaybill_number, is_valid_waybill, requires_ewaybill, CarrierClient,
    DomainError, DomainResult, Ewaybill, EwaybillRepository, UpsertEwaybillRepoInput,
};
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateEwaybillRequest {
    #[garde(skip)]
    #[serde(default)]
    pub waybill: String,
    #[garde(length(min = 12, max = 12))]
    pub ewaybill_number: String,
    #[garde(length(min = 1, max = 64))]
    pub invoice_number: String,
    #[garde(range(min = 0.0))]
    pub invoice_value: f64,
}

/// Stored e-waybill with derived flags
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EwaybillView {
    #[serde(flatten)]
    pub ewaybill: Ewaybill,
    pub expired: bool,
    pub required: bool,
}

impl EwaybillView {
    fn new(ewaybill: Ewaybill) -> Self {
        let expired = ewaybill.is_expired(Utc::now());
        let required = requires_ewaybill(ewaybill.invoice_value);
        Self {
            ewaybill,
            expired,
            required,
        }
    }
}

pub struct EwaybillService {
    ewaybill_repository: Arc<dyn EwaybillRepository>,
    carrier: Arc<dyn CarrierClient>,
}

impl EwaybillService {
    pub fn new(
        ewaybill_repository: Arc<dyn EwaybillRepository>,
        carrier: Arc<dyn CarrierClient>,
    ) -> Self {
        Self {
            ewaybill_repository,
            carrier,
        }
    }

    /// Push an e-waybill to the carrier and store it with a fresh expiry
    #[instrument(skip(self, request), fields(waybill = %request.waybill, invoice_number = %request.invoice_number))]
    pub async fn update_ewaybill(&self, request: UpdateEwaybillRequest) -> DomainResult<EwaybillView> {
        if !is_valid_waybill(&request.waybill) {
            return Err(DomainError::InvalidWaybill(request.waybill));
        }
        common::garde::validate_struct(&request)?;
        if !is_valid_ewaybill_number(&request.ewaybill_number) {
            return Err(DomainError::InvalidEwaybill(request.ewaybill_number));
        }

        debug!("Sending e-waybill to carrier");
        let carrier_response = self
            .carrier
            .update_ewaybill(
                &request.waybill,
                &request.invoice_number,
                &request.ewaybill_number,
            )
            .await?;

        let generated_at = Utc::now();
        let stored = self
            .ewaybill_repository
            .upsert_ewaybill(UpsertEwaybillRepoInput {
                waybill: request.waybill,
                ewaybill_number: request.ewaybill_number,
                invoice_number: request.invoice_number,
                invoice_value: request.invoice_value,
                generated_at,
                expires_at: ewaybill_expiry(generated_at),
                carrier_response,
            })
            .await?;

        info!(expires_at = %stored.expires_at, "E-waybill updated");
        Ok(EwaybillView::new(stored))
    }

    pub async fn get_ewaybill(&self, waybill: &str) -> DomainResult<EwaybillView> {
        if !is_valid_waybill(waybill) {
            return Err(DomainError::InvalidWaybill(waybill.to_string()));
        }

        self.ewaybill_repository
            .get_ewaybill(waybill)
            .await?
            .map(EwaybillView::new)
            .ok_or_else(|| DomainError::EwaybillNotFound(waybill.to_string()))
    }
}
