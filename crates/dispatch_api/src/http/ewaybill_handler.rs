use axum::extract::{Path, State};
use common::http::{ApiResponse, ApiResult};
use tracing::instrument;

use super::router::DispatchServices;
use super::ApiJson;
use crate::domain::{EwaybillView, UpdateEwaybillRequest};

#[instrument(name = "UpdateEwaybill", skip(services, request))]
pub async fn update_ewaybill(
    State(services): State<DispatchServices>,
    Path(waybill): Path<String>,
    ApiJson(mut request): ApiJson<UpdateEwaybillRequest>,
) -> ApiResult<EwaybillView> {
    request.waybill = waybill;
    Ok(ApiResponse::ok(
        services.ewaybills.update_ewaybill(request).await?,
    ))
}

#[instrument(name = "GetEwaybill", skip(services))]
pub async fn get_ewaybill(
    State(services): State<DispatchServices>,
    Path(waybill): Path<String>,
) -> ApiResult<EwaybillView> {
    Ok(ApiResponse::ok(services.ewaybills.get_ewaybill(&waybill).await?))
}
