use axum::extract::{Path, State};
use common::domain::{Waybill, WaybillStats, WaybillStatus};
use common::http::{ApiResponse, ApiResult};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::router::DispatchServices;
use super::{ApiJson, ApiQuery};
use crate::domain::{
    FetchBulkWaybillsRequest, ListWaybillsRequest, MarkWaybillUsedRequest, ReserveWaybillRequest,
    DEFAULT_LIST_LIMIT,
};

#[derive(Debug, Deserialize)]
pub struct ListWaybillsQuery {
    pub status: Option<WaybillStatus>,
    pub limit: Option<i64>,
}

#[instrument(name = "FetchBulkWaybills", skip_all, fields(count = request.count))]
pub async fn fetch_bulk(
    State(services): State<DispatchServices>,
    ApiJson(request): ApiJson<FetchBulkWaybillsRequest>,
) -> ApiResult<Vec<Waybill>> {
    let inserted = services.waybills.fetch_bulk(request).await?;
    Ok(ApiResponse::ok(inserted))
}

#[instrument(name = "ReserveWaybill", skip_all, fields(order_id = %request.order_id))]
pub async fn reserve_waybill(
    State(services): State<DispatchServices>,
    ApiJson(request): ApiJson<ReserveWaybillRequest>,
) -> ApiResult<Waybill> {
    let waybill = services.waybills.reserve(request).await?;
    Ok(ApiResponse::ok(waybill))
}

#[instrument(name = "ListWaybills", skip_all)]
pub async fn list_waybills(
    State(services): State<DispatchServices>,
    ApiQuery(query): ApiQuery<ListWaybillsQuery>,
) -> ApiResult<Vec<Waybill>> {
    let waybills = services
        .waybills
        .list(ListWaybillsRequest {
            status: query.status,
            limit: query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
        })
        .await?;
    Ok(ApiResponse::ok(waybills))
}

#[instrument(name = "WaybillStats", skip_all)]
pub async fn waybill_stats(State(services): State<DispatchServices>) -> ApiResult<WaybillStats> {
    let stats = services.waybills.stats().await?;
    debug!(total = stats.total(), "Waybill stats");
    Ok(ApiResponse::ok(stats))
}

#[instrument(name = "GetWaybill", skip(services))]
pub async fn get_waybill(
    State(services): State<DispatchServices>,
    Path(waybill): Path<String>,
) -> ApiResult<Waybill> {
    Ok(ApiResponse::ok(services.waybills.get(&waybill).await?))
}

#[instrument(name = "MarkWaybillUsed", skip(services, request))]
pub async fn mark_waybill_used(
    State(services): State<DispatchServices>,
    Path(waybill): Path<String>,
    ApiJson(mut request): ApiJson<MarkWaybillUsedRequest>,
) -> ApiResult<Waybill> {
    request.waybill = waybill;
    Ok(ApiResponse::ok(services.waybills.mark_used(request).await?))
}

#[instrument(name = "CancelWaybill", skip(services))]
pub async fn cancel_waybill(
    State(services): State<DispatchServices>,
    Path(waybill): Path<String>,
) -> ApiResult<Waybill> {
    Ok(ApiResponse::ok(services.waybills.cancel(&waybill).await?))
}
