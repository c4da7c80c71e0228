use axum::extract::{Path, State};
use common::domain::PickupRequest;
use common::http::{ApiResponse, ApiResult};
use serde::Deserialize;
use tracing::instrument;

use super::router::DispatchServices;
use super::{ApiJson, ApiQuery};
use crate::domain::{CreatePickupRequest, DEFAULT_LIST_LIMIT};

#[derive(Debug, Deserialize)]
pub struct ListPickupsQuery {
    pub limit: Option<i64>,
}

#[instrument(name = "CreatePickup", skip_all, fields(pickup_date = %request.pickup_date))]
pub async fn create_pickup(
    State(services): State<DispatchServices>,
    ApiJson(request): ApiJson<CreatePickupRequest>,
) -> ApiResult<PickupRequest> {
    Ok(ApiResponse::ok(services.pickups.create_pickup(request).await?))
}

#[instrument(name = "GetPickup", skip(services))]
pub async fn get_pickup(
    State(services): State<DispatchServices>,
    Path(id): Path<String>,
) -> ApiResult<PickupRequest> {
    Ok(ApiResponse::ok(services.pickups.get_pickup(&id).await?))
}

#[instrument(name = "ListPickups", skip_all)]
pub async fn list_pickups(
    State(services): State<DispatchServices>,
    ApiQuery(query): ApiQuery<ListPickupsQuery>,
) -> ApiResult<Vec<PickupRequest>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    Ok(ApiResponse::ok(services.pickups.list_pickups(limit).await?))
}
