use axum::extract::{Path, State};
use common::domain::TrackingHistory;
use common::http::{ApiResponse, ApiResult};
use tracing::instrument;

use super::router::DispatchServices;
use crate::domain::TrackingView;

#[instrument(name = "TrackWaybill", skip(services))]
pub async fn track(
    State(services): State<DispatchServices>,
    Path(waybill): Path<String>,
) -> ApiResult<TrackingView> {
    Ok(ApiResponse::ok(services.tracking.track(&waybill).await?))
}

#[instrument(name = "GetTrackingHistory", skip(services))]
pub async fn get_history(
    State(services): State<DispatchServices>,
    Path(waybill): Path<String>,
) -> ApiResult<TrackingHistory> {
    Ok(ApiResponse::ok(services.tracking.get_history(&waybill).await?))
}
