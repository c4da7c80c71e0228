use axum::extract::{Path, State};
use common::domain::Serviceability;
use common::http::{ApiResponse, ApiResult};
use serde::Deserialize;
use tracing::instrument;

use super::router::DispatchServices;
use super::ApiQuery;
use crate::domain::ServiceabilityView;

#[derive(Debug, Default, Deserialize)]
pub struct CheckQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[instrument(name = "CheckServiceability", skip(services, query), fields(refresh = query.refresh))]
pub async fn check(
    State(services): State<DispatchServices>,
    Path(pincode): Path<String>,
    ApiQuery(query): ApiQuery<CheckQuery>,
) -> ApiResult<ServiceabilityView> {
    let view = services
        .serviceability
        .check(&pincode, query.refresh)
        .await?;
    Ok(ApiResponse::ok(view))
}

#[instrument(name = "GetCachedServiceability", skip(services))]
pub async fn get_cached(
    State(services): State<DispatchServices>,
    Path(pincode): Path<String>,
) -> ApiResult<Serviceability> {
    Ok(ApiResponse::ok(
        services.serviceability.get_cached(&pincode).await?,
    ))
}
