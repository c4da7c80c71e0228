use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{Json, Router};
use common::http::{require_api_key, ApiKeyAuth};
use serde_json::{json, Value};

use super::{
    ewaybill_handler, pickup_handler, serviceability_handler, shipment_handler, tracking_handler,
    waybill_handler,
};
use crate::domain::{
    EwaybillService, PickupService, ServiceabilityService, ShipmentService, TrackingService,
    WaybillService,
};

/// Domain services shared by every handler
#[derive(Clone)]
pub struct DispatchServices {
    pub waybills: Arc<WaybillService>,
    pub shipments: Arc<ShipmentService>,
    pub ewaybills: Arc<EwaybillService>,
    pub serviceability: Arc<ServiceabilityService>,
    pub tracking: Arc<TrackingService>,
    pub pickups: Arc<PickupService>,
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn api_routes() -> Router<DispatchServices> {
    Router::new()
        .route("/waybills", get(waybill_handler::list_waybills))
        .route("/waybills/bulk", post(waybill_handler::fetch_bulk))
        .route("/waybills/reserve", post(waybill_handler::reserve_waybill))
        .route("/waybills/stats", get(waybill_handler::waybill_stats))
        .route("/waybills/:waybill", get(waybill_handler::get_waybill))
        .route("/waybills/:waybill/use", post(waybill_handler::mark_waybill_used))
        .route("/waybills/:waybill/cancel", post(waybill_handler::cancel_waybill))
        .route(
            "/shipments",
            post(shipment_handler::create_shipment).get(shipment_handler::list_shipments),
        )
        .route("/shipments/:id", get(shipment_handler::get_shipment))
        .route("/shipments/:id/cancel", post(shipment_handler::cancel_shipment))
        .route("/tracking/:waybill", get(tracking_handler::track))
        .route("/tracking/:waybill/history", get(tracking_handler::get_history))
        .route(
            "/ewaybills/:waybill",
            get(ewaybill_handler::get_ewaybill).put(ewaybill_handler::update_ewaybill),
        )
        .route("/serviceability/:pincode", get(serviceability_handler::check))
        .route(
            "/serviceability/:pincode/cached",
            get(serviceability_handler::get_cached),
        )
        .route(
            "/pickups",
            post(pickup_handler::create_pickup).get(pickup_handler::list_pickups),
        )
        .route("/pickups/:id", get(pickup_handler::get_pickup))
}

/// Build the full router: `/healthz` is open, `/api/*` sits behind the API key check
pub fn build_dispatch_router(services: DispatchServices, auth: ApiKeyAuth) -> Router {
    let api = api_routes().route_layer(from_fn_with_state(auth, require_api_key));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api)
        .with_state(services)
}
