use axum::extract::{Path, State};
use common::domain::Shipment;
use common::http::{ApiResponse, ApiResult};
use serde::Deserialize;
use tracing::instrument;

use super::router::DispatchServices;
use super::{ApiJson, ApiQuery};
use crate::domain::CreateShipmentRequest;

#[derive(Debug, Deserialize)]
pub struct ListShipmentsQuery {
    #[serde(default)]
    pub order_id: String,
}

#[instrument(name = "CreateShipment", skip_all, fields(order_id = %request.order_id))]
pub async fn create_shipment(
    State(services): State<DispatchServices>,
    ApiJson(request): ApiJson<CreateShipmentRequest>,
) -> ApiResult<Shipment> {
    let shipment = services.shipments.create_shipment(request).await?;
    Ok(ApiResponse::ok(shipment))
}

#[instrument(name = "GetShipment", skip(services))]
pub async fn get_shipment(
    State(services): State<DispatchServices>,
    Path(id): Path<String>,
) -> ApiResult<Shipment> {
    Ok(ApiResponse::ok(services.shipments.get_shipment(&id).await?))
}

#[instrument(name = "ListShipments", skip_all, fields(order_id = %query.order_id))]
pub async fn list_shipments(
    State(services): State<DispatchServices>,
    ApiQuery(query): ApiQuery<ListShipmentsQuery>,
) -> ApiResult<Vec<Shipment>> {
    let shipments = services
        .shipments
        .list_shipments_by_order(&query.order_id)
        .await?;
    Ok(ApiResponse::ok(shipments))
}

#[instrument(name = "CancelShipment", skip(services))]
pub async fn cancel_shipment(
    State(services): State<DispatchServices>,
    Path(id): Path<String>,
) -> ApiResult<Shipment> {
    Ok(ApiResponse::ok(services.shipments.cancel_shipment(&id).await?))
}

#[cfg(test)]
mod tests {
    use crate::http::router::test_support::{send, Mocks};
    use axum::http::{Method, StatusCode};
    use common::domain::{
        CarrierPackage, CarrierShipmentResponse, Waybill, WaybillSource, WaybillStatus,
    };
    use serde_json::json;

    fn order_body() -> serde_json::Value {
        json!({
            "order_id": "ORD-7",
            "waybill": "1234567890123",
            "customer_name": "Ravi Kumar",
            "address": "4 Park Street",
            "pincode": "700016",
            "city": "Kolkata",
            "state": "West Bengal",
            "phone": "9830012345",
            "payment_mode": "COD",
            "total_amount": 2500.0
        })
    }

    #[tokio::test]
    async fn test_create_shipment_returns_waybill() {
        let mut mocks = Mocks::default();
        mocks
            .carrier
            .expect_create_shipment()
            .withf(|manifest| manifest.shipments[0].cod_amount == 2500.0)
            .return_once(|_| {
                Ok(CarrierShipmentResponse {
                    success: true,
                    upload_wbn: None,
                    packages: vec![CarrierPackage {
                        waybill: "1234567890123".to_string(),
                        status: "Success".to_string(),
                        refnum: Some("ORD-7".to_string()),
                        remarks: vec![],
                    }],
                    remarks: None,
                    raw: json!({"success": true}),
                })
            });
        mocks.shipments.expect_create_shipment().returning(|s| Ok(s));
        // inventory bookkeeping failure does not fail the request
        mocks
            .waybills
            .expect_get_waybill()
            .times(3)
            .returning(|_| Ok(None));
        mocks.waybills.expect_insert_waybills().return_once(|_| Ok(vec![]));

        let (response, body) = send(
            mocks.router(None),
            Method::POST,
            "/api/shipments",
            Some(order_body()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body["data"]["waybill"], "1234567890123");
        assert_eq!(body["data"]["status"], "created");
    }

    #[tokio::test]
    async fn test_create_shipment_rejected_is_422() {
        let mut mocks = Mocks::default();
        mocks.carrier.expect_create_shipment().return_once(|_| {
            Ok(CarrierShipmentResponse {
                success: false,
                upload_wbn: None,
                packages: vec![],
                remarks: Some("Non serviceable pincode".to_string()),
                raw: json!({"success": false}),
            })
        });
        mocks.shipments.expect_create_shipment().returning(|s| Ok(s));

        let (response, body) = send(
            mocks.router(None),
            Method::POST,
            "/api/shipments",
            Some(order_body()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("Non serviceable pincode"));
    }

    #[tokio::test]
    async fn test_create_with_cancelled_waybill_is_conflict() {
        let mut mocks = Mocks::default();
        mocks.waybills.expect_get_waybill().return_once(|_| {
            Ok(Some(Waybill {
                waybill: "1234567890123".to_string(),
                status: WaybillStatus::Cancelled,
                source: WaybillSource::DelhiveryBulk,
                order_id: None,
                shipment_id: None,
                reserved_at: None,
                used_at: None,
                cancelled_at: None,
                created_at: None,
                updated_at: None,
            }))
        });
        mocks.carrier.expect_create_shipment().times(0);

        let (response, body) = send(
            mocks.router(None),
            Method::POST,
            "/api/shipments",
            Some(order_body()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_list_requires_order_id() {
        let (response, _) = send(
            Mocks::default().router(None),
            Method::GET,
            "/api/shipments",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_by_order() {
        let mut mocks = Mocks::default();
        mocks
            .shipments
            .expect_list_shipments_by_order()
            .withf(|order| order == "ORD-7")
            .return_once(|_| Ok(vec![]));

        let (response, body) = send(
            mocks.router(None),
            Method::GET,
            "/api/shipments?order_id=ORD-7",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body["data"], json!([]));
    }
}
