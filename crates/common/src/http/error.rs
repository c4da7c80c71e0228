use crate::domain::{CarrierError, DomainError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

/// Success envelope shared by every JSON endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// HTTP status for a domain error
pub fn domain_error_status(error: &DomainError) -> StatusCode {
    match error {
        DomainError::WaybillNotFound(_)
        | DomainError::ShipmentNotFound(_)
        | DomainError::EwaybillNotFound(_)
        | DomainError::ServiceabilityNotFound(_)
        | DomainError::TrackingNotFound(_)
        | DomainError::PickupNotFound(_) => StatusCode::NOT_FOUND,

        DomainError::InvalidWaybill(_)
        | DomainError::InvalidOrder(_)
        | DomainError::InvalidEwaybill(_)
        | DomainError::InvalidPincode(_)
        | DomainError::InvalidPickup(_)
        | DomainError::ValidationError(_) => StatusCode::BAD_REQUEST,

        DomainError::InvalidWaybillTransition { .. }
        | DomainError::WaybillInventoryExhausted
        | DomainError::ShipmentAlreadyCancelled(_) => StatusCode::CONFLICT,

        DomainError::CarrierRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,

        DomainError::Carrier(_) => StatusCode::BAD_GATEWAY,

        DomainError::RepositoryError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn public_message(error: &DomainError) -> String {
    match error {
        DomainError::Carrier(CarrierError::Unauthorized(_)) => {
            "Carrier rejected the configured API token".to_string()
        }
        DomainError::RepositoryError(_) => "Internal error".to_string(),
        other => other.to_string(),
    }
}

/// Error returned from HTTP handlers; renders as `{"success": false, "message": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        let status = domain_error_status(&error);
        if status.is_server_error() {
            error!(status = status.as_u16(), error = ?error, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %error, "Request rejected");
        }
        Self::new(status, public_message(&error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}
