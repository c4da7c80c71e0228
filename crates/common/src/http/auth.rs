use crate::http::ApiError;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

/// Admin API key guarding `/api/*`; `None` disables the check
#[derive(Clone, Debug, Default)]
pub struct ApiKeyAuth {
    api_key: Option<String>,
}

impl ApiKeyAuth {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    fn accepts(&self, authorization: Option<&str>) -> bool {
        let Some(expected) = &self.api_key else {
            return true;
        };
        authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim() == expected)
            .unwrap_or(false)
    }
}

/// Axum middleware rejecting requests without `Authorization: Bearer <key>`
pub async fn require_api_key(
    State(auth): State<ApiKeyAuth>,
    request: Request,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if !auth.accepts(authorization) {
        warn!(path = %request.uri().path(), "Rejected request without valid API key");
        return ApiError::unauthorized().into_response();
    }

    next.run(request).await
}
