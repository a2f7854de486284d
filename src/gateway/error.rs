use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::pipeline::RetrievalError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<RetrievalError> for GatewayError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::InvalidRequest { reason } => GatewayError::InvalidRequest(reason),
            RetrievalError::Timeout { .. } => GatewayError::Timeout(err.to_string()),
            RetrievalError::IndexUnavailable { .. } | RetrievalError::RerankFailure { .. } => {
                GatewayError::RetrievalUnavailable(err.to_string())
            }
        }
    }
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::RetrievalUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, "Request rejected");
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}
