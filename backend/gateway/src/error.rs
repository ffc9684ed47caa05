//! Broker and capture errors as HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::error;

use armdeck_core::BrokerError;
use armdeck_devices::CaptureError;

/// A handler failure, carrying the status code it should surface as.
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        let status = match &err {
            BrokerError::Configuration(_) => StatusCode::BAD_REQUEST,
            BrokerError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            BrokerError::ResourceBusy { .. } | BrokerError::InvalidState { .. } => {
                StatusCode::CONFLICT
            }
            BrokerError::Spawn { .. } | BrokerError::Write(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(error = %err, "broker operation failed");
        }
        Self::new(status, err.to_string())
    }
}

impl From<CaptureError> for ApiError {
    fn from(err: CaptureError) -> Self {
        let status = match &err {
            CaptureError::Unavailable { .. } => StatusCode::NOT_FOUND,
            CaptureError::Open { .. } | CaptureError::Release { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(error = %err, "capture operation failed");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn broker_errors_map_to_expected_codes() {
        let cases: Vec<(BrokerError, StatusCode)> = vec![
            (
                BrokerError::configuration("missing port"),
                StatusCode::BAD_REQUEST,
            ),
            (
                BrokerError::SessionNotFound(Uuid::new_v4()),
                StatusCode::NOT_FOUND,
            ),
            (
                BrokerError::ResourceBusy {
                    resource: "/dev/ttyUSB0".into(),
                    holder: Uuid::new_v4(),
                },
                StatusCode::CONFLICT,
            ),
            (
                BrokerError::Write("pipe closed".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status, expected);
        }
    }

    #[test]
    fn missing_device_is_not_found() {
        let api: ApiError = CaptureError::Unavailable {
            index: 3,
            reason: "gone".into(),
        }
        .into();
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert!(api.message.contains("3"));
    }
}
