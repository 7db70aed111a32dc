use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use flatfile_storage::{GatewayError, RowStoreError};
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug)]
pub struct ApiError {
    status_code: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status_code: StatusCode, message: &str) -> Self {
        Self {
            status_code,
            message: message.to_string(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            error!("API Error: {} - {}", self.status_code, self.message);
        } else {
            warn!("API Error: {} - {}", self.status_code, self.message);
        }
        (self.status_code, Json(json!({ "detail": self.message }))).into_response()
    }
}

impl From<RowStoreError> for ApiError {
    fn from(err: RowStoreError) -> Self {
        let status = match &err {
            RowStoreError::Validation(_) | RowStoreError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            RowStoreError::NotFound(_) => StatusCode::NOT_FOUND,
            RowStoreError::Conflict(_) => StatusCode::CONFLICT,
            RowStoreError::Malformed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RowStoreError::Store(GatewayError::Auth { .. }) => StatusCode::FORBIDDEN,
            RowStoreError::Store(_) | RowStoreError::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, &err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::new(err.status(), &format!("Invalid multipart upload: {}", err.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatfile_core::ValidationError;

    #[test]
    fn row_store_errors_map_to_distinct_statuses() {
        let cases = [
            (RowStoreError::Validation(ValidationError::EmptyUpdate), StatusCode::BAD_REQUEST),
            (RowStoreError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
            (RowStoreError::Conflict(3), StatusCode::CONFLICT),
            (
                RowStoreError::Store(GatewayError::Auth {
                    key: "a.csv".to_string(),
                    message: "denied".to_string(),
                }),
                StatusCode::FORBIDDEN,
            ),
            (
                RowStoreError::Store(GatewayError::Transport {
                    message: "reset".to_string(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn conflict_message_names_id() {
        let err = ApiError::from(RowStoreError::Conflict(12));
        assert_eq!(err.message, "Transaction ID 12 already exists");
    }
}
