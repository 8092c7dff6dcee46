//! Error taxonomy shared by the repository and handler layers.
//!
//! Repository operations fail with [`StorageError`]; handlers convert every
//! outcome into an [`ApiError`], which actix renders as a JSON body of the form
//! `{"detail": "<message>"}`.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::{error, warn};
use thiserror::Error;

/// Failure reported by a storage backend. The in-flight transaction has
/// already been rolled back when this is returned.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// Error returned to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Could not {action} {entity}: {source}")]
    Storage {
        action: &'static str,
        entity: &'static str,
        #[source]
        source: StorageError,
    },

    #[error("Failed to upload dataset: {0}")]
    Upload(String),
}

impl ApiError {
    /// Wrap a storage failure for the given operation and entity name.
    pub fn storage(action: &'static str, entity: &'static str) -> impl FnOnce(StorageError) -> Self {
        move |source| {
            error!("Storage failure during {} of {}: {}", action, entity, source);
            ApiError::Storage { action, entity, source }
        }
    }

    pub fn item_not_found() -> Self {
        ApiError::NotFound("Item not found")
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage { .. } => StatusCode::BAD_REQUEST,
            ApiError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Validation(message) = self {
            warn!("Rejected request: {}", message);
        }
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "detail": self.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Validation("bad".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::item_not_found().status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Upload("disk full".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let storage = ApiError::storage("update", "Dataset")(StorageError::Unavailable("locked".into()));
        assert_eq!(storage.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_storage_message_includes_cause() {
        let err = ApiError::storage("create", "Dataset")(StorageError::Unavailable("disk I/O error".into()));
        assert_eq!(err.to_string(), "Could not create Dataset: disk I/O error");
    }

    #[actix_web::test]
    async fn test_error_body_is_json_detail() {
        let response = ApiError::item_not_found().error_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "Item not found");
    }
}
