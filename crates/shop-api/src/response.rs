//! # Response Envelope
//!
//! The uniform JSON envelope used by every endpoint, and the error type
//! all handlers reject with. Nothing is allowed to crash the process:
//! every `ShopError` maps to an envelope with the matching status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use shop_core::ShopError;

/// Uniform response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Success envelope with data
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
            count: None,
            total: None,
            page: None,
            pages: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_paging(mut self, total: u64, page: u32, pages: u32) -> Self {
        self.total = Some(total);
        self.page = Some(page);
        self.pages = Some(pages);
        self
    }
}

impl ApiResponse<()> {
    /// Failure envelope (no data)
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            error: None,
            count: None,
            total: None,
            page: None,
            pages: None,
        }
    }
}

/// Handler rejection: status code plus failure envelope
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Extra detail, surfaced only outside production
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: None,
        }
    }

    /// Map a domain error; `expose_detail` controls whether server-side
    /// detail accompanies 5xx responses (never in production).
    pub fn from_shop(err: ShopError, expose_detail: bool) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let detail = if expose_detail && status.is_server_error() {
            Some(format!("{err:?}"))
        } else {
            None
        };
        Self {
            status,
            message: err.to_string(),
            detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = ApiResponse::failure(self.message);
        body.error = self.detail;
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_skips_empty_fields() {
        let envelope = ApiResponse::ok(json!({"id": "ord_1"}));
        let rendered = serde_json::to_value(&envelope).unwrap();
        assert_eq!(rendered["success"], json!(true));
        assert!(rendered.get("message").is_none());
        assert!(rendered.get("total").is_none());
    }

    #[test]
    fn test_envelope_paging_fields() {
        let envelope = ApiResponse::ok(json!([]))
            .with_count(2)
            .with_paging(10, 1, 5);
        let rendered = serde_json::to_value(&envelope).unwrap();
        assert_eq!(rendered["count"], json!(2));
        assert_eq!(rendered["pages"], json!(5));
    }

    #[test]
    fn test_error_mapping_hides_detail_in_production() {
        let err = ApiError::from_shop(ShopError::Internal("boom".into()), false);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.detail.is_none());

        let err = ApiError::from_shop(ShopError::Internal("boom".into()), true);
        assert!(err.detail.is_some());

        // Client errors never carry detail
        let err = ApiError::from_shop(ShopError::Validation("bad".into()), true);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.detail.is_none());
    }
}
