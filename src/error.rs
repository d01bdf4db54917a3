//! 애플리케이션 에러 및 HTTP 응답 변환

use crate::store::StoreError;
use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// 요청 처리 에러
///
/// 클라이언트가 `code`로 분기할 수 있도록 부류별로 구분된다.
#[derive(Debug, Error)]
pub enum AppError {
    /// 잘못된 입력. 재시도해도 결과는 같다.
    #[error("{0}")]
    Validation(String),

    /// 없는 방, 만료된 방
    #[error("{0}")]
    NotFound(String),

    /// 엄격 모드에서만 발생
    #[error("{0}")]
    Conflict(String),

    #[error("Request body too large")]
    TooLarge,

    /// 일시적 장애. 클라이언트는 다음 heartbeat/poll 주기에 재시도한다.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::TooLarge => "too_large",
            Self::Storage(_) => "storage",
        }
    }

    fn body(&self) -> Value {
        match self {
            Self::NotFound(msg) => json!({ "error": msg, "code": self.code(), "data": null }),
            Self::Storage(_) => json!({
                "error": "Storage unavailable, retry later",
                "code": self.code(),
            }),
            Self::Validation(_) | Self::Conflict(_) | Self::TooLarge => {
                json!({ "error": self.to_string(), "code": self.code() })
            }
        }
    }
}

/// 본문 크기 초과만 413으로 유지하고 나머지는 검증 에러로 취급한다.
impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::TooLarge
        } else {
            Self::Validation(rejection.body_text())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("Invalid request body: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            Self::Storage(err) => tracing::error!(error = %err, "Storage fault"),
            other => tracing::debug!(code = other.code(), error = %other, "Request rejected"),
        }
        (self.status_code(), Json(self.body())).into_response()
    }
}
