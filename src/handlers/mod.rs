//! 핸들러 모듈

pub mod health;
pub mod presence;
pub mod signal;

pub use health::*;
pub use presence::*;
pub use signal::*;

use crate::error::AppResult;
use axum::body::Bytes;
use serde::de::DeserializeOwned;

/// 요청 본문을 JSON으로 해석한다.
///
/// `Content-Type`은 보지 않는다. 브라우저는 preflight를 피하려고
/// `text/plain`으로 JSON을 보내기도 한다.
pub(crate) fn decode_body<T: DeserializeOwned>(body: &Bytes) -> AppResult<T> {
    Ok(serde_json::from_slice(body)?)
}
