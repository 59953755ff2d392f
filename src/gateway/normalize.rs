//! 响应规范化
//!
//! 把上游（抽取服务或网关）的状态码 + 响应体统一映射为
//! `ExtractionResult` 或 `ExtractionError`。ExtractionClient 与网关共用这一套映射。

use crate::error::ExtractionError;
use crate::infrastructure::transport::{TransportError, TransportResponse};
use crate::models::invoice::ExtractionResult;
use crate::utils::logging::truncate_text;
use axum::http::StatusCode;
use serde_json::{json, Value as JsonValue};

/// 错误消息在日志和失败原因中的最大长度
const MAX_MESSAGE_CHARS: usize = 300;

/// 规范化一次上游响应
pub fn normalize_response(
    response: &TransportResponse,
) -> Result<ExtractionResult, ExtractionError> {
    if !response.is_success() {
        return Err(normalize_failure(response));
    }

    let value: JsonValue =
        serde_json::from_str(&response.body).map_err(|e| ExtractionError::UpstreamMalformed {
            missing: Vec::new(),
            detail: format!("响应不是合法 JSON: {}", e),
        })?;

    ExtractionResult::from_json(value)
}

/// 非 2xx 响应的映射
///
/// 网关返回的带 `error` 标签的响应体会被原样还原；
/// 其它响应一律视为 `UpstreamRejected`，并尽量取出可读的错误信息。
fn normalize_failure(response: &TransportResponse) -> ExtractionError {
    let value = serde_json::from_str::<JsonValue>(&response.body).ok();

    if let Some(value) = &value {
        if value.get("error").is_some() {
            if let Ok(err) = serde_json::from_value::<ExtractionError>(value.clone()) {
                return err;
            }
        }
    }

    let message = value
        .as_ref()
        .and_then(readable_message)
        .unwrap_or_else(|| response.body.trim().to_string());

    ExtractionError::UpstreamRejected {
        status: response.status,
        message: truncate_text(&message, MAX_MESSAGE_CHARS),
    }
}

/// 从常见错误响应格式中取出消息：`{"detail": ...}` / `{"message": ...}` / `{"error": "..."}`
fn readable_message(value: &JsonValue) -> Option<String> {
    ["detail", "message", "error"]
        .iter()
        .filter_map(|key| value.get(*key))
        .find_map(|v| match v {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Null => None,
            other => Some(other.to_string()),
        })
}

/// 传输层错误一律视为上游不可用（超时与连接失败同等对待）
pub fn transport_failure(err: TransportError) -> ExtractionError {
    ExtractionError::UpstreamUnavailable {
        reason: err.to_string(),
    }
}

/// 网关对外返回的状态码
pub fn status_for(err: &ExtractionError) -> StatusCode {
    match err {
        ExtractionError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ExtractionError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ExtractionError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
        ExtractionError::UpstreamMalformed { .. } => StatusCode::BAD_GATEWAY,
        ExtractionError::UpstreamRejected { .. } => StatusCode::BAD_GATEWAY,
        ExtractionError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// 网关错误响应体：带标签的错误字段 + 可读描述
pub fn error_body(err: &ExtractionError) -> JsonValue {
    let mut body = serde_json::to_value(err).unwrap_or_else(|_| json!({}));
    if let Some(object) = body.as_object_mut() {
        object.insert("description".to_string(), JsonValue::String(err.to_string()));
    }
    body
}
