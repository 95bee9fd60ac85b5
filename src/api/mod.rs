pub mod search;
pub mod server;

use axum::{
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use notehub_backend::audit::Actor;
use notehub_backend::error::SearchError;

/// Header carrying the administrator id set by the upstream auth layer / 管理员身份头
pub const ADMIN_ID_HEADER: &str = "x-admin-id";

pub type ApiError = (StatusCode, Json<Value>);

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "success".to_string(),
            data: Some(data),
        }
    }
}

/// Map a core error to an HTTP response / 错误转 HTTP 响应
pub fn error_response(e: SearchError) -> ApiError {
    let status = match &e {
        SearchError::Validation(_) => StatusCode::BAD_REQUEST,
        e if e.is_upstream() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status != StatusCode::BAD_REQUEST {
        tracing::error!("Request failed: {}", e);
    }
    (status, Json(json!({ "error": e.to_string() })))
}

/// Actor of an administrative request / 管理请求的操作者
pub fn require_admin(headers: &HeaderMap) -> Result<Actor, ApiError> {
    headers
        .get(ADMIN_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(Actor::new)
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, Json(json!({ "error": "未登录" }))))
}
