use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use notehub_backend::models::{BlockedNote, SearchConfig, SearchConfigUpdate, SensitiveWord};
use notehub_backend::search::{IndexStatus, RebuildReport};

use crate::api::{error_response, require_admin, ApiError, ApiResponse};
use crate::state::AppState;
use super::types::*;

/// GET /api/admin/search/config
pub async fn get_search_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<SearchConfig>>, ApiError> {
    require_admin(&headers)?;
    let config = state.admin.get_config().await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(config)))
}

/// POST /api/admin/search/config - 部分更新
pub async fn update_search_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<SearchConfigUpdate>,
) -> Result<Json<ApiResponse<SearchConfig>>, ApiError> {
    let actor = require_admin(&headers)?;
    let config = state.admin.update_config(&actor, &update).await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(config)))
}

/// POST /api/admin/search/index/rebuild - 重建索引
pub async fn rebuild_index(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<RebuildReport>>, ApiError> {
    let actor = require_admin(&headers)?;
    let report = state.admin.rebuild_index(&actor).await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(report)))
}

/// GET /api/admin/search/index/status
pub async fn index_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<IndexStatus>>, ApiError> {
    require_admin(&headers)?;
    let status = state.admin.index_status().await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(status)))
}

/// POST /api/admin/search/cache/clear - 清空搜索缓存
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let actor = require_admin(&headers)?;
    let removed = state.admin.clear_cache(&actor).await;
    Ok(Json(ApiResponse::success(json!({ "removed": removed }))))
}

pub async fn list_sensitive_words(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<SensitiveWord>>>, ApiError> {
    require_admin(&headers)?;
    let words = state.admin.list_sensitive_words().await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(words)))
}

pub async fn add_sensitive_word(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SensitiveWordRequest>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let actor = require_admin(&headers)?;
    let added = state.admin.add_sensitive_word(&actor, &req.word).await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(json!({ "added": added }))))
}

pub async fn remove_sensitive_word(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SensitiveWordRequest>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let actor = require_admin(&headers)?;
    let removed = state.admin.remove_sensitive_word(&actor, &req.word).await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(json!({ "removed": removed }))))
}

pub async fn list_blocked_notes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<BlockedNote>>>, ApiError> {
    require_admin(&headers)?;
    let notes = state.admin.list_blocked_notes().await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(notes)))
}

/// POST /api/admin/search/blocked - 屏蔽笔记
pub async fn block_note(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<BlockNoteRequest>,
) -> Result<Json<ApiResponse<BlockedNote>>, ApiError> {
    let actor = require_admin(&headers)?;
    let blocked = state.admin.block_note(&actor, req.note_id).await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(blocked)))
}

/// POST /api/admin/search/blocked/delete - 取消屏蔽
pub async fn unblock_note(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<BlockNoteRequest>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let actor = require_admin(&headers)?;
    let removed = state.admin.unblock_note(&actor, req.note_id).await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(json!({ "removed": removed }))))
}
