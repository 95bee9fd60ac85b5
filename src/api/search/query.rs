use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use notehub_backend::models::TrendingKeyword;
use notehub_backend::search::SearchPage;

use crate::api::{error_response, ApiError, ApiResponse};
use crate::state::AppState;
use super::types::*;

/// GET /api/search - 搜索笔记
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<SearchPage>>, ApiError> {
    let request = params.into_request().map_err(error_response)?;
    let page = state.engine.search(&request).await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(page)))
}

/// GET /api/search/trending - 热门搜索
pub async fn trending(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrendingParams>,
) -> Json<ApiResponse<Vec<TrendingKeyword>>> {
    Json(ApiResponse::success(state.engine.trending(params.limit).await))
}

/// GET /api/search/suggest - 搜索建议
pub async fn suggest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestParams>,
) -> Json<ApiResponse<Vec<String>>> {
    Json(ApiResponse::success(state.engine.suggest(&params.prefix).await))
}
