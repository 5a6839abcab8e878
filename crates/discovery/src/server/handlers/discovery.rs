use actix_web::{web, HttpRequest, HttpResponse};
use novel_hub_core::{clamp_limit, Board, CategoryId, NovelId, DEFAULT_LIMIT};
use serde::Deserialize;
use serde_json::json;

use crate::recommendation::RecommendationKind;
use crate::server::error::{ok, ApiError};
use crate::server::identity::require_user;
use crate::server::AppState;

/// Query parameters for rank boards
#[derive(Debug, Deserialize)]
pub struct RankingQuery {
    /// total, month, week or day
    pub board: Option<String>,
    /// Older clients send the board as `type`
    #[serde(rename = "type")]
    pub board_alias: Option<String>,
    pub limit: Option<i64>,
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub novel_id: Option<NovelId>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PersonalizedQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/rankings - Rank board by click window
///
/// Query parameters:
/// - board (alias `type`): total, month, week, day (default: total)
/// - limit: 1..=50 (default: 10)
/// - category_id: restrict the board to one category
pub async fn rankings(
    state: web::Data<AppState>,
    params: web::Query<RankingQuery>,
) -> Result<HttpResponse, ApiError> {
    let board: Board = params
        .board
        .as_deref()
        .or(params.board_alias.as_deref())
        .unwrap_or("total")
        .parse()?;
    let limit = clamp_limit(params.limit, DEFAULT_LIMIT);
    let novels = state
        .facade
        .rankings(board, Some(limit as i64), params.category_id)
        .await?;
    Ok(ok(json!({
        "type": board,
        "novels": novels.as_slice(),
        "limit": limit,
    })))
}

/// GET /api/v1/recommendations - popular, new or similar novels
pub async fn recommendations(
    state: web::Data<AppState>,
    params: web::Query<RecommendationQuery>,
) -> Result<HttpResponse, ApiError> {
    let kind: RecommendationKind = params.kind.as_deref().unwrap_or("popular").parse()?;
    let novels = state
        .facade
        .recommendations(kind, params.novel_id, params.limit)
        .await?;
    Ok(ok(json!({
        "type": kind,
        "novels": novels.as_slice(),
    })))
}

/// GET /api/v1/recommendations/personalized - Recommendations for the caller
pub async fn personalized(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<PersonalizedQuery>,
) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(&req)?;
    let novels = state.facade.personalized(user_id, params.limit).await?;
    Ok(ok(json!({
        "type": "personalized",
        "novels": novels,
    })))
}

/// POST /api/v1/novels/{id}/click - Records one reader open
pub async fn record_click(
    state: web::Data<AppState>,
    path: web::Path<NovelId>,
) -> Result<HttpResponse, ApiError> {
    let novel_id = path.into_inner();
    let counters = state.facade.record_click(novel_id).await?;
    Ok(ok(json!({
        "novel_id": novel_id,
        "clicks": counters,
    })))
}
