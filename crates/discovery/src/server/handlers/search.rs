use actix_web::{web, HttpRequest, HttpResponse};
use novel_hub_core::CategoryId;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::facade::{SearchFilters, SearchMode};
use crate::server::error::{ok, ApiError};
use crate::server::identity::{require_admin, require_user, search_actor};
use crate::server::AppState;

/// Query parameters for the search endpoints
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub page: Option<i64>,
    pub size: Option<i64>,
    /// `fulltext` switches `/search/novels` to the content index
    #[serde(rename = "type")]
    pub search_type: Option<String>,
    pub category_id: Option<CategoryId>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
}

impl SearchQuery {
    fn filters(&self) -> SearchFilters {
        SearchFilters {
            category_id: self.category_id,
            min_score: self.min_score,
            max_score: self.max_score,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

/// GET /api/v1/search/novels - Metadata search
///
/// Query parameters:
/// - q: Search keyword (required)
/// - page, size: 1-based page and page size (clamped to 1..=50)
/// - type: `fulltext` searches novel content instead
/// - category_id: only novels in this category
/// - min_score, max_score: average rating bounds, ignored unless positive
pub async fn search_novels(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let mode = params
        .search_type
        .as_deref()
        .unwrap_or_default()
        .parse::<SearchMode>()?;
    let page = state
        .facade
        .search_filtered(
            mode,
            &params.q,
            &params.filters(),
            params.page,
            params.size,
            &search_actor(&req),
        )
        .await?;
    Ok(ok(page))
}

/// GET /api/v1/search/full-text - Full-text search over novel content
pub async fn search_full_text(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = state
        .facade
        .search_filtered(
            SearchMode::FullText,
            &params.q,
            &params.filters(),
            params.page,
            params.size,
            &search_actor(&req),
        )
        .await?;
    Ok(ok(page))
}

/// GET /api/v1/search/suggestions - Merged autocomplete suggestions
pub async fn suggestions(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<SuggestionQuery>,
) -> Result<HttpResponse, ApiError> {
    let suggestions = state
        .facade
        .suggestions(&params.q, params.limit, &search_actor(&req))
        .await?;
    Ok(ok(json!({ "suggestions": suggestions })))
}

/// GET /api/v1/search/hot-words - Most searched keywords
pub async fn hot_words(
    state: web::Data<AppState>,
    params: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    let words = state.facade.hot_words(params.limit).await;
    let keywords: Vec<&str> = words.iter().map(|w| w.keyword.as_str()).collect();
    Ok(ok(json!({ "keywords": keywords })))
}

/// GET /api/v1/search/stats - Site-wide search statistics (admin)
pub async fn search_stats(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req)?;
    let stats = state.facade.search_stats(params.limit).await?;
    Ok(ok(stats))
}

/// GET /api/v1/search/history - The caller's search history
///
/// Also served at /api/v1/users/search-history
pub async fn history(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<HistoryQuery>,
) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(&req)?;
    let page = state
        .facade
        .search_history(user_id, params.page, params.size)
        .await?;
    Ok(ok(page))
}

/// DELETE /api/v1/search/history - Clears the caller's search history
///
/// Also served at /api/v1/users/search-history
pub async fn clear_history(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = require_user(&req)?;
    let removed = state.facade.clear_search_history(user_id).await?;
    info!(user_id, removed, "Search history cleared by user");
    Ok(ok(json!({ "removed": removed })))
}
