use actix_web::{web, HttpRequest, HttpResponse};
use novel_hub_core::NovelId;
use serde_json::json;
use tracing::info;

use crate::server::error::{ok, ApiError};
use crate::server::identity::require_admin;
use crate::server::AppState;

/// POST /api/v1/search/index/{id} - Re-indexes one approved novel
pub async fn index_novel(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<NovelId>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_admin(&req)?;
    let novel_id = path.into_inner();
    state.facade.reindex(novel_id).await?;
    info!(admin, novel_id, "Novel re-indexed on request");
    Ok(ok(json!({ "novel_id": novel_id })))
}

/// POST /api/v1/search/rebuild-index - Re-indexes every approved novel
pub async fn rebuild_index(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_admin(&req)?;
    let report = state.facade.rebuild_index().await?;
    info!(
        admin,
        total = report.total_novels,
        failed = report.failed_count,
        "Index rebuild requested"
    );
    Ok(ok(report))
}

/// GET /api/v1/admin/cache/stats - Facade cache hit/miss counters
pub async fn cache_stats(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req)?;
    Ok(ok(state.facade.cache_stats()))
}
