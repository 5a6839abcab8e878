pub mod error;
pub mod handlers;
pub mod identity;

pub use error::{ok, ApiError, Envelope};
pub use identity::{USER_ID_HEADER, USER_ROLE_HEADER};

use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use std::sync::Arc;

use crate::config::DiscoveryConfig;
use crate::facade::QueryFacade;

/// Application state shared across all handlers
pub struct AppState {
    pub config: Arc<DiscoveryConfig>,
    pub facade: Arc<QueryFacade>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    service: String,
    version: String,
    indexed_novels: u64,
    indexed_contents: u64,
}

/// Health check endpoint
async fn health(state: web::Data<AppState>) -> impl Responder {
    let (indexed_novels, indexed_contents) = state.facade.index().document_counts();
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "discovery-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        indexed_novels,
        indexed_contents,
    })
}

/// Configure application routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health))
            // Search routes
            .service(
                web::scope("/search")
                    .route("/novels", web::get().to(handlers::search_novels))
                    .route("/full-text", web::get().to(handlers::search_full_text))
                    .route("/fulltext", web::get().to(handlers::search_full_text))
                    .route("/suggestions", web::get().to(handlers::suggestions))
                    .route("/hot-words", web::get().to(handlers::hot_words))
                    .route("/history", web::get().to(handlers::history))
                    .route("/history", web::delete().to(handlers::clear_history))
                    .route("/stats", web::get().to(handlers::search_stats))
                    .route("/index/{id}", web::post().to(handlers::index_novel))
                    .route("/rebuild-index", web::post().to(handlers::rebuild_index)),
            )
            .route("/users/search-history", web::get().to(handlers::history))
            .route(
                "/users/search-history",
                web::delete().to(handlers::clear_history),
            )
            // Discovery routes
            .route("/rankings", web::get().to(handlers::rankings))
            .route(
                "/recommendations/personalized",
                web::get().to(handlers::personalized),
            )
            .route("/recommendations", web::get().to(handlers::recommendations))
            .route("/novels/{id}/click", web::post().to(handlers::record_click))
            // Admin routes
            .route("/admin/cache/stats", web::get().to(handlers::cache_stats)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::MemoryCorpus;
    use crate::facade::Stores;
    use crate::search::SearchIndex;
    use actix_web::{test, App};
    use novel_hub_core::SystemClock;

    fn state(dir: &std::path::Path) -> web::Data<AppState> {
        let config = Arc::new(DiscoveryConfig::default());
        let index = Arc::new(SearchIndex::open(dir, 50_000_000).unwrap());
        let facade = QueryFacade::new(
            Stores::shared(Arc::new(MemoryCorpus::default())),
            index,
            Arc::new(SystemClock),
            &config,
        );
        web::Data::new(AppState {
            config,
            facade: Arc::new(facade),
        })
    }

    #[actix_web::test]
    async fn test_health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(state(dir.path()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/health").to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["status"], "healthy");
        assert_eq!(resp["indexed_novels"], 0);
    }

    #[actix_web::test]
    async fn test_unknown_board_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(state(dir.path()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/rankings?board=yearly")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
