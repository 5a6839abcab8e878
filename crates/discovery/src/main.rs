//! Discovery Service - search, rankings and recommendations for the novel site
//!
//! Port: 8080

use actix_web::{web, App, HttpServer};
use novel_hub_core::{init_logging, load_dotenv, Clock, SystemClock};
use novel_hub_discovery::{config, run_rollover_task, server};
use std::sync::Arc;
use tracing::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Load configuration
    let config = Arc::new(config::DiscoveryConfig::load()?);
    init_logging(&config.logging)?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting Discovery Service on {}", bind_addr);

    // Initialize service components
    let facade = novel_hub_discovery::init_service(config.clone()).await?;

    if config.clicks.run_scheduler {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        tokio::spawn(run_rollover_task(facade.clone(), clock));
    } else {
        info!("Click rollover scheduler disabled for this instance");
    }

    // Create application state
    let app_state = web::Data::new(server::AppState {
        config: config.clone(),
        facade,
    });

    // Start HTTP server with routes
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(server::configure_routes)
            .wrap(actix_web::middleware::Logger::default())
    })
    .workers(config.server.workers.unwrap_or_else(num_cpus::get))
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
