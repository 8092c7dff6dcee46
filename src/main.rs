use actix_web::{App, HttpServer, web};
use log::info;
use std::io;

use emc_explore::app_state::AppState;
use emc_explore::config::AppConfig;
use emc_explore::logging::init_logging;
use emc_explore::middleware::build_cors;
use emc_explore::service::api_scope;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = AppConfig::load().map_err(io::Error::other)?;
    init_logging(&config.logging);
    config.log_sources();

    std::fs::create_dir_all(&config.upload_dir)?;
    let app_state = AppState::from_config(config.clone()).map_err(io::Error::other)?;

    let server = config.server.clone();
    info!("Starting server on {}:{} (debug: {})", server.host, server.port, server.debug);

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&app_state.config.server))
            .wrap(actix_web::middleware::Logger::default())
            .app_data(web::PayloadConfig::default().limit(app_state.config.server.max_payload_size))
            .service(api_scope(&app_state))
    })
    .workers(server.workers)
    .bind((server.host.as_str(), server.port))?
    .run()
    .await
}
