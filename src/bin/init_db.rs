//! Create the database tables for every resource if they do not exist yet.

use log::{error, info};
use std::process::ExitCode;

use emc_explore::config::AppConfig;
use emc_explore::database::open_connection;
use emc_explore::entity::dataset::Dataset;
use emc_explore::logging::init_logging;
use emc_explore::repository::sqlite_store::SqliteRepository;

fn main() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging);
    config.log_sources();

    let result = open_connection(&config.database).and_then(SqliteRepository::<Dataset>::new);
    match result {
        Ok(_) => {
            info!("Database tables created successfully at {}", config.database.url);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to initialise database at {}: {}", config.database.url, e);
            ExitCode::FAILURE
        }
    }
}
