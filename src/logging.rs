//! Logger initialisation for the server binaries

use std::path::Path;

use log::info;

use crate::config::LoggingConfig;

/// Configure log4rs from the configured YAML file, or fall back to env_logger
/// (honouring `RUST_LOG`, default level `info`) when the file is absent or invalid.
pub fn init_logging(config: &LoggingConfig) {
    let path = Path::new(&config.config_file);
    if path.exists() {
        match log4rs::init_file(path, Default::default()) {
            Ok(()) => {
                info!("Logging configured from {}", path.display());
                return;
            }
            Err(e) => eprintln!("Failed to load log configuration {}: {}", path.display(), e),
        }
    }

    let env = env_logger::Env::default().default_filter_or("info");
    if env_logger::Builder::from_env(env).try_init().is_ok() {
        info!("Logging configured from environment");
    }
}
