use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use telescope::{config, init_tracing, server};
use tracing::info;

/// Execute the start command
///
/// Loads configuration, initializes logging from it and runs the server until
/// a shutdown signal arrives.
pub async fn execute(config_path: &Path, port: Option<u16>) -> Result<()> {
    let mut cfg = config::load_config(Some(config_path))?;
    if let Some(port) = port {
        cfg.server.port = port;
        config::validate_config(&cfg)?;
    }

    init_tracing(&cfg.server.log_level, &cfg.server.log_format);

    println!("{}", "Starting telescope collector...".green());
    info!(
        config = %config_path.display(),
        backend = ?cfg.storage.backend,
        "Starting Telescope"
    );

    server::start_server(cfg).await?;

    Ok(())
}
