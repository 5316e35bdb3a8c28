use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use telescope::config::{self, Config, StorageKind};
use tracing::info;

/// Execute the config show command
pub fn show(path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!(config = %path.display(), "Loading configuration for display");

    let cfg = config::load_config(Some(path))?;

    println!("{}", "Current Configuration:".green().bold());
    println!();
    println!("{}", toml::to_string_pretty(&cfg)?);

    Ok(())
}

/// Execute the config validate command
pub fn validate(path: &Path) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!(config = %path.display(), "Validating configuration file");

    let cfg = config::load_config(Some(path))?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    for line in summary(&cfg) {
        println!("  {}", line);
    }

    Ok(())
}

fn summary(cfg: &Config) -> Vec<String> {
    let watched: Vec<&str> = cfg
        .telescope
        .watch_set()
        .into_iter()
        .map(|t| t.as_str())
        .collect();

    let storage = match cfg.storage.backend {
        StorageKind::Memory => "memory".to_string(),
        StorageKind::Sqlite => format!("sqlite ({})", cfg.storage.database_url),
    };

    let retention = match cfg.storage.retention_hours {
        0 => "forever".to_string(),
        hours => format!("{}h", hours),
    };

    vec![
        format!("Listen: {}:{}", cfg.server.host, cfg.server.port),
        format!("Route prefix: {}", cfg.telescope.normalized_prefix()),
        format!("Watched types: {}", watched.join(", ")),
        format!("Query logging: {}", cfg.telescope.enable_query_logging),
        format!("Source context: {}", cfg.telescope.file_reading_allowed()),
        format!("Storage: {}", storage),
        format!("Retention: {}", retention),
    ]
}
