use crate::entry::EntryType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telescope: TelescopeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Capture and dashboard options
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelescopeConfig {
    /// Entry types that are captured and distributed
    #[serde(default = "default_watched_entry_types")]
    pub watched_entry_types: Vec<EntryType>,

    #[serde(default)]
    pub enable_query_logging: bool,

    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    /// Read source lines around the faulting line of captured exceptions
    #[serde(default)]
    pub enable_file_reading: bool,

    /// Environments in which file reading is allowed
    #[serde(default = "default_file_reading_environments")]
    pub file_reading_environments: Vec<String>,

    /// Current runtime environment name
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Replaced by a placeholder in captured paths; defaults to the working directory
    #[serde(default)]
    pub project_root: Option<PathBuf>,

    /// Character budget for query result previews
    #[serde(default = "default_query_result_limit")]
    pub query_result_limit: usize,
}

impl Default for TelescopeConfig {
    fn default() -> Self {
        Self {
            watched_entry_types: default_watched_entry_types(),
            enable_query_logging: false,
            route_prefix: default_route_prefix(),
            enable_file_reading: false,
            file_reading_environments: default_file_reading_environments(),
            environment: default_environment(),
            project_root: None,
            query_result_limit: default_query_result_limit(),
        }
    }
}

impl TelescopeConfig {
    pub fn watch_set(&self) -> BTreeSet<EntryType> {
        self.watched_entry_types.iter().copied().collect()
    }

    /// Whether source context may be read in the current environment
    pub fn file_reading_allowed(&self) -> bool {
        self.enable_file_reading
            && self
                .file_reading_environments
                .iter()
                .any(|env| env.eq_ignore_ascii_case(&self.environment))
    }

    pub fn resolved_project_root(&self) -> Option<PathBuf> {
        self.project_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
    }

    /// Prefix without a trailing slash, e.g. "/telescope"
    pub fn normalized_prefix(&self) -> String {
        normalize_prefix(&self.route_prefix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageKind,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Entries older than this are pruned; 0 keeps everything
    #[serde(default)]
    pub retention_hours: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            database_url: default_database_url(),
            retention_hours: 0,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_watched_entry_types() -> Vec<EntryType> {
    vec![EntryType::Request, EntryType::Exception, EntryType::Query]
}

fn default_route_prefix() -> String {
    "/telescope".to_string()
}

fn default_file_reading_environments() -> Vec<String> {
    vec!["development".to_string()]
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_query_result_limit() -> usize {
    200
}

fn default_storage_backend() -> StorageKind {
    StorageKind::Memory
}

fn default_database_url() -> String {
    "sqlite:./data/telescope.db".to_string()
}

pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Load configuration from an optional TOML file and `TELESCOPE__*` environment variables
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path.to_path_buf()).required(false));
    }

    let config = builder
        .add_source(
            config::Environment::with_prefix("TELESCOPE")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("telescope.watched_entry_types")
                .with_list_parse_key("telescope.file_reading_environments")
                .try_parsing(true),
        )
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.server.port == 0 {
        anyhow::bail!("Server port must be non-zero");
    }

    let prefix = cfg.telescope.route_prefix.trim();
    if !prefix.starts_with('/') {
        anyhow::bail!("Route prefix '{}' must start with '/'", prefix);
    }
    if normalize_prefix(prefix) == "/" || prefix == "/" {
        anyhow::bail!("Route prefix cannot be the root path");
    }

    if !matches!(cfg.server.log_format.as_str(), "text" | "json") {
        anyhow::bail!(
            "Invalid log format '{}', expected 'text' or 'json'",
            cfg.server.log_format
        );
    }

    if cfg.storage.backend == StorageKind::Sqlite && cfg.storage.database_url.trim().is_empty() {
        anyhow::bail!("SQLite storage requires a database_url");
    }

    if cfg.telescope.query_result_limit == 0 {
        anyhow::bail!("query_result_limit must be at least 1");
    }

    Ok(())
}
