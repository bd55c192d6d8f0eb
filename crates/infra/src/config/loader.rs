//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the credential variables are incomplete, falls back to a file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required:
//! - `FLEETLINK_ISSUER`: assertion issuer (team id)
//! - `FLEETLINK_CLIENT_ID`: client id, used as the assertion subject
//! - `FLEETLINK_KEY_ID`: signing key id
//! - `FLEETLINK_PRIVATE_KEY_PATH`: PEM file holding the P-256 private key
//!
//! Optional:
//! - `FLEETLINK_SCOPE`: requested scope
//! - `FLEETLINK_BASE_URL`: API base URL
//! - `FLEETLINK_TOKEN_URL`: token endpoint
//! - `FLEETLINK_CACHE_DIR`: credential cache directory
//! - `FLEETLINK_CACHE_ENABLED`: whether to persist credentials (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./fleetlink.toml` or `./fleetlink.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};

use fleetlink_domain::{
    AuthConfig, Config, FleetLinkError, HttpConfig, IdentityConfig, PollingConfig, Result,
};

const CONFIG_FILE_NAMES: [&str; 4] = ["fleetlink.toml", "fleetlink.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `FleetLinkError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("config.loaded_from_env");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "config.env_incomplete");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// The four credential variables are required; everything else falls back
/// to the section defaults.
///
/// # Errors
/// Returns `FleetLinkError::Config` if a required variable is missing.
pub fn load_from_env() -> Result<Config> {
    let mut identity = IdentityConfig {
        issuer: env_var("FLEETLINK_ISSUER")?,
        client_id: env_var("FLEETLINK_CLIENT_ID")?,
        key_id: env_var("FLEETLINK_KEY_ID")?,
        private_key_pem: None,
        private_key_path: Some(PathBuf::from(env_var("FLEETLINK_PRIVATE_KEY_PATH")?)),
        scope: fleetlink_domain::constants::DEFAULT_SCOPE.to_string(),
    };
    if let Some(scope) = env_opt("FLEETLINK_SCOPE") {
        identity.scope = scope;
    }

    let mut auth = AuthConfig::default();
    if let Some(url) = env_opt("FLEETLINK_TOKEN_URL") {
        auth.token_url = url;
    }
    auth.cache_dir = env_opt("FLEETLINK_CACHE_DIR").map(PathBuf::from);
    auth.cache_enabled = env_bool("FLEETLINK_CACHE_ENABLED", true);

    let mut http = HttpConfig::default();
    if let Some(url) = env_opt("FLEETLINK_BASE_URL") {
        http.base_url = url;
    }

    Ok(Config { identity, auth, http, polling: PollingConfig::default() })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `FleetLinkError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(FleetLinkError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            FleetLinkError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "config.loading_file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| FleetLinkError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| FleetLinkError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| FleetLinkError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(FleetLinkError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the working directory, then the executable's directory, for a
/// config file.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    probe_dirs(&dirs)
}

fn probe_dirs(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

/// Get required environment variable
///
/// # Errors
/// Returns `FleetLinkError::Config` if the variable is not set or empty.
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        FleetLinkError::Config(format!("Missing required environment variable: {key}"))
    })
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
