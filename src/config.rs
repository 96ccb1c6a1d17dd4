use crate::core::db::SqliteProvider;
use crate::core::{RecadminError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `database.path`.
pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub output: OutputConfig,
    pub log: LogConfig,
}

/// Database connection configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub foreign_keys: bool,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: None,
            foreign_keys: true,
            busy_timeout_ms: 5000,
        }
    }
}

/// How result sets are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Tsv,
    Json,
}

/// Output configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

/// Logging configuration; `RUST_LOG` takes precedence.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Resolves the database path: explicit argument, then the
    /// `DATABASE_PATH` environment variable, then the config file.
    pub fn database_path(&self, cli_path: Option<&str>) -> Result<PathBuf> {
        if let Some(path) = cli_path {
            return Ok(PathBuf::from(path));
        }
        if let Some(path) = std::env::var_os(DATABASE_PATH_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        self.database.path.clone().ok_or_else(|| {
            RecadminError::Config(format!(
                "no database given: pass a path, set {} or configure database.path",
                DATABASE_PATH_ENV
            ))
        })
    }

    /// Builds the connection provider for a resolved database path.
    pub fn provider(&self, path: PathBuf) -> SqliteProvider {
        SqliteProvider::new(path)
            .with_foreign_keys(self.database.foreign_keys)
            .with_busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = recadmin::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Default location: `<config dir>/recadmin/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("recadmin").join("config.toml"))
}

/// Loads an explicit config file, or the default one if it exists, or
/// falls back to built-in defaults.
pub fn load_or_default(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None => match default_config_path() {
            Some(path) if path.exists() => load_config(path),
            _ => Ok(Config::default()),
        },
    }
}
