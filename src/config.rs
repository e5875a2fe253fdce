//! Configuration loaded from `tabula.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};

/// Environment variable that overrides `database.url`.
pub const DATABASE_URL_ENV: &str = "TABULA_DATABASE_URL";

/// Database connection configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Migration-specific configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MigrationsConfig {
    /// Directory scanned for migration files
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Ledger table recording applied migrations
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_directory() -> PathBuf {
    PathBuf::from("./migrations")
}

fn default_table() -> String {
    "migrations".to_string()
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            table: default_table(),
        }
    }
}

/// Main configuration struct.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub migrations: MigrationsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> OrmResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> OrmResult<Self> {
        toml::from_str(s).map_err(|e| OrmError::Config(e.to_string()))
    }

    /// The database URL, preferring `TABULA_DATABASE_URL` when set.
    pub fn database_url(&self) -> OrmResult<String> {
        self.resolve_url(std::env::var(DATABASE_URL_ENV).ok())
    }

    fn resolve_url(&self, env_url: Option<String>) -> OrmResult<String> {
        env_url
            .filter(|url| !url.is_empty())
            .or_else(|| self.database.url.clone())
            .ok_or_else(|| {
                OrmError::Config(format!(
                    "no database URL; set [database] url or {}",
                    DATABASE_URL_ENV
                ))
            })
    }

    /// The dialect implied by the configured URL.
    pub fn dialect(&self) -> OrmResult<Dialect> {
        let url = self.database_url()?;
        Dialect::from_url(&url)
            .ok_or_else(|| OrmError::Config(format!("unsupported database URL: {}", url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[database]
url = "sqlite::memory:"

[migrations]
directory = "./db/migrations"
table = "schema_ledger"
"#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.database.url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.migrations.directory, PathBuf::from("./db/migrations"));
        assert_eq!(config.migrations.table, "schema_ledger");
    }

    #[test]
    fn test_default_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.migrations.directory, PathBuf::from("./migrations"));
        assert_eq!(config.migrations.table, "migrations");
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_env_url_wins() {
        let config = Config::parse("[database]\nurl = \"sqlite::memory:\"").unwrap();
        let url = config.resolve_url(Some("postgres://localhost/app".into())).unwrap();
        assert_eq!(url, "postgres://localhost/app");
        assert_eq!(config.resolve_url(None).unwrap(), "sqlite::memory:");
    }

    #[test]
    fn test_missing_url() {
        let config = Config::default();
        assert!(matches!(config.resolve_url(None), Err(OrmError::Config(_))));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(Config::parse("[database"), Err(OrmError::Config(_))));
    }
}
