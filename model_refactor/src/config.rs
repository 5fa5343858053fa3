//! Configuration handling for model_refactor

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default configuration file looked up by the CLI
pub const DEFAULT_CONFIG_FILE: &str = "model_refactor.toml";

/// Load configuration from a TOML or YAML file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read config file {}: {}", path.display(), e)))?;

    let config: Config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&config_str)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?,
        _ => toml::from_str(&config_str)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?,
    };

    Ok(config)
}

/// Represents the complete model_refactor configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub models: ModelsConfig,
    pub naming: NamingConfig,
    pub type_mapping: TypeMappingConfig,
    pub refactor: RefactorConfig,
    pub migrations: MigrationsConfig,
    pub database: Option<DatabaseConfig>,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Resolve a configured path against the code root unless it is absolute
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.paths.code_root.join(path)
        }
    }

    pub fn snapshot_directory(&self) -> PathBuf {
        self.resolve_path(&self.paths.snapshot_directory)
    }

    pub fn migrations_directory(&self) -> PathBuf {
        self.resolve_path(&self.paths.migrations_directory)
    }
}

/// Supported SQL dialects
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[default]
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    #[serde(alias = "mariadb")]
    Mysql,
    Sqlite,
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Driver::Postgres => "postgres",
            Driver::Mysql => "mysql",
            Driver::Sqlite => "sqlite",
        };
        f.write_str(name)
    }
}

/// Filesystem locations used by the CLI layer
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub code_root: PathBuf,
    pub snapshot_directory: PathBuf,
    pub migrations_directory: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            code_root: PathBuf::from("."),
            snapshot_directory: PathBuf::from("storage/snapshots"),
            migrations_directory: PathBuf::from("database/migrations"),
        }
    }
}

/// Model discovery configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ModelsConfig {
    pub paths: Vec<String>,
    pub exclude_paths: Option<Vec<String>>,
    /// Prefix prepended to class names derived from file paths
    pub namespace: String,
    pub derive_macros: Vec<String>,
    pub recursive_scan: bool,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            paths: vec!["src".to_string()],
            exclude_paths: None,
            namespace: String::new(),
            derive_macros: vec!["Model".to_string()],
            recursive_scan: true,
        }
    }
}

/// Naming conventions configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NamingConfig {
    pub table_style: String,
    pub column_style: String,
    pub pluralize_tables: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            table_style: "snake_case".to_string(),
            column_style: "snake_case".to_string(),
            pluralize_tables: true,
        }
    }
}

/// Type mapping configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TypeMappingConfig {
    pub custom: Option<Vec<CustomTypeMapping>>,
}

/// Custom Rust type to semantic column type mapping
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomTypeMapping {
    pub rust_type: String,
    pub column_type: String,
}

/// Code rewriting configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RefactorConfig {
    /// File extensions considered source files
    pub extensions: Vec<String>,
    /// Glob patterns, relative to the code root, never rewritten
    pub exclude: Vec<String>,
    pub parallel: bool,
    /// Also rewrite string-escaped class names (`App\\Models\\User`)
    pub escaped_class_names: bool,
}

impl Default for RefactorConfig {
    fn default() -> Self {
        Self {
            extensions: [
                "rs", "php", "js", "jsx", "ts", "tsx", "mjs", "py", "rb", "go", "java", "kt",
                "cs", "sql", "json", "toml", "yaml", "yml", "xml", "twig",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
            exclude: vec!["storage/**".to_string()],
            parallel: true,
            escaped_class_names: true,
        }
    }
}

/// Migration generation configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MigrationsConfig {
    pub driver: Driver,
    pub description_prefix: String,
    pub max_name_length: usize,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            driver: Driver::Postgres,
            description_prefix: "refactor".to_string(),
            max_name_length: 100,
        }
    }
}

/// Database connection configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub driver: Driver,
    pub url: String,
    pub pool_size: Option<u32>,
    pub timeout_seconds: Option<u64>,
    pub schema: Option<String>,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    /// Log to stderr when no file is configured
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: "text".to_string(),
            console: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.paths.snapshot_directory, PathBuf::from("storage/snapshots"));
        assert_eq!(config.migrations.driver, Driver::Postgres);
        assert!(config.refactor.parallel);
        assert!(config.database.is_none());
        assert_eq!(config.models.derive_macros, vec!["Model".to_string()]);
    }

    #[test]
    fn test_partial_config() {
        let config_str = r#"
        [paths]
        code_root = "/srv/app"
        snapshot_directory = "storage/snapshots"
        migrations_directory = "/tmp/migrations"

        [migrations]
        driver = "mysql"

        [database]
        driver = "pg"
        url = "postgres://localhost/app"

        [type_mapping]
        custom = [{ rust_type = "Money", column_type = "decimal" }]
        "#;

        let config: Config = toml::from_str(config_str).unwrap();

        assert_eq!(config.migrations.driver, Driver::Mysql);
        assert_eq!(config.database.as_ref().unwrap().driver, Driver::Postgres);
        assert_eq!(config.snapshot_directory(), PathBuf::from("/srv/app/storage/snapshots"));
        assert_eq!(config.migrations_directory(), PathBuf::from("/tmp/migrations"));
        assert_eq!(config.naming.table_style, "snake_case");
        assert_eq!(config.type_mapping.custom.unwrap()[0].column_type, "decimal");
    }

    #[test]
    fn test_yaml_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_refactor.yaml");
        fs::write(&path, "migrations:\n  driver: sqlite\nrefactor:\n  parallel: false\n").unwrap();

        let config = load_from_file(&path).unwrap();

        assert_eq!(config.migrations.driver, Driver::Sqlite);
        assert!(!config.refactor.parallel);
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
