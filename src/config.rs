use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::classify::phone::parse_region;
use crate::constants::*;
use crate::domain::Shape;
use crate::error::{CompositorError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub target: TargetConfig,
    pub phone: PhoneConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL; normally supplied through `DATABASE_URL`
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 2,
            acquire_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub schema: String,
    pub point_table: String,
    pub polygon_table: String,
    pub relevance_column: String,
    pub fetch_batch_size: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SOURCE_SCHEMA.to_string(),
            point_table: DEFAULT_POINT_TABLE.to_string(),
            polygon_table: DEFAULT_POLYGON_TABLE.to_string(),
            relevance_column: DEFAULT_RELEVANCE_COLUMN.to_string(),
            fetch_batch_size: DEFAULT_FETCH_BATCH_SIZE,
        }
    }
}

impl SourceConfig {
    /// Schema-qualified name of the relation holding rows of `shape`
    pub fn relation(&self, shape: Shape) -> String {
        let table = match shape {
            Shape::Point => &self.point_table,
            Shape::Polygon => &self.polygon_table,
        };
        format!("{}.{}", self.schema, table)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Schema-qualified place table
    pub table: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TARGET_TABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhoneConfig {
    pub default_region: String,
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            default_region: DEFAULT_PHONE_REGION.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `config.toml` when present,
    /// then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenv::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CompositorError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var(ENV_DATABASE_URL) {
            self.database.url = Some(url);
        }
        if let Ok(schema) = env::var(ENV_SOURCE_SCHEMA) {
            self.source.schema = schema;
        }
        if let Ok(table) = env::var(ENV_TARGET_TABLE) {
            self.target.table = table;
        }
        if let Ok(region) = env::var(ENV_PHONE_REGION) {
            self.phone.default_region = region;
        }
    }

    /// Relation and column names are spliced into SQL, so they must be plain
    /// identifiers.
    pub fn validate(&self) -> Result<()> {
        check_identifier("source.schema", &self.source.schema)?;
        check_identifier("source.point_table", &self.source.point_table)?;
        check_identifier("source.polygon_table", &self.source.polygon_table)?;
        check_identifier("source.relevance_column", &self.source.relevance_column)?;
        for (i, part) in self.target.table.split('.').enumerate() {
            check_identifier(&format!("target.table[{i}]"), part)?;
        }
        if self.source.fetch_batch_size == 0 {
            return Err(CompositorError::Config(
                "source.fetch_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(CompositorError::Config(
                "database.max_connections must be greater than zero".to_string(),
            ));
        }
        parse_region(&self.phone.default_region)?;
        Ok(())
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database.url.as_deref().ok_or_else(|| {
            CompositorError::Config(format!(
                "No database URL configured; set {ENV_DATABASE_URL} or database.url"
            ))
        })
    }
}

fn check_identifier(field: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !value.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(CompositorError::Config(format!(
            "{field} must be a plain SQL identifier, got '{value}'"
        )))
    }
}
