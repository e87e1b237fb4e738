use serde::Deserialize;
use std::path::Path;

/// Root application configuration. Loaded from environment variables
/// with the prefix `CAMPAIGN_EXPRESS__` and an optional TOML config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
}

/// Storage layer settings. Passed to the store at construction so table
/// naming never depends on global state.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
}

impl StoreConfig {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            table_prefix: prefix.into(),
        }
    }

    /// Physical table name for a logical one.
    pub fn table(&self, name: &str) -> String {
        format!("{}{}", self.table_prefix, name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportingConfig {
    /// Bucket unit used when the caller does not pick one (`i`, `H`, `d`, `W`, `m`, `Y`).
    #[serde(default = "default_unit")]
    pub default_unit: String,
    #[serde(default = "default_range_days")]
    pub default_range_days: i64,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_table_prefix() -> String {
    String::new()
}
fn default_unit() -> String {
    "d".to_string()
}
fn default_range_days() -> i64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_prefix: default_table_prefix(),
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            default_unit: default_unit(),
            default_range_days: default_range_days(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            store: StoreConfig::default(),
            reporting: ReportingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_with_file(None)
    }

    /// Load configuration from an optional TOML file, with environment
    /// variables taking precedence over file values.
    pub fn load_with_file(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("CAMPAIGN_EXPRESS")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
