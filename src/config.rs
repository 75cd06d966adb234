use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub directory: DirectorySettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Profile directory service (read-only collaborator)
#[derive(Debug, Clone, Deserialize)]
pub struct DirectorySettings {
    pub endpoint: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSettings {
    /// When unset the engine runs against the in-memory store.
    #[serde(default)]
    pub url: Option<String>,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    pub score_cache_size: Option<u64>,
    pub score_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchingSettings {
    pub invitation_ttl_days: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_cleanliness_weight")]
    pub cleanliness: f64,
    #[serde(default = "default_sleep_weight")]
    pub sleep: f64,
    #[serde(default = "default_noise_weight")]
    pub noise: f64,
    #[serde(default = "default_guests_weight")]
    pub guests: f64,
    #[serde(default = "default_smoking_weight")]
    pub smoking: f64,
    #[serde(default = "default_pets_weight")]
    pub pets: f64,
    #[serde(default = "default_dietary_weight")]
    pub dietary: f64,
    #[serde(default = "default_hobbies_weight")]
    pub hobbies: f64,
    #[serde(default = "default_languages_weight")]
    pub languages: f64,
    #[serde(default = "default_budget_weight")]
    pub budget: f64,
    #[serde(default = "default_neighborhood_weight")]
    pub neighborhood: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            cleanliness: default_cleanliness_weight(),
            sleep: default_sleep_weight(),
            noise: default_noise_weight(),
            guests: default_guests_weight(),
            smoking: default_smoking_weight(),
            pets: default_pets_weight(),
            dietary: default_dietary_weight(),
            hobbies: default_hobbies_weight(),
            languages: default_languages_weight(),
            budget: default_budget_weight(),
            neighborhood: default_neighborhood_weight(),
        }
    }
}

fn default_cleanliness_weight() -> f64 { 12.0 }
fn default_sleep_weight() -> f64 { 12.0 }
fn default_noise_weight() -> f64 { 10.0 }
fn default_guests_weight() -> f64 { 8.0 }
fn default_smoking_weight() -> f64 { 10.0 }
fn default_pets_weight() -> f64 { 8.0 }
fn default_dietary_weight() -> f64 { 8.0 }
fn default_hobbies_weight() -> f64 { 12.0 }
fn default_languages_weight() -> f64 { 6.0 }
fn default_budget_weight() -> f64 { 8.0 }
fn default_neighborhood_weight() -> f64 { 6.0 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with ROOMIO_)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            // Add default config file
            .add_source(File::with_name("config/default").required(false))
            // Add local config file (for development overrides)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (prefixed with ROOMIO_)
            // e.g., ROOMIO_SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("ROOMIO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = apply_env_overrides(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("ROOMIO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Well-known environment overrides that don't fit the prefix scheme.
/// DATABASE_URL is the conventional deployment variable.
fn apply_env_overrides(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(database_url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", database_url)?;
    }
    if let Ok(endpoint) = env::var("ROOMIO_DIRECTORY__ENDPOINT") {
        builder = builder.set_override("directory.endpoint", endpoint)?;
    }
    if let Ok(api_key) = env::var("ROOMIO_DIRECTORY__API_KEY") {
        builder = builder.set_override("directory.api_key", api_key)?;
    }

    builder.build()
}
