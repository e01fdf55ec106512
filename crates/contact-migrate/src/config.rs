//! Configuration management

use sqlx::postgres::PgConnectOptions;
use std::path::PathBuf;

use crate::error::{MigrateError, Result};

// ============================================================================
// Transform Constants
// ============================================================================

/// Delimiters that separate values in a multi-valued feature field, applied in order.
pub const EXTENSION_DELIMITERS: [char; 5] = [',', ';', '|', '\n', '\t'];

/// Tokens starting with this prefix use another encoding and are skipped.
pub const SIGNED_TOKEN_PREFIX: char = '+';

/// Separator inside a decoded feature value; the identifier is the second segment.
pub const FEATURE_SEGMENT_SEPARATOR: char = '.';

/// Audit marker written to `created_by` on every upsert.
pub const CREATED_BY_MARKER: &str = "system_migration";

/// Row counts above this switch `auto` mode to a single batched statement.
pub const BATCH_THRESHOLD: usize = 100;

/// Number of rows read back for the operator after a load.
pub const VERIFY_SAMPLE_SIZE: i64 = 5;

/// Rows per multi-row statement; keeps binds under the PostgreSQL limit of 65535.
pub const BATCH_CHUNK_ROWS: usize = 10_000;

/// Per-record failures echoed in the run summary.
pub const MAX_ERROR_SAMPLES: usize = 5;

/// Default input file.
pub const DEFAULT_INPUT_PATH: &str = "contacts.csv";

// ============================================================================
// Database Configuration Constants
// ============================================================================

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_NAME: &str = "postgres";
pub const DEFAULT_DB_USER: &str = "postgres";
/// Placeholder only; real runs must set `MIGRATE_DB_PASSWORD`.
pub const DEFAULT_DB_PASSWORD: &str = "changeme";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Database connection settings
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

// Hand-written so the password never reaches a log line.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            name: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: DEFAULT_DB_PASSWORD.to_string(),
            max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DB_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl DatabaseConfig {
    /// Load connection settings from the environment
    ///
    /// - `MIGRATE_DB_HOST`, `MIGRATE_DB_PORT`, `MIGRATE_DB_NAME`
    /// - `MIGRATE_DB_USER`, `MIGRATE_DB_PASSWORD`
    /// - `MIGRATE_DB_MAX_CONNECTIONS`, `MIGRATE_DB_CONNECT_TIMEOUT`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            host: std::env::var("MIGRATE_DB_HOST").unwrap_or(defaults.host),
            port: env_parse("MIGRATE_DB_PORT")?.unwrap_or(defaults.port),
            name: std::env::var("MIGRATE_DB_NAME").unwrap_or(defaults.name),
            user: std::env::var("MIGRATE_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("MIGRATE_DB_PASSWORD").unwrap_or(defaults.password),
            max_connections: env_parse("MIGRATE_DB_MAX_CONNECTIONS")?
                .unwrap_or(defaults.max_connections),
            connect_timeout_secs: env_parse("MIGRATE_DB_CONNECT_TIMEOUT")?
                .unwrap_or(defaults.connect_timeout_secs),
        })
    }

    /// Build driver connection options without formatting a URL
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user)
            .password(&self.password)
            .application_name("contact-migrate")
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(MigrateError::config("database host cannot be empty"));
        }

        if self.port == 0 {
            return Err(MigrateError::config("database port must be greater than 0"));
        }

        if self.name.trim().is_empty() {
            return Err(MigrateError::config("database name cannot be empty"));
        }

        if self.user.trim().is_empty() {
            return Err(MigrateError::config("database user cannot be empty"));
        }

        if self.max_connections == 0 {
            return Err(MigrateError::config("max_connections must be greater than 0"));
        }

        if self.password == DEFAULT_DB_PASSWORD {
            tracing::warn!("MIGRATE_DB_PASSWORD not set, using the placeholder password");
        }

        Ok(())
    }
}

/// Command-line values that take precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct DatabaseOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub name: Option<String>,
    pub user: Option<String>,
}

impl DatabaseOverrides {
    fn apply(self, config: &mut DatabaseConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(name) = self.name {
            config.name = name;
        }
        if let Some(user) = self.user {
            config.user = user;
        }
    }
}

/// Everything one run needs
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    pub input: PathBuf,
    pub database: DatabaseConfig,
    pub run_migrations: bool,
}

impl MigrateConfig {
    /// Load configuration from `.env`, the environment and defaults, then
    /// apply command-line overrides
    pub fn load(input: impl Into<PathBuf>, overrides: DatabaseOverrides) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut database = DatabaseConfig::from_env()?;
        overrides.apply(&mut database);

        let config = Self {
            input: input.into(),
            database,
            run_migrations: true,
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.input.as_os_str().is_empty() {
            return Err(MigrateError::config("input path cannot be empty"));
        }

        self.database.validate()
    }
}

/// Parse an optional environment variable, rejecting malformed values
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| MigrateError::config(format!("{} has invalid value '{}': {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}
