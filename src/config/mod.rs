use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub ingestion: IngestionConfig,
    pub metrics: MetricsConfig,
    /// Requests running longer than this are cancelled, including any
    /// in-flight storage call
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Maximum in-flight stores during bulk ingestion (1 = sequential)
    pub bulk_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Cache TTL for metrics query results; 0 disables the cache
    pub cache_ttl_secs: u64,
    pub cache_max_entries: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                backend: DatabaseBackend::Sqlite,
                url: "sqlite://./tally.db".to_string(),
                max_connections: 20,
            },
            api_server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            ingestion: IngestionConfig {
                bulk_concurrency: 1,
            },
            metrics: MetricsConfig {
                cache_ttl_secs: 0,
                cache_max_entries: 10_000,
            },
            request_timeout_secs: 30,
        }
    }
}

/// Read and parse an optional environment variable
fn env_parse<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("{name} has an invalid value '{value}'")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "memory" => DatabaseBackend::Memory,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres, memory"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database_url = std::env::var("DATABASE_URL").unwrap_or(defaults.database.url);
        let max_connections =
            env_parse("DATABASE_MAX_CONNECTIONS", defaults.database.max_connections)?;

        let api_host = std::env::var("API_HOST").unwrap_or(defaults.api_server.host);
        let api_port = env_parse("API_PORT", defaults.api_server.port)?;

        let bulk_concurrency =
            env_parse("BULK_CONCURRENCY", defaults.ingestion.bulk_concurrency)?;
        if bulk_concurrency == 0 {
            anyhow::bail!("BULK_CONCURRENCY must be at least 1");
        }

        let cache_ttl_secs = env_parse("METRICS_CACHE_TTL_SECS", defaults.metrics.cache_ttl_secs)?;
        let cache_max_entries =
            env_parse("METRICS_CACHE_MAX_ENTRIES", defaults.metrics.cache_max_entries)?;

        let request_timeout_secs =
            env_parse("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?;

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            ingestion: IngestionConfig { bulk_concurrency },
            metrics: MetricsConfig {
                cache_ttl_secs,
                cache_max_entries,
            },
            request_timeout_secs,
        })
    }
}
