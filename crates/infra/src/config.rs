//! Process configuration loaded from environment variables.
//!
//! Every loader takes a lookup function so tests can supply values without
//! touching the process environment. Empty values count as absent. A missing
//! required value is fatal at startup; it is never a per-job error.

use std::str::FromStr;
use std::time::Duration;

/// Default port of the analytic store.
pub const DEFAULT_WAREHOUSE_PORT: u16 = 5439;
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_STREAM_KEY: &str = "queryjob:jobs";
pub const DEFAULT_CONSUMER_GROUP: &str = "queryjob.worker";
pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Connection settings for the analytic store.
#[derive(Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    pub host: String,
    pub database: String,
    pub user: String,
    password: String,
    pub port: u16,
}

impl WarehouseConfig {
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
            user: user.into(),
            password: password.into(),
            port: DEFAULT_WAREHOUSE_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: required(&lookup, "REDSHIFT_SERVERLESS_ENDPOINT")?,
            database: required(&lookup, "REDSHIFT_SERVERLESS_DATABASE")?,
            user: required(&lookup, "REDSHIFT_SERVERLESS_USER")?,
            password: required(&lookup, "REDSHIFT_SERVERLESS_PASSWORD")?,
            port: parsed(&lookup, "REDSHIFT_SERVERLESS_PORT")?.unwrap_or(DEFAULT_WAREHOUSE_PORT),
        })
    }
}

impl core::fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .finish()
    }
}

/// Everything the worker binary needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub warehouse: WarehouseConfig,
    /// Namespace of result records in the result store.
    pub result_table: String,
    pub redis_url: String,
    pub stream_key: String,
    pub consumer_group: String,
    /// Stable consumer name; generated per process when `None`.
    pub consumer_name: Option<String>,
    /// Jobs processed at once by one worker process.
    pub concurrency: usize,
    /// Per-job bound on connect + execute. `None` means unbounded.
    pub job_deadline: Option<Duration>,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let concurrency =
            parsed::<usize, _>(&lookup, "WORKER_CONCURRENCY")?.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "WORKER_CONCURRENCY",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            warehouse: WarehouseConfig::from_lookup(&lookup)?,
            result_table: required(&lookup, "RESULT_TABLE_NAME")?,
            redis_url: optional(&lookup, "REDIS_URL")
                .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            stream_key: optional(&lookup, "JOB_STREAM_KEY")
                .unwrap_or_else(|| DEFAULT_STREAM_KEY.to_string()),
            consumer_group: optional(&lookup, "JOB_CONSUMER_GROUP")
                .unwrap_or_else(|| DEFAULT_CONSUMER_GROUP.to_string()),
            consumer_name: optional(&lookup, "JOB_CONSUMER_NAME"),
            concurrency,
            job_deadline: parsed::<u64, _>(&lookup, "JOB_DEADLINE_SECS")?.map(Duration::from_secs),
        })
    }
}

/// Settings for the HTTP ingress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressConfig {
    pub redis_url: String,
    pub stream_key: String,
    pub bind_addr: String,
}

impl IngressConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            redis_url: optional(&lookup, "REDIS_URL")
                .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            stream_key: optional(&lookup, "JOB_STREAM_KEY")
                .unwrap_or_else(|| DEFAULT_STREAM_KEY.to_string()),
            bind_addr: optional(&lookup, "INGRESS_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn optional<F>(lookup: &F, key: &'static str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or(ConfigError::Missing(key))
}

fn parsed<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn worker_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("REDSHIFT_SERVERLESS_ENDPOINT", "wg.123.eu-west-2.redshift-serverless.amazonaws.com"),
            ("REDSHIFT_SERVERLESS_DATABASE", "dev"),
            ("REDSHIFT_SERVERLESS_USER", "admin"),
            ("REDSHIFT_SERVERLESS_PASSWORD", "hunter2"),
            ("RESULT_TABLE_NAME", "query-results"),
        ]
    }

    #[test]
    fn worker_config_applies_defaults() {
        let config = WorkerConfig::from_lookup(lookup_from(&worker_env())).unwrap();

        assert_eq!(config.warehouse.port, DEFAULT_WAREHOUSE_PORT);
        assert_eq!(config.warehouse.password(), "hunter2");
        assert_eq!(config.result_table, "query-results");
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(config.stream_key, DEFAULT_STREAM_KEY);
        assert_eq!(config.consumer_group, DEFAULT_CONSUMER_GROUP);
        assert_eq!(config.consumer_name, None);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.job_deadline, None);
    }

    #[test]
    fn overrides_are_parsed() {
        let mut env = worker_env();
        env.push(("REDSHIFT_SERVERLESS_PORT", "5440"));
        env.push(("WORKER_CONCURRENCY", "3"));
        env.push(("JOB_DEADLINE_SECS", "30"));
        env.push(("JOB_CONSUMER_NAME", "worker-a"));

        let config = WorkerConfig::from_lookup(lookup_from(&env)).unwrap();
        assert_eq!(config.warehouse.port, 5440);
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.job_deadline, Some(Duration::from_secs(30)));
        assert_eq!(config.consumer_name.as_deref(), Some("worker-a"));
    }

    #[test]
    fn missing_required_value_is_fatal() {
        let env: Vec<_> = worker_env()
            .into_iter()
            .filter(|(k, _)| *k != "REDSHIFT_SERVERLESS_PASSWORD")
            .collect();

        assert_eq!(
            WorkerConfig::from_lookup(lookup_from(&env)),
            Err(ConfigError::Missing("REDSHIFT_SERVERLESS_PASSWORD"))
        );
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let mut env = worker_env();
        env.retain(|(k, _)| *k != "RESULT_TABLE_NAME");
        env.push(("RESULT_TABLE_NAME", "  "));

        assert_eq!(
            WorkerConfig::from_lookup(lookup_from(&env)),
            Err(ConfigError::Missing("RESULT_TABLE_NAME"))
        );
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let mut env = worker_env();
        env.push(("REDSHIFT_SERVERLESS_PORT", "not-a-port"));
        assert!(matches!(
            WorkerConfig::from_lookup(lookup_from(&env)),
            Err(ConfigError::Invalid { key: "REDSHIFT_SERVERLESS_PORT", .. })
        ));

        let mut env = worker_env();
        env.push(("WORKER_CONCURRENCY", "0"));
        assert!(matches!(
            WorkerConfig::from_lookup(lookup_from(&env)),
            Err(ConfigError::Invalid { key: "WORKER_CONCURRENCY", .. })
        ));
    }

    #[test]
    fn debug_output_redacts_password() {
        let config = WarehouseConfig::new("host", "dev", "admin", "hunter2");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn ingress_config_defaults() {
        let config = IngressConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.stream_key, DEFAULT_STREAM_KEY);
    }
}
