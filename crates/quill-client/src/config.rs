use crate::classify::RetryPolicy;
use crate::connection::{is_identifier, ConnectionOptions, DEFAULT_CQL_VERSION};
use quill_core::consistency::ConsistencyLevel;
use quill_core::types::Endpoint;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    #[serde(default)]
    pub keyspace: String,
    #[serde(default)]
    pub default_consistency: ConsistencyLevel,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConnectionConfig {
    pub cql_version: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: Option<u64>,
    pub max_protocol_errors: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            cql_version: DEFAULT_CQL_VERSION.to_string(),
            connect_timeout_ms: 5_000,
            request_timeout_ms: None,
            max_protocol_errors: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 100,
            max_backoff_ms: 2_000,
        }
    }
}

impl ClientConfig {
    pub fn from_path(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.endpoint.host.trim().is_empty() {
            return Err(anyhow::anyhow!("endpoint host must not be empty"));
        }
        if self.endpoint.port == 0 {
            return Err(anyhow::anyhow!("endpoint port must not be zero"));
        }
        if !self.keyspace.is_empty() && !is_identifier(&self.keyspace) {
            return Err(anyhow::anyhow!(format!(
                "keyspace {} is not a plain identifier",
                self.keyspace
            )));
        }
        if self.connection.cql_version.is_empty() {
            return Err(anyhow::anyhow!("connection.cql_version must not be empty"));
        }
        if self.connection.connect_timeout_ms == 0 {
            return Err(anyhow::anyhow!("connection.connect_timeout_ms must be positive"));
        }
        if self.connection.request_timeout_ms == Some(0) {
            return Err(anyhow::anyhow!("connection.request_timeout_ms must be positive"));
        }
        if self.connection.max_protocol_errors == 0 {
            return Err(anyhow::anyhow!("connection.max_protocol_errors must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow::anyhow!("retry.max_attempts must be at least 1"));
        }
        if self.retry.base_backoff_ms > self.retry.max_backoff_ms {
            return Err(anyhow::anyhow!(
                "retry.base_backoff_ms exceeds retry.max_backoff_ms"
            ));
        }
        Ok(())
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            cql_version: self.connection.cql_version.clone(),
            connect_timeout: Duration::from_millis(self.connection.connect_timeout_ms),
            max_protocol_errors: self.connection.max_protocol_errors,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.connection.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_backoff: Duration::from_millis(self.retry.base_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
        }
    }
}
