//! Executor configuration.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::protocol::RegistryParams;

/// Executor agent configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Admin center base address, e.g. `http://localhost:8080/xxl-job-admin`.
    pub server_addr: String,
    /// Shared access token; sent on outbound calls and required on inbound
    /// calls when set.
    pub access_token: Option<SecretString>,
    /// Executor bind IP, used to derive the advertised address.
    pub executor_ip: String,
    /// Executor bind port.
    pub executor_port: u16,
    /// Explicit advertised address; overrides the ip/port-derived one.
    pub executor_url: Option<String>,
    /// Executor name under which this agent registers.
    pub registry_key: String,
    /// Registration heartbeat interval.
    pub registry_interval: Duration,
    /// Timeout for outbound HTTP calls to the admin center.
    pub client_timeout: Duration,
    /// Optional directory for rolling file logs.
    pub log_dir: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            server_addr: String::new(),
            access_token: None,
            executor_ip: "127.0.0.1".to_string(),
            executor_port: 9999,
            executor_url: None,
            registry_key: "rust-jobs".to_string(),
            registry_interval: Duration::from_secs(20), // admin expires entries after 90s
            client_timeout: Duration::from_secs(10),
            log_dir: None,
        }
    }
}

impl ExecutorConfig {
    /// Build a configuration from `XXL_*` environment variables.
    ///
    /// `XXL_ADMIN_ADDR` is required; everything else falls back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self {
            server_addr: std::env::var("XXL_ADMIN_ADDR")
                .map_err(|_| ConfigError::MissingEnvVar("XXL_ADMIN_ADDR".to_string()))?,
            ..Self::default()
        };

        if let Ok(token) = std::env::var("XXL_ACCESS_TOKEN")
            && !token.is_empty()
        {
            config.access_token = Some(SecretString::from(token));
        }
        if let Ok(ip) = std::env::var("XXL_EXECUTOR_IP") {
            config.executor_ip = ip;
        }
        if let Ok(port) = std::env::var("XXL_EXECUTOR_PORT") {
            config.executor_port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "XXL_EXECUTOR_PORT".to_string(),
                message: format!("not a valid port: {port}"),
            })?;
        }
        if let Ok(url) = std::env::var("XXL_EXECUTOR_URL") {
            config.executor_url = Some(url);
        }
        if let Ok(key) = std::env::var("XXL_REGISTRY_KEY") {
            config.registry_key = key;
        }
        if let Ok(secs) = std::env::var("XXL_REGISTRY_INTERVAL_SECS") {
            let secs: u64 = secs.parse().map_err(|_| ConfigError::InvalidValue {
                key: "XXL_REGISTRY_INTERVAL_SECS".to_string(),
                message: format!("not a valid number of seconds: {secs}"),
            })?;
            config.registry_interval = Duration::from_secs(secs);
        }
        if let Ok(dir) = std::env::var("XXL_LOG_DIR") {
            config.log_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }

    /// Address the scheduler should reach this executor at.
    pub fn executor_address(&self) -> String {
        self.executor_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.executor_ip, self.executor_port))
    }

    /// Registration payload announcing this executor.
    pub fn registry_params(&self) -> RegistryParams {
        RegistryParams {
            registry_group: "EXECUTOR".to_string(),
            registry_key: self.registry_key.clone(),
            registry_value: self.executor_address(),
        }
    }
}
