//! 服务发现配置
//!
//! 从 TOML 文件加载，部分字段可通过环境变量覆盖

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, Result};

/// 默认轮询间隔（秒）
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub registry: RegistryConfig,
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 注册中心后端类型
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    #[default]
    Consul,
    Static,
}

impl FromStr for RegistryBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "consul" => Ok(RegistryBackend::Consul),
            "static" | "list" => Ok(RegistryBackend::Static),
            _ => Err(format!("Unknown registry backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub backend: RegistryBackend,
    #[serde(default = "default_registry_url")]
    pub url: String,
    /// 只返回通过全部健康检查的实例
    #[serde(default = "default_true")]
    pub passing_only: bool,
    #[serde(default = "default_registry_timeout")]
    pub timeout_secs: u64,
    /// static 后端使用的 `host:port` 列表
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: RegistryBackend::default(),
            url: default_registry_url(),
            passing_only: true,
            timeout_secs: default_registry_timeout(),
            addresses: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub service_name: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub tls: TlsConfig,
}

impl ClientConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 传输安全配置，是否加密由部署决定
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// 证书校验使用的域名（默认取 URI 中的主机）
    pub domain: Option<String>,
    /// 自定义 CA 证书（PEM）
    pub ca_cert_path: Option<PathBuf>,
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_registry_url() -> String {
    "http://localhost:8500".to_string()
}

fn default_true() -> bool {
    true
}

fn default_registry_timeout() -> u64 {
    5
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DiscoveryConfig {
    /// 从 TOML 文件加载（会应用环境变量覆盖并校验）
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DiscoveryError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 解析 TOML 字符串（不应用环境变量）
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DiscoveryError::config(e.to_string()))
    }

    /// 应用环境变量覆盖
    ///
    /// - `DISCOVERY_REGISTRY_URL`
    /// - `DISCOVERY_SERVICE_NAME`
    /// - `DISCOVERY_POLL_INTERVAL_SECS`
    /// - `DISCOVERY_PASSING_ONLY`
    /// - `DISCOVERY_LOG_FORMAT`
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("DISCOVERY_REGISTRY_URL") {
            self.registry.url = url;
        }
        if let Ok(name) = std::env::var("DISCOVERY_SERVICE_NAME") {
            self.client.service_name = name;
        }
        if let Ok(v) = std::env::var("DISCOVERY_POLL_INTERVAL_SECS") {
            self.client.poll_interval_secs = v.parse().map_err(|_| {
                DiscoveryError::config(format!("DISCOVERY_POLL_INTERVAL_SECS is not a number: {}", v))
            })?;
        }
        if let Ok(v) = std::env::var("DISCOVERY_PASSING_ONLY") {
            self.registry.passing_only = v.parse().map_err(|_| {
                DiscoveryError::config(format!("DISCOVERY_PASSING_ONLY is not a bool: {}", v))
            })?;
        }
        if let Ok(v) = std::env::var("DISCOVERY_LOG_FORMAT") {
            self.logging.format = v.parse().map_err(DiscoveryError::config)?;
        }
        Ok(())
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.client.service_name.trim().is_empty() {
            return Err(DiscoveryError::config("client.service_name must not be empty"));
        }
        if self.client.poll_interval_secs == 0 {
            return Err(DiscoveryError::config("client.poll_interval_secs must be > 0"));
        }
        if self.registry.backend == RegistryBackend::Static {
            for address in &self.registry.addresses {
                crate::discovery::registry::static_list::parse_host_port(address)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let config = DiscoveryConfig::from_toml_str(
            r#"
            [client]
            service_name = "user-profile"
            "#,
        )
        .unwrap();

        assert_eq!(config.registry.backend, RegistryBackend::Consul);
        assert_eq!(config.registry.url, "http://localhost:8500");
        assert!(config.registry.passing_only);
        assert_eq!(config.client.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.client.request_timeout(), Duration::from_secs(30));
        assert!(!config.client.tls.enabled);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
        config.validate().unwrap();
    }

    #[test]
    fn test_static_backend_validation() {
        let config = DiscoveryConfig::from_toml_str(
            r#"
            [registry]
            backend = "static"
            addresses = ["10.0.0.1:9000", "nope"]

            [client]
            service_name = "search"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = DiscoveryConfig::from_toml_str(
            r#"
            [client]
            service_name = "search"
            poll_interval_secs = 0
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("STATIC".parse::<RegistryBackend>(), Ok(RegistryBackend::Static));
        assert!("etcd".parse::<RegistryBackend>().is_err());
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
    }
}
