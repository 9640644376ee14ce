//! Consul 注册中心客户端
//!
//! 通过 `/v1/health/service/:service` 查询健康实例

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Url};
use serde::Deserialize;

use crate::config::RegistryConfig;
use crate::discovery::instance::{ServiceInstance, ServiceName};
use crate::discovery::registry::RegistryClient;
use crate::error::{RegistryError, Result};

/// Consul 健康查询返回的单条记录
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthEntry {
    #[serde(default)]
    node: Option<NodeEntry>,
    service: ServiceEntry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeEntry {
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceEntry {
    #[serde(default, rename = "ID")]
    id: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    port: u64,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Consul 注册中心客户端
pub struct ConsulRegistry {
    http_client: HttpClient,
    consul_url: String,
    passing_only: bool,
    timeout: Duration,
}

impl ConsulRegistry {
    /// 创建新的 Consul 客户端
    pub fn new(consul_url: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            consul_url: consul_url.into().trim_end_matches('/').to_string(),
            passing_only: true,
            timeout: Duration::from_secs(5),
        }
    }

    /// 从配置创建
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(crate::error::DiscoveryError::config(
                "registry.url is required for the consul backend",
            ));
        }
        Ok(Self::new(config.url.clone())
            .with_passing_only(config.passing_only)
            .with_timeout(Duration::from_secs(config.timeout_secs)))
    }

    /// 是否只返回通过全部健康检查的实例
    pub fn with_passing_only(mut self, passing_only: bool) -> Self {
        self.passing_only = passing_only;
        self
    }

    /// 单次查询超时
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 构建健康查询 URL，服务名作为单独的路径段编码
    fn health_url(&self, service: &ServiceName) -> std::result::Result<Url, RegistryError> {
        let invalid = || RegistryError::unavailable(format!("invalid consul url: {}", self.consul_url));
        let mut url = Url::parse(&self.consul_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["v1", "health", "service", service.as_str()]);
        if self.passing_only {
            url.query_pairs_mut().append_pair("passing", "true");
        }
        Ok(url)
    }

    async fn fetch(&self, service: &ServiceName) -> std::result::Result<Vec<HealthEntry>, RegistryError> {
        let url = self.health_url(service)?;
        let resp = self.http_client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RegistryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| RegistryError::decode(e.to_string()))
    }
}

/// 将 Consul 健康记录转换为服务实例
///
/// `Service.Address` 为空时回退到 `Node.Address`；端口超出 u16 的记录被丢弃
fn to_instances(service: &ServiceName, entries: Vec<HealthEntry>) -> Vec<ServiceInstance> {
    let mut instances = Vec::with_capacity(entries.len());
    for entry in entries {
        let svc = entry.service;
        let host = if svc.address.is_empty() {
            entry.node.map(|n| n.address).unwrap_or_default()
        } else {
            svc.address
        };

        let port = match u16::try_from(svc.port) {
            Ok(port) => port,
            Err(_) => {
                tracing::warn!(
                    service = %service,
                    instance_id = %svc.id,
                    port = svc.port,
                    "Dropping consul entry with out-of-range port"
                );
                continue;
            }
        };

        let mut instance = ServiceInstance::new(host, port);
        if !svc.id.is_empty() {
            instance = instance.with_id(svc.id);
        }

        for tag in svc.tags.unwrap_or_default() {
            if let Some((key, value)) = tag.split_once('=') {
                instance = instance.with_tag(key, value);
            } else {
                instance = instance.with_tag(tag, "true");
            }
        }

        instances.push(instance);
    }
    instances
}

#[async_trait]
impl RegistryClient for ConsulRegistry {
    async fn query_healthy(
        &self,
        service: &ServiceName,
    ) -> std::result::Result<Vec<ServiceInstance>, RegistryError> {
        // 使用 timeout 确保请求不会无限等待，避免阻塞轮询任务
        let entries = tokio::time::timeout(self.timeout, self.fetch(service))
            .await
            .map_err(|_| RegistryError::Timeout(self.timeout))??;

        Ok(to_instances(service, entries))
    }

    fn name(&self) -> &'static str {
        "consul"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEALTH_RESPONSE: &str = r#"[
        {
            "Node": {"Node": "node-a", "Address": "10.0.0.10"},
            "Service": {"ID": "profile-1", "Service": "profile", "Tags": ["env=prod", "primary"], "Address": "10.0.0.1", "Port": 9000},
            "Checks": []
        },
        {
            "Node": {"Node": "node-b", "Address": "10.0.0.20"},
            "Service": {"ID": "profile-2", "Service": "profile", "Tags": null, "Address": "", "Port": 9001},
            "Checks": []
        },
        {
            "Node": {"Node": "node-c", "Address": "10.0.0.30"},
            "Service": {"ID": "profile-3", "Service": "profile", "Tags": [], "Address": "10.0.0.3", "Port": 70000},
            "Checks": []
        }
    ]"#;

    #[test]
    fn test_parse_health_entries() {
        let service = ServiceName::new("profile").unwrap();
        let entries: Vec<HealthEntry> = serde_json::from_str(HEALTH_RESPONSE).unwrap();
        let instances = to_instances(&service, entries);

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].instance_id, "profile-1");
        assert_eq!(instances[0].host, "10.0.0.1");
        assert_eq!(instances[0].port, 9000);
        assert_eq!(instances[0].tags.get("env").map(String::as_str), Some("prod"));
        assert_eq!(instances[0].tags.get("primary").map(String::as_str), Some("true"));

        // Service.Address 为空时回退到节点地址
        assert_eq!(instances[1].host, "10.0.0.20");
        assert_eq!(instances[1].port, 9001);
    }

    #[test]
    fn test_ipv6_service_address_translates_to_bracketed_address() {
        let service = ServiceName::new("profile").unwrap();
        let entries: Vec<HealthEntry> = serde_json::from_str(
            r#"[{"Service": {"ID": "profile-6", "Address": "fe80::1", "Port": 9000}}]"#,
        )
        .unwrap();
        let instances = to_instances(&service, entries);
        let addresses = crate::discovery::instance::translate_instances(&service, &instances);
        assert_eq!(addresses.len(), 1);
        assert_eq!(addresses.get(0).unwrap(), &"[fe80::1]:9000");
    }

    #[test]
    fn test_health_url_encodes_service_segment() {
        let registry = ConsulRegistry::new("http://consul:8500/");
        let url = registry
            .health_url(&ServiceName::new("team/profile api").unwrap())
            .unwrap();
        assert_eq!(url.path(), "/v1/health/service/team%2Fprofile%20api");
        assert_eq!(url.query(), Some("passing=true"));

        let registry = ConsulRegistry::new("http://consul:8500/proxy").with_passing_only(false);
        let url = registry.health_url(&ServiceName::new("profile").unwrap()).unwrap();
        assert_eq!(url.as_str(), "http://consul:8500/proxy/v1/health/service/profile");
    }

    #[test]
    fn test_health_url_rejects_unparsable_base() {
        let registry = ConsulRegistry::new("consul without scheme");
        let err = registry
            .health_url(&ServiceName::new("profile").unwrap())
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unavailable(_)));
    }

    #[test]
    fn test_from_config_requires_url() {
        let mut config = RegistryConfig::default();
        config.url = String::new();
        assert!(ConsulRegistry::from_config(&config).is_err());

        config.url = "http://consul:8500/".to_string();
        let registry = ConsulRegistry::from_config(&config).unwrap();
        assert_eq!(registry.consul_url, "http://consul:8500");
        assert!(registry.passing_only);
    }
}
