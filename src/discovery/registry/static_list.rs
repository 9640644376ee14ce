//! 静态实例列表注册中心
//!
//! 用于本地开发和没有注册中心的部署，实例列表来自配置，可在运行时整体替换

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::RegistryConfig;
use crate::discovery::instance::{ServiceInstance, ServiceName};
use crate::discovery::registry::RegistryClient;
use crate::error::{DiscoveryError, RegistryError, Result};

/// 静态注册中心：对任意服务名都返回同一份实例列表
pub struct StaticRegistry {
    instances: RwLock<Vec<ServiceInstance>>,
}

impl StaticRegistry {
    pub fn new(instances: Vec<ServiceInstance>) -> Self {
        Self {
            instances: RwLock::new(instances),
        }
    }

    /// 从配置的 `addresses`（`host:port`）创建
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let instances = config
            .addresses
            .iter()
            .map(|address| parse_host_port(address))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(instances))
    }

    /// 整体替换实例列表
    pub async fn set_instances(&self, instances: Vec<ServiceInstance>) {
        *self.instances.write().await = instances;
    }

    pub async fn instances(&self) -> Vec<ServiceInstance> {
        self.instances.read().await.clone()
    }
}

/// 解析 `host:port`，端口取最后一个冒号之后的部分，IPv6 主机保留方括号
pub(crate) fn parse_host_port(address: &str) -> Result<ServiceInstance> {
    let invalid = |reason: &str| DiscoveryError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = address.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
    let port: u16 = port.parse().map_err(|_| invalid("port is not a valid u16"))?;

    let instance = ServiceInstance::new(host, port);
    if !instance.is_well_formed() {
        return Err(invalid("empty host or zero port"));
    }
    Ok(instance)
}

#[async_trait]
impl RegistryClient for StaticRegistry {
    async fn query_healthy(
        &self,
        _service: &ServiceName,
    ) -> std::result::Result<Vec<ServiceInstance>, RegistryError> {
        Ok(self.instances.read().await.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
