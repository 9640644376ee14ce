//! 连接工厂
//!
//! 先同步解析一次得到非空地址集，再构建绑定 Resolver 的轮询 Channel。
//! 初始解析失败时不会返回任何连接。

use std::sync::Arc;
use std::time::Duration;

use tonic::transport::{Certificate, ClientTlsConfig};
use tracing::{info, warn};

use crate::config::{ClientConfig, TlsConfig};
use crate::discovery::balancer::{EndpointTemplate, RoundRobinChannel};
use crate::discovery::instance::{AddressSet, ServiceName, translate_instances};
use crate::discovery::registry::RegistryClient;
use crate::discovery::resolver::Resolver;
use crate::error::{DiscoveryError, Result};

/// 传输安全策略，由调用方决定
#[derive(Debug, Clone, Default)]
pub enum TransportSecurity {
    /// 明文 HTTP/2
    #[default]
    Insecure,
    /// TLS
    Tls(ClientTlsConfig),
}

impl TransportSecurity {
    /// 从配置构建
    pub fn from_config(config: &TlsConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(TransportSecurity::Insecure);
        }

        let mut tls = ClientTlsConfig::new().with_native_roots();
        if let Some(domain) = &config.domain {
            tls = tls.domain_name(domain.clone());
        }
        if let Some(path) = &config.ca_cert_path {
            let pem = std::fs::read(path).map_err(|e| {
                DiscoveryError::config(format!("failed to read CA certificate {}: {}", path.display(), e))
            })?;
            tls = tls.ca_certificate(Certificate::from_pem(pem));
        }
        Ok(TransportSecurity::Tls(tls))
    }

    /// URI scheme
    pub fn scheme(&self) -> &'static str {
        match self {
            TransportSecurity::Insecure => "http",
            TransportSecurity::Tls(_) => "https",
        }
    }
}

/// 绑定了 Resolver 的 RPC 连接
///
/// Resolver 由内部的轮询 Channel 强持有；连接本身或从它取出的任一 Channel
/// 克隆存活期间，Resolver 都保持有效
#[derive(Clone)]
pub struct RpcConnection {
    channel: RoundRobinChannel,
}

impl RpcConnection {
    /// 可直接交给 tonic 生成客户端的 Channel
    pub fn channel(&self) -> RoundRobinChannel {
        self.channel.clone()
    }

    /// 绑定的 Resolver（交给 DiscoveryWatcher 使用）
    pub fn resolver(&self) -> Arc<Resolver> {
        self.channel.resolver()
    }

    pub fn service_name(&self) -> &ServiceName {
        self.channel.service_name()
    }

    /// 当前生效的地址集
    pub fn addresses(&self) -> Arc<AddressSet> {
        self.channel.resolver().addresses()
    }
}

impl std::fmt::Debug for RpcConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcConnection")
            .field("channel", &self.channel)
            .finish()
    }
}

/// 连接工厂
pub struct ConnectionFactory {
    registry: Arc<dyn RegistryClient>,
    template: EndpointTemplate,
}

impl ConnectionFactory {
    pub fn new(registry: Arc<dyn RegistryClient>) -> Self {
        Self {
            registry,
            template: EndpointTemplate::default(),
        }
    }

    /// 从客户端配置创建（超时与 TLS）
    pub fn from_config(registry: Arc<dyn RegistryClient>, config: &ClientConfig) -> Result<Self> {
        Ok(Self::new(registry)
            .transport_security(TransportSecurity::from_config(&config.tls)?)
            .connect_timeout(config.connect_timeout())
            .request_timeout(config.request_timeout()))
    }

    pub fn transport_security(mut self, security: TransportSecurity) -> Self {
        self.template.security = security;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.template.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.template.request_timeout = timeout;
        self
    }

    pub fn registry(&self) -> Arc<dyn RegistryClient> {
        self.registry.clone()
    }

    /// 解析服务并构建连接
    ///
    /// - 注册中心查询失败：`DiscoveryError::RegistryUnavailable`
    /// - 查询成功但没有可用地址：`DiscoveryError::NoAliveServices`
    pub async fn build(&self, service: &ServiceName) -> Result<RpcConnection> {
        let instances = self.registry.query_healthy(service).await.map_err(|e| {
            warn!(
                service = %service,
                registry = self.registry.name(),
                error = %e,
                "Initial service resolution failed"
            );
            DiscoveryError::registry_unavailable(service.as_str(), e)
        })?;

        let addresses = translate_instances(service, &instances);
        if addresses.is_empty() {
            warn!(
                service = %service,
                registry = self.registry.name(),
                reported = instances.len(),
                "No alive instances during initial resolution"
            );
            return Err(DiscoveryError::no_alive_services(service.as_str()));
        }

        let resolver = Arc::new(Resolver::new(service.clone()));
        resolver.initialize(addresses)?;

        let channel = RoundRobinChannel::new(resolver.clone(), self.template.clone());

        info!(
            service = %service,
            registry = self.registry.name(),
            addresses = %resolver.addresses(),
            scheme = self.template.security.scheme(),
            "✅ RPC connection built"
        );

        Ok(RpcConnection { channel })
    }
}
