//! 动态服务发现模块
//!
//! 从注册中心发现健康实例，构建轮询负载均衡的 RPC 连接，并通过后台轮询
//! 保持连接地址集的新鲜度。

pub mod balancer;
pub mod connection;
pub mod instance;
pub mod registry;
pub mod resolver;
pub mod watcher;

pub use balancer::{EndpointTemplate, RoundRobin, RoundRobinChannel};
pub use connection::{ConnectionFactory, RpcConnection, TransportSecurity};
pub use instance::{Address, AddressSet, ServiceInstance, ServiceName, translate_instances};
pub use registry::{ConsulRegistry, RegistryClient, RegistryFactory, StaticRegistry};
pub use resolver::Resolver;
pub use watcher::{
    DEFAULT_POLL_INTERVAL, DiscoveryWatcher, WatcherHandle, WatcherState, WatcherStatsSnapshot,
};

use tokio_util::sync::CancellationToken;

use crate::config::DiscoveryConfig;
use crate::error::Result;

/// 按配置完成一次完整的服务发现：创建注册中心客户端、构建连接、启动轮询
///
/// 返回的连接可以立即使用；`cancel` 触发后轮询停止，连接保留最后一次的地址集
pub async fn discover(
    config: &DiscoveryConfig,
    cancel: CancellationToken,
) -> Result<(RpcConnection, WatcherHandle)> {
    config.validate()?;

    let service = ServiceName::new(config.client.service_name.clone())?;
    let registry = RegistryFactory::create(&config.registry)?;
    let factory = ConnectionFactory::from_config(registry.clone(), &config.client)?;

    let connection = factory.build(&service).await?;
    let handle = DiscoveryWatcher::new(
        registry,
        &connection.resolver(),
        service,
        config.client.poll_interval(),
    )
    .start(cancel);

    Ok((connection, handle))
}
