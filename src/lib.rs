//! Flare Discovery
//!
//! 基于注册中心轮询的 gRPC 客户端服务发现：一次同步解析得到初始地址集，
//! 构建轮询负载均衡的连接，再由后台任务按固定周期刷新地址集，直到取消。

pub mod config;
pub mod discovery;
pub mod error;
pub mod telemetry;

// Re-exports
pub use config::{
    ClientConfig, DiscoveryConfig, LogFormat, LoggingConfig, RegistryBackend, RegistryConfig,
    TlsConfig,
};
pub use discovery::{
    Address, AddressSet, ConnectionFactory, ConsulRegistry, DiscoveryWatcher, RegistryClient,
    RegistryFactory, Resolver, RoundRobinChannel, RpcConnection, ServiceInstance, ServiceName,
    StaticRegistry, TransportSecurity, WatcherHandle, WatcherState, discover,
};
pub use error::{DiscoveryError, ErrorCode, RegistryError, Result};
pub use telemetry::init_tracing;
