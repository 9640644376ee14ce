//! 注册中心客户端抽象和实现

pub mod consul;
pub mod static_list;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{RegistryBackend, RegistryConfig};
use crate::discovery::instance::{ServiceInstance, ServiceName};
use crate::error::{RegistryError, Result};

pub use consul::ConsulRegistry;
pub use static_list::StaticRegistry;

/// 注册中心客户端 trait
///
/// 核心只依赖这一个查询契约，不关心注册中心自身的一致性模型。
/// 返回空列表表示"注册中心可达但当前没有健康实例"，不是错误。
/// 由于需要动态分发（dyn），使用 async-trait
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// 查询服务当前被认为健康的实例
    async fn query_healthy(
        &self,
        service: &ServiceName,
    ) -> std::result::Result<Vec<ServiceInstance>, RegistryError>;

    /// 后端名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 注册中心客户端工厂
pub struct RegistryFactory;

impl RegistryFactory {
    /// 从配置创建注册中心客户端
    pub fn create(config: &RegistryConfig) -> Result<Arc<dyn RegistryClient>> {
        match config.backend {
            RegistryBackend::Consul => Ok(Arc::new(ConsulRegistry::from_config(config)?)),
            RegistryBackend::Static => Ok(Arc::new(StaticRegistry::from_config(config)?)),
        }
    }
}
