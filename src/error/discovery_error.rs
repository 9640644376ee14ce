//! 服务发现统一错误类型

use super::code::ErrorCode;
use super::registry_error::RegistryError;
use thiserror::Error;

/// 服务发现统一错误类型
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// 注册中心可达，但没有任何健康实例
    #[error("no alive instances for service `{service}`")]
    NoAliveServices { service: String },

    /// 注册中心不可达或响应异常
    #[error("registry unavailable while resolving `{service}`: {source}")]
    RegistryUnavailable {
        service: String,
        #[source]
        source: RegistryError,
    },

    /// 服务名非法（空字符串等）
    #[error("invalid service name: {0:?}")]
    InvalidServiceName(String),

    /// Resolver 已经初始化过
    #[error("resolver for `{service}` is already initialized")]
    AlreadyInitialized { service: String },

    /// 地址无法构造为 gRPC endpoint
    #[error("invalid address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// 传输层错误（TLS 配置、endpoint 构建）
    #[error("transport error: {0}")]
    Transport(String),

    /// 配置错误
    #[error("invalid configuration: {0}")]
    Config(String),

    /// 日志初始化失败
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

impl DiscoveryError {
    /// 创建"无健康实例"错误
    pub fn no_alive_services(service: impl Into<String>) -> Self {
        DiscoveryError::NoAliveServices {
            service: service.into(),
        }
    }

    /// 创建"注册中心不可用"错误
    pub fn registry_unavailable(service: impl Into<String>, source: RegistryError) -> Self {
        DiscoveryError::RegistryUnavailable {
            service: service.into(),
            source,
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        DiscoveryError::Transport(reason.into())
    }

    pub fn config(reason: impl Into<String>) -> Self {
        DiscoveryError::Config(reason.into())
    }

    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            DiscoveryError::NoAliveServices { .. } => ErrorCode::NoAliveServices,
            DiscoveryError::RegistryUnavailable { .. } => ErrorCode::RegistryUnavailable,
            DiscoveryError::InvalidServiceName(_) => ErrorCode::InvalidServiceName,
            DiscoveryError::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            DiscoveryError::InvalidAddress { .. } => ErrorCode::InvalidAddress,
            DiscoveryError::Transport(_) => ErrorCode::TransportError,
            DiscoveryError::Config(_) => ErrorCode::ConfigInvalid,
            DiscoveryError::Logging(_) => ErrorCode::LoggingInitFailed,
        }
    }

    /// 是否为"注册中心可达但无健康实例"
    pub fn is_no_alive_services(&self) -> bool {
        matches!(self, DiscoveryError::NoAliveServices { .. })
    }

    /// 是否为"注册中心不可达"
    pub fn is_registry_unavailable(&self) -> bool {
        matches!(self, DiscoveryError::RegistryUnavailable { .. })
    }

    /// 判断是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, DiscoveryError>;
