//! 服务发现错误处理模块
//!
//! 区分"注册中心不可达"与"注册中心可达但无健康实例"两类初始解析失败，
//! 并提供到 `tonic::Status` 的转换

pub mod code;
pub mod discovery_error;
pub mod grpc;
pub mod registry_error;

pub use code::{ErrorCategory, ErrorCode};
pub use discovery_error::{DiscoveryError, Result};
pub use registry_error::RegistryError;
