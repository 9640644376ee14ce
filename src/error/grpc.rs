//! gRPC 错误转换
//!
//! 上层服务客户端直接拿到 `tonic::Status`

use super::DiscoveryError;
use tonic::Status;

impl From<DiscoveryError> for Status {
    fn from(err: DiscoveryError) -> Self {
        let message = err.to_string();
        match err {
            DiscoveryError::NoAliveServices { .. } | DiscoveryError::RegistryUnavailable { .. } => {
                Status::unavailable(message)
            }
            DiscoveryError::InvalidServiceName(_)
            | DiscoveryError::InvalidAddress { .. }
            | DiscoveryError::Config(_) => Status::invalid_argument(message),
            DiscoveryError::AlreadyInitialized { .. }
            | DiscoveryError::Transport(_)
            | DiscoveryError::Logging(_) => Status::internal(message),
        }
    }
}
