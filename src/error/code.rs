//! 错误代码和错误类别定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
///
/// 错误代码按类别分组，每个类别占用1000个代码范围：
/// - 1000-1999: 服务发现相关错误
/// - 2000-2999: 传输相关错误
/// - 6000-6999: 系统相关错误（配置、日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 服务发现相关错误 (1000-1999)
    // ============================================================
    NoAliveServices = 1000,
    RegistryUnavailable = 1001,
    InvalidServiceName = 1002,
    AlreadyInitialized = 1003,

    // ============================================================
    // 传输相关错误 (2000-2999)
    // ============================================================
    TransportError = 2000,
    InvalidAddress = 2001,

    // ============================================================
    // 系统相关错误 (6000-6999)
    // ============================================================
    ConfigInvalid = 6000,
    LoggingInitFailed = 6001,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 从数字值创建错误代码
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            1000 => Some(ErrorCode::NoAliveServices),
            1001 => Some(ErrorCode::RegistryUnavailable),
            1002 => Some(ErrorCode::InvalidServiceName),
            1003 => Some(ErrorCode::AlreadyInitialized),
            2000 => Some(ErrorCode::TransportError),
            2001 => Some(ErrorCode::InvalidAddress),
            6000 => Some(ErrorCode::ConfigInvalid),
            6001 => Some(ErrorCode::LoggingInitFailed),
            _ => None,
        }
    }

    /// 获取错误代码的英文标识符
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoAliveServices => "NO_ALIVE_SERVICES",
            ErrorCode::RegistryUnavailable => "REGISTRY_UNAVAILABLE",
            ErrorCode::InvalidServiceName => "INVALID_SERVICE_NAME",
            ErrorCode::AlreadyInitialized => "ALREADY_INITIALIZED",
            ErrorCode::TransportError => "TRANSPORT_ERROR",
            ErrorCode::InvalidAddress => "INVALID_ADDRESS",
            ErrorCode::ConfigInvalid => "CONFIG_INVALID",
            ErrorCode::LoggingInitFailed => "LOGGING_INIT_FAILED",
        }
    }

    /// 获取错误代码的类别
    pub fn category(&self) -> ErrorCategory {
        match self.as_u32() {
            1000..=1999 => ErrorCategory::Discovery,
            2000..=2999 => ErrorCategory::Transport,
            _ => ErrorCategory::System,
        }
    }

    /// 判断是否为可重试的错误
    ///
    /// 注册中心不可达与暂无健康实例都是暂时状态，稍后重建连接可能成功
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::NoAliveServices | ErrorCode::RegistryUnavailable | ErrorCode::TransportError
        )
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Discovery,
    Transport,
    System,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Discovery => write!(f, "DISCOVERY"),
            ErrorCategory::Transport => write!(f, "TRANSPORT"),
            ErrorCategory::System => write!(f, "SYSTEM"),
        }
    }
}
