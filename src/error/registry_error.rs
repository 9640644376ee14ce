//! 注册中心查询错误

use std::time::Duration;
use thiserror::Error;

/// 注册中心客户端返回的错误
///
/// 只描述"注册中心不可达/响应不可用"，查询成功但没有健康实例不是错误
#[derive(Error, Debug)]
pub enum RegistryError {
    /// HTTP 传输失败
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// 注册中心返回非 2xx 状态
    #[error("registry responded with status {status}: {body}")]
    Status { status: u16, body: String },

    /// 响应体无法解析
    #[error("failed to decode registry response: {0}")]
    Decode(String),

    /// 请求超时
    #[error("registry request timed out after {0:?}")]
    Timeout(Duration),

    /// 其他不可用原因（内存实现、测试桩）
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

impl RegistryError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        RegistryError::Unavailable(reason.into())
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        RegistryError::Decode(reason.into())
    }
}
