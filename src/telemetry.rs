//! 日志初始化
//!
//! 基于 tracing-subscriber，`RUST_LOG` 优先于配置中的级别

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{DiscoveryError, Result};

/// 构建日志过滤器：`RUST_LOG` 存在时优先使用
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| DiscoveryError::Logging(format!("invalid level `{}`: {}", config.level, e))),
    }
}

/// 初始化全局 tracing subscriber
///
/// 进程内只能成功调用一次，重复调用返回 `DiscoveryError::Logging`
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = build_env_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
    };

    result.map_err(|e| DiscoveryError::Logging(e.to_string()))
}
