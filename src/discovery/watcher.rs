//! 服务发现后台轮询任务
//!
//! 状态机：`Idle -> Running -> Stopped`。每个轮询周期查询一次注册中心并整体替换
//! Resolver 的地址集；单次查询失败只记录日志并保留上一次的地址集，不会退出循环。
//! 只有取消信号（或持有 Resolver 的连接及其所有 Channel 克隆都被释放）才会让任务停止。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::discovery::instance::{ServiceName, translate_instances};
use crate::discovery::registry::RegistryClient;
use crate::discovery::resolver::Resolver;

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// 轮询任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Running,
    Stopped,
}

/// 轮询统计快照
#[derive(Debug, Clone, Default)]
pub struct WatcherStatsSnapshot {
    pub polls: u64,
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
}

/// 轮询统计（日志之外的观测通道）
#[derive(Debug, Default)]
pub struct WatcherStats {
    polls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    consecutive_failures: AtomicU64,
    last_error: Mutex<Option<String>>,
    last_success_at: Mutex<Option<DateTime<Utc>>>,
}

impl WatcherStats {
    fn record_success(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        if let Ok(mut at) = self.last_success_at.lock() {
            *at = Some(Utc::now());
        }
    }

    /// 返回连续失败次数
    fn record_failure(&self, error: String) -> u64 {
        self.polls.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(error);
        }
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> WatcherStatsSnapshot {
        WatcherStatsSnapshot {
            polls: self.polls.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            last_error: self.last_error.lock().ok().and_then(|e| e.clone()),
            last_success_at: self.last_success_at.lock().ok().and_then(|t| *t),
        }
    }
}

/// 服务发现轮询器
///
/// 只持有 Resolver 的弱引用，Resolver 的生命周期由 RPC 连接及其 Channel 克隆决定
pub struct DiscoveryWatcher {
    registry: Arc<dyn RegistryClient>,
    resolver: Weak<Resolver>,
    service_name: ServiceName,
    interval: Duration,
}

impl DiscoveryWatcher {
    /// 创建处于 `Idle` 状态的轮询器
    ///
    /// `interval` 为零时使用 [`DEFAULT_POLL_INTERVAL`]
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        resolver: &Arc<Resolver>,
        service_name: ServiceName,
        interval: Duration,
    ) -> Self {
        let interval = if interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };
        Self {
            registry,
            resolver: Arc::downgrade(resolver),
            service_name,
            interval,
        }
    }

    pub fn state(&self) -> WatcherState {
        WatcherState::Idle
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 启动后台轮询，直到 `cancel` 被触发
    ///
    /// 消费 self：停止后的轮询器不能重新启动，需要重新创建
    pub fn start(self, cancel: CancellationToken) -> WatcherHandle {
        let (state_tx, state_rx) = watch::channel(WatcherState::Running);
        let stats = Arc::new(WatcherStats::default());

        info!(
            service = %self.service_name,
            registry = self.registry.name(),
            interval_ms = self.interval.as_millis() as u64,
            "🔄 Discovery watcher started"
        );

        let task_stats = stats.clone();
        let join = tokio::spawn(async move {
            self.run(cancel, task_stats).await;
            state_tx.send_replace(WatcherState::Stopped);
        });

        WatcherHandle {
            join,
            state: state_rx,
            stats,
        }
    }

    async fn run(self, cancel: CancellationToken, stats: Arc<WatcherStats>) {
        // 第一次查询发生在启动后一个完整周期，之后每个周期一次
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // 查询本身也与取消竞争，取消后不会再应用任何结果
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.registry.query_healthy(&self.service_name) => result,
            };

            let Some(resolver) = self.resolver.upgrade() else {
                warn!(
                    service = %self.service_name,
                    "Every connection bound to the resolver was dropped, stopping watcher"
                );
                break;
            };

            match result {
                Ok(instances) => {
                    stats.record_success();
                    let addresses = translate_instances(&self.service_name, &instances);
                    let changed = *resolver.addresses() != addresses;
                    if changed {
                        info!(
                            service = %self.service_name,
                            addresses = %addresses,
                            "Service address set changed"
                        );
                    } else {
                        debug!(
                            service = %self.service_name,
                            count = addresses.len(),
                            "Service address set refreshed"
                        );
                    }
                    resolver.update(addresses);
                }
                Err(e) => {
                    let consecutive = stats.record_failure(e.to_string());
                    warn!(
                        service = %self.service_name,
                        registry = self.registry.name(),
                        error = %e,
                        consecutive_failures = consecutive,
                        "Failed to refresh service instances, keeping previous address set"
                    );
                }
            }
        }

        info!(service = %self.service_name, "🛑 Discovery watcher stopped");
    }
}

/// 已启动轮询任务的句柄
#[derive(Debug)]
pub struct WatcherHandle {
    join: JoinHandle<()>,
    state: watch::Receiver<WatcherState>,
    stats: Arc<WatcherStats>,
}

impl WatcherHandle {
    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> WatcherStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// 等待任务结束（需要先触发取消信号）
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            warn!(error = %e, "Discovery watcher task panicked or was aborted");
        }
    }
}
