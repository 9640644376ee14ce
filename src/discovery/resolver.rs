//! 地址集持有者
//!
//! Resolver 持有当前生效的地址集，由 RPC 连接的负载均衡层读取，
//! 由唯一的 DiscoveryWatcher 写入。每次更新都是整体替换一个 `Arc<AddressSet>`，
//! 读者只会看到替换前或替换后的完整集合。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::discovery::instance::{AddressSet, ServiceName};
use crate::error::{DiscoveryError, Result};

pub struct Resolver {
    service_name: ServiceName,
    state: watch::Sender<Arc<AddressSet>>,
    initialized: AtomicBool,
}

impl Resolver {
    /// 创建未初始化的 Resolver（地址集为空）
    pub fn new(service_name: ServiceName) -> Self {
        let (state, _) = watch::channel(Arc::new(AddressSet::empty()));
        Self {
            service_name,
            state,
            initialized: AtomicBool::new(false),
        }
    }

    /// 安装初始地址集，只能调用一次
    ///
    /// 非空约束由 ConnectionFactory 保证，这里不检查
    pub fn initialize(&self, addresses: AddressSet) -> Result<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Err(DiscoveryError::AlreadyInitialized {
                service: self.service_name.to_string(),
            });
        }
        self.state.send_replace(Arc::new(addresses));
        Ok(())
    }

    /// 整体替换地址集，空集合同样会被安装
    pub fn update(&self, addresses: AddressSet) {
        let previous = self.state.send_replace(Arc::new(addresses));
        tracing::trace!(
            service = %self.service_name,
            previous = previous.len(),
            current = self.state.borrow().len(),
            "Resolver address set replaced"
        );
    }

    /// 当前地址集快照
    pub fn addresses(&self) -> Arc<AddressSet> {
        self.state.borrow().clone()
    }

    /// 订阅地址集变化
    pub fn subscribe(&self) -> watch::Receiver<Arc<AddressSet>> {
        self.state.subscribe()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn service_name(&self) -> &ServiceName {
        &self.service_name
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("service_name", &self.service_name)
            .field("addresses", &*self.addresses())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
