//! 轮询负载均衡 Channel
//!
//! `RoundRobinChannel` 实现 `tower::Service<http::Request<Body>>`，可直接作为
//! tonic 生成客户端的传输层。它读取 Resolver 的地址集，在地址集被替换时重建
//! 所有克隆共享的 Channel 缓存（仍存在的地址复用原 Channel），每次调用按轮询选择一个槽位。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use tonic::Status;
use tonic::body::Body;
use tonic::transport::{Channel, Endpoint};
use tower::{Service, ServiceExt};

use crate::discovery::connection::TransportSecurity;
use crate::discovery::instance::{Address, AddressSet, ServiceName};
use crate::discovery::resolver::Resolver;
use crate::error::{DiscoveryError, Result};

/// 轮询选择器
///
/// 游标在同一连接的所有克隆之间共享
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在 `len` 个槽位中选择下一个，`len == 0` 时返回 None
    pub fn pick(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        Some(index % len)
    }
}

/// 地址到 Endpoint 的构建模板
#[derive(Debug, Clone)]
pub struct EndpointTemplate {
    pub security: TransportSecurity,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for EndpointTemplate {
    fn default() -> Self {
        Self {
            security: TransportSecurity::Insecure,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl EndpointTemplate {
    /// 构建 Endpoint（不建立连接）
    pub fn endpoint(&self, address: &Address) -> Result<Endpoint> {
        let uri = format!("{}://{}", self.security.scheme(), address);
        let invalid = |reason: String| DiscoveryError::InvalidAddress {
            address: address.to_string(),
            reason,
        };

        let mut endpoint = Endpoint::from_shared(uri)
            .map_err(|e| invalid(e.to_string()))?
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout);

        if let TransportSecurity::Tls(tls) = &self.security {
            endpoint = endpoint
                .tls_config(tls.clone())
                .map_err(|e| DiscoveryError::transport(format!("invalid tls config: {}", e)))?;
        }

        Ok(endpoint)
    }

    /// 构建懒连接的 Channel，首次请求时才真正建连
    pub fn connect_lazy(&self, address: &Address) -> Result<Channel> {
        Ok(self.endpoint(address)?.connect_lazy())
    }
}

/// 从某一版本地址集构建出的路由表
#[derive(Default)]
struct Routes {
    source: Option<Arc<AddressSet>>,
    slots: Vec<(Address, Channel)>,
    by_address: HashMap<Address, Channel>,
}

impl Routes {
    /// 地址集被替换时重建，仍存在的地址复用原 Channel
    fn refresh(&mut self, service: &ServiceName, current: Arc<AddressSet>, template: &EndpointTemplate) {
        if let Some(source) = &self.source
            && Arc::ptr_eq(source, &current)
        {
            return;
        }

        let mut by_address: HashMap<Address, Channel> = HashMap::with_capacity(current.len());
        let mut slots = Vec::with_capacity(current.len());
        for address in current.iter() {
            let cached = by_address
                .get(address)
                .or_else(|| self.by_address.get(address))
                .cloned();
            let channel = match cached {
                Some(channel) => channel,
                None => match template.connect_lazy(address) {
                    Ok(channel) => channel,
                    Err(e) => {
                        tracing::warn!(
                            service = %service,
                            address = %address,
                            error = %e,
                            "Skipping address that cannot be turned into an endpoint"
                        );
                        continue;
                    }
                },
            };
            by_address.insert(address.clone(), channel.clone());
            slots.push((address.clone(), channel));
        }

        tracing::debug!(
            service = %service,
            slots = slots.len(),
            endpoints = by_address.len(),
            "Rebuilt round-robin routes"
        );

        self.source = Some(current);
        self.slots = slots;
        self.by_address = by_address;
    }
}

/// 按轮询策略在当前地址集上分发请求的 Channel
///
/// 持有 Resolver 的强引用：只要还有一个克隆存活，Resolver 和后台轮询就继续工作。
/// 路由表与轮询游标在所有克隆之间共享，每个地址只对应一个底层连接。
#[derive(Clone)]
pub struct RoundRobinChannel {
    resolver: Arc<Resolver>,
    template: Arc<EndpointTemplate>,
    cursor: Arc<RoundRobin>,
    routes: Arc<Mutex<Routes>>,
}

impl RoundRobinChannel {
    pub fn new(resolver: Arc<Resolver>, template: EndpointTemplate) -> Self {
        Self {
            resolver,
            template: Arc::new(template),
            cursor: Arc::new(RoundRobin::new()),
            routes: Arc::new(Mutex::new(Routes::default())),
        }
    }

    pub fn service_name(&self) -> &ServiceName {
        self.resolver.service_name()
    }

    /// 绑定的 Resolver
    pub fn resolver(&self) -> Arc<Resolver> {
        self.resolver.clone()
    }

    fn next_route(&self) -> Option<(Address, Channel)> {
        let current = self.resolver.addresses();
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.refresh(self.resolver.service_name(), current, &self.template);
        let index = self.cursor.pick(routes.slots.len())?;
        routes.slots.get(index).cloned()
    }

    /// 选出下一次调用将使用的地址（会推进轮询游标）
    pub fn next_address(&self) -> Option<Address> {
        self.next_route().map(|(address, _)| address)
    }

    /// 当前路由表中不同地址（底层连接）的数量
    pub fn endpoint_count(&self) -> usize {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_address
            .len()
    }
}

impl std::fmt::Debug for RoundRobinChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundRobinChannel")
            .field("resolver", &self.resolver)
            .field("endpoints", &self.endpoint_count())
            .finish()
    }
}

impl Service<http::Request<Body>> for RoundRobinChannel {
    type Response = http::Response<Body>;
    type Error = tower::BoxError;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        // 每个 Channel 的就绪检查在 oneshot 中完成
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<Body>) -> Self::Future {
        match self.next_route() {
            Some((_, channel)) => {
                Box::pin(async move { channel.oneshot(req).await.map_err(tower::BoxError::from) })
            }
            None => {
                let status = Status::unavailable(format!(
                    "no available endpoints for service `{}`",
                    self.service_name()
                ));
                Box::pin(futures::future::ready(Err::<Self::Response, _>(
                    tower::BoxError::from(status),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::instance::ServiceInstance;

    fn set(hosts: &[&str]) -> AddressSet {
        hosts
            .iter()
            .map(|h| ServiceInstance::new(*h, 9000).to_address())
            .collect()
    }

    fn resolver_with(hosts: &[&str]) -> Arc<Resolver> {
        let resolver = Arc::new(Resolver::new(ServiceName::new("profile").unwrap()));
        if !hosts.is_empty() {
            resolver.initialize(set(hosts)).unwrap();
        }
        resolver
    }

    fn channel_for(resolver: &Arc<Resolver>) -> RoundRobinChannel {
        RoundRobinChannel::new(resolver.clone(), EndpointTemplate::default())
    }

    #[test]
    fn test_round_robin_cycles() {
        let rr = RoundRobin::new();
        let picks: Vec<_> = (0..6).map(|_| rr.pick(3).unwrap()).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(rr.pick(0), None);
    }

    #[test]
    fn test_endpoint_scheme_follows_security() {
        let template = EndpointTemplate::default();
        let address = ServiceInstance::new("10.0.0.1", 9000).to_address();
        let endpoint = template.endpoint(&address).unwrap();
        assert_eq!(endpoint.uri().scheme_str(), Some("http"));
        assert_eq!(endpoint.uri().authority().unwrap().as_str(), "10.0.0.1:9000");
    }

    #[test]
    fn test_endpoint_accepts_ipv6_address() {
        let template = EndpointTemplate::default();
        let address = ServiceInstance::new("fe80::1", 9000).to_address();
        let endpoint = template.endpoint(&address).unwrap();
        assert_eq!(endpoint.uri().host(), Some("[fe80::1]"));
        assert_eq!(endpoint.uri().port_u16(), Some(9000));
    }

    #[tokio::test]
    async fn test_next_address_follows_resolver_updates() {
        let resolver = resolver_with(&["10.0.0.1", "10.0.0.2"]);
        let channel = channel_for(&resolver);

        let picks: Vec<String> = (0..4)
            .map(|_| channel.next_address().unwrap().to_string())
            .collect();
        assert_eq!(
            picks,
            vec!["10.0.0.1:9000", "10.0.0.2:9000", "10.0.0.1:9000", "10.0.0.2:9000"]
        );

        resolver.update(AddressSet::empty());
        assert_eq!(channel.next_address(), None);

        resolver.update(set(&["10.0.0.3"]));
        assert_eq!(channel.next_address().unwrap(), "10.0.0.3:9000");
    }

    #[tokio::test]
    async fn test_duplicates_get_one_slot_each() {
        let resolver = resolver_with(&["10.0.0.1", "10.0.0.1", "10.0.0.2"]);
        let channel = channel_for(&resolver);

        let picks: Vec<String> = (0..3)
            .map(|_| channel.next_address().unwrap().to_string())
            .collect();
        assert_eq!(picks, vec!["10.0.0.1:9000", "10.0.0.1:9000", "10.0.0.2:9000"]);
        assert_eq!(channel.endpoint_count(), 2);
    }

    #[tokio::test]
    async fn test_clones_share_routes_and_cursor() {
        let resolver = resolver_with(&["10.0.0.1"]);
        let channel = channel_for(&resolver);
        assert_eq!(channel.next_address().unwrap(), "10.0.0.1:9000");

        resolver.update(set(&["10.0.0.1", "10.0.0.2"]));
        let picks: Vec<String> = (0..4)
            .map(|_| channel.clone().next_address().unwrap().to_string())
            .collect();
        assert_eq!(
            picks,
            vec!["10.0.0.2:9000", "10.0.0.1:9000", "10.0.0.2:9000", "10.0.0.1:9000"]
        );

        // 所有克隆共用一张路由表，未因克隆而新建连接
        let first = channel.clone();
        let second = channel.clone();
        let routes_a = first.routes.lock().unwrap();
        assert_eq!(routes_a.by_address.len(), 2);
        drop(routes_a);
        assert!(Arc::ptr_eq(&first.routes, &second.routes));
    }

    #[tokio::test]
    async fn test_channel_keeps_resolver_alive() {
        let resolver = resolver_with(&["10.0.0.1"]);
        let weak = Arc::downgrade(&resolver);
        let channel = channel_for(&resolver);
        drop(resolver);

        assert!(weak.upgrade().is_some());
        drop(channel);
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_call_with_empty_set_is_unavailable() {
        let resolver = resolver_with(&[]);
        let mut channel = channel_for(&resolver);

        let err = channel
            .call(http::Request::new(Body::empty()))
            .await
            .unwrap_err();
        let status = err.downcast::<Status>().unwrap();
        assert_eq!(status.code(), tonic::Code::Unavailable);
    }
}
