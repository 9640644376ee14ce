//! 测试公共工具：可编排响应的注册中心桩

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use flare_discovery::{RegistryClient, RegistryError, ServiceInstance, ServiceName};

/// 单次查询的编排结果
#[derive(Clone)]
pub enum Reply {
    Instances(Vec<ServiceInstance>),
    Fail(String),
    /// 等待一段时间后返回实例（用于模拟慢查询）
    Slow(Duration, Vec<ServiceInstance>),
}

/// 按顺序返回编排结果的注册中心；脚本耗尽后重复最后一个结果
pub struct ScriptedRegistry {
    script: Mutex<VecDeque<Reply>>,
    last: Mutex<Reply>,
    calls: AtomicUsize,
}

impl ScriptedRegistry {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            last: Mutex::new(Reply::Instances(vec![])),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(instances: Vec<ServiceInstance>) -> Self {
        Self::new(vec![Reply::Instances(instances)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Reply {
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = script.pop_front() {
            *last = reply;
        }
        last.clone()
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    async fn query_healthy(
        &self,
        _service: &ServiceName,
    ) -> Result<Vec<ServiceInstance>, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_reply() {
            Reply::Instances(instances) => Ok(instances),
            Reply::Fail(reason) => Err(RegistryError::unavailable(reason)),
            Reply::Slow(delay, instances) => {
                tokio::time::sleep(delay).await;
                Ok(instances)
            }
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn service(name: &str) -> ServiceName {
    ServiceName::new(name).unwrap()
}

pub fn inst(host: &str, port: u16) -> ServiceInstance {
    ServiceInstance::new(host, port)
}

pub fn addrs(set: &flare_discovery::AddressSet) -> Vec<String> {
    set.iter().map(|a| a.to_string()).collect()
}
