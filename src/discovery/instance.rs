//! 服务实例、地址与地址集定义

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, Result};

/// 服务名（注册中心中的逻辑服务标识）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceName(Arc<str>);

impl ServiceName {
    /// 创建服务名，空串或纯空白返回 `InvalidServiceName`
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DiscoveryError::InvalidServiceName(name));
        }
        Ok(Self(Arc::from(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServiceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ServiceName {
    type Error = DiscoveryError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ServiceName> for String {
    fn from(name: ServiceName) -> Self {
        name.0.to_string()
    }
}

/// 服务实例
///
/// 注册中心每次查询返回的瞬时记录，核心逻辑只读取 `host` 和 `port`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInstance {
    /// 实例 ID（注册中心内唯一，缺省时由 host:port 生成）
    pub instance_id: String,

    /// 主机（IP 或域名）
    pub host: String,

    /// 端口
    pub port: u16,

    /// 自定义标签
    pub tags: HashMap<String, String>,
}

impl ServiceInstance {
    /// 创建新的服务实例
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            instance_id: format!("{}:{}", host, port),
            host,
            port,
            tags: HashMap::new(),
        }
    }

    /// 设置实例 ID
    pub fn with_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    /// 添加标签
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// 主机非空且不含空白，端口非零
    pub fn is_well_formed(&self) -> bool {
        !self.host.is_empty()
            && !self.host.chars().any(char::is_whitespace)
            && self.port != 0
    }

    /// 转换为可连接地址
    pub fn to_address(&self) -> Address {
        Address::from_instance(self)
    }
}

/// 可连接地址（`host:port`）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// 由服务实例生成地址：`host + ":" + port`
    ///
    /// IPv6 字面量主机加上方括号（`[fe80::1]:9000`），已带括号的保持不变
    pub fn from_instance(instance: &ServiceInstance) -> Self {
        let host = &instance.host;
        if host.contains(':') && !host.starts_with('[') {
            Self(format!("[{}]:{}", host, instance.port))
        } else {
            Self(format!("{}:{}", host, instance.port))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&ServiceInstance> for Address {
    fn from(instance: &ServiceInstance) -> Self {
        Address::from_instance(instance)
    }
}

impl PartialEq<&str> for Address {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// 地址集
///
/// 顺序与注册中心返回一致，不去重
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressSet(Vec<Address>);

impl AddressSet {
    pub fn new(addresses: Vec<Address>) -> Self {
        Self(addresses)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Address> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&Address> {
        self.0.get(index)
    }
}

impl FromIterator<Address> for AddressSet {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a AddressSet {
    type Item = &'a Address;
    type IntoIter = std::slice::Iter<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for AddressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, address) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            f.write_str(address.as_str())?;
        }
        f.write_str("]")
    }
}

/// 将注册中心返回的实例列表翻译为地址集
///
/// 保持顺序与重复；格式错误的实例被丢弃并记录告警，不会让调用方失败
pub fn translate_instances(service: &ServiceName, instances: &[ServiceInstance]) -> AddressSet {
    instances
        .iter()
        .filter(|instance| {
            let ok = instance.is_well_formed();
            if !ok {
                tracing::warn!(
                    service = %service,
                    instance_id = %instance.instance_id,
                    host = %instance.host,
                    port = instance.port,
                    "Dropping malformed service instance"
                );
            }
            ok
        })
        .map(Address::from_instance)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ServiceName {
        ServiceName::new("user-profile").unwrap()
    }

    #[test]
    fn test_service_name_rejects_blank() {
        assert!(ServiceName::new("").is_err());
        assert!(ServiceName::new("   ").is_err());
        assert_eq!(ServiceName::new("search").unwrap().as_str(), "search");
    }

    #[test]
    fn test_address_is_host_colon_port() {
        let instance = ServiceInstance::new("10.0.0.1", 9000);
        assert_eq!(instance.to_address(), "10.0.0.1:9000");
        assert_eq!(instance.instance_id, "10.0.0.1:9000");
    }

    #[test]
    fn test_ipv6_host_is_bracketed() {
        assert_eq!(ServiceInstance::new("fe80::1", 9000).to_address(), "[fe80::1]:9000");
        assert_eq!(ServiceInstance::new("[::1]", 50051).to_address(), "[::1]:50051");
    }

    #[test]
    fn test_translate_keeps_order_and_duplicates() {
        let instances = vec![
            ServiceInstance::new("10.0.0.2", 9000),
            ServiceInstance::new("10.0.0.1", 9000),
            ServiceInstance::new("10.0.0.2", 9000),
        ];
        let set = translate_instances(&service(), &instances);
        let got: Vec<&str> = set.iter().map(Address::as_str).collect();
        assert_eq!(got, vec!["10.0.0.2:9000", "10.0.0.1:9000", "10.0.0.2:9000"]);
    }

    #[test]
    fn test_translate_drops_malformed() {
        let instances = vec![
            ServiceInstance::new("", 9000),
            ServiceInstance::new("10.0.0.1", 0),
            ServiceInstance::new("bad host", 80),
            ServiceInstance::new("profile.internal", 7000),
        ];
        let set = translate_instances(&service(), &instances);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0).unwrap(), &"profile.internal:7000");
    }

    #[test]
    fn test_address_set_display() {
        let set: AddressSet = vec![
            ServiceInstance::new("a", 1).to_address(),
            ServiceInstance::new("b", 2).to_address(),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.to_string(), "[a:1, b:2]");
        assert_eq!(AddressSet::empty().to_string(), "[]");
    }
}
