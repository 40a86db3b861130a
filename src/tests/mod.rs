mod walker_tests;

use crate::endpoint::EndpointId;
use crate::{EndpointHandle, GcDomain, Message};
use std::collections::BTreeSet;

/// 测试用域：关闭发送时的自动回收
pub(super) fn manual_domain() -> GcDomain {
    GcDomain::builder().auto_collect_threshold(None).build()
}

/// 把 `to` 的一个副本放进 `from` 的队列
pub(super) fn pass(from: &EndpointHandle, to: &EndpointHandle) {
    from.send(Message::default().with_endpoint(to)).unwrap();
}

/// 注册表中仍然存活的端点
pub(super) fn live_ids(domain: &GcDomain) -> BTreeSet<EndpointId> {
    domain
        .shared()
        .registry
        .snapshot()
        .iter()
        .map(|endpoint| endpoint.id())
        .collect()
}

/// 注册表中是否还有被标记的端点
pub(super) fn any_marked(domain: &GcDomain) -> bool {
    domain
        .shared()
        .registry
        .snapshot()
        .iter()
        .any(|endpoint| endpoint.is_marked())
}

/// 确定性的伪随机数生成器（线性同余），用于生成随机图
pub(super) struct Lcg(u64);

impl Lcg {
    pub(super) fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub(super) fn next_below(&mut self, bound: usize) -> usize {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % bound
    }
}
