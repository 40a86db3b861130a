use crate::endpoint::{Endpoint, EndpointId};
use crate::sync::{Arc, Mutex};
use std::collections::BTreeMap;
use std::vec::Vec;

/// The list of every live endpoint in a domain.
///
/// Endpoints insert themselves when created and are removed by the destroy
/// path. Membership does not keep an endpoint alive in the accounting sense:
/// only its `open_count` does.
///
/// 域内所有存活端点的列表。
/// 端点在创建时加入，由销毁路径移除。
/// 注册关系不会在计数意义上保持端点存活，只有 `open_count` 会。
pub(crate) struct Registry {
    endpoints: Mutex<BTreeMap<EndpointId, Arc<Endpoint>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            endpoints: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn insert(&self, endpoint: Arc<Endpoint>) {
        self.endpoints.lock().insert(endpoint.id(), endpoint);
    }

    /// Returns `true` if the endpoint was still registered.
    pub(crate) fn remove(&self, id: EndpointId) -> bool {
        self.endpoints.lock().remove(&id).is_some()
    }

    /// Copy of the current membership, in identifier order.
    ///
    /// The collector works on this copy so the registry lock is not held
    /// while the destroy path removes entries.
    ///
    /// 当前成员的副本，按标识符排序。
    /// 回收器基于此副本工作，因此销毁路径移除条目时不持有注册表锁。
    pub(crate) fn snapshot(&self) -> Vec<Arc<Endpoint>> {
        self.endpoints.lock().values().cloned().collect()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.endpoints.lock().len()
    }
}
