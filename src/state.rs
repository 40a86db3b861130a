use crate::endpoint::EndpointId;
#[cfg(all(test, not(feature = "loom")))]
use crate::endpoint::Endpoint;
#[cfg(all(test, not(feature = "loom")))]
use crate::sync::Arc;
use crate::registry::Registry;
use crate::sync::{AtomicBool, AtomicU64, AtomicUsize, Mutex};
use std::boxed::Box;

/// Default ceiling of the walker's explicit stack: one 4 KiB page of pointer-sized slots.
/// 遍历器显式栈的默认上限：一个 4 KiB 页面可容纳的指针大小槽位数。
pub(crate) const DEFAULT_MAX_STACK_DEPTH: usize = 4096 / std::mem::size_of::<usize>();

/// Default in-flight total above which a send triggers a collection.
/// 发送后触发回收的默认在途引用总数阈值。
pub(crate) const DEFAULT_AUTO_COLLECT_THRESHOLD: usize = 16_000;

/// Upper bound on root-and-mark re-runs caused by vetoed destroys within one invocation.
/// 单次调用中，因销毁被否决而重新执行根选择与标记的次数上限。
pub(crate) const MAX_COLLECTION_PASSES: usize = 4;

/// Teardown hook invoked once per destroyed endpoint.
/// 每个被销毁的端点调用一次的拆除回调。
pub(crate) type DestroyHook = Box<dyn Fn(EndpointId) + Send + Sync + 'static>;

/// Test hook run after marking and before the hit list is built, with the
/// collection lock held. Receives the pass's registry snapshot.
#[cfg(all(test, not(feature = "loom")))]
pub(crate) type BeforeSweepHook = Box<dyn Fn(&[Arc<Endpoint>]) + Send + Sync + 'static>;

/// What the walker does when its explicit stack would exceed the configured ceiling.
///
/// 当遍历器的显式栈将超过配置上限时的处理方式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Abandon the pass: nothing is destroyed, every mark is cleared and
    /// `collect()` returns `CollectError::GraphTooDeep`.
    ///
    /// 放弃本轮回收：不销毁任何端点，清除所有标记，
    /// `collect()` 返回 `CollectError::GraphTooDeep`。
    #[default]
    Degrade,
    /// Log the failure and panic.
    /// 记录失败并 panic。
    Abort,
}

/// Immutable per-domain settings, fixed by `GcDomainBuilder::build()`.
/// 每个域的不可变配置，由 `GcDomainBuilder::build()` 确定。
pub(crate) struct Config {
    pub(crate) max_stack_depth: usize,
    pub(crate) overflow_policy: OverflowPolicy,
    pub(crate) auto_collect_threshold: Option<usize>,
    pub(crate) collect_on_close: bool,
    pub(crate) on_destroy: Option<DestroyHook>,
}

/// Global shared state for one collector domain.
///
/// Holds the endpoint registry, the domain-wide collection lock and the
/// counters every endpoint reports into.
///
/// 一个回收域的全局共享状态。
/// 包含端点注册表、域级回收锁以及所有端点上报的计数器。
pub(crate) struct SharedState {
    /// Serializes a whole collection pass against send, receive and destroy.
    /// 将整个回收过程与发送、接收和销毁串行化。
    pub(crate) gc_lock: Mutex<()>,
    /// Reentrancy flag: `true` while a pass is running.
    /// 重入标志：回收进行期间为 `true`。
    pub(crate) collecting: AtomicBool,
    /// Every live endpoint of this domain.
    /// 本域所有存活端点。
    pub(crate) registry: Registry,
    /// Sum of `inflight_count` over all endpoints.
    /// 所有端点 `inflight_count` 之和。
    pub(crate) total_inflight: AtomicUsize,
    /// Live `GcDomain` values; the last one to drop runs a final collection.
    /// 存活的 `GcDomain` 数量；最后一个被 drop 时执行最终回收。
    pub(crate) domains: AtomicUsize,
    /// Next endpoint identifier.
    pub(crate) next_endpoint_id: AtomicU64,
    /// Next collection identifier, used to correlate log events.
    pub(crate) next_gc_id: AtomicU64,
    pub(crate) config: Config,
    #[cfg(all(test, not(feature = "loom")))]
    pub(crate) before_sweep: Mutex<Option<BeforeSweepHook>>,
}

impl SharedState {
    pub(crate) fn new(config: Config) -> Self {
        Self {
            gc_lock: Mutex::new(()),
            collecting: AtomicBool::new(false),
            registry: Registry::new(),
            total_inflight: AtomicUsize::new(0),
            domains: AtomicUsize::new(0),
            next_endpoint_id: AtomicU64::new(1),
            next_gc_id: AtomicU64::new(1),
            config,
            #[cfg(all(test, not(feature = "loom")))]
            before_sweep: Mutex::new(None),
        }
    }
}
